//! Typed partition settings and restart layouts.
//!
//! Both types hold runtime-sized vectors so that a configuration loader can
//! produce them without knowing the mesh dimension; they are checked against
//! the compile-time dimension when converted into a [`PartitionInput`].

use serde::{Deserialize, Serialize};

use crate::decomp_error::DecompError;
use crate::partition::basis::BasisLayout;
use crate::partition::extent::PartitionInput;

/// Settings of one structured mesh.
///
/// The construction mode follows from which fields are present:
/// - only `nElementsGlobal` (and optionally `nRanks`): discover mode,
/// - `nElementsLocal`, `beginElementGlobal` and `nRanks`: given mode,
/// - `nElementsLocal` and `nRanks` without a begin: local-sizes mode
///   (`nElementsGlobal` is then derived and may be left empty).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartitionSettings {
    #[serde(default)]
    pub n_elements_global: Vec<usize>,
    #[serde(default)]
    pub n_ranks: Option<Vec<usize>>,
    #[serde(default)]
    pub n_elements_local: Option<Vec<usize>>,
    #[serde(default)]
    pub begin_element_global: Option<Vec<usize>>,
    #[serde(default)]
    pub basis: BasisLayout,
}

impl PartitionSettings {
    pub fn into_input<const D: usize>(&self) -> Result<PartitionInput<D>, DecompError> {
        match (&self.n_elements_local, &self.begin_element_global) {
            (None, None) => Ok(PartitionInput::Discover {
                n_elements_global: to_array("nElementsGlobal", &self.n_elements_global)?,
                n_ranks: self
                    .n_ranks
                    .as_deref()
                    .map(|n| to_array("nRanks", n))
                    .transpose()?,
            }),
            (Some(local), Some(begin)) => Ok(PartitionInput::Given {
                n_elements_global: to_array("nElementsGlobal", &self.n_elements_global)?,
                n_elements_local: to_array("nElementsLocal", local)?,
                begin_element_global: to_array("beginElementGlobal", begin)?,
                n_ranks: to_array("nRanks", self.required_n_ranks())?,
            }),
            (Some(local), None) => Ok(PartitionInput::LocalSizes {
                n_elements_local: to_array("nElementsLocal", local)?,
                n_ranks: to_array("nRanks", self.required_n_ranks())?,
            }),
            (None, Some(_)) => Err(DecompError::DimensionMismatch {
                field: "nElementsLocal",
                expected: D,
                got: 0,
            }),
        }
    }

    fn required_n_ranks(&self) -> &[usize] {
        self.n_ranks.as_deref().unwrap_or(&[])
    }
}

/// Serializable snapshot of a structured decomposition, fed back through
/// given mode to reproduce it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartitionLayout {
    pub n_elements_global: Vec<usize>,
    pub n_elements_local: Vec<usize>,
    pub begin_element_global: Vec<usize>,
    pub n_ranks: Vec<usize>,
}

impl PartitionLayout {
    pub fn into_input<const D: usize>(&self) -> Result<PartitionInput<D>, DecompError> {
        Ok(PartitionInput::Given {
            n_elements_global: to_array("nElementsGlobal", &self.n_elements_global)?,
            n_elements_local: to_array("nElementsLocal", &self.n_elements_local)?,
            begin_element_global: to_array("beginElementGlobal", &self.begin_element_global)?,
            n_ranks: to_array("nRanks", &self.n_ranks)?,
        })
    }

    /// Settings for the same decomposition with the given basis.
    pub fn to_settings(&self, basis: BasisLayout) -> PartitionSettings {
        PartitionSettings {
            n_elements_global: self.n_elements_global.clone(),
            n_ranks: Some(self.n_ranks.clone()),
            n_elements_local: Some(self.n_elements_local.clone()),
            begin_element_global: Some(self.begin_element_global.clone()),
            basis,
        }
    }
}

fn to_array<const D: usize>(field: &'static str, values: &[usize]) -> Result<[usize; D], DecompError> {
    values.try_into().map_err(|_| DecompError::DimensionMismatch {
        field,
        expected: D,
        got: values.len(),
    })
}
