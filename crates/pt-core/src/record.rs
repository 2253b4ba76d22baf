//! Photon detection records.

use serde::{Deserialize, Serialize};

/// One detected photon, as produced by an external propagation code.
///
/// Records are consumed by value; the table keeps nothing but the
/// statistics they contribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PhotonRecord {
    /// Physical coordinate, one component per table axis (e.g. `r`, zenith, `t`).
    pub coordinate: Vec<f64>,

    /// Statistical weight, `>= 0`. Zero-weight records are counted but carry no mass.
    #[serde(default = "unit_weight")]
    pub weight: f64,

    /// Value whose statistics are accumulated. When absent, the table uses
    /// the coordinate component of its value axis.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,

    /// Opaque producer tag (stream or seed index).
    #[serde(default)]
    pub source_id: u64,
}

fn unit_weight() -> f64 {
    1.0
}

impl PhotonRecord {
    /// Record whose accumulated value is taken from the table's value axis.
    pub fn new(coordinate: Vec<f64>, weight: f64, source_id: u64) -> Self {
        Self { coordinate, weight, value: None, source_id }
    }

    /// Record carrying an explicit accumulated value.
    pub fn with_value(coordinate: Vec<f64>, weight: f64, value: f64, source_id: u64) -> Self {
        Self { coordinate, weight, value: Some(value), source_id }
    }

    /// Number of coordinate components.
    pub fn dimension(&self) -> usize {
        self.coordinate.len()
    }
}
