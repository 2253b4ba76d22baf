//! Table axes: bin edges, coordinate transforms and per-axis lookup.

use pt_core::{Error, Result};
use serde::{Deserialize, Serialize};

/// Monotone map applied to both coordinates and edges before lookup.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub enum Transform {
    /// `x`
    #[default]
    Identity,
    /// `ln(x)`; non-positive coordinates fall out of range.
    Log,
    /// `x^exponent` for `x >= 0`; negative coordinates fall out of range.
    Power {
        /// Strictly positive exponent.
        exponent: f64,
    },
}

impl Transform {
    /// Apply the transform. Values outside the domain map to NaN.
    #[inline]
    pub fn apply(&self, x: f64) -> f64 {
        match *self {
            Transform::Identity => x,
            Transform::Log => {
                if x > 0.0 {
                    x.ln()
                } else {
                    f64::NAN
                }
            }
            Transform::Power { exponent } => {
                if x >= 0.0 {
                    x.powf(exponent)
                } else {
                    f64::NAN
                }
            }
        }
    }

    fn validate(&self) -> std::result::Result<(), String> {
        match *self {
            Transform::Power { exponent } if !(exponent.is_finite() && exponent > 0.0) => {
                Err(format!("power transform exponent must be finite and > 0, got {exponent}"))
            }
            _ => Ok(()),
        }
    }
}

/// How an axis's edges are generated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub enum Binning {
    /// `bins` equal-width bins spanning `[min, max]`.
    Uniform {
        /// Lower edge of the first bin.
        min: f64,
        /// Upper edge of the last bin.
        max: f64,
        /// Number of bins.
        bins: usize,
    },
    /// `bins` bins of equal width in `ln(x)`; requires `min > 0`.
    Logarithmic {
        /// Lower edge of the first bin.
        min: f64,
        /// Upper edge of the last bin.
        max: f64,
        /// Number of bins.
        bins: usize,
    },
    /// Caller-supplied edges (length = n_bins + 1).
    Explicit {
        /// Bin edges, strictly increasing.
        edges: Vec<f64>,
    },
}

impl Binning {
    /// Materialize the edge list. The first and last edges are exactly `min` and `max`.
    pub fn edges(&self) -> Result<Vec<f64>> {
        match *self {
            Binning::Uniform { min, max, bins } => {
                check_range(min, max, bins)?;
                Ok(spaced(bins, min, max, |t| min + (max - min) * t))
            }
            Binning::Logarithmic { min, max, bins } => {
                check_range(min, max, bins)?;
                if min <= 0.0 {
                    return Err(Error::InvalidConfig(format!(
                        "logarithmic binning requires min > 0, got {min}"
                    )));
                }
                let (lo, hi) = (min.ln(), max.ln());
                Ok(spaced(bins, min, max, |t| (lo + (hi - lo) * t).exp()))
            }
            Binning::Explicit { ref edges } => Ok(edges.clone()),
        }
    }
}

fn check_range(min: f64, max: f64, bins: usize) -> Result<()> {
    if bins == 0 {
        return Err(Error::InvalidConfig("binning needs at least one bin".into()));
    }
    if !(min.is_finite() && max.is_finite() && min < max) {
        return Err(Error::InvalidConfig(format!("invalid binning range [{min}, {max}]")));
    }
    Ok(())
}

fn spaced(bins: usize, min: f64, max: f64, f: impl Fn(f64) -> f64) -> Vec<f64> {
    let mut edges = Vec::with_capacity(bins + 1);
    edges.push(min);
    for i in 1..bins {
        edges.push(f(i as f64 / bins as f64));
    }
    edges.push(max);
    edges
}

/// One table dimension.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Axis {
    label: String,
    unit: String,
    transform: Transform,
    edges: Vec<f64>,
    inclusive_upper: bool,
    #[serde(skip)]
    transformed: Vec<f64>,
}

impl Axis {
    /// Create an axis from physical edges.
    ///
    /// Fails with [`Error::InvalidConfig`] unless there are at least two edges
    /// and the transformed edges are finite and strictly increasing.
    pub fn new(
        label: impl Into<String>,
        unit: impl Into<String>,
        transform: Transform,
        edges: Vec<f64>,
        inclusive_upper: bool,
    ) -> Result<Self> {
        let label = label.into();
        transform.validate().map_err(|e| Error::InvalidConfig(format!("axis '{label}': {e}")))?;
        if edges.len() < 2 {
            return Err(Error::InvalidConfig(format!(
                "axis '{label}': need at least 2 edges, got {}",
                edges.len()
            )));
        }
        let transformed: Vec<f64> = edges.iter().map(|&e| transform.apply(e)).collect();
        if let Some(i) = transformed.iter().position(|t| !t.is_finite()) {
            return Err(Error::InvalidConfig(format!(
                "axis '{label}': edge {} ({}) is outside the transform domain",
                i, edges[i]
            )));
        }
        if let Some(w) = transformed.windows(2).position(|w| w[0] >= w[1]) {
            return Err(Error::InvalidConfig(format!(
                "axis '{label}': edges not strictly increasing at index {}",
                w + 1
            )));
        }
        Ok(Self { label, unit: unit.into(), transform, edges, inclusive_upper, transformed })
    }

    /// Axis label, e.g. `"r"`.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Physical unit of the coordinate, e.g. `"m"`.
    pub fn unit(&self) -> &str {
        &self.unit
    }

    /// Coordinate transform.
    pub fn transform(&self) -> Transform {
        self.transform
    }

    /// Physical bin edges (length = n_bins + 1).
    pub fn edges(&self) -> &[f64] {
        &self.edges
    }

    /// Whether the last bin's upper edge is inclusive.
    pub fn inclusive_upper(&self) -> bool {
        self.inclusive_upper
    }

    /// Number of bins.
    #[inline]
    pub fn n_bins(&self) -> usize {
        self.edges.len() - 1
    }

    /// Bin index of a physical coordinate, or `None` if it is out of range.
    ///
    /// Bins are half-open: a coordinate on an interior edge lands in the upper bin.
    #[inline]
    pub fn locate(&self, x: f64) -> Option<usize> {
        let t = self.transform.apply(x);
        if t.is_nan() {
            return None;
        }
        let first = self.transformed[0];
        let last = self.transformed[self.transformed.len() - 1];
        if t < first {
            return None;
        }
        if t >= last {
            return (self.inclusive_upper && t == last).then(|| self.n_bins() - 1);
        }
        // t in [first, last): at least one edge is <= t.
        Some(self.transformed.partition_point(|&e| e <= t) - 1)
    }

    /// Physical `(lower, upper)` bounds of bin `i`.
    pub fn bin_bounds(&self, i: usize) -> Option<(f64, f64)> {
        if i < self.n_bins() { Some((self.edges[i], self.edges[i + 1])) } else { None }
    }

    /// Physical width of bin `i`.
    pub fn bin_width(&self, i: usize) -> Option<f64> {
        self.bin_bounds(i).map(|(lo, hi)| hi - lo)
    }

    /// Describe the first difference from `other`, or `None` if the definitions match.
    pub(crate) fn difference(&self, other: &Axis) -> Option<String> {
        if self.label != other.label || self.unit != other.unit {
            return Some(format!(
                "axis '{}' [{}] vs '{}' [{}]",
                self.label, self.unit, other.label, other.unit
            ));
        }
        if self.edges.len() != other.edges.len() {
            return Some(format!(
                "axis '{}': {} edges vs {}",
                self.label,
                self.edges.len(),
                other.edges.len()
            ));
        }
        if self.transform != other.transform {
            return Some(format!(
                "axis '{}': transform {:?} vs {:?}",
                self.label, self.transform, other.transform
            ));
        }
        if self.inclusive_upper != other.inclusive_upper {
            return Some(format!("axis '{}': inclusive_upper differs", self.label));
        }
        if let Some(i) =
            self.edges.iter().zip(&other.edges).position(|(a, b)| a.to_bits() != b.to_bits())
        {
            return Some(format!(
                "axis '{}': edge {} is {} vs {}",
                self.label, i, self.edges[i], other.edges[i]
            ));
        }
        None
    }
}

/// Declarative axis definition, as found in a table config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AxisSpec {
    /// Axis label.
    pub label: String,
    /// Physical unit.
    #[serde(default)]
    pub unit: String,
    /// Coordinate transform.
    #[serde(default)]
    pub transform: Transform,
    /// Edge generation.
    pub binning: Binning,
    /// Make the last bin's upper edge inclusive.
    #[serde(default)]
    pub inclusive_upper: bool,
}

impl AxisSpec {
    /// Axis with explicit edges and identity transform.
    pub fn explicit(label: impl Into<String>, unit: impl Into<String>, edges: Vec<f64>) -> Self {
        Self::with_binning(label, unit, Binning::Explicit { edges })
    }

    /// Linear axis with `bins` equal-width bins.
    pub fn uniform(
        label: impl Into<String>,
        unit: impl Into<String>,
        min: f64,
        max: f64,
        bins: usize,
    ) -> Self {
        Self::with_binning(label, unit, Binning::Uniform { min, max, bins })
    }

    /// Axis with `bins` logarithmically spaced bins.
    pub fn logarithmic(
        label: impl Into<String>,
        unit: impl Into<String>,
        min: f64,
        max: f64,
        bins: usize,
    ) -> Self {
        Self::with_binning(label, unit, Binning::Logarithmic { min, max, bins })
    }

    fn with_binning(label: impl Into<String>, unit: impl Into<String>, binning: Binning) -> Self {
        Self {
            label: label.into(),
            unit: unit.into(),
            transform: Transform::Identity,
            binning,
            inclusive_upper: false,
        }
    }

    /// Set the coordinate transform.
    pub fn transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    /// Make the last bin's upper edge inclusive.
    pub fn inclusive(mut self) -> Self {
        self.inclusive_upper = true;
        self
    }

    /// Build the axis.
    pub fn build(&self) -> Result<Axis> {
        Axis::new(
            self.label.clone(),
            self.unit.clone(),
            self.transform,
            self.binning.edges()?,
            self.inclusive_upper,
        )
    }
}
