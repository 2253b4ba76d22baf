//! Table construction config.
//!
//! This is the only runtime configuration the engine reads. Every level
//! rejects unknown keys, so a misspelt option fails loudly instead of being
//! ignored.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use pt_core::{Error, Result};
use serde::{Deserialize, Serialize};

use crate::axis::{Axis, AxisSpec};

/// Axes, seed and generator parameters for a new table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TableConfig {
    /// Axis definitions, in row-major order.
    pub axes: Vec<AxisSpec>,
    /// Seed that produced the photons accumulated into this table.
    pub seed: u64,
    /// Free-form description of the generator run (source depth, energy, ...).
    #[serde(default)]
    pub generator_parameters: BTreeMap<String, String>,
    /// Axis whose coordinate is accumulated when a record has no explicit value.
    /// Defaults to the last axis.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_axis: Option<usize>,
}

impl TableConfig {
    /// Config with no axes yet.
    pub fn new(seed: u64) -> Self {
        Self { axes: Vec::new(), seed, generator_parameters: BTreeMap::new(), value_axis: None }
    }

    /// Append an axis.
    pub fn axis(mut self, spec: AxisSpec) -> Self {
        self.axes.push(spec);
        self
    }

    /// Record a generator parameter.
    pub fn parameter(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.generator_parameters.insert(key.into(), value.to_string());
        self
    }

    /// Accumulate the coordinate of axis `index`.
    pub fn with_value_axis(mut self, index: usize) -> Self {
        self.value_axis = Some(index);
        self
    }

    /// Parse a JSON config.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: TableConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a JSON config file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_json_str(&std::fs::read_to_string(path)?)
    }

    /// Check the config without building the table.
    pub fn validate(&self) -> Result<()> {
        self.build_axes().map(|_| ())
    }

    /// Resolved value axis index.
    pub fn resolved_value_axis(&self) -> usize {
        self.value_axis.unwrap_or(self.axes.len().saturating_sub(1))
    }

    pub(crate) fn build_axes(&self) -> Result<Vec<Axis>> {
        if self.axes.is_empty() {
            return Err(Error::InvalidConfig("at least one axis is required".into()));
        }
        let mut seen = HashSet::new();
        for spec in &self.axes {
            if spec.label.is_empty() {
                return Err(Error::InvalidConfig("axis label must not be empty".into()));
            }
            if !seen.insert(spec.label.as_str()) {
                return Err(Error::InvalidConfig(format!("duplicate axis label '{}'", spec.label)));
            }
        }
        if let Some(i) = self.value_axis
            && i >= self.axes.len()
        {
            return Err(Error::InvalidConfig(format!(
                "value_axis {i} out of range for {} axes",
                self.axes.len()
            )));
        }
        if self.generator_parameters.keys().any(|k| k.is_empty()) {
            return Err(Error::InvalidConfig("generator parameter keys must not be empty".into()));
        }
        self.axes.iter().map(AxisSpec::build).collect()
    }
}
