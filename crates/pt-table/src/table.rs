//! The photon table: dense cell array, overflow cell, axes and provenance.

use std::collections::{BTreeMap, BTreeSet};

use pt_core::{Error, EventSource, PhotonRecord, Result};
use serde::Serialize;

use crate::accumulator::Cell;
use crate::axis::Axis;
use crate::binner::{self, BinIndex};
use crate::config::TableConfig;

/// What produced a table.
///
/// Tables filled from independently seeded streams merge freely; the merged
/// table remembers every contributing seed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Provenance {
    /// Seed the table was created with; after merges, the lowest contributing seed.
    pub seed: u64,
    /// Every seed whose photons are in the table. Always contains `seed`.
    pub seeds: BTreeSet<u64>,
    /// Records ingested, overflow included.
    pub total_events: u64,
    /// Σw over all ingested records, overflow included.
    pub total_weight: f64,
    /// Generator run description.
    pub generator_parameters: BTreeMap<String, String>,
}

impl Provenance {
    fn new(seed: u64, generator_parameters: BTreeMap<String, String>) -> Self {
        Self {
            seed,
            seeds: BTreeSet::from([seed]),
            total_events: 0,
            total_weight: 0.0,
            generator_parameters,
        }
    }

    fn absorb(&mut self, other: &Provenance) {
        self.seeds.extend(other.seeds.iter().copied());
        self.seed = self.seeds.first().copied().unwrap_or(self.seed);
        self.total_events += other.total_events;
        self.total_weight += other.total_weight;
    }
}

/// Accumulated photon statistics over the Cartesian product of a set of axes.
///
/// Axes are fixed at construction. The table is mutated only through
/// [`Table::ingest`] and [`Table::merge_from`] until [`Table::finalize`]
/// makes it read-only.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    axes: Vec<Axis>,
    strides: Vec<usize>,
    cells: Vec<Cell>,
    overflow: Cell,
    provenance: Provenance,
    value_axis: usize,
    finalized: bool,
}

impl Table {
    /// Create an empty table from a config.
    pub fn new(config: &TableConfig) -> Result<Self> {
        let axes = config.build_axes()?;
        let n = binner::n_cells(&axes)
            .ok_or_else(|| Error::InvalidConfig("number of cells overflows usize".into()))?;
        Ok(Self {
            strides: binner::strides(&axes),
            cells: vec![Cell::new(); n],
            overflow: Cell::new(),
            provenance: Provenance::new(config.seed, config.generator_parameters.clone()),
            value_axis: config.resolved_value_axis(),
            finalized: false,
            axes,
        })
    }

    /// Reassemble a stored table. Errors are reported as [`Error::CorruptTable`].
    pub(crate) fn from_parts(
        axes: Vec<Axis>,
        cells: Vec<Cell>,
        overflow: Cell,
        provenance: Provenance,
        value_axis: usize,
        finalized: bool,
    ) -> Result<Self> {
        if axes.is_empty() {
            return Err(Error::CorruptTable("table has no axes".into()));
        }
        if value_axis >= axes.len() {
            return Err(Error::CorruptTable(format!(
                "value axis {value_axis} out of range for {} axes",
                axes.len()
            )));
        }
        let expected = binner::n_cells(&axes)
            .ok_or_else(|| Error::CorruptTable("number of cells overflows usize".into()))?;
        if cells.len() != expected {
            return Err(Error::CorruptTable(format!(
                "{} cells stored, axes declare {expected}",
                cells.len()
            )));
        }
        for (i, cell) in cells.iter().enumerate() {
            cell.validate().map_err(|e| Error::CorruptTable(format!("cell {i}: {e}")))?;
        }
        overflow.validate().map_err(|e| Error::CorruptTable(format!("overflow cell: {e}")))?;
        if provenance.seeds.first() != Some(&provenance.seed) {
            return Err(Error::CorruptTable(format!(
                "seed {} is not the lowest of the contributing seeds",
                provenance.seed
            )));
        }
        if !(provenance.total_weight.is_finite() && provenance.total_weight >= 0.0) {
            return Err(Error::CorruptTable(format!(
                "invalid total weight {}",
                provenance.total_weight
            )));
        }
        let samples = cells
            .iter()
            .chain(std::iter::once(&overflow))
            .try_fold(0u64, |acc, c| acc.checked_add(c.sample_count()));
        if samples != Some(provenance.total_events) {
            return Err(Error::CorruptTable(format!(
                "cell sample counts do not add up to {} events",
                provenance.total_events
            )));
        }
        Ok(Self {
            strides: binner::strides(&axes),
            axes,
            cells,
            overflow,
            provenance,
            value_axis,
            finalized,
        })
    }

    /// Accumulate one record.
    ///
    /// Out-of-range coordinates go to the overflow cell. Provenance counters
    /// advance for every accepted record. A record that would push a cell or
    /// the total weight past the range of `f64` is rejected and leaves the
    /// table unchanged.
    pub fn ingest(&mut self, record: PhotonRecord) -> Result<()> {
        if self.finalized {
            return Err(Error::TableFinalized);
        }
        let PhotonRecord { coordinate, weight, value, .. } = record;
        if coordinate.len() != self.axes.len() {
            return Err(Error::DimensionMismatch { expected: self.axes.len(), got: coordinate.len() });
        }
        if !(weight.is_finite() && weight >= 0.0) {
            return Err(Error::InvalidWeight(weight));
        }
        if let Some(i) = coordinate.iter().position(|x| x.is_nan()) {
            return Err(Error::InvalidCoordinate(format!(
                "component {i} ('{}') is NaN",
                self.axes[i].label()
            )));
        }
        let value = value.unwrap_or(coordinate[self.value_axis]);
        if !value.is_finite() {
            return Err(Error::InvalidCoordinate(format!("accumulated value {value} is not finite")));
        }

        let cell = match binner::locate_linear(&coordinate, &self.axes, &self.strides)? {
            Some(offset) => &mut self.cells[offset],
            None => &mut self.overflow,
        };
        let mut updated = *cell;
        updated.update(weight, value);
        let total_weight = self.provenance.total_weight + weight;
        if !(total_weight.is_finite()
            && updated.weight_sum().is_finite()
            && updated.weight_sq_sum().is_finite())
        {
            return Err(Error::InvalidWeight(weight));
        }
        if !updated.is_finite() {
            return Err(Error::InvalidCoordinate(format!(
                "accumulating value {value} overflows the bin statistics"
            )));
        }
        *cell = updated;
        self.provenance.total_events += 1;
        self.provenance.total_weight = total_weight;
        Ok(())
    }

    /// Drain an event source into the table, stopping at the first bad record.
    pub fn ingest_all<S: EventSource>(&mut self, source: S) -> Result<u64> {
        let mut n = 0u64;
        for record in source.records() {
            self.ingest(record)?;
            n += 1;
        }
        Ok(n)
    }

    /// Merge another table with identical axes and generator parameters into this one.
    ///
    /// Seeds may differ; the union is recorded in the provenance. The merged
    /// cells are computed before anything is written, so on error `self` is
    /// unchanged.
    pub fn merge_from(&mut self, other: &Table) -> Result<()> {
        if self.finalized {
            return Err(Error::TableFinalized);
        }
        self.check_compatible(other)?;

        let cells: Vec<Cell> =
            self.cells.iter().zip(&other.cells).map(|(a, b)| Cell::merge(a, b)).collect();
        let overflow = Cell::merge(&self.overflow, &other.overflow);
        if let Some(i) = cells.iter().position(|c| !c.is_finite()) {
            return Err(Error::NumericOverflow(format!("merged cell {i} is not finite")));
        }
        if !overflow.is_finite() {
            return Err(Error::NumericOverflow("merged overflow cell is not finite".into()));
        }
        if !(self.provenance.total_weight + other.provenance.total_weight).is_finite() {
            return Err(Error::NumericOverflow("merged total weight is not finite".into()));
        }

        self.cells = cells;
        self.overflow = overflow;
        self.provenance.absorb(&other.provenance);
        log::debug!(
            "merged table: {} events, total weight {}",
            self.provenance.total_events,
            self.provenance.total_weight
        );
        Ok(())
    }

    fn check_compatible(&self, other: &Table) -> Result<()> {
        if self.axes.len() != other.axes.len() {
            return Err(Error::ShapeMismatch(format!(
                "{} axes vs {}",
                self.axes.len(),
                other.axes.len()
            )));
        }
        if let Some(diff) = self.axes.iter().zip(&other.axes).find_map(|(a, b)| a.difference(b)) {
            return Err(Error::ShapeMismatch(diff));
        }
        if self.value_axis != other.value_axis {
            return Err(Error::ShapeMismatch(format!(
                "value axis {} vs {}",
                self.value_axis, other.value_axis
            )));
        }
        if self.provenance.generator_parameters != other.provenance.generator_parameters {
            return Err(Error::ProvenanceMismatch("generator parameters differ".into()));
        }
        Ok(())
    }

    /// Make the table read-only. Idempotent.
    pub fn finalize(&mut self) {
        if !self.finalized {
            log::debug!(
                "finalizing table: {} cells, {} events ({} in overflow)",
                self.cells.len(),
                self.provenance.total_events,
                self.overflow.sample_count()
            );
        }
        self.finalized = true;
    }

    /// Whether [`Table::finalize`] has been called.
    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Axes in row-major order.
    pub fn axes(&self) -> &[Axis] {
        &self.axes
    }

    /// Index of the axis accumulated when a record has no explicit value.
    pub fn value_axis(&self) -> usize {
        self.value_axis
    }

    /// Provenance metadata.
    pub fn provenance(&self) -> &Provenance {
        &self.provenance
    }

    /// All in-range cells, row-major (last axis fastest).
    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    /// Aggregate of everything outside the binned range.
    pub fn overflow(&self) -> &Cell {
        &self.overflow
    }

    /// Number of in-range cells.
    pub fn n_cells(&self) -> usize {
        self.cells.len()
    }

    /// Cell at a per-axis index.
    pub fn cell(&self, index: &[usize]) -> Option<&Cell> {
        binner::linear_index(index, &self.axes).map(|i| &self.cells[i])
    }

    /// Resolve a coordinate on this table's axes.
    pub fn locate(&self, coordinate: &[f64]) -> Result<BinIndex> {
        binner::locate(coordinate, &self.axes)
    }

    /// Cell a coordinate resolves to (the overflow cell if out of range).
    pub fn cell_at(&self, coordinate: &[f64]) -> Result<&Cell> {
        Ok(match binner::locate_linear(coordinate, &self.axes, &self.strides)? {
            Some(i) => &self.cells[i],
            None => &self.overflow,
        })
    }

    /// Product of physical bin widths.
    pub fn bin_volume(&self, index: &[usize]) -> Option<f64> {
        if index.len() != self.axes.len() {
            return None;
        }
        self.axes.iter().zip(index).map(|(a, &i)| a.bin_width(i)).product()
    }

    /// Σw of a cell divided by its bin volume.
    pub fn weight_density(&self, index: &[usize]) -> Option<f64> {
        let cell = self.cell(index)?;
        Some(cell.weight_sum() / self.bin_volume(index)?)
    }

    /// Σw over all in-range cells.
    pub fn in_range_weight(&self) -> f64 {
        self.cells.iter().map(Cell::weight_sum).sum()
    }

    /// Non-empty cells with their per-axis indices.
    pub fn iter_nonempty(&self) -> impl Iterator<Item = (Vec<usize>, &Cell)> + '_ {
        self.cells
            .iter()
            .enumerate()
            .filter(|(_, c)| !c.is_empty())
            .map(|(i, c)| (binner::unravel(i, &self.axes), c))
    }
}
