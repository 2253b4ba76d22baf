//! Coordinate binner: physical coordinate → bin index.
//!
//! All functions here are pure. Any axis component out of range resolves to
//! the table's single overflow index rather than a per-axis flow bin.

use pt_core::{Error, Result};

use crate::axis::Axis;

/// Resolved location of a coordinate.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BinIndex {
    /// In range on every axis; one index per axis.
    Cell(Vec<usize>),
    /// Out of range on at least one axis.
    Overflow,
}

impl BinIndex {
    /// Whether this is the overflow index.
    pub fn is_overflow(&self) -> bool {
        matches!(self, BinIndex::Overflow)
    }
}

fn check_dimension(coordinate: &[f64], axes: &[Axis]) -> Result<()> {
    if coordinate.len() != axes.len() {
        return Err(Error::DimensionMismatch { expected: axes.len(), got: coordinate.len() });
    }
    Ok(())
}

/// Locate a coordinate on a set of axes.
pub fn locate(coordinate: &[f64], axes: &[Axis]) -> Result<BinIndex> {
    check_dimension(coordinate, axes)?;
    let mut index = Vec::with_capacity(axes.len());
    for (axis, &x) in axes.iter().zip(coordinate) {
        match axis.locate(x) {
            Some(i) => index.push(i),
            None => return Ok(BinIndex::Overflow),
        }
    }
    Ok(BinIndex::Cell(index))
}

/// Locate a coordinate and flatten it to a row-major cell offset in one pass.
///
/// `Ok(None)` is the overflow index. `strides` must come from [`strides`].
#[inline]
pub fn locate_linear(coordinate: &[f64], axes: &[Axis], strides: &[usize]) -> Result<Option<usize>> {
    check_dimension(coordinate, axes)?;
    let mut offset = 0usize;
    for ((axis, &x), &stride) in axes.iter().zip(coordinate).zip(strides) {
        match axis.locate(x) {
            Some(i) => offset += i * stride,
            None => return Ok(None),
        }
    }
    Ok(Some(offset))
}

/// Total number of in-range cells (product of bin counts).
///
/// Returns `None` if the product overflows `usize`.
pub fn n_cells(axes: &[Axis]) -> Option<usize> {
    axes.iter().try_fold(1usize, |acc, a| acc.checked_mul(a.n_bins()))
}

/// Row-major strides: the last axis varies fastest.
pub fn strides(axes: &[Axis]) -> Vec<usize> {
    let mut out = vec![1usize; axes.len()];
    for i in (0..axes.len().saturating_sub(1)).rev() {
        out[i] = out[i + 1] * axes[i + 1].n_bins();
    }
    out
}

/// Flatten a per-axis index. `None` if it has the wrong length or an index is out of bounds.
pub fn linear_index(index: &[usize], axes: &[Axis]) -> Option<usize> {
    if index.len() != axes.len() {
        return None;
    }
    let mut offset = 0usize;
    for ((&i, axis), stride) in index.iter().zip(axes).zip(strides(axes)) {
        if i >= axis.n_bins() {
            return None;
        }
        offset += i * stride;
    }
    Some(offset)
}

/// Inverse of [`linear_index`].
pub fn unravel(mut linear: usize, axes: &[Axis]) -> Vec<usize> {
    let mut index = vec![0usize; axes.len()];
    for (slot, axis) in index.iter_mut().zip(axes).rev() {
        let n = axis.n_bins();
        *slot = linear % n;
        linear /= n;
    }
    index
}
