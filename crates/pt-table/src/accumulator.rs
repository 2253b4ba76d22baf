//! Per-bin weighted running statistics.
//!
//! Single-sample updates follow West's weighted form of Welford's recurrence;
//! partial accumulators combine with the pairwise formula of Chan, Golub and
//! LeVeque. Neither path forms a raw sum of squares, so precision does not
//! degrade with the number of samples.
//!
//! Events with zero weight are counted in `sample_count` but carry no
//! statistical mass: they never move the mean or `m2`.

/// Weighted count, mean and variance of the values that landed in one bin.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Cell {
    sample_count: u64,
    weight_sum: f64,
    weight_sq_sum: f64,
    mean: f64,
    m2: f64,
}

impl Cell {
    /// An empty cell.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reassemble a cell from stored fields without checking them; see [`Cell::validate`].
    pub fn from_parts(
        sample_count: u64,
        weight_sum: f64,
        weight_sq_sum: f64,
        mean: f64,
        m2: f64,
    ) -> Self {
        Self { sample_count, weight_sum, weight_sq_sum, mean, m2 }
    }

    /// Record one sample.
    #[inline]
    pub fn update(&mut self, weight: f64, value: f64) {
        self.sample_count += 1;
        if weight == 0.0 {
            return;
        }
        if self.weight_sum == 0.0 {
            self.weight_sum = weight;
            self.weight_sq_sum = weight * weight;
            self.mean = value;
            self.m2 = 0.0;
            return;
        }
        let weight_sum = self.weight_sum + weight;
        let delta = value - self.mean;
        self.mean += delta * (weight / weight_sum);
        // w·δ·(x − μ') rewritten as δ²·w·W/W' so rounding can never make m2 negative.
        self.m2 += delta * delta * (weight * (self.weight_sum / weight_sum));
        self.weight_sum = weight_sum;
        self.weight_sq_sum += weight * weight;
    }

    /// Combine two independently accumulated cells.
    ///
    /// `merge(a, b)` and `merge(b, a)` are bitwise identical; grouping of
    /// three or more cells agrees up to floating-point rounding.
    pub fn merge(a: &Cell, b: &Cell) -> Cell {
        let (a, b) = if a.order_key() <= b.order_key() { (a, b) } else { (b, a) };
        let sample_count = a.sample_count + b.sample_count;
        if a.weight_sum == 0.0 {
            return Cell { sample_count, ..*b };
        }
        if b.weight_sum == 0.0 {
            return Cell { sample_count, ..*a };
        }
        let weight_sum = a.weight_sum + b.weight_sum;
        let delta = b.mean - a.mean;
        Cell {
            sample_count,
            weight_sum,
            weight_sq_sum: a.weight_sq_sum + b.weight_sq_sum,
            mean: a.mean + delta * (b.weight_sum / weight_sum),
            m2: a.m2 + b.m2 + delta * delta * (a.weight_sum * (b.weight_sum / weight_sum)),
        }
    }

    /// Merge `other` into `self`.
    #[inline]
    pub fn absorb(&mut self, other: &Cell) {
        *self = Cell::merge(self, other);
    }

    fn order_key(&self) -> (u64, u64, u64, u64, u64) {
        (
            self.weight_sum.to_bits(),
            self.mean.to_bits(),
            self.m2.to_bits(),
            self.weight_sq_sum.to_bits(),
            self.sample_count,
        )
    }

    /// Number of samples recorded, including zero-weight ones.
    pub fn sample_count(&self) -> u64 {
        self.sample_count
    }

    /// Σw
    pub fn weight_sum(&self) -> f64 {
        self.weight_sum
    }

    /// Σw²
    pub fn weight_sq_sum(&self) -> f64 {
        self.weight_sq_sum
    }

    /// Stored mean, `0.0` for a cell without statistical mass.
    pub(crate) fn raw_mean(&self) -> f64 {
        self.mean
    }

    /// Weighted sum of squared deviations from the mean.
    pub fn m2(&self) -> f64 {
        self.m2
    }

    /// Whether every stored statistic is finite.
    pub fn is_finite(&self) -> bool {
        [self.weight_sum, self.weight_sq_sum, self.mean, self.m2].iter().all(|v| v.is_finite())
    }

    /// Whether no sample has been recorded.
    pub fn is_empty(&self) -> bool {
        self.sample_count == 0
    }

    /// Weighted mean, or `None` without statistical mass.
    pub fn mean(&self) -> Option<f64> {
        (self.weight_sum > 0.0).then_some(self.mean)
    }

    /// Weighted population variance `m2 / Σw`.
    pub fn variance(&self) -> Option<f64> {
        (self.weight_sum > 0.0).then(|| self.m2 / self.weight_sum)
    }

    /// Unbiased variance for reliability weights, `m2 / (Σw − Σw²/Σw)`.
    ///
    /// `None` when fewer than two effective samples contribute.
    pub fn sample_variance(&self) -> Option<f64> {
        if self.weight_sum <= 0.0 {
            return None;
        }
        let denom = self.weight_sum - self.weight_sq_sum / self.weight_sum;
        (denom > 0.0).then(|| self.m2 / denom)
    }

    /// Square root of [`Cell::variance`].
    pub fn std_dev(&self) -> Option<f64> {
        self.variance().map(f64::sqrt)
    }

    /// Kish effective number of entries `(Σw)² / Σw²`.
    pub fn effective_entries(&self) -> Option<f64> {
        (self.weight_sq_sum > 0.0).then(|| self.weight_sum * self.weight_sum / self.weight_sq_sum)
    }

    /// Check the invariants a stored cell must satisfy.
    pub fn validate(&self) -> std::result::Result<(), String> {
        let fields = [self.weight_sum, self.weight_sq_sum, self.mean, self.m2];
        if self.weight_sum < 0.0 {
            return Err(format!("negative weight_sum {}", self.weight_sum));
        }
        if self.sample_count > 0 && fields.iter().any(|v| !v.is_finite()) {
            return Err(format!("non-finite statistics in cell with {} samples", self.sample_count));
        }
        if self.weight_sum == 0.0 && fields.iter().any(|v| v.to_bits() != 0) {
            return Err("statistics present without weight".into());
        }
        if self.sample_count == 0 && self.weight_sum != 0.0 {
            return Err(format!("weight_sum {} in cell without samples", self.weight_sum));
        }
        if self.m2 < 0.0 || self.weight_sq_sum < 0.0 {
            return Err("negative second moment".into());
        }
        Ok(())
    }
}
