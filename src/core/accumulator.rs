// accumulator.rs - Ratio-of-sums accumulation across genes

use ndarray::{Array2, ArrayView2, Zip};
use serde::Serialize;

use crate::error::{PairdivError, Result};

/// How a degenerate denominator is offset before dividing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DenominatorGuard {
    /// Add 1 to denominators that are exactly zero
    Zero,
    /// Add 1 to denominators below the threshold (accumulated site counts
    /// may carry small floating residues)
    Below(f64),
}

impl DenominatorGuard {
    #[inline]
    pub fn apply(&self, denominator: f64) -> f64 {
        let degenerate = match *self {
            DenominatorGuard::Zero => denominator == 0.0,
            DenominatorGuard::Below(threshold) => denominator < threshold,
        };
        if degenerate {
            denominator + 1.0
        } else {
            denominator
        }
    }
}

/// Element-wise `numerator / guard(denominator)`
pub fn guarded_ratio(
    numerator: ArrayView2<f64>,
    denominator: ArrayView2<f64>,
    guard: DenominatorGuard,
) -> Array2<f64> {
    Zip::from(numerator)
        .and(denominator)
        .map_collect(|&n, &d| n / guard.apply(d))
}

/// Two running sums, divided only once every gene has been added.
///
/// Partial accumulators built over disjoint gene subsets can be merged in
/// any order before the final division.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RatioAccumulator {
    numerator: Array2<f64>,
    denominator: Array2<f64>,
}

impl RatioAccumulator {
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            numerator: Array2::zeros((rows, cols)),
            denominator: Array2::zeros((rows, cols)),
        }
    }

    pub fn dim(&self) -> (usize, usize) {
        self.numerator.dim()
    }

    pub fn numerator(&self) -> &Array2<f64> {
        &self.numerator
    }

    pub fn denominator(&self) -> &Array2<f64> {
        &self.denominator
    }

    fn check(&self, context: &'static str, found: (usize, usize)) -> Result<()> {
        if found != self.dim() {
            return Err(PairdivError::shape(
                context,
                format!("{:?}", self.dim()),
                format!("{:?}", found),
            ));
        }
        Ok(())
    }

    /// Add one gene's contribution to both sums.
    pub fn add(&mut self, numerator: ArrayView2<f64>, denominator: ArrayView2<f64>) -> Result<()> {
        self.check("accumulated numerator", numerator.dim())?;
        self.check("accumulated denominator", denominator.dim())?;
        self.numerator += &numerator;
        self.denominator += &denominator;
        Ok(())
    }

    /// Fold in an accumulator built over a disjoint set of genes.
    pub fn merge(&mut self, other: &RatioAccumulator) -> Result<()> {
        self.add(other.numerator.view(), other.denominator.view())
    }

    pub fn ratio(&self, guard: DenominatorGuard) -> Array2<f64> {
        guarded_ratio(self.numerator.view(), self.denominator.view(), guard)
    }
}
