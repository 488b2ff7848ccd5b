// alleles.rs - Allele count tensors and the frequencies derived from them

use ndarray::{Array1, Array2, Array3, ArrayView2, ArrayView3, Axis, Zip};

use crate::error::{PairdivError, Result};

/// Index of the alternate allele along the allele axis
pub const ALT: usize = 0;
/// Index of the reference allele along the allele axis
pub const REF: usize = 1;

/// Pooled frequencies at or below this value are treated as exact zeros
pub const FREQ_EPSILON: f64 = 1e-10;

/// Replace a zero denominator with 1 so that `x / guarded(0)` is `x`, which
/// for every numerator used here is itself 0.
#[inline]
pub fn guarded(denominator: f64) -> f64 {
    if denominator == 0.0 {
        1.0
    } else {
        denominator
    }
}

/// Consensus (majority) call from a frequency. Ties round to even, so a
/// frequency of exactly 0.5 is called 0.
#[inline]
pub fn consensus_call(freq: f64) -> f64 {
    freq.round_ties_even()
}

/// Minor-allele (folded) frequency
#[inline]
pub fn fold_freq(freq: f64) -> f64 {
    freq.min(1.0 - freq)
}

/// Zero out floating point residue left over from pooling.
#[inline]
pub fn clear_residue(value: f64) -> f64 {
    if value > FREQ_EPSILON {
        value
    } else {
        0.0
    }
}

/// Read counts indexed by (site, sample, allele), allele 0 = alt, 1 = ref.
#[derive(Debug, Clone, PartialEq)]
pub struct AlleleCountTensor {
    counts: Array3<u32>,
}

impl AlleleCountTensor {
    /// Wrap a (sites × samples × 2) count array
    pub fn new(counts: Array3<u32>) -> Result<Self> {
        let allele_axis = counts.shape()[2];
        if allele_axis != 2 {
            return Err(PairdivError::shape(
                "allele count tensor",
                "2 alleles (alt, ref)",
                format!("{} alleles", allele_axis),
            ));
        }
        Ok(Self { counts })
    }

    /// Build from a flat row-major buffer of `[alt, ref]` pairs.
    pub fn from_shape_vec(num_sites: usize, num_samples: usize, data: Vec<u32>) -> Result<Self> {
        let found = data.len();
        let counts = Array3::from_shape_vec((num_sites, num_samples, 2), data).map_err(|_| {
            PairdivError::shape(
                "allele count buffer",
                format!("{} values", num_sites * num_samples * 2),
                format!("{} values", found),
            )
        })?;
        Self::new(counts)
    }

    /// Build from separate alt and ref count matrices (sites × samples).
    pub fn from_alt_ref(alt: ArrayView2<u32>, reference: ArrayView2<u32>) -> Result<Self> {
        if alt.dim() != reference.dim() {
            return Err(PairdivError::shape(
                "alt/ref count matrices",
                format!("{:?}", alt.dim()),
                format!("{:?}", reference.dim()),
            ));
        }
        let (num_sites, num_samples) = alt.dim();
        let counts = Array3::from_shape_fn((num_sites, num_samples, 2), |(i, j, k)| {
            if k == ALT {
                alt[[i, j]]
            } else {
                reference[[i, j]]
            }
        });
        Ok(Self { counts })
    }

    /// A gene with no sites
    pub fn empty(num_samples: usize) -> Self {
        Self {
            counts: Array3::zeros((0, num_samples, 2)),
        }
    }

    pub fn num_sites(&self) -> usize {
        self.counts.shape()[0]
    }

    pub fn num_samples(&self) -> usize {
        self.counts.shape()[1]
    }

    pub fn is_empty(&self) -> bool {
        self.num_sites() == 0
    }

    pub fn counts(&self) -> ArrayView3<'_, u32> {
        self.counts.view()
    }

    /// Total reads per (site, sample)
    pub fn depths(&self) -> Array2<u64> {
        self.counts.mapv(u64::from).sum_axis(Axis(2))
    }

    /// 1.0 where a (site, sample) has any reads, 0.0 otherwise.
    pub fn covered(&self) -> Array2<f64> {
        self.depths().mapv(|d| if d > 0 { 1.0 } else { 0.0 })
    }

    /// Alt allele frequency per (site, sample); 0 where depth is 0.
    pub fn alt_freqs(&self) -> Array2<f64> {
        let depths = self.depths();
        Zip::from(self.counts.index_axis(Axis(2), ALT))
            .and(&depths)
            .map_collect(|&alt, &depth| alt as f64 / guarded(depth as f64))
    }

    /// Frequency of both alleles per (site, sample).
    pub fn allele_freqs(&self) -> Array3<f64> {
        let depths = self.depths();
        Array3::from_shape_fn(self.counts.dim(), |(i, j, k)| {
            self.counts[[i, j, k]] as f64 / guarded(depths[[i, j]] as f64)
        })
    }

    /// Consensus call (0 or 1) per (site, sample).
    pub fn consensus(&self) -> Array2<f64> {
        self.alt_freqs().mapv(consensus_call)
    }

    /// Minor-allele frequency per (site, sample).
    pub fn folded_freqs(&self) -> Array2<f64> {
        self.alt_freqs().mapv(fold_freq)
    }

    /// Within-sample heterozygosity per (site, sample) using leave-one-out
    /// counts: `1 - sum_k c_k (c_k - 1) / (d (d - 1))`.
    ///
    /// Entries with fewer than two reads cannot supply a pair of distinct
    /// reads and contribute 0.
    pub fn self_pis(&self) -> Array2<f64> {
        let depths = self.depths();
        Array2::from_shape_fn(depths.dim(), |(i, j)| {
            let depth = depths[[i, j]];
            if depth < 2 {
                return 0.0;
            }
            let d = depth as f64;
            let homozygosity: f64 = (0..2)
                .map(|k| {
                    let c = self.counts[[i, j, k]] as f64;
                    (c / d) * ((c - 1.0) / (d - 1.0))
                })
                .sum();
            1.0 - homozygosity
        })
    }

    /// Alt frequency per site averaged over the samples that cover it.
    pub fn pooled_alt_freqs(&self) -> Array1<f64> {
        let freqs = self.alt_freqs();
        let covered = self.covered();
        let totals = freqs.sum_axis(Axis(1));
        let num_covered = covered.sum_axis(Axis(1));
        Zip::from(&totals)
            .and(&num_covered)
            .map_collect(|&total, &n| total / guarded(n))
    }

    /// The (sites × 2) counts of a single sample, the shape consumed by the
    /// site-frequency-spectrum estimators.
    pub fn sample_counts(&self, sample: usize) -> Result<Array2<u32>> {
        if sample >= self.num_samples() {
            return Err(PairdivError::InvalidParameter(format!(
                "sample index {} out of range for {} samples",
                sample,
                self.num_samples()
            )));
        }
        Ok(self.counts.index_axis(Axis(1), sample).to_owned())
    }
}
