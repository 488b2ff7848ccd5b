// sfs.rs - Site frequency spectrum estimators

//! Site frequency spectra from a single (sites × 2) alt/ref count matrix.
//!
//! Naive binning rounds each site's frequency to the nearest multiple of
//! 1/D. Downsampling instead spreads every site over the allele counts it
//! would show if its reads were subsampled without replacement to a common
//! depth, which removes the discretisation bias of uneven depths.

use log::debug;
use ndarray::ArrayView2;
use serde::{Deserialize, Serialize};
use statrs::function::factorial::ln_binomial;

use crate::data::alleles::{ALT, REF};
use crate::error::{PairdivError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SfsConfig {
    /// Number of reads sites are binned or downsampled to
    pub target_depth: usize,
}

impl Default for SfsConfig {
    fn default() -> Self {
        Self { target_depth: 10 }
    }
}

impl SfsConfig {
    pub fn validate(&self) -> Result<()> {
        if self.target_depth == 0 {
            return Err(PairdivError::InvalidParameter(
                "target_depth must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Fold a spectrum onto minor-allele classes.
///
/// Entry k of the result is `fs[k] + fs[len - 1 - k]` for the first
/// `len / 2` classes; when `len` is odd the last retained class is halved.
pub fn fold_sfs(fs: &[f64]) -> Vec<f64> {
    let n = fs.len();
    let mut folded: Vec<f64> = (0..n / 2).map(|k| fs[k] + fs[n - 1 - k]).collect();
    if n % 2 != 0 {
        if let Some(last) = folded.last_mut() {
            *last *= 0.5;
        }
    }
    folded
}

fn check_inputs(allele_counts: &ArrayView2<u32>, target_depth: usize) -> Result<()> {
    if allele_counts.ncols() != 2 {
        return Err(PairdivError::shape(
            "site frequency spectrum counts",
            "2 columns (alt, ref)",
            format!("{} columns", allele_counts.ncols()),
        ));
    }
    SfsConfig { target_depth }.validate()
}

/// (alt, depth) of every site with at least one read
fn covered_sites(allele_counts: &ArrayView2<u32>) -> Vec<(u64, u64)> {
    allele_counts
        .rows()
        .into_iter()
        .map(|row| (row[ALT] as u64, row[ALT] as u64 + row[REF] as u64))
        .filter(|&(_, depth)| depth > 0)
        .collect()
}

/// Histogram of alt frequencies into `target_depth + 1` bins centred on
/// k / target_depth.
pub fn estimate_sfs_naive_binning(allele_counts: ArrayView2<u32>, target_depth: usize) -> Result<Vec<f64>> {
    check_inputs(&allele_counts, target_depth)?;
    let d = target_depth as f64;
    let edges: Vec<f64> = (0..=target_depth + 1).map(|k| (k as f64 - 0.5) / d).collect();

    let mut counts = vec![0.0; target_depth + 1];
    for (alt, depth) in covered_sites(&allele_counts) {
        let freq = alt as f64 / depth as f64;
        let bin = edges.partition_point(|&edge| edge <= freq) - 1;
        counts[bin] += 1.0;
    }
    Ok(counts)
}

/// Probability of drawing `k` alt reads when `draws` reads are sampled
/// without replacement from `depth` reads of which `alt` are alt.
fn hypergeometric_pmf(alt: u64, depth: u64, draws: u64, k: u64) -> f64 {
    if k > alt || draws - k > depth - alt {
        return 0.0;
    }
    (ln_binomial(alt, k) + ln_binomial(depth - alt, draws - k) - ln_binomial(depth, draws)).exp()
}

/// Expected spectrum after downsampling every covered site to
/// `min(min depth, target_depth)` reads.
///
/// The result has one entry per alt count 0..=D_min. With no covered sites
/// it is `target_depth + 1` zeros.
pub fn estimate_sfs_downsampling(allele_counts: ArrayView2<u32>, target_depth: usize) -> Result<Vec<f64>> {
    check_inputs(&allele_counts, target_depth)?;
    let sites = covered_sites(&allele_counts);

    let min_depth = match sites.iter().map(|&(_, depth)| depth).min() {
        Some(depth) => depth,
        None => return Ok(vec![0.0; target_depth + 1]),
    };
    let draws = min_depth.min(target_depth as u64);
    if draws < target_depth as u64 {
        debug!(
            "Downsampling to depth {} (below target {}) to keep all {} sites",
            draws,
            target_depth,
            sites.len()
        );
    }

    let mut density = vec![0.0; draws as usize + 1];
    for &(alt, depth) in &sites {
        for (k, slot) in density.iter_mut().enumerate() {
            *slot += hypergeometric_pmf(alt, depth, draws, k as u64);
        }
    }
    Ok(density)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array2};

    #[test]
    fn test_fold_even_length() {
        assert_eq!(fold_sfs(&[1.0, 2.0, 3.0, 4.0]), vec![5.0, 5.0]);
    }

    #[test]
    fn test_fold_odd_length_halves_last_class() {
        let fs = [1.0, 2.0, 3.0, 4.0, 5.0];
        let folded = fold_sfs(&fs);
        assert_eq!(folded.len(), 2);
        assert_eq!(folded, vec![6.0, 3.0]);
    }

    #[test]
    fn test_fold_lengths() {
        for n in 0..12 {
            let fs: Vec<f64> = (0..n).map(|k| k as f64).collect();
            assert_eq!(fold_sfs(&fs).len(), n / 2, "length {}", n);
        }
        assert!(fold_sfs(&[7.0]).is_empty());
    }

    #[test]
    fn test_naive_binning() {
        // frequencies 0, 0.25, 0.5, 1.0 and one uncovered site at depth 4
        let counts = array![[0, 4], [1, 3], [2, 2], [4, 0], [0, 0]];
        let sfs = estimate_sfs_naive_binning(counts.view(), 4).unwrap();
        assert_eq!(sfs, vec![1.0, 1.0, 1.0, 0.0, 1.0]);

        // 0.3 sits closest to 1/4
        let sfs = estimate_sfs_naive_binning(array![[3, 7]].view(), 4).unwrap();
        assert_eq!(sfs, vec![0.0, 1.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_downsampling_matches_binning_at_uniform_depth() {
        let counts = array![[0, 10], [3, 7], [5, 5], [10, 0], [9, 1], [3, 7]];
        let naive = estimate_sfs_naive_binning(counts.view(), 10).unwrap();
        let downsampled = estimate_sfs_downsampling(counts.view(), 10).unwrap();
        assert_eq!(naive, downsampled);
    }

    #[test]
    fn test_downsampling_probabilities() {
        // alt 2 of depth 4 downsampled to 2 reads: 1/6, 4/6, 1/6
        let counts = array![[2, 2], [1, 1]];
        let sfs = estimate_sfs_downsampling(counts.view(), 5).unwrap();
        assert_eq!(sfs.len(), 3);
        assert!((sfs[0] - 1.0 / 6.0).abs() < 1e-9);
        assert!((sfs[1] - (4.0 / 6.0 + 1.0)).abs() < 1e-9);
        assert!((sfs[2] - 1.0 / 6.0).abs() < 1e-9);
    }

    #[test]
    fn test_downsampling_conserves_sites() {
        let counts = Array2::from_shape_fn((50, 2), |(i, k)| ((i * 7 + k * 3) % 40 + 20) as u32);
        let sfs = estimate_sfs_downsampling(counts.view(), 12).unwrap();
        assert_eq!(sfs.len(), 13);
        assert!((sfs.iter().sum::<f64>() - 50.0).abs() < 1e-8);
        assert!(sfs.iter().all(|v| v.is_finite() && *v >= 0.0));
    }

    #[test]
    fn test_large_depths_do_not_overflow() {
        let counts = array![[40_000, 60_000], [12_345, 87_655]];
        let sfs = estimate_sfs_downsampling(counts.view(), 20).unwrap();
        assert!((sfs.iter().sum::<f64>() - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_no_coverage() {
        let counts = Array2::<u32>::zeros((3, 2));
        assert_eq!(estimate_sfs_downsampling(counts.view(), 4).unwrap(), vec![0.0; 5]);
        assert_eq!(estimate_sfs_naive_binning(counts.view(), 4).unwrap(), vec![0.0; 5]);
    }

    #[test]
    fn test_bad_inputs() {
        let counts = Array2::<u32>::zeros((3, 3));
        assert!(estimate_sfs_naive_binning(counts.view(), 4).is_err());
        let counts = Array2::<u32>::zeros((3, 2));
        assert!(estimate_sfs_downsampling(counts.view(), 0).is_err());
    }
}
