// ld.rs - Pairwise linkage disequilibrium between sites

//! Linkage disequilibrium between every pair of sites of two allele count
//! tensors.
//!
//! The statistic is σ² rather than r²: σ² = E[(p_AB - p_A p_B)²] /
//! E[p_A (1 - p_A) p_B (1 - p_B)], whereas r² averages the per-pair ratio
//! (McVean 2002). Numerators and denominators are therefore returned
//! separately so callers can pool them over many site pairs before dividing.

use log::debug;
use ndarray::{Array1, Array2, Axis, Zip};
use serde::{Deserialize, Serialize};

use crate::core::accumulator::{guarded_ratio, DenominatorGuard};
use crate::data::alleles::{clear_residue, fold_freq, guarded, AlleleCountTensor};
use crate::error::{PairdivError, Result};

/// Folded pooled-frequency band used by [`calculate_rsquared_condition_freq`]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LdConfig {
    pub low_freq: f64,
    pub high_freq: f64,
}

impl Default for LdConfig {
    fn default() -> Self {
        Self {
            low_freq: 0.0,
            high_freq: 0.5,
        }
    }
}

impl LdConfig {
    pub fn validate(&self) -> Result<()> {
        // pooled frequencies are folded, so a high bound above 0.5 acts as 0.5
        if !(self.low_freq >= 0.0 && self.low_freq <= self.high_freq) {
            return Err(PairdivError::InvalidParameter(format!(
                "frequency band [{}, {}] must satisfy 0 <= low <= high",
                self.low_freq, self.high_freq
            )));
        }
        Ok(())
    }
}

/// σ² numerators and denominators for every (site of tensor 2, site of
/// tensor 1) pair. Rows follow the second tensor, columns the first.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LdMatrices {
    pub numerators: Array2<f64>,
    pub denominators: Array2<f64>,
}

impl LdMatrices {
    pub fn dim(&self) -> (usize, usize) {
        self.numerators.dim()
    }

    /// Per-pair ratio; pairs with a zero denominator are 0.
    pub fn sigma_squared(&self) -> Array2<f64> {
        guarded_ratio(
            self.numerators.view(),
            self.denominators.view(),
            DenominatorGuard::Zero,
        )
    }
}

/// σ² pooled over many site pairs as a ratio of sums.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct LdSummary {
    pub numerator: f64,
    pub denominator: f64,
    pub num_pairs: usize,
}

impl LdSummary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_pair(&mut self, numerator: f64, denominator: f64) {
        self.numerator += numerator;
        self.denominator += denominator;
        self.num_pairs += 1;
    }

    /// Pool every pair of a matrix set.
    pub fn add(&mut self, matrices: &LdMatrices) {
        Zip::from(&matrices.numerators)
            .and(&matrices.denominators)
            .for_each(|&n, &d| self.add_pair(n, d));
    }

    pub fn merge(&mut self, other: &LdSummary) {
        self.numerator += other.numerator;
        self.denominator += other.denominator;
        self.num_pairs += other.num_pairs;
    }

    pub fn sigma_squared(&self) -> f64 {
        self.numerator / DenominatorGuard::Zero.apply(self.denominator)
    }
}

fn check_samples(allele_counts_1: &AlleleCountTensor, allele_counts_2: &AlleleCountTensor) -> Result<()> {
    if allele_counts_1.num_samples() != allele_counts_2.num_samples() {
        return Err(PairdivError::shape(
            "linkage disequilibrium tensors",
            format!("{} samples", allele_counts_1.num_samples()),
            format!("{} samples", allele_counts_2.num_samples()),
        ));
    }
    Ok(())
}

/// Pool consensus frequencies over the samples passing at both sites of each
/// pair. `freqs` and `passed` are sites × samples.
fn pooled_ld(
    freqs_1: &Array2<f64>,
    passed_1: &Array2<f64>,
    freqs_2: &Array2<f64>,
    passed_2: &Array2<f64>,
) -> LdMatrices {
    let masked_1 = freqs_1 * passed_1;
    let masked_2 = freqs_2 * passed_2;

    // inner products along the sample axis; rows follow tensor 2
    let total_passed = passed_2.dot(&passed_1.t());
    let joint = masked_2.dot(&masked_1.t());
    let marginal_1 = passed_2.dot(&masked_1.t());
    let marginal_2 = masked_2.dot(&passed_1.t());

    let dim = total_passed.dim();
    let mut numerators = Array2::zeros(dim);
    let mut denominators = Array2::zeros(dim);

    Zip::from(&mut numerators)
        .and(&mut denominators)
        .and(&joint)
        .and(&marginal_1)
        .and(&marginal_2)
        .and(&total_passed)
        .for_each(|num, den, &ab, &a, &b, &n| {
            let n = guarded(n);
            let p_ab = clear_residue(ab / n);
            let p_a = clear_residue(a / n);
            let p_b = clear_residue(b / n);
            *num = (p_ab - p_a * p_b).powi(2);
            *den = p_a * (1.0 - p_a) * p_b * (1.0 - p_b);
        });

    LdMatrices {
        numerators,
        denominators,
    }
}

/// σ² numerators and denominators for every pair of sites, pooling samples
/// covered at both sites and using consensus calls.
pub fn calculate_rsquared(
    allele_counts_1: &AlleleCountTensor,
    allele_counts_2: &AlleleCountTensor,
) -> Result<LdMatrices> {
    check_samples(allele_counts_1, allele_counts_2)?;
    debug!(
        "LD over {} x {} sites, {} samples",
        allele_counts_1.num_sites(),
        allele_counts_2.num_sites(),
        allele_counts_1.num_samples()
    );

    Ok(pooled_ld(
        &allele_counts_1.consensus(),
        &allele_counts_1.covered(),
        &allele_counts_2.consensus(),
        &allele_counts_2.covered(),
    ))
}

/// Raw alt frequency per site averaged over every sample. Uncovered samples
/// count as frequency 0, so sparsely covered sites are pulled towards 0.
fn population_alt_freqs(allele_counts: &AlleleCountTensor) -> Array1<f64> {
    let num_samples = guarded(allele_counts.num_samples() as f64);
    allele_counts.alt_freqs().sum_axis(Axis(1)) / num_samples
}

/// Coverage mask restricted to sites whose folded population frequency lies
/// in `[low_freq, high_freq]`.
fn frequency_band_mask(allele_counts: &AlleleCountTensor, low_freq: f64, high_freq: f64) -> Array2<f64> {
    let in_band: Array1<f64> = population_alt_freqs(allele_counts).mapv(|p| {
        let folded = fold_freq(p);
        if folded >= low_freq && folded <= high_freq {
            1.0
        } else {
            0.0
        }
    });
    allele_counts.covered() * &in_band.insert_axis(Axis(1))
}

/// Like [`calculate_rsquared`], but a site only takes part when its folded
/// population frequency (raw, unrounded frequencies averaged over all
/// samples) lies within `[low_freq, high_freq]`.
pub fn calculate_rsquared_condition_freq(
    allele_counts_1: &AlleleCountTensor,
    allele_counts_2: &AlleleCountTensor,
    low_freq: f64,
    high_freq: f64,
) -> Result<LdMatrices> {
    check_samples(allele_counts_1, allele_counts_2)?;
    LdConfig { low_freq, high_freq }.validate()?;

    Ok(pooled_ld(
        &allele_counts_1.consensus(),
        &frequency_band_mask(allele_counts_1, low_freq, high_freq),
        &allele_counts_2.consensus(),
        &frequency_band_mask(allele_counts_2, low_freq, high_freq),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;
    use rand::{Rng, SeedableRng};
    use rand_xoshiro::Xoshiro256PlusPlus;

    /// Build a tensor from per-site consensus patterns, every call backed by
    /// `depth` reads.
    fn from_calls(calls: &[Vec<u8>], depth: u32) -> AlleleCountTensor {
        let num_samples = calls[0].len();
        let counts = Array3::from_shape_fn((calls.len(), num_samples, 2), |(i, j, k)| {
            let alt = calls[i][j] == 1;
            match (k, alt) {
                (0, true) | (1, false) => depth,
                _ => 0,
            }
        });
        AlleleCountTensor::new(counts).unwrap()
    }

    #[test]
    fn test_perfect_coupling_gives_one() {
        let pattern: Vec<u8> = (0..40).map(|k| (k % 2) as u8).collect();
        let t = from_calls(&[pattern.clone(), pattern], 5);
        let ld = calculate_rsquared(&t, &t).unwrap();

        assert!((ld.numerators[[0, 1]] - 0.0625).abs() < 1e-12);
        assert!((ld.numerators[[0, 1]] - ld.denominators[[0, 1]]).abs() < 1e-12);
        assert!((ld.sigma_squared()[[0, 1]] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_independent_loci_give_zero() {
        let site_a: Vec<u8> = (0..40).map(|k| (k % 2) as u8).collect();
        let site_b: Vec<u8> = (0..40).map(|k| ((k / 2) % 2) as u8).collect();
        let t = from_calls(&[site_a, site_b], 3);
        let ld = calculate_rsquared(&t, &t).unwrap();

        assert!(ld.numerators[[0, 1]].abs() < 1e-12);
        assert!(ld.denominators[[0, 1]] > 0.05);
    }

    #[test]
    fn test_random_unlinked_loci_near_zero() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(7);
        let num_samples = 2000;
        let calls: Vec<Vec<u8>> = (0..2)
            .map(|_| (0..num_samples).map(|_| rng.random_bool(0.5) as u8).collect())
            .collect();
        let t = from_calls(&calls, 4);
        let ld = calculate_rsquared(&t, &t).unwrap();

        assert!(ld.sigma_squared()[[0, 1]] < 0.01);
        assert!((ld.sigma_squared()[[0, 0]] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_zero_depth_gives_zeros() {
        let t = AlleleCountTensor::new(Array3::zeros((3, 5, 2))).unwrap();
        let ld = calculate_rsquared(&t, &t).unwrap();
        assert!(ld.numerators.iter().all(|&v| v == 0.0));
        assert!(ld.denominators.iter().all(|&v| v == 0.0));
        assert!(ld.sigma_squared().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_only_jointly_covered_samples_pool() {
        // sample 2 has no reads at site 1 and must not dilute the pooled frequencies
        let counts = Array3::from_shape_vec(
            (2, 3, 2),
            vec![4, 0, 0, 4, 4, 0, 4, 0, 0, 4, 0, 0],
        )
        .unwrap();
        let t = AlleleCountTensor::new(counts).unwrap();
        let ld = calculate_rsquared(&t, &t).unwrap();
        assert!((ld.sigma_squared()[[0, 1]] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_symmetric_for_identical_tensors() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(11);
        let counts = Array3::from_shape_fn((6, 30, 2), |_| rng.random_range(0..4u32));
        let t = AlleleCountTensor::new(counts).unwrap();
        let ld = calculate_rsquared(&t, &t).unwrap();

        for i in 0..6 {
            for j in 0..6 {
                assert!((ld.numerators[[i, j]] - ld.numerators[[j, i]]).abs() < 1e-12);
                assert!((ld.denominators[[i, j]] - ld.denominators[[j, i]]).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn test_cross_tensor_orientation() {
        let t1 = from_calls(&[vec![1, 0, 1, 0]], 2);
        let t2 = from_calls(&[vec![1, 0, 1, 0], vec![1, 1, 0, 0], vec![1, 1, 1, 1]], 2);
        let ld = calculate_rsquared(&t1, &t2).unwrap();
        // rows are sites of the second tensor
        assert_eq!(ld.dim(), (3, 1));
        assert!((ld.sigma_squared()[[0, 0]] - 1.0).abs() < 1e-12);
        assert!(ld.numerators[[1, 0]].abs() < 1e-12);
        assert!(ld.denominators[[1, 0]] > 0.0);
        // monomorphic locus has no variance
        assert_eq!(ld.denominators[[2, 0]], 0.0);

        let swapped = calculate_rsquared(&t2, &t1).unwrap();
        assert_eq!(swapped.dim(), (1, 3));
        assert_eq!(swapped.numerators, ld.numerators.t());
    }

    #[test]
    fn test_sample_count_mismatch() {
        let t1 = from_calls(&[vec![1, 0]], 2);
        let t2 = from_calls(&[vec![1, 0, 1]], 2);
        assert!(matches!(
            calculate_rsquared(&t1, &t2),
            Err(PairdivError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_frequency_band_excludes_sites() {
        let common: Vec<u8> = (0..20).map(|k| (k % 2) as u8).collect();
        let rare: Vec<u8> = (0..20).map(|k| (k == 0) as u8).collect();
        let t = from_calls(&[common.clone(), common, rare], 3);

        let banded = calculate_rsquared_condition_freq(&t, &t, 0.2, 0.5).unwrap();
        assert!((banded.sigma_squared()[[0, 1]] - 1.0).abs() < 1e-12);
        for k in 0..3 {
            assert_eq!(banded.numerators[[2, k]], 0.0);
            assert_eq!(banded.denominators[[k, 2]], 0.0);
        }

        let full_band = calculate_rsquared_condition_freq(&t, &t, 0.0, 0.5).unwrap();
        let plain = calculate_rsquared(&t, &t).unwrap();
        assert_eq!(full_band, plain);
    }

    #[test]
    fn test_band_pools_over_all_samples() {
        // site 1 is read only in samples 0 (alt) and 1 (ref): 0.5 among covered
        // samples but 0.1 over all ten
        let counts = Array3::from_shape_fn((2, 10, 2), |(i, j, k)| match (i, j, k) {
            (0, j, 0) if j % 2 == 1 => 3,
            (0, j, 1) if j % 2 == 0 => 3,
            (1, 0, 0) | (1, 1, 1) => 3,
            _ => 0,
        });
        let t = AlleleCountTensor::new(counts).unwrap();

        let plain = calculate_rsquared(&t, &t).unwrap();
        assert!((plain.denominators[[1, 0]] - 0.0625).abs() < 1e-12);

        let banded = calculate_rsquared_condition_freq(&t, &t, 0.2, 0.5).unwrap();
        assert_eq!(banded.numerators[[1, 0]], 0.0);
        assert_eq!(banded.denominators[[1, 0]], 0.0);
        assert_eq!(banded.denominators[[0, 1]], 0.0);
        assert!((banded.sigma_squared()[[0, 0]] - 1.0).abs() < 1e-12);

        let low = calculate_rsquared_condition_freq(&t, &t, 0.05, 0.15).unwrap();
        assert!((low.denominators[[1, 1]] - 0.25 * 0.25).abs() < 1e-12);
        assert_eq!(low.denominators[[0, 0]], 0.0);
    }

    #[test]
    fn test_invalid_band() {
        let t = from_calls(&[vec![1, 0]], 2);
        assert!(calculate_rsquared_condition_freq(&t, &t, 0.4, 0.2).is_err());
        assert!(calculate_rsquared_condition_freq(&t, &t, -0.1, 0.2).is_err());
    }

    #[test]
    fn test_band_above_half_acts_as_half() {
        let common: Vec<u8> = (0..20).map(|k| (k % 2) as u8).collect();
        let rare: Vec<u8> = (0..20).map(|k| (k < 3) as u8).collect();
        let t = from_calls(&[common, rare], 3);

        let wide = calculate_rsquared_condition_freq(&t, &t, 0.1, 1.0).unwrap();
        let half = calculate_rsquared_condition_freq(&t, &t, 0.1, 0.5).unwrap();
        assert_eq!(wide, half);
        assert!(LdConfig { low_freq: 0.1, high_freq: 1.0 }.validate().is_ok());
    }

    #[test]
    fn test_summary_pools_as_ratio_of_sums() {
        let pattern: Vec<u8> = (0..8).map(|k| (k % 2) as u8).collect();
        let other: Vec<u8> = (0..8).map(|k| ((k / 2) % 2) as u8).collect();
        let t = from_calls(&[pattern, other], 2);
        let ld = calculate_rsquared(&t, &t).unwrap();

        let mut whole = LdSummary::new();
        whole.add(&ld);

        let mut left = LdSummary::new();
        left.add_pair(ld.numerators[[0, 0]], ld.denominators[[0, 0]]);
        left.add_pair(ld.numerators[[0, 1]], ld.denominators[[0, 1]]);
        let mut right = LdSummary::new();
        right.add_pair(ld.numerators[[1, 0]], ld.denominators[[1, 0]]);
        right.add_pair(ld.numerators[[1, 1]], ld.denominators[[1, 1]]);
        left.merge(&right);

        assert_eq!(whole.num_pairs, 4);
        assert!((whole.sigma_squared() - left.sigma_squared()).abs() < 1e-12);
        assert!((whole.sigma_squared() - 0.5).abs() < 1e-12);
        assert_eq!(LdSummary::new().sigma_squared(), 0.0);
    }
}
