// gene_content.rs - Gene presence and copy-number distances between samples

use log::info;
use ndarray::{Array2, ArrayView1, ArrayView2, Axis, Zip};
use serde::{Deserialize, Serialize};

use crate::core::accumulator::{guarded_ratio, DenominatorGuard};
use crate::error::{PairdivError, Result};

/// Coverages are clipped to this range before computing copy numbers
pub const COVERAGE_CLIP: (f64, f64) = (1.0, 1e9);

/// Copy numbers strictly inside this range are considered single-copy
pub const GOOD_COPYNUM: (f64, f64) = (0.5, 2.0);

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneContentConfig {
    /// Smallest |log2| copy-number fold change counted as a difference
    pub min_log2_fold_change: f64,
    /// Genes processed per batch. Only bounds working memory; the result
    /// does not depend on it.
    pub chunk_size: usize,
}

impl Default for GeneContentConfig {
    fn default() -> Self {
        Self {
            min_log2_fold_change: 3.0,
            chunk_size: 1000,
        }
    }
}

impl GeneContentConfig {
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(PairdivError::InvalidParameter(
                "chunk_size must be at least 1".to_string(),
            ));
        }
        if !self.min_log2_fold_change.is_finite() {
            return Err(PairdivError::InvalidParameter(format!(
                "min_log2_fold_change must be finite, got {}",
                self.min_log2_fold_change
            )));
        }
        Ok(())
    }
}

#[inline]
fn clip_coverage(value: f64) -> f64 {
    value.clamp(COVERAGE_CLIP.0, COVERAGE_CLIP.1)
}

#[inline]
fn is_good_copynum(copynum: f64) -> bool {
    copynum > GOOD_COPYNUM.0 && copynum < GOOD_COPYNUM.1
}

/// Count, for every sample pair, the genes whose copy number differs by at
/// least `min_log2_fold_change` (log2 scale) while at least one of the two
/// samples carries a single copy.
///
/// `gene_depths` is genes × samples; `marker_coverages` holds one coverage
/// per sample used to turn depths into copy numbers.
pub fn coverage_based_gene_hamming_matrix(
    gene_depths: ArrayView2<f64>,
    marker_coverages: ArrayView1<f64>,
    config: &GeneContentConfig,
) -> Result<Array2<f64>> {
    config.validate()?;
    let (num_genes, num_samples) = gene_depths.dim();
    if marker_coverages.len() != num_samples {
        return Err(PairdivError::shape(
            "marker coverages",
            format!("{} samples", num_samples),
            format!("{} samples", marker_coverages.len()),
        ));
    }

    let markers = marker_coverages.mapv(clip_coverage);
    let copynums = gene_depths.mapv(clip_coverage) / &markers;
    let good = copynums.mapv(is_good_copynum);

    let mut hamming = Array2::zeros((num_samples, num_samples));
    for (copynum_chunk, good_chunk) in copynums
        .axis_chunks_iter(Axis(0), config.chunk_size)
        .zip(good.axis_chunks_iter(Axis(0), config.chunk_size))
    {
        let mut chunk_counts = Array2::<f64>::zeros((num_samples, num_samples));
        Zip::from(copynum_chunk.rows())
            .and(good_chunk.rows())
            .for_each(|copynum, good| {
                for j in 0..num_samples {
                    for l in j..num_samples {
                        let fold_change = if good[j] || good[l] {
                            (copynum[j] / copynum[l]).log2().abs()
                        } else {
                            0.0
                        };
                        if fold_change >= config.min_log2_fold_change {
                            chunk_counts[[j, l]] += 1.0;
                            if l != j {
                                chunk_counts[[l, j]] += 1.0;
                            }
                        }
                    }
                }
            });
        hamming += &chunk_counts;
    }

    info!(
        "Copy-number hamming matrix: {} genes, {} samples, batches of {}",
        num_genes, num_samples, config.chunk_size
    );
    Ok(hamming)
}

/// Σ_genes |presence_j - presence_l| for a genes × samples presence matrix.
pub fn gene_hamming_matrix(gene_presence: ArrayView2<f64>) -> Array2<f64> {
    let num_samples = gene_presence.ncols();
    let mut hamming = Array2::zeros((num_samples, num_samples));
    for presence in gene_presence.rows() {
        for j in 0..num_samples {
            for l in (j + 1)..num_samples {
                let difference = (presence[j] - presence[l]).abs();
                hamming[[j, l]] += difference;
                hamming[[l, j]] += difference;
            }
        }
    }
    hamming
}

/// Shared genes over the union of genes present in either sample. Pairs
/// with no genes at all share 0.
pub fn gene_sharing_matrix(gene_presence: ArrayView2<f64>) -> Array2<f64> {
    let totals = gene_presence.sum_axis(Axis(0));
    let shared = gene_presence.t().dot(&gene_presence);
    let union = Array2::from_shape_fn(shared.dim(), |(j, l)| {
        totals[j] + totals[l] - shared[[j, l]]
    });
    guarded_ratio(shared.view(), union.view(), DenominatorGuard::Zero)
}
