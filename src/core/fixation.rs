// fixation.rs - Fixed allele differences between samples

use log::{debug, info};
use ndarray::{Array2, Zip};
use serde::{Deserialize, Serialize};

use crate::core::accumulator::{DenominatorGuard, RatioAccumulator};
use crate::data::{AlleleCountTensor, GeneCountMap, GeneRecord, VariantClass};
use crate::error::{PairdivError, Result};

/// Thresholds deciding when a frequency difference counts as fixed
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FixationConfig {
    /// Frequencies within this distance of 0 or 1 are snapped to the boundary
    pub min_freq: f64,
    /// Smallest frequency change counted as a fixed difference
    pub min_change: f64,
}

impl Default for FixationConfig {
    fn default() -> Self {
        Self {
            min_freq: 0.0,
            min_change: 0.8,
        }
    }
}

impl FixationConfig {
    pub fn new(min_freq: f64, min_change: f64) -> Result<Self> {
        let config = Self {
            min_freq,
            min_change,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=0.5).contains(&self.min_freq) {
            return Err(PairdivError::InvalidParameter(format!(
                "min_freq must be between 0.0 and 0.5, got {}",
                self.min_freq
            )));
        }
        if !(0.0..=1.0).contains(&self.min_change) {
            return Err(PairdivError::InvalidParameter(format!(
                "min_change must be between 0.0 and 1.0, got {}",
                self.min_change
            )));
        }
        Ok(())
    }

    #[inline]
    fn snap(&self, freq: f64) -> f64 {
        if freq < self.min_freq {
            0.0
        } else if freq >= 1.0 - self.min_freq {
            1.0
        } else {
            freq
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FixationMatrices {
    /// Summed fixed differences per sample pair
    pub fixation: Array2<f64>,
    /// Fixed differences per passed site
    pub persite_fixation: Array2<f64>,
}

/// One gene's summed fixed differences for every sample pair.
pub fn gene_fixation_sums(alleles: &AlleleCountTensor, config: &FixationConfig) -> Array2<f64> {
    let freqs = alleles.alt_freqs().mapv(|f| config.snap(f));
    let covered = alleles.covered();
    let num_samples = alleles.num_samples();
    let mut sums = Array2::zeros((num_samples, num_samples));

    Zip::from(freqs.rows()).and(covered.rows()).for_each(|site_freqs, site_covered| {
        for j in 0..num_samples {
            if site_covered[j] == 0.0 {
                continue;
            }
            for l in (j + 1)..num_samples {
                if site_covered[l] == 0.0 {
                    continue;
                }
                let delta = (site_freqs[j] - site_freqs[l]).abs();
                if delta >= config.min_change {
                    sums[[j, l]] += delta;
                    sums[[l, j]] += delta;
                }
            }
        }
    });
    sums
}

/// Running fixation sums and passed sites over genes
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FixationAccumulator {
    sums: RatioAccumulator,
    num_genes: usize,
}

impl FixationAccumulator {
    pub fn new(num_samples: usize) -> Self {
        Self {
            sums: RatioAccumulator::new(num_samples, num_samples),
            num_genes: 0,
        }
    }

    pub fn num_genes(&self) -> usize {
        self.num_genes
    }

    pub fn add_gene(&mut self, record: &GeneRecord, config: &FixationConfig) -> Result<()> {
        if record.alleles.is_empty() {
            return Ok(());
        }
        let sums = gene_fixation_sums(&record.alleles, config);
        self.sums.add(sums.view(), record.sites.view())?;
        self.num_genes += 1;
        Ok(())
    }

    pub fn merge(&mut self, other: &FixationAccumulator) -> Result<()> {
        self.sums.merge(&other.sums)?;
        self.num_genes += other.num_genes;
        Ok(())
    }

    pub fn finish(&self) -> FixationMatrices {
        FixationMatrices {
            fixation: self.sums.numerator().clone(),
            persite_fixation: self.sums.ratio(DenominatorGuard::Below(0.1)),
        }
    }
}

pub fn accumulate_fixation(
    map: &GeneCountMap,
    variant_class: VariantClass,
    allowed_genes: Option<&[String]>,
    config: &FixationConfig,
) -> Result<FixationAccumulator> {
    config.validate()?;
    let mut accumulator = FixationAccumulator::new(map.num_samples());
    for (gene, record) in map.records(variant_class, allowed_genes)? {
        if record.alleles.is_empty() {
            debug!("Skipping {} ({}): no sites", gene, variant_class);
        }
        accumulator.add_gene(record, config)?;
    }
    Ok(accumulator)
}

/// Fixation and per-site fixation matrices pooled over genes.
pub fn calculate_fixation_matrix(
    map: &GeneCountMap,
    variant_class: VariantClass,
    allowed_genes: Option<&[String]>,
    config: &FixationConfig,
) -> Result<FixationMatrices> {
    let accumulator = accumulate_fixation(map, variant_class, allowed_genes, config)?;
    info!(
        "Fixation matrix ({}, {}): {} genes, {} samples, min_change {}",
        variant_class,
        variant_class.description(),
        accumulator.num_genes(),
        map.num_samples(),
        config.min_change
    );
    Ok(accumulator.finish())
}
