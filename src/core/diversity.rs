// diversity.rs - Nucleotide diversity (π) between and within samples

use log::{debug, info};
use ndarray::{Array1, Array2, Axis};
use serde::Serialize;

use crate::core::accumulator::{DenominatorGuard, RatioAccumulator};
use crate::data::{AlleleCountTensor, GeneCountMap, GeneRecord, VariantClass};
use crate::error::Result;

/// Sample × sample diversity, normalised per passed site.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PiMatrices {
    /// Between-sample π off the diagonal, within-sample π on it
    pub pi: Array2<f64>,
    /// Average of the two within-sample π values of each pair
    pub avg_pi: Array2<f64>,
}

/// One gene's un-normalised π and average-π sums.
///
/// π_jl = (sites covered in both) - Σ_sites Σ_alleles f_j f_l. The general
/// formula reuses the same read twice when j = l, so the diagonal is replaced
/// by the leave-one-out within-sample estimate.
pub fn gene_pi_sums(alleles: &AlleleCountTensor) -> (Array2<f64>, Array2<f64>) {
    let covered = alleles.covered();
    let freqs = alleles.allele_freqs();
    let self_pis = alleles.self_pis();

    let mut pi = covered.t().dot(&covered);
    for allele_freqs in freqs.axis_iter(Axis(2)) {
        pi -= &allele_freqs.t().dot(&allele_freqs);
    }

    let mut avg_pi = self_pis.t().dot(&covered);
    avg_pi += &covered.t().dot(&self_pis);
    avg_pi /= 2.0;

    pi.diag_mut().assign(&avg_pi.diag());
    (pi, avg_pi)
}

/// Running π sums over genes, divided by the summed passed sites at the end.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PiAccumulator {
    pi: RatioAccumulator,
    avg_pi: RatioAccumulator,
    num_genes: usize,
}

impl PiAccumulator {
    pub fn new(num_samples: usize) -> Self {
        Self {
            pi: RatioAccumulator::new(num_samples, num_samples),
            avg_pi: RatioAccumulator::new(num_samples, num_samples),
            num_genes: 0,
        }
    }

    /// Genes that contributed (empty genes are skipped)
    pub fn num_genes(&self) -> usize {
        self.num_genes
    }

    pub fn add_gene(&mut self, record: &GeneRecord) -> Result<()> {
        if record.alleles.is_empty() {
            return Ok(());
        }
        let (pi, avg_pi) = gene_pi_sums(&record.alleles);
        self.pi.add(pi.view(), record.sites.view())?;
        self.avg_pi.add(avg_pi.view(), record.sites.view())?;
        self.num_genes += 1;
        Ok(())
    }

    pub fn merge(&mut self, other: &PiAccumulator) -> Result<()> {
        self.pi.merge(&other.pi)?;
        self.avg_pi.merge(&other.avg_pi)?;
        self.num_genes += other.num_genes;
        Ok(())
    }

    pub fn finish(&self) -> PiMatrices {
        PiMatrices {
            pi: self.pi.ratio(DenominatorGuard::Zero),
            avg_pi: self.avg_pi.ratio(DenominatorGuard::Zero),
        }
    }
}

/// Accumulate π sums over the selected genes without normalising.
pub fn accumulate_pi(
    map: &GeneCountMap,
    variant_class: VariantClass,
    allowed_genes: Option<&[String]>,
) -> Result<PiAccumulator> {
    let mut accumulator = PiAccumulator::new(map.num_samples());
    for (gene, record) in map.records(variant_class, allowed_genes)? {
        if record.alleles.is_empty() {
            debug!("Skipping {} ({}): no sites", gene, variant_class);
        }
        accumulator.add_gene(record)?;
    }
    Ok(accumulator)
}

/// π and average-π matrices pooled over genes as a ratio of sums.
pub fn calculate_pi_matrix(
    map: &GeneCountMap,
    variant_class: VariantClass,
    allowed_genes: Option<&[String]>,
) -> Result<PiMatrices> {
    let accumulator = accumulate_pi(map, variant_class, allowed_genes)?;
    info!(
        "π matrix ({}, {}): {} genes, {} samples",
        variant_class,
        variant_class.description(),
        accumulator.num_genes(),
        map.num_samples()
    );
    Ok(accumulator.finish())
}

/// Nonzero folded frequencies observed in each sample, with the number of
/// sites each sample covers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SampleFreqs {
    pub freqs: Vec<Vec<f64>>,
    pub passed_sites: Array1<f64>,
}

pub fn calculate_sample_freqs(
    map: &GeneCountMap,
    variant_class: VariantClass,
    allowed_genes: Option<&[String]>,
) -> Result<SampleFreqs> {
    let num_samples = map.num_samples();
    let mut freqs = vec![Vec::new(); num_samples];
    let mut passed_sites = Array1::zeros(num_samples);

    for (gene, record) in map.records(variant_class, allowed_genes)? {
        if record.alleles.is_empty() {
            debug!("Skipping {} ({}): no sites", gene, variant_class);
            continue;
        }
        let folded = record.alleles.folded_freqs();
        for (sample_freqs, column) in freqs.iter_mut().zip(folded.axis_iter(Axis(1))) {
            sample_freqs.extend(column.iter().copied().filter(|&f| f > 0.0));
        }
        passed_sites += &record.sites.diag();
    }

    Ok(SampleFreqs {
        freqs,
        passed_sites,
    })
}

/// Per-site alt frequency pooled over covered samples, concatenated over the
/// selected genes in gene order.
pub fn calculate_pooled_freqs(
    map: &GeneCountMap,
    variant_class: VariantClass,
    allowed_genes: Option<&[String]>,
) -> Result<Array1<f64>> {
    let mut pooled = Vec::new();
    for (_, record) in map.records(variant_class, allowed_genes)? {
        pooled.extend(record.alleles.pooled_alt_freqs());
    }
    Ok(Array1::from(pooled))
}
