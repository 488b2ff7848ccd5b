// report.rs - Per-variant-class summary reports

use chrono::{DateTime, Utc};
use log::info;
use rayon::prelude::*;
use serde::Serialize;

use crate::config::StatsConfig;
use crate::core::{accumulate_fixation, accumulate_pi, FixationMatrices, PiMatrices};
use crate::data::{GeneCountMap, VariantClass};
use crate::error::Result;

/// π and fixation matrices of one variant class
#[derive(Debug, Clone, Serialize)]
pub struct ClassReport {
    pub variant_class: VariantClass,
    pub num_genes: usize,
    pub num_samples: usize,
    pub pi: PiMatrices,
    pub fixation: FixationMatrices,
    pub computed_at: DateTime<Utc>,
}

pub fn compute_class_report(
    map: &GeneCountMap,
    variant_class: VariantClass,
    allowed_genes: Option<&[String]>,
    config: &StatsConfig,
) -> Result<ClassReport> {
    let pi = accumulate_pi(map, variant_class, allowed_genes)?;
    let fixation = accumulate_fixation(map, variant_class, allowed_genes, &config.fixation)?;
    Ok(ClassReport {
        variant_class,
        num_genes: pi.num_genes(),
        num_samples: map.num_samples(),
        pi: pi.finish(),
        fixation: fixation.finish(),
        computed_at: Utc::now(),
    })
}

/// Compute one report per variant class, in parallel.
///
/// Reports come back in the order of `classes`. The first failing class
/// aborts the whole batch.
pub fn compute_class_reports(
    map: &GeneCountMap,
    classes: &[VariantClass],
    allowed_genes: Option<&[String]>,
    config: &StatsConfig,
) -> Result<Vec<ClassReport>> {
    config.validate()?;
    info!(
        "Computing reports for {} variant classes over {} genes",
        classes.len(),
        map.num_genes()
    );
    classes
        .par_iter()
        .map(|&class| compute_class_report(map, class, allowed_genes, config))
        .collect()
}

pub fn reports_to_json(reports: &[ClassReport]) -> Result<String> {
    Ok(serde_json::to_string_pretty(reports)?)
}
