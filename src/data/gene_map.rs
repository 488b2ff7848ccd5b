// gene_map.rs - Per-gene, per-variant-class count records

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::data::alleles::AlleleCountTensor;
use crate::error::{PairdivError, Result};

/// Samples × samples count of jointly covered sites; the diagonal holds the
/// sites covered within each sample.
pub type PassedSitesMatrix = Array2<f64>;

/// Degeneracy class of the sites a record covers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum VariantClass {
    /// Nondegenerate (every change is nonsynonymous)
    #[serde(rename = "1D")]
    OneD,
    #[serde(rename = "2D")]
    TwoD,
    #[serde(rename = "3D")]
    ThreeD,
    /// Fourfold degenerate (every change is synonymous)
    #[serde(rename = "4D")]
    FourD,
}

impl VariantClass {
    pub fn code(&self) -> &'static str {
        match self {
            VariantClass::OneD => "1D",
            VariantClass::TwoD => "2D",
            VariantClass::ThreeD => "3D",
            VariantClass::FourD => "4D",
        }
    }

    pub fn description(&self) -> &str {
        match self {
            VariantClass::OneD => "nondegenerate (nonsynonymous)",
            VariantClass::TwoD => "twofold degenerate",
            VariantClass::ThreeD => "threefold degenerate",
            VariantClass::FourD => "fourfold degenerate (synonymous)",
        }
    }

    pub fn is_synonymous(&self) -> bool {
        matches!(self, VariantClass::FourD)
    }
}

impl FromStr for VariantClass {
    type Err = PairdivError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "1D" => Ok(VariantClass::OneD),
            "2D" => Ok(VariantClass::TwoD),
            "3D" => Ok(VariantClass::ThreeD),
            "4D" => Ok(VariantClass::FourD),
            _ => Err(PairdivError::UnknownVariantClass(s.to_string())),
        }
    }
}

impl fmt::Display for VariantClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Allele counts of one gene and variant class with its passed-sites matrix
#[derive(Debug, Clone)]
pub struct GeneRecord {
    pub alleles: AlleleCountTensor,
    pub sites: PassedSitesMatrix,
}

impl GeneRecord {
    pub fn new(alleles: AlleleCountTensor, sites: PassedSitesMatrix) -> Result<Self> {
        let n = alleles.num_samples();
        if sites.dim() != (n, n) {
            return Err(PairdivError::shape(
                "passed sites matrix",
                format!("({}, {})", n, n),
                format!("{:?}", sites.dim()),
            ));
        }
        Ok(Self { alleles, sites })
    }

    pub fn num_samples(&self) -> usize {
        self.alleles.num_samples()
    }
}

/// Typed replacement for a nested gene -> class -> record lookup.
///
/// Genes are kept sorted so aggregation always visits them in the same order.
#[derive(Debug, Clone, Default)]
pub struct GeneCountMap {
    num_samples: Option<usize>,
    records: BTreeMap<String, BTreeMap<VariantClass, GeneRecord>>,
}

impl GeneCountMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record; every record in a map must describe the same samples.
    pub fn insert(&mut self, gene: &str, class: VariantClass, record: GeneRecord) -> Result<()> {
        let found = record.num_samples();
        match self.num_samples {
            Some(expected) if expected != found => {
                return Err(PairdivError::SampleCountMismatch {
                    gene: gene.to_string(),
                    expected,
                    found,
                });
            }
            Some(_) => {}
            None => self.num_samples = Some(found),
        }
        self.records
            .entry(gene.to_string())
            .or_default()
            .insert(class, record);
        Ok(())
    }

    pub fn get(&self, gene: &str, class: VariantClass) -> Result<&GeneRecord> {
        let classes = self
            .records
            .get(gene)
            .ok_or_else(|| PairdivError::MissingGene(gene.to_string()))?;
        classes
            .get(&class)
            .ok_or_else(|| PairdivError::MissingVariantClass {
                gene: gene.to_string(),
                class,
            })
    }

    pub fn contains_gene(&self, gene: &str) -> bool {
        self.records.contains_key(gene)
    }

    pub fn gene_names(&self) -> impl Iterator<Item = &str> {
        self.records.keys().map(|k| k.as_str())
    }

    pub fn num_genes(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of samples shared by every record (0 for an empty map)
    pub fn num_samples(&self) -> usize {
        self.num_samples.unwrap_or(0)
    }

    /// Sorted, deduplicated gene names to aggregate over. `None` selects
    /// every gene in the map; naming a gene the map lacks is an error.
    pub fn resolve_genes(&self, allowed_genes: Option<&[String]>) -> Result<Vec<&str>> {
        match allowed_genes {
            None => Ok(self.gene_names().collect()),
            Some(names) => {
                let unique: BTreeSet<&str> = names.iter().map(|s| s.as_str()).collect();
                unique
                    .into_iter()
                    .map(|name| {
                        self.records
                            .get_key_value(name)
                            .map(|(k, _)| k.as_str())
                            .ok_or_else(|| PairdivError::MissingGene(name.to_string()))
                    })
                    .collect()
            }
        }
    }

    /// Records of one variant class for the selected genes, in gene order.
    pub fn records(
        &self,
        class: VariantClass,
        allowed_genes: Option<&[String]>,
    ) -> Result<Vec<(&str, &GeneRecord)>> {
        self.resolve_genes(allowed_genes)?
            .into_iter()
            .map(|gene| Ok((gene, self.get(gene, class)?)))
            .collect()
    }
}
