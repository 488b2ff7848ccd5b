// mod.rs - Data structures module

pub mod alleles;
pub mod gene_map;

// Re-export main types for convenience
pub use alleles::{AlleleCountTensor, ALT, FREQ_EPSILON, REF};
pub use gene_map::{GeneCountMap, GeneRecord, PassedSitesMatrix, VariantClass};
