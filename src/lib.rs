// lib.rs - pairdiv library root

//! # pairdiv - Pairwise population-genetic statistics from allele counts
//!
//! This library computes sample × sample diversity statistics from per-gene,
//! per-site alt/ref read counts of many metagenomic samples. Every engine is
//! a pure function of in-memory arrays; loading the counts and deciding which
//! sites passed filtering is left to the caller.
//!
//! ## Features
//!
//! - **Linkage disequilibrium**: σ² numerators and denominators between every
//!   pair of sites, optionally restricted to a frequency band
//! - **Diversity**: between- and within-sample π pooled over genes
//! - **Fixation**: counts of fixed allele differences per sample pair
//! - **Gene content**: copy-number and presence/absence distances
//! - **Site frequency spectra**: naive binning and hypergeometric downsampling
//!
//! ## Basic Usage
//!
//! ```rust,no_run
//! use pairdiv::prelude::*;
//! use ndarray::Array2;
//!
//! // one site, two samples: (alt, ref) = (4, 0) and (0, 4)
//! let alleles = AlleleCountTensor::from_shape_vec(1, 2, vec![4, 0, 0, 4])?;
//! let record = GeneRecord::new(alleles, Array2::from_elem((2, 2), 1.0))?;
//!
//! let mut map = GeneCountMap::new();
//! map.insert("geneA", VariantClass::FourD, record)?;
//!
//! let pi = calculate_pi_matrix(&map, VariantClass::FourD, None)?;
//! let fixation = calculate_fixation_matrix(&map, VariantClass::FourD, None, &FixationConfig::default())?;
//! assert_eq!(pi.pi[[0, 1]], 1.0);
//! assert_eq!(fixation.fixation[[0, 1]], 1.0);
//! # Ok::<(), pairdiv::PairdivError>(())
//! ```

pub mod config;
pub mod core;
pub mod data;
pub mod error;
pub mod output;
pub mod report;

// Convenience prelude for common imports
pub mod prelude {
    pub use crate::config::StatsConfig;
    pub use crate::core::{calculate_fixation_matrix, calculate_pi_matrix};
    pub use crate::core::{calculate_rsquared, calculate_rsquared_condition_freq};
    pub use crate::core::{coverage_based_gene_hamming_matrix, gene_hamming_matrix, gene_sharing_matrix};
    pub use crate::core::{estimate_sfs_downsampling, estimate_sfs_naive_binning, fold_sfs};
    pub use crate::core::{FixationConfig, GeneContentConfig, LdConfig, LdSummary, SfsConfig};
    pub use crate::data::{AlleleCountTensor, GeneCountMap, GeneRecord, VariantClass};
    pub use crate::error::{PairdivError, Result};
    pub use crate::output::phylip_distance_matrix_str;
    pub use crate::report::compute_class_reports;
}

// Re-export main types at the root level for convenience
pub use config::StatsConfig;
pub use data::{AlleleCountTensor, GeneCountMap, GeneRecord, VariantClass};
pub use error::{PairdivError, Result};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get library information
pub fn get_info() -> String {
    format!(
        "pairdiv v{} - Pairwise diversity statistics from allele counts",
        VERSION
    )
}
