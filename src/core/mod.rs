// mod.rs - Statistics engines module

pub mod accumulator;
pub mod diversity;
pub mod fixation;
pub mod gene_content;
pub mod ld;
pub mod sfs;

// Re-export main types for convenience
pub use accumulator::{guarded_ratio, DenominatorGuard, RatioAccumulator};
pub use diversity::{
    accumulate_pi, calculate_pi_matrix, calculate_pooled_freqs, calculate_sample_freqs,
    PiAccumulator, PiMatrices, SampleFreqs,
};
pub use fixation::{
    accumulate_fixation, calculate_fixation_matrix, FixationAccumulator, FixationConfig,
    FixationMatrices,
};
pub use gene_content::{
    coverage_based_gene_hamming_matrix, gene_hamming_matrix, gene_sharing_matrix,
    GeneContentConfig,
};
pub use ld::{calculate_rsquared, calculate_rsquared_condition_freq, LdConfig, LdMatrices, LdSummary};
pub use sfs::{estimate_sfs_downsampling, estimate_sfs_naive_binning, fold_sfs, SfsConfig};
