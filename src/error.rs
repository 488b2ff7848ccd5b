// error.rs - Error types shared by every engine

use thiserror::Error;

use crate::data::VariantClass;

/// Errors raised at the boundary of the statistics engines.
///
/// Missing coverage is never an error; these variants cover malformed inputs
/// and lookups that cannot be satisfied.
#[derive(Debug, Error)]
pub enum PairdivError {
    #[error("shape mismatch in {context}: expected {expected}, found {found}")]
    ShapeMismatch {
        context: &'static str,
        expected: String,
        found: String,
    },

    #[error("sample count mismatch: map holds {expected} samples but '{gene}' has {found}")]
    SampleCountMismatch {
        gene: String,
        expected: usize,
        found: usize,
    },

    #[error("gene '{0}' is not present in the allele count map")]
    MissingGene(String),

    #[error("gene '{gene}' has no records for variant class {class}")]
    MissingVariantClass { gene: String, class: VariantClass },

    #[error("unknown variant class '{0}'. Use: 1D, 2D, 3D, 4D")]
    UnknownVariantClass(String),

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, PairdivError>;

impl PairdivError {
    pub(crate) fn shape(
        context: &'static str,
        expected: impl ToString,
        found: impl ToString,
    ) -> Self {
        PairdivError::ShapeMismatch {
            context,
            expected: expected.to_string(),
            found: found.to_string(),
        }
    }
}
