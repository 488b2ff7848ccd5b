// config.rs - Configuration file support

use log::info;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::core::{FixationConfig, GeneContentConfig, LdConfig, SfsConfig};
use crate::data::VariantClass;
use crate::error::{PairdivError, Result};

/// Thresholds and defaults for every statistics engine.
///
/// Missing sections and keys fall back to their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatsConfig {
    /// Variant class used when none is given explicitly
    pub variant_class: VariantClass,
    pub fixation: FixationConfig,
    pub ld: LdConfig,
    pub gene_content: GeneContentConfig,
    pub sfs: SfsConfig,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            variant_class: VariantClass::FourD,
            fixation: FixationConfig::default(),
            ld: LdConfig::default(),
            gene_content: GeneContentConfig::default(),
            sfs: SfsConfig::default(),
        }
    }
}

impl StatsConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: StatsConfig = toml::from_str(content)
            .map_err(|e| PairdivError::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            PairdivError::Config(format!("Failed to read config file '{}': {}", path.display(), e))
        })?;

        let config = Self::from_toml_str(&content).map_err(|e| match e {
            PairdivError::Config(msg) => PairdivError::Config(format!("{} ({})", msg, path.display())),
            other => other,
        })?;

        info!("Loaded configuration from: {}", path.display());
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let content = toml::to_string_pretty(self)
            .map_err(|e| PairdivError::Config(format!("Failed to serialize config: {}", e)))?;

        fs::write(path, content)?;

        info!("Saved configuration to: {}", path.display());
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.fixation.validate()?;
        self.ld.validate()?;
        self.gene_content.validate()?;
        self.sfs.validate()
    }

    /// Generate a sample configuration file with comments
    pub fn generate_sample() -> String {
        r#"# pairdiv.toml - Thresholds for the pairwise diversity engines
# Every key is optional; omitted keys keep the values shown here.

# Variant class used by default: 1D, 2D, 3D, 4D
variant_class = "4D"

# =============================================================================
# FIXATION
# =============================================================================

[fixation]
# Frequencies within this distance of 0 or 1 are snapped to the boundary (0.0-0.5)
min_freq = 0.0
# Smallest frequency change counted as a fixed difference (0.0-1.0)
min_change = 0.8

# =============================================================================
# LINKAGE DISEQUILIBRIUM
# =============================================================================

[ld]
# Folded population-frequency band for conditioned LD (0 <= low <= high)
low_freq = 0.0
high_freq = 0.5

# =============================================================================
# GENE CONTENT
# =============================================================================

[gene_content]
# Smallest |log2| copy-number fold change counted as a difference
min_log2_fold_change = 3.0
# Genes processed per batch
chunk_size = 1000

# =============================================================================
# SITE FREQUENCY SPECTRUM
# =============================================================================

[sfs]
# Depth sites are binned or downsampled to
target_depth = 10
"#
        .to_string()
    }
}
