// WHY: one TOML file drives detector tuning, progress budgeting, dictionary caps
// and fetch limits; every section falls back to its Default when omitted

use crate::error::{ConvertError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub detector: DetectorConfig,
    pub progress: ProgressConfig,
    pub dictionary: DictionaryConfig,
    pub fetch: FetchConfig,
    pub file_name: FileNameConfig,
    /// OpenCC-style conversion tables, applied as one merged table
    pub tables: Vec<PathBuf>,
}

/// Tunable parameters of the Chinese-likelihood heuristic
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Legacy encodings tried after strict UTF-8, in tie-break order
    pub candidates: Vec<String>,
    pub cjk_weight: f64,
    pub punct_weight: f64,
    pub control_weight: f64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            candidates: vec!["GBK".to_string(), "GB18030".to_string(), "Big5".to_string()],
            cjk_weight: 100.0,
            punct_weight: 10.0,
            control_weight: 50.0,
        }
    }
}

/// Progress cadence and how the overall 0..1 budget is split between stages
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressConfig {
    /// Upper bound on converter notifications per document
    pub max_notifications: usize,
    /// Share reserved for reading, detection and dictionary loading
    pub lead_fraction: f64,
    /// Share reserved for file-name derivation and hand-off
    pub trail_fraction: f64,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            max_notifications: 100,
            lead_fraction: 0.10,
            trail_fraction: 0.05,
        }
    }
}

/// Per-tier caps on how many custom pairs a user may apply
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DictionaryConfig {
    pub free_max_pairs: usize,
    pub pro_max_pairs: usize,
}

impl Default for DictionaryConfig {
    fn default() -> Self {
        Self {
            free_max_pairs: 50,
            pro_max_pairs: 5000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// None leaves the request unbounded; the host decides
    pub timeout_secs: Option<u64>,
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: None,
            user_agent: format!("txtconv/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FileNameConfig {
    pub max_bytes: usize,
    pub placeholder: String,
}

impl Default for FileNameConfig {
    fn default() -> Self {
        Self {
            max_bytes: 255,
            placeholder: "untitled".to_string(),
        }
    }
}

impl Config {
    /// Parse configuration from TOML text
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(text).map_err(|e| ConvertError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub async fn load(path: &Path) -> Result<Self> {
        debug!("Loading configuration from {}", path.display());
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConvertError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        let config = Self::from_toml_str(&text)?;
        info!(
            tables = config.tables.len(),
            candidates = ?config.detector.candidates,
            "Loaded configuration from {}",
            path.display()
        );
        Ok(config)
    }

    /// Reject budgets that could not keep overall progress inside 0..1
    pub fn validate(&self) -> Result<()> {
        let p = &self.progress;
        if p.max_notifications == 0 {
            return Err(ConvertError::Config(
                "progress.max_notifications must be at least 1".to_string(),
            ));
        }
        let in_range = |f: f64| (0.0..1.0).contains(&f);
        if !in_range(p.lead_fraction)
            || !in_range(p.trail_fraction)
            || p.lead_fraction + p.trail_fraction >= 1.0
        {
            return Err(ConvertError::Config(format!(
                "progress fractions must leave room for conversion (lead {}, trail {})",
                p.lead_fraction, p.trail_fraction
            )));
        }
        if self.file_name.placeholder.trim().is_empty() {
            return Err(ConvertError::Config(
                "file_name.placeholder must not be empty".to_string(),
            ));
        }
        // the placeholder is the last resort and must never be truncated
        if self.file_name.max_bytes < self.file_name.placeholder.len() {
            return Err(ConvertError::Config(format!(
                "file_name.max_bytes ({}) must fit the placeholder {:?}",
                self.file_name.max_bytes, self.file_name.placeholder
            )));
        }
        Ok(())
    }
}
