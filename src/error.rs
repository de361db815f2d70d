// WHY: every terminal pipeline failure collapses to one of these; the Display
// text is the only thing that reaches the caller's error event

use std::path::PathBuf;
use thiserror::Error;

/// Terminal errors of a conversion pipeline
#[derive(Debug, Error)]
pub enum ConvertError {
    /// Network-level failure while fetching a remote source
    #[error("failed to fetch {url}: {reason}")]
    Fetch { url: String, reason: String },

    /// Remote source answered with a non-success status
    #[error("failed to fetch {url}: server responded with status {status}")]
    FetchStatus { url: String, status: u16 },

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration: {0}")]
    Config(String),

    /// Conversion table could not be loaded
    #[error("invalid conversion table {}: {reason}", path.display())]
    Table { path: PathBuf, reason: String },

    #[error("conversion failed: {0}")]
    Conversion(String),
}

pub type Result<T, E = ConvertError> = std::result::Result<T, E>;
