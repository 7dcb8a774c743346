use std::path::PathBuf;

/// Errors that can occur during host registry operations
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    #[error("host not found: {0}")]
    HostNotFound(String),

    #[error("no capability source configured")]
    NoSource,

    #[error("failed to read capability reports from {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse capability reports from {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid pool filter pattern: {0}")]
    InvalidPattern(#[from] globset::Error),
}
