//! Configuration error types.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file exists but is not a valid config; the span points into it.
    #[error("{path} is not a valid config: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: ron::error::SpannedError,
    },

    #[error("cannot encode config: {0}")]
    Serialize(#[from] ron::Error),

    /// A value is outside the range the server can run with.
    #[error("invalid setting `{key}`: {reason}")]
    Invalid {
        /// Dotted path of the offending setting.
        key: &'static str,
        reason: String,
    },
}
