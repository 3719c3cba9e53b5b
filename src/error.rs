use thiserror::Error;

/// Why a manifest build produced no manifest.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BuildError {
    #[error("chapter source is unavailable ({source_location}): {reason}")]
    SourceUnavailable {
        source_location: String,
        reason: String,
    },

    #[error("manifest build was superseded by a newer build")]
    Superseded,

    #[error("chapter layout is invalid: {0}")]
    Layout(String),
}
