//! Error types for release versions and artefact references.
//!
//! Each variant names the rejected input and the constraint it violated.

use thiserror::Error;

/// Errors arising from invalid artefact-related values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArtefactError {
    /// A release version is empty or cannot be used in a filename.
    #[error("invalid release version \"{value}\": {reason}")]
    InvalidVersion {
        /// The rejected version string.
        value: String,
        /// Description of the validation failure.
        reason: String,
    },

    /// A URL cannot yield a usable local filename.
    #[error("invalid URL \"{url}\": {reason}")]
    InvalidUrl {
        /// The rejected URL.
        url: String,
        /// Description of the validation failure.
        reason: String,
    },
}

/// Result type alias using [`ArtefactError`].
pub type Result<T> = std::result::Result<T, ArtefactError>;
