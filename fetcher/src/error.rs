//! Error types for the verified-retrieval pipeline.
//!
//! Every fatal error knows the pipeline stage it was raised in, so the CLI
//! can print a single `error: <stage>: <cause>` line. Stage-local error enums
//! convert into [`PipelineError`] at the stage boundary.

use crate::artefact::download::DownloadError;
use crate::artefact::unpack::UnpackError;
use crate::config::ConfigError;
use crate::pipeline::PipelineStage;
use crate::preflight::PreflightError;
use crate::signature::{SignatureFailure, VerificationError};
use camino::Utf8PathBuf;
use std::fmt;
use thiserror::Error;

/// Fatal errors that abort a run.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Configuration could not be resolved.
    #[error(transparent)]
    InvalidConfig(#[from] ConfigError),

    /// A required external tool is not invocable.
    #[error(transparent)]
    MissingDependency(#[from] PreflightError),

    /// A remote artefact could not be fetched.
    #[error("could not fetch {artefact}: {source}")]
    Fetch {
        /// Local filename of the artefact being fetched.
        artefact: String,
        /// The download failure.
        #[source]
        source: DownloadError,
    },

    /// The signing key could not be parsed or imported.
    #[error("could not import signing key {key_file}: {reason}")]
    KeyImport {
        /// The fetched key file.
        key_file: String,
        /// Verifier diagnostic.
        reason: String,
    },

    /// The detached signature was rejected.
    #[error("{0}")]
    SignatureInvalid(SignatureFailure),

    /// The verified artefact could not be decompressed.
    #[error(transparent)]
    Decompression(#[from] UnpackError),

    /// A local filesystem operation failed.
    #[error("{path}: {source}")]
    Io {
        /// The stage that performed the operation.
        stage: PipelineStage,
        /// The path being operated on.
        path: Utf8PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

impl PipelineError {
    /// Return the stage the run failed in.
    ///
    /// # Examples
    ///
    /// ```
    /// use unifont_fetch::error::PipelineError;
    /// use unifont_fetch::pipeline::PipelineStage;
    /// use unifont_fetch::preflight::PreflightError;
    ///
    /// let err = PipelineError::from(PreflightError::MissingDependency {
    ///     tools: vec!["gpg".to_owned()],
    /// });
    /// assert_eq!(err.stage(), PipelineStage::Preflight);
    /// ```
    #[must_use]
    pub fn stage(&self) -> PipelineStage {
        match self {
            Self::InvalidConfig(_) => PipelineStage::Configure,
            Self::MissingDependency(_) => PipelineStage::Preflight,
            Self::Fetch { .. } => PipelineStage::Fetch,
            Self::KeyImport { .. } => PipelineStage::KeyImport,
            Self::SignatureInvalid(_) => PipelineStage::Verify,
            Self::Decompression(_) => PipelineStage::Unpack,
            Self::Io { stage, .. } => *stage,
        }
    }

    /// Return the name of this failure in the error taxonomy, as logged on exit.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidConfig(_) => "InvalidConfig",
            Self::MissingDependency(_) => "MissingDependency",
            Self::Fetch { .. } => "FetchError",
            Self::KeyImport { .. } => "KeyImportError",
            Self::SignatureInvalid(_) => "SignatureInvalid",
            Self::Decompression(_) => "DecompressionError",
            Self::Io { .. } => "IoError",
        }
    }

    /// Format the single diagnostic line printed before a non-zero exit.
    #[must_use]
    pub fn diagnostic(&self) -> String {
        format!("error: {}: {self}", self.stage())
    }

    pub(crate) fn io(
        stage: PipelineStage,
        path: impl Into<Utf8PathBuf>,
    ) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| Self::Io {
            stage,
            path,
            source,
        }
    }
}

impl From<VerificationError> for PipelineError {
    fn from(err: VerificationError) -> Self {
        match err {
            VerificationError::KeyImport { key_file, reason } => {
                Self::KeyImport { key_file, reason }
            }
            VerificationError::SignatureInvalid(failure) => Self::SignatureInvalid(failure),
        }
    }
}

/// Non-fatal conditions reported during a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineWarning {
    /// The key import yielded no usable key, so the signature check cannot
    /// succeed.
    TrustEstablishment {
        /// The fetched key file.
        key_file: String,
    },
}

impl fmt::Display for PipelineWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TrustEstablishment { key_file } => write!(
                f,
                "no usable signing key was imported from {key_file}; signature verification will fail"
            ),
        }
    }
}

/// Convenience result alias for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;
