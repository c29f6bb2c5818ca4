//! Detached signature verification against a scoped keyring.
//!
//! Verification happens in two steps: the fetched signing key is imported
//! into a [`Keyring`], then the detached signature is checked against the
//! compressed artefact using only the keys in that keyring. Any outcome
//! other than a good signature from a valid key is a failure.
//!
//! # Sub-modules
//!
//! - [`keyring`] — Per-run or explicitly persistent key stores.
//! - [`status`] — Parser for the machine-readable GnuPG status protocol.
//! - [`gpg`] — [`SignatureVerifier`] backed by the `gpg` executable.

pub mod gpg;
pub mod keyring;
pub mod status;

pub use keyring::Keyring;

use camino::Utf8Path;
use std::fmt;

/// Keys added to a keyring by an import.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyImport {
    /// Fingerprints of keys the import reported as usable.
    pub fingerprints: Vec<String>,
}

impl KeyImport {
    /// Return whether the import yielded no usable key.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fingerprints.is_empty()
    }
}

/// Details of a good signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureReport {
    /// Fingerprint of the signing key.
    pub fingerprint: String,
    /// Primary user id of the signer, when reported.
    pub signer: Option<String>,
    /// Signature creation time as reported by the verifier.
    pub signed_at: Option<String>,
}

/// Why a signature was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignatureFailure {
    /// The signature does not match the data.
    BadSignature {
        /// Key id named by the signature.
        key_id: String,
    },
    /// The signing key is not in the keyring.
    UnknownSigner {
        /// Key id named by the signature.
        key_id: String,
    },
    /// The signing key has expired.
    ExpiredKey {
        /// Key id named by the signature.
        key_id: String,
    },
    /// The signing key has been revoked.
    RevokedKey {
        /// Key id named by the signature.
        key_id: String,
    },
    /// The signature itself has expired.
    ExpiredSignature {
        /// Key id named by the signature.
        key_id: String,
    },
    /// The signature file holds no parseable signature.
    Malformed {
        /// Verifier diagnostic.
        reason: String,
    },
    /// The verifier could not establish a good signature for another reason.
    Unverified {
        /// Verifier diagnostic.
        reason: String,
    },
}

impl fmt::Display for SignatureFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadSignature { key_id } => {
                write!(f, "bad signature from key {key_id}; the data does not match")
            }
            Self::UnknownSigner { key_id } => {
                write!(f, "signed by key {key_id}, which is not in the keyring")
            }
            Self::ExpiredKey { key_id } => write!(f, "signing key {key_id} has expired"),
            Self::RevokedKey { key_id } => write!(f, "signing key {key_id} has been revoked"),
            Self::ExpiredSignature { key_id } => {
                write!(f, "signature by key {key_id} has expired")
            }
            Self::Malformed { reason } => write!(f, "unparseable signature: {reason}"),
            Self::Unverified { reason } => write!(f, "signature not verified: {reason}"),
        }
    }
}

/// Errors raised by a [`SignatureVerifier`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VerificationError {
    /// The key file could not be parsed or imported.
    #[error("failed to import signing key {key_file}: {reason}")]
    KeyImport {
        /// The key file that was offered.
        key_file: String,
        /// Verifier diagnostic.
        reason: String,
    },

    /// The detached signature was rejected.
    #[error("{0}")]
    SignatureInvalid(SignatureFailure),
}

/// Verifies detached signatures using keys imported into a [`Keyring`].
///
/// Implementations must fail closed: anything short of a good signature by a
/// key in the keyring is [`VerificationError::SignatureInvalid`].
#[cfg_attr(test, mockall::automock)]
pub trait SignatureVerifier {
    /// Import the key file at `key_path` into `keyring`.
    ///
    /// # Errors
    ///
    /// Returns [`VerificationError::KeyImport`] if the key cannot be parsed
    /// or imported.
    fn import_key(&self, keyring: &Keyring, key_path: &Utf8Path)
    -> Result<KeyImport, VerificationError>;

    /// Verify the detached `signature` over `data` using `keyring`.
    ///
    /// # Errors
    ///
    /// Returns [`VerificationError::SignatureInvalid`] for every outcome
    /// other than a good signature.
    fn verify_detached(
        &self,
        keyring: &Keyring,
        signature: &Utf8Path,
        data: &Utf8Path,
    ) -> Result<SignatureReport, VerificationError>;
}
