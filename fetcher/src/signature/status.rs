//! Parser for the GnuPG machine-readable status protocol.
//!
//! `gpg --status-fd 1` writes one `[GNUPG:] KEYWORD args...` line per event.
//! Only the keywords that decide an import or a verification are modelled;
//! everything else is kept as [`StatusLine::Other`].

use super::{KeyImport, SignatureFailure, SignatureReport};

/// Prefix that marks a status line.
const STATUS_PREFIX: &str = "[GNUPG:] ";

/// `ERRSIG` return code for a missing public key.
const ERRSIG_NO_PUBKEY: &str = "9";

/// One recognised status line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusLine {
    /// A key was imported or was already present.
    ImportOk {
        /// Fingerprint of the key.
        fingerprint: String,
    },
    /// The signature is good.
    GoodSig {
        /// Long key id.
        key_id: String,
        /// Primary user id of the signer.
        user_id: String,
    },
    /// The signature is good and the signing key is valid.
    ValidSig {
        /// Fingerprint of the signing key.
        fingerprint: String,
        /// Signature creation date.
        created: String,
        /// Signature creation time as seconds since the epoch.
        timestamp: String,
    },
    /// The signature does not match the data.
    BadSig {
        /// Long key id.
        key_id: String,
    },
    /// The signature could not be checked.
    ErrSig {
        /// Long key id.
        key_id: String,
        /// GnuPG return code (`9` means the key is missing).
        rc: String,
    },
    /// The signing key is not available.
    NoPubkey {
        /// Long key id.
        key_id: String,
    },
    /// Good signature from an expired key.
    ExpKeySig {
        /// Long key id.
        key_id: String,
    },
    /// Good signature from a revoked key.
    RevKeySig {
        /// Long key id.
        key_id: String,
    },
    /// Good but expired signature.
    ExpSig {
        /// Long key id.
        key_id: String,
    },
    /// No OpenPGP data was found.
    NoData {
        /// GnuPG reason code.
        reason: String,
    },
    /// Any other status keyword.
    Other(String),
}

/// Parse every status line in `output`, skipping non-status text.
///
/// # Examples
///
/// ```
/// use unifont_fetch::signature::status::{StatusLine, parse_status};
///
/// let lines = parse_status("[GNUPG:] BADSIG 1A09227B1F435A33 Unifoundry\n");
/// assert_eq!(
///     lines,
///     vec![StatusLine::BadSig { key_id: "1A09227B1F435A33".to_owned() }]
/// );
/// ```
#[must_use]
pub fn parse_status(output: &str) -> Vec<StatusLine> {
    output
        .lines()
        .filter_map(|line| line.strip_prefix(STATUS_PREFIX))
        .map(parse_line)
        .collect()
}

fn parse_line(body: &str) -> StatusLine {
    let mut fields = body.split(' ');
    let keyword = fields.next().unwrap_or_default();
    let args: Vec<&str> = fields.collect();
    let arg = |index: usize| args.get(index).copied().unwrap_or_default().to_owned();

    match keyword {
        "IMPORT_OK" => StatusLine::ImportOk {
            fingerprint: arg(1),
        },
        "GOODSIG" => StatusLine::GoodSig {
            key_id: arg(0),
            user_id: args.get(1..).map(|rest| rest.join(" ")).unwrap_or_default(),
        },
        "VALIDSIG" => StatusLine::ValidSig {
            fingerprint: arg(0),
            created: arg(1),
            timestamp: arg(2),
        },
        "BADSIG" => StatusLine::BadSig { key_id: arg(0) },
        "ERRSIG" => StatusLine::ErrSig {
            key_id: arg(0),
            rc: arg(5),
        },
        "NO_PUBKEY" => StatusLine::NoPubkey { key_id: arg(0) },
        "EXPKEYSIG" => StatusLine::ExpKeySig { key_id: arg(0) },
        "REVKEYSIG" => StatusLine::RevKeySig { key_id: arg(0) },
        "EXPSIG" => StatusLine::ExpSig { key_id: arg(0) },
        "NODATA" => StatusLine::NoData { reason: arg(0) },
        other => StatusLine::Other(other.to_owned()),
    }
}

/// Summarise the status lines of a key import.
#[must_use]
pub fn import_from_status(lines: &[StatusLine]) -> KeyImport {
    let mut fingerprints: Vec<String> = Vec::new();
    for line in lines {
        if let StatusLine::ImportOk { fingerprint } = line
            && !fingerprint.is_empty()
            && !fingerprints.contains(fingerprint)
        {
            fingerprints.push(fingerprint.clone());
        }
    }
    KeyImport { fingerprints }
}

/// Decide a verification from its status lines and exit status.
///
/// Rejections take precedence over a `GOODSIG`, and a good signature needs
/// both `GOODSIG` and `VALIDSIG` plus a successful exit.
///
/// # Errors
///
/// Returns the [`SignatureFailure`] that best describes the rejection.
pub fn evaluate_verification(
    lines: &[StatusLine],
    exit_ok: bool,
) -> Result<SignatureReport, SignatureFailure> {
    if let Some(failure) = lines.iter().find_map(rejection) {
        return Err(failure);
    }

    let good = lines.iter().find_map(|line| match line {
        StatusLine::GoodSig { user_id, .. } => Some(user_id.clone()),
        _ => None,
    });
    let valid = lines.iter().find_map(|line| match line {
        StatusLine::ValidSig {
            fingerprint,
            timestamp,
            ..
        } => Some((fingerprint.clone(), timestamp.clone())),
        _ => None,
    });

    match (good, valid, exit_ok) {
        (Some(user_id), Some((fingerprint, timestamp)), true) => Ok(SignatureReport {
            fingerprint,
            signer: (!user_id.is_empty()).then_some(user_id),
            signed_at: (!timestamp.is_empty()).then_some(timestamp),
        }),
        (_, _, false) => Err(SignatureFailure::Unverified {
            reason: "verifier exited with failure".to_owned(),
        }),
        _ => Err(SignatureFailure::Unverified {
            reason: "no good signature was reported".to_owned(),
        }),
    }
}

fn rejection(line: &StatusLine) -> Option<SignatureFailure> {
    let failure = match line {
        StatusLine::BadSig { key_id } => SignatureFailure::BadSignature {
            key_id: key_id.clone(),
        },
        StatusLine::NoPubkey { key_id } => SignatureFailure::UnknownSigner {
            key_id: key_id.clone(),
        },
        StatusLine::ErrSig { key_id, rc } if rc == ERRSIG_NO_PUBKEY => {
            SignatureFailure::UnknownSigner {
                key_id: key_id.clone(),
            }
        }
        StatusLine::ErrSig { key_id, rc } => SignatureFailure::Unverified {
            reason: format!("signature by {key_id} could not be checked (rc {rc})"),
        },
        StatusLine::ExpKeySig { key_id } => SignatureFailure::ExpiredKey {
            key_id: key_id.clone(),
        },
        StatusLine::RevKeySig { key_id } => SignatureFailure::RevokedKey {
            key_id: key_id.clone(),
        },
        StatusLine::ExpSig { key_id } => SignatureFailure::ExpiredSignature {
            key_id: key_id.clone(),
        },
        StatusLine::NoData { reason } => SignatureFailure::Malformed {
            reason: format!("no OpenPGP signature data found (code {reason})"),
        },
        _ => return None,
    };
    Some(failure)
}
