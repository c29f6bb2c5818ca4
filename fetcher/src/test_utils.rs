//! Shared test utilities for the fetcher crate.
//!
//! Besides the command stubs, this module provides deterministic fakes for
//! the three pipeline capabilities: [`CannedDownloader`] serves bytes from
//! memory and counts requests, and [`DigestVerifier`] stands in for OpenPGP
//! with a keyed SHA-256 scheme so tampering and unknown signers are
//! detectable without real cryptography.

use crate::artefact::download::{ArtefactDownloader, DownloadError};
use crate::command::CommandExecutor;
use crate::signature::{
    KeyImport, Keyring, SignatureFailure, SignatureReport, SignatureVerifier, VerificationError,
};
use camino::Utf8Path;
use flate2::Compression;
use flate2::write::GzEncoder;
use sha2::{Digest, Sha256};
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::io::Write;
use std::path::Path;
use std::process::{ExitStatus, Output};

/// Creates an `ExitStatus` from an exit code (Unix implementation).
#[cfg(unix)]
pub fn exit_status(code: i32) -> ExitStatus {
    use std::os::unix::process::ExitStatusExt;

    ExitStatus::from_raw(code << 8)
}

/// Creates an `ExitStatus` from an exit code (Windows implementation).
#[cfg(windows)]
pub fn exit_status(code: i32) -> ExitStatus {
    use std::os::windows::process::ExitStatusExt;

    ExitStatus::from_raw(code as u32)
}

/// Creates a successful command `Output` with empty stdout and stderr.
pub fn success_output() -> Output {
    Output {
        status: exit_status(0),
        stdout: Vec::new(),
        stderr: Vec::new(),
    }
}

/// Creates a failed command `Output` with the given stderr message.
pub fn failure_output(stderr: &str) -> Output {
    Output {
        status: exit_status(1),
        stdout: Vec::new(),
        stderr: stderr.as_bytes().to_vec(),
    }
}

/// Represents an expected command invocation for testing.
#[derive(Debug)]
pub struct ExpectedCall {
    /// The command to execute (e.g., "gpg").
    pub cmd: &'static str,
    /// The arguments to pass to the command.
    pub args: Vec<String>,
    /// The result to return when this command is invoked.
    pub result: std::io::Result<Output>,
}

/// A stub implementation of `CommandExecutor` for testing.
///
/// Records expected command invocations and returns predefined results,
/// allowing tests to verify command execution without side effects.
#[derive(Debug)]
pub struct StubExecutor {
    expected: RefCell<VecDeque<ExpectedCall>>,
}

impl StubExecutor {
    /// Creates a new `StubExecutor` with the given expected calls.
    pub fn new(expected: Vec<ExpectedCall>) -> Self {
        Self {
            expected: RefCell::new(expected.into()),
        }
    }

    /// Asserts that all expected command invocations have been consumed.
    ///
    /// # Panics
    ///
    /// Panics if there are remaining expected calls that were not invoked.
    pub fn assert_finished(&self) {
        assert!(
            self.expected.borrow().is_empty(),
            "expected no further command invocations"
        );
    }
}

impl CommandExecutor for StubExecutor {
    fn run(&self, cmd: &str, args: &[&str]) -> std::io::Result<Output> {
        let mut expected = self.expected.borrow_mut();
        let call = expected.pop_front().expect("unexpected command invocation");

        assert_eq!(call.cmd, cmd);
        assert_eq!(call.args, args);

        call.result
    }
}

/// An executor that reports a fixed set of programs as installed.
///
/// Every other program fails to spawn with `NotFound`.
#[derive(Debug, Default)]
pub struct InstalledTools {
    installed: Vec<String>,
    calls: Cell<usize>,
}

impl InstalledTools {
    /// Creates an executor where only `names` are installed.
    pub fn new(names: &[&str]) -> Self {
        Self {
            installed: names.iter().map(|&name| name.to_owned()).collect(),
            calls: Cell::new(0),
        }
    }

    /// Returns the number of commands run.
    pub fn calls(&self) -> usize {
        self.calls.get()
    }
}

impl CommandExecutor for InstalledTools {
    fn run(&self, cmd: &str, _args: &[&str]) -> std::io::Result<Output> {
        self.calls.set(self.calls.get() + 1);
        if self.installed.iter().any(|name| name == cmd) {
            Ok(success_output())
        } else {
            Err(std::io::Error::from(std::io::ErrorKind::NotFound))
        }
    }
}

/// Gzip-compress `data` in memory.
pub fn gzip_bytes(data: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).expect("gzip write");
    encoder.finish().expect("gzip finish")
}

/// Lowercase hex SHA-256 of `data`.
pub fn sha256_hex(data: &[u8]) -> String {
    format!("{:x}", Sha256::digest(data))
}

/// A canned response served by [`CannedDownloader`].
#[derive(Debug, Clone)]
pub enum CannedResponse {
    /// Serve these bytes with a success status.
    Body(Vec<u8>),
    /// Answer with this HTTP status.
    Status(u16),
    /// Fail before any status is received.
    Transport(String),
}

/// An in-memory downloader that serves canned responses by URL.
///
/// Unknown URLs answer 404. Every request is recorded, so tests can assert
/// how many and which downloads were attempted.
#[derive(Debug, Default)]
pub struct CannedDownloader {
    responses: HashMap<String, CannedResponse>,
    requests: RefCell<Vec<String>>,
}

impl CannedDownloader {
    /// Creates a downloader with no responses.
    pub fn new() -> Self {
        Self::default()
    }

    /// Serves `body` for `url`.
    #[must_use]
    pub fn with_body(mut self, url: &str, body: impl Into<Vec<u8>>) -> Self {
        self.responses
            .insert(url.to_owned(), CannedResponse::Body(body.into()));
        self
    }

    /// Answers `url` with `response`.
    #[must_use]
    pub fn with_response(mut self, url: &str, response: CannedResponse) -> Self {
        self.responses.insert(url.to_owned(), response);
        self
    }

    /// Returns the number of download requests made.
    pub fn request_count(&self) -> usize {
        self.requests.borrow().len()
    }

    /// Returns the requested URLs in order.
    pub fn requests(&self) -> Vec<String> {
        self.requests.borrow().clone()
    }
}

impl ArtefactDownloader for CannedDownloader {
    fn download(&self, url: &str, dest: &Path) -> Result<u64, DownloadError> {
        self.requests.borrow_mut().push(url.to_owned());
        match self.responses.get(url) {
            Some(CannedResponse::Body(body)) => {
                std::fs::write(dest, body)?;
                Ok(body.len() as u64)
            }
            Some(CannedResponse::Status(status)) => Err(DownloadError::HttpStatus {
                url: url.to_owned(),
                status: *status,
            }),
            Some(CannedResponse::Transport(reason)) => Err(DownloadError::Transport {
                url: url.to_owned(),
                reason: reason.clone(),
            }),
            None => Err(DownloadError::HttpStatus {
                url: url.to_owned(),
                status: 404,
            }),
        }
    }
}

/// Prefix of a fake key file understood by [`DigestVerifier`].
const FAKE_KEY_PREFIX: &str = "fake-signing-key ";

/// Key file content for `key_id`.
pub fn fake_key(key_id: &str) -> Vec<u8> {
    format!("{FAKE_KEY_PREFIX}{key_id}\n").into_bytes()
}

/// Key file content that parses but yields no usable key.
pub fn fake_empty_key() -> Vec<u8> {
    FAKE_KEY_PREFIX.trim_end().as_bytes().to_vec()
}

/// Signature file content binding `key_id` to the SHA-256 of `data`.
pub fn fake_signature(key_id: &str, data: &[u8]) -> Vec<u8> {
    format!("{key_id} {}\n", sha256_hex(data)).into_bytes()
}

/// A deterministic stand-in for an OpenPGP verifier.
///
/// Importing a [`fake_key`] records its key id as a file in the keyring.
/// A [`fake_signature`] verifies only if its key id is in the keyring and its
/// digest matches the data exactly.
#[derive(Debug, Default)]
pub struct DigestVerifier {
    imports: Cell<usize>,
    verifications: Cell<usize>,
}

impl DigestVerifier {
    /// Creates a verifier.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of key imports attempted.
    pub fn imports(&self) -> usize {
        self.imports.get()
    }

    /// Returns the number of signature checks attempted.
    pub fn verifications(&self) -> usize {
        self.verifications.get()
    }
}

impl SignatureVerifier for DigestVerifier {
    fn import_key(
        &self,
        keyring: &Keyring,
        key_path: &Utf8Path,
    ) -> Result<KeyImport, VerificationError> {
        self.imports.set(self.imports.get() + 1);
        let import_error = |reason: &str| VerificationError::KeyImport {
            key_file: key_path.to_string(),
            reason: reason.to_owned(),
        };
        let content = std::fs::read_to_string(key_path)
            .map_err(|_| import_error("key file is unreadable"))?;
        let content = content.trim();
        if content == FAKE_KEY_PREFIX.trim_end() {
            return Ok(KeyImport::default());
        }
        let key_id = content
            .strip_prefix(FAKE_KEY_PREFIX)
            .ok_or_else(|| import_error("no valid key data found"))?;
        std::fs::write(keyring.home().join(key_id), b"")
            .map_err(|_| import_error("keyring is not writable"))?;
        Ok(KeyImport {
            fingerprints: vec![key_id.to_owned()],
        })
    }

    fn verify_detached(
        &self,
        keyring: &Keyring,
        signature: &Utf8Path,
        data: &Utf8Path,
    ) -> Result<SignatureReport, VerificationError> {
        self.verifications.set(self.verifications.get() + 1);
        let invalid = VerificationError::SignatureInvalid;
        let content = std::fs::read_to_string(signature).unwrap_or_default();
        let Some((key_id, digest)) = content.trim().split_once(' ') else {
            return Err(invalid(SignatureFailure::Malformed {
                reason: "no signature data found".to_owned(),
            }));
        };
        if !keyring.home().join(key_id).exists() {
            return Err(invalid(SignatureFailure::UnknownSigner {
                key_id: key_id.to_owned(),
            }));
        }
        let bytes = std::fs::read(data).unwrap_or_default();
        if sha256_hex(&bytes) != digest {
            return Err(invalid(SignatureFailure::BadSignature {
                key_id: key_id.to_owned(),
            }));
        }
        Ok(SignatureReport {
            fingerprint: key_id.to_owned(),
            signer: Some("Test Signer <signer@example.test>".to_owned()),
            signed_at: Some("1757808000".to_owned()),
        })
    }
}
