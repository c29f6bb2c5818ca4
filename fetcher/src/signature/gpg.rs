//! [`SignatureVerifier`] backed by the GnuPG command-line tool.
//!
//! Every invocation is pinned to the keyring's directory with `--homedir`,
//! runs non-interactively, and reports through `--status-fd 1` so decisions
//! are taken from the status protocol rather than localised messages.

use super::status::{StatusLine, evaluate_verification, import_from_status, parse_status};
use super::{
    KeyImport, Keyring, SignatureFailure, SignatureReport, SignatureVerifier, VerificationError,
};
use crate::command::CommandExecutor;
use camino::Utf8Path;
use std::process::Output;

/// Default verification program.
pub const DEFAULT_GPG_PROGRAM: &str = "gpg";

/// Verifies signatures by running `gpg` through a [`CommandExecutor`].
///
/// # Examples
///
/// ```no_run
/// use camino::Utf8Path;
/// use unifont_fetch::command::SystemCommandExecutor;
/// use unifont_fetch::signature::{Keyring, SignatureVerifier};
/// use unifont_fetch::signature::gpg::GpgVerifier;
///
/// let executor = SystemCommandExecutor;
/// let verifier = GpgVerifier::new(&executor, "gpg");
/// let keyring = Keyring::ephemeral()?;
/// verifier.import_key(&keyring, Utf8Path::new("signer.asc"))?;
/// let report = verifier.verify_detached(
///     &keyring,
///     Utf8Path::new("unifont_all-17.0.03.hex.gz.sig"),
///     Utf8Path::new("unifont_all-17.0.03.hex.gz"),
/// )?;
/// println!("signed by {}", report.fingerprint);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct GpgVerifier<'a> {
    executor: &'a dyn CommandExecutor,
    program: String,
}

impl<'a> GpgVerifier<'a> {
    /// Create a verifier that runs `program` via `executor`.
    #[must_use]
    pub fn new(executor: &'a dyn CommandExecutor, program: impl Into<String>) -> Self {
        Self {
            executor,
            program: program.into(),
        }
    }

    fn run(&self, keyring: &Keyring, args: &[&str]) -> std::io::Result<Output> {
        let mut full_args = vec![
            "--homedir",
            keyring.home().as_str(),
            "--batch",
            "--no-tty",
            "--no-autostart",
            "--status-fd",
            "1",
        ];
        full_args.extend_from_slice(args);
        self.executor.run(&self.program, &full_args)
    }
}

impl std::fmt::Debug for GpgVerifier<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GpgVerifier")
            .field("program", &self.program)
            .finish_non_exhaustive()
    }
}

impl SignatureVerifier for GpgVerifier<'_> {
    fn import_key(
        &self,
        keyring: &Keyring,
        key_path: &Utf8Path,
    ) -> Result<KeyImport, VerificationError> {
        let key_import_error = |reason: String| VerificationError::KeyImport {
            key_file: key_path.to_string(),
            reason,
        };
        let output = self
            .run(keyring, &["--import", key_path.as_str()])
            .map_err(|e| key_import_error(format!("failed to run {}: {e}", self.program)))?;

        let lines = parse_status(&String::from_utf8_lossy(&output.stdout));
        let import = import_from_status(&lines);
        if !output.status.success() && import.is_empty() {
            let no_data = lines
                .iter()
                .any(|line| matches!(line, StatusLine::NoData { .. }));
            let reason = if no_data {
                "no valid OpenPGP data found".to_owned()
            } else {
                diagnostic(&output)
            };
            return Err(key_import_error(reason));
        }
        if !output.status.success() {
            log::debug!(
                "{} --import exited with {} but reported {} usable key(s)",
                self.program,
                output.status,
                import.fingerprints.len()
            );
        }
        Ok(import)
    }

    fn verify_detached(
        &self,
        keyring: &Keyring,
        signature: &Utf8Path,
        data: &Utf8Path,
    ) -> Result<SignatureReport, VerificationError> {
        let output = self
            .run(
                keyring,
                &[
                    "--trust-model",
                    "always",
                    "--verify",
                    signature.as_str(),
                    data.as_str(),
                ],
            )
            .map_err(|e| {
                VerificationError::SignatureInvalid(SignatureFailure::Unverified {
                    reason: format!("failed to run {}: {e}", self.program),
                })
            })?;

        let lines = parse_status(&String::from_utf8_lossy(&output.stdout));
        evaluate_verification(&lines, output.status.success()).map_err(|failure| {
            log::debug!("{} --verify stderr: {}", self.program, diagnostic(&output));
            VerificationError::SignatureInvalid(failure)
        })
    }
}

/// First stderr line that describes a failure.
///
/// GnuPG opens with notices about a freshly created home and closes with
/// import totals; neither names the cause.
fn diagnostic(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    stderr
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty() && !is_notice(line))
        .map_or_else(
            || format!("exited with {}", output.status),
            ToOwned::to_owned,
        )
}

fn is_notice(line: &str) -> bool {
    line.ends_with(" created") || line.starts_with("gpg: Total number processed")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{ExpectedCall, StubExecutor, exit_status};

    const FPR: &str = "95D2E9AB8740D8046387FD151A09227B1F435A33";

    fn output(code: i32, stdout: &str, stderr: &str) -> Output {
        Output {
            status: exit_status(code),
            stdout: stdout.as_bytes().to_vec(),
            stderr: stderr.as_bytes().to_vec(),
        }
    }

    fn gpg_call(keyring: &Keyring, tail: &[&str], result: Output) -> ExpectedCall {
        let mut args: Vec<String> = [
            "--homedir",
            keyring.home().as_str(),
            "--batch",
            "--no-tty",
            "--no-autostart",
            "--status-fd",
            "1",
        ]
        .into_iter()
        .map(str::to_owned)
        .collect();
        args.extend(tail.iter().map(|&arg| arg.to_owned()));
        ExpectedCall {
            cmd: "gpg",
            args,
            result: Ok(result),
        }
    }

    #[test]
    fn import_reports_fingerprints() {
        let keyring = Keyring::ephemeral().expect("keyring");
        let executor = StubExecutor::new(vec![gpg_call(
            &keyring,
            &["--import", "signer.asc"],
            output(0, &format!("[GNUPG:] IMPORT_OK 1 {FPR}\n"), ""),
        )]);

        let import = GpgVerifier::new(&executor, "gpg")
            .import_key(&keyring, Utf8Path::new("signer.asc"))
            .expect("import");

        assert_eq!(import.fingerprints, vec![FPR.to_owned()]);
        executor.assert_finished();
    }

    #[test]
    fn import_failure_without_keys_is_key_import_error() {
        let keyring = Keyring::ephemeral().expect("keyring");
        let executor = StubExecutor::new(vec![gpg_call(
            &keyring,
            &["--import", "signer.asc"],
            output(
                2,
                "[GNUPG:] NODATA 1\n[GNUPG:] IMPORT_RES 0 0 0 0 0 0 0 0 0 0 0 0 0 0 0\n",
                "gpg: no valid OpenPGP data found.\ngpg: Total number processed: 0\n",
            ),
        )]);

        let err = GpgVerifier::new(&executor, "gpg")
            .import_key(&keyring, Utf8Path::new("signer.asc"))
            .expect_err("import should fail");

        match err {
            VerificationError::KeyImport { key_file, reason } => {
                assert_eq!(key_file, "signer.asc");
                assert_eq!(reason, "no valid OpenPGP data found");
            }
            other => panic!("expected KeyImport, got {other:?}"),
        }
    }

    #[test]
    fn successful_import_with_no_keys_is_empty_not_error() {
        let keyring = Keyring::ephemeral().expect("keyring");
        let executor = StubExecutor::new(vec![gpg_call(
            &keyring,
            &["--import", "signer.asc"],
            output(0, "[GNUPG:] IMPORT_RES 0 0 0 0 0 0 0 0 0 0 0 0 0 0 0\n", ""),
        )]);

        let import = GpgVerifier::new(&executor, "gpg")
            .import_key(&keyring, Utf8Path::new("signer.asc"))
            .expect("import");

        assert!(import.is_empty());
    }

    #[test]
    fn spawn_failure_during_import_is_key_import_error() {
        let keyring = Keyring::ephemeral().expect("keyring");
        let mut call = gpg_call(&keyring, &["--import", "signer.asc"], output(0, "", ""));
        call.result = Err(std::io::Error::from(std::io::ErrorKind::NotFound));
        let executor = StubExecutor::new(vec![call]);

        let err = GpgVerifier::new(&executor, "gpg")
            .import_key(&keyring, Utf8Path::new("signer.asc"))
            .expect_err("spawn failure");

        assert!(matches!(err, VerificationError::KeyImport { .. }));
    }

    #[test]
    fn verify_good_signature() {
        let keyring = Keyring::ephemeral().expect("keyring");
        let status = format!(
            "[GNUPG:] GOODSIG 1A09227B1F435A33 Unifoundry\n[GNUPG:] VALIDSIG {FPR} 2025-09-14 1757808000\n"
        );
        let executor = StubExecutor::new(vec![gpg_call(
            &keyring,
            &["--trust-model", "always", "--verify", "a.gz.sig", "a.gz"],
            output(0, &status, "gpg: Good signature"),
        )]);

        let report = GpgVerifier::new(&executor, "gpg")
            .verify_detached(&keyring, Utf8Path::new("a.gz.sig"), Utf8Path::new("a.gz"))
            .expect("good signature");

        assert_eq!(report.fingerprint, FPR);
        assert_eq!(report.signer.as_deref(), Some("Unifoundry"));
        executor.assert_finished();
    }

    #[test]
    fn verify_unknown_signer_is_signature_invalid() {
        let keyring = Keyring::ephemeral().expect("keyring");
        let executor = StubExecutor::new(vec![gpg_call(
            &keyring,
            &["--trust-model", "always", "--verify", "a.gz.sig", "a.gz"],
            output(
                2,
                "[GNUPG:] ERRSIG 0123456789ABCDEF 1 10 00 1757808000 9 -\n[GNUPG:] NO_PUBKEY 0123456789ABCDEF\n",
                "gpg: Can't check signature: No public key",
            ),
        )]);

        let err = GpgVerifier::new(&executor, "gpg")
            .verify_detached(&keyring, Utf8Path::new("a.gz.sig"), Utf8Path::new("a.gz"))
            .expect_err("unknown signer");

        assert_eq!(
            err,
            VerificationError::SignatureInvalid(SignatureFailure::UnknownSigner {
                key_id: "0123456789ABCDEF".to_owned()
            })
        );
    }

    #[test]
    fn custom_program_is_invoked() {
        let keyring = Keyring::ephemeral().expect("keyring");
        let mut call = gpg_call(
            &keyring,
            &["--import", "k.asc"],
            output(0, &format!("[GNUPG:] IMPORT_OK 1 {FPR}\n"), ""),
        );
        call.cmd = "gpg2";
        let executor = StubExecutor::new(vec![call]);

        GpgVerifier::new(&executor, "gpg2")
            .import_key(&keyring, Utf8Path::new("k.asc"))
            .expect("import");
        executor.assert_finished();
    }

    #[test]
    fn import_failure_reports_cause_not_notices() {
        let keyring = Keyring::ephemeral().expect("keyring");
        let executor = StubExecutor::new(vec![gpg_call(
            &keyring,
            &["--import", "signer.asc"],
            output(
                2,
                "",
                concat!(
                    "gpg: keybox '/tmp/k/pubring.kbx' created\n",
                    "gpg: key 1A09227B1F435A33: public key cannot be imported\n",
                    "gpg: Total number processed: 1\n",
                ),
            ),
        )]);

        let err = GpgVerifier::new(&executor, "gpg")
            .import_key(&keyring, Utf8Path::new("signer.asc"))
            .expect_err("import should fail");

        assert_eq!(
            err,
            VerificationError::KeyImport {
                key_file: "signer.asc".to_owned(),
                reason: "gpg: key 1A09227B1F435A33: public key cannot be imported".to_owned(),
            }
        );
    }

    #[test]
    fn diagnostic_falls_back_to_exit_status() {
        let message = diagnostic(&output(2, "", "  \n"));
        assert!(message.starts_with("exited with"), "message: {message}");
    }
}
