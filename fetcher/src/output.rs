//! Output formatting for the fetcher CLI.
//!
//! Progress and diagnostics go to stderr; the optional JSON summary is the
//! only thing written to stdout so it can be piped.

use crate::config::FetchConfig;
use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use std::io::Write;

/// Write one line to `stderr`, ignoring write failures.
pub fn write_stderr_line(stderr: &mut dyn Write, message: impl std::fmt::Display) {
    if writeln!(stderr, "{message}").is_err() {
        // Best-effort logging; ignore write failures.
    }
}

/// Outcome of a successful run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Release that was fetched.
    pub version: String,
    /// Verified compressed table on disk.
    pub archive: Utf8PathBuf,
    /// Size of the compressed table in bytes.
    pub archive_bytes: u64,
    /// Lowercase hex SHA-256 of the compressed table.
    pub archive_sha256: String,
    /// Unpacked glyph table.
    pub output: Utf8PathBuf,
    /// Size of the unpacked table in bytes.
    pub output_bytes: u64,
    /// Fingerprint of the key that made the signature.
    pub signer_fingerprint: String,
    /// Signer user id, when reported.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signer: Option<String>,
    /// Signature creation time, when reported.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signed_at: Option<String>,
    /// Non-fatal conditions reported during the run.
    pub warnings: Vec<String>,
}

impl RunSummary {
    /// Format the summary for display on stderr.
    ///
    /// # Example
    ///
    /// ```
    /// use unifont_fetch::output::RunSummary;
    ///
    /// let summary = RunSummary {
    ///     version: "17.0.03".to_owned(),
    ///     archive: "unifont_all-17.0.03.hex.gz".into(),
    ///     archive_bytes: 2_000_000,
    ///     archive_sha256: "ab".repeat(32),
    ///     output: "unifont_all-17.0.03.hex".into(),
    ///     output_bytes: 9_000_000,
    ///     signer_fingerprint: "95D2E9AB8740D8046387FD151A09227B1F435A33".to_owned(),
    ///     signer: None,
    ///     signed_at: None,
    ///     warnings: Vec::new(),
    /// };
    /// assert!(summary.display_text().contains("unifont_all-17.0.03.hex"));
    /// ```
    #[must_use]
    pub fn display_text(&self) -> String {
        let signer = self.signer.as_deref().map_or_else(
            || self.signer_fingerprint.clone(),
            |name| format!("{name} ({})", self.signer_fingerprint),
        );
        let mut lines = vec![
            format!(
                "Unpacked Unifont {} to {} ({} bytes)",
                self.version, self.output, self.output_bytes
            ),
            format!("  signed by: {signer}"),
        ];
        if let Some(signed_at) = &self.signed_at {
            lines.push(format!("  signed at: {signed_at}"));
        }
        lines.push(format!("  sha256:    {}", self.archive_sha256));
        lines.join("\n")
    }

    /// Serialize the summary as pretty-printed JSON.
    #[must_use]
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| "{}".to_owned())
    }
}

/// Configuration information for dry-run output.
#[derive(Debug)]
pub struct DryRunInfo<'a> {
    /// The resolved configuration.
    pub config: &'a FetchConfig,
    /// The configuration file in effect, if any.
    pub config_file: Option<&'a Utf8Path>,
}

impl DryRunInfo<'_> {
    /// Format the dry-run information for display.
    #[must_use]
    pub fn display_text(&self) -> String {
        let config = self.config;
        let artefacts = &config.artefacts;
        let keyring = config
            .keyring_dir
            .as_ref()
            .map_or_else(|| "per-run (discarded on exit)".to_owned(), ToString::to_string);
        let config_file = self
            .config_file
            .map_or_else(|| "none".to_owned(), ToString::to_string);

        let mut lines = vec![
            "Dry run - nothing will be fetched".to_owned(),
            String::new(),
            format!("Version: {}", artefacts.version()),
            format!("Configuration file: {config_file}"),
            format!("Output directory: {}", config.output_dir),
            format!(
                "Output file: {}",
                config.output_dir.join(artefacts.output_filename())
            ),
            format!("Timeout: {}s", config.timeout.as_secs()),
            format!("Verifier: {}", config.gpg_program),
            format!("Keyring: {keyring}"),
            String::new(),
            "Artefacts to fetch:".to_owned(),
        ];
        for artefact in artefacts.fetch_order() {
            lines.push(format!("  - {} <- {}", artefact.filename(), artefact.url()));
        }
        lines.join("\n")
    }
}
