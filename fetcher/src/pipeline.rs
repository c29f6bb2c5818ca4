//! Verified retrieval pipeline orchestration.
//!
//! A run moves strictly forward through
//! `START → PREFLIGHT_OK → FETCHED → KEY_IMPORTED → VERIFIED → UNPACKED`.
//! Each stage returns a `Result`, and the first failure ends the run with a
//! [`PipelineError`] naming that stage. Nothing is unpacked unless the
//! signature check succeeded.
//!
//! The external capabilities (tool probing, downloading, signature
//! verification, and decompression) are injected through [`Capabilities`]
//! so tests can substitute deterministic fakes.

use crate::artefact::digest::compute_sha256;
use crate::artefact::download::ArtefactDownloader;
use crate::artefact::naming::{ArtefactSet, RemoteArtefact};
use crate::artefact::unpack::ArtefactUnpacker;
use crate::command::CommandExecutor;
use crate::config::FetchConfig;
use crate::error::{PipelineError, PipelineWarning, Result};
use crate::output::{RunSummary, write_stderr_line};
use crate::preflight::check_tools;
use crate::signature::{Keyring, SignatureReport, SignatureVerifier};
use camino::{Utf8Path, Utf8PathBuf};
use std::fmt;
use std::io::Write;

/// A step of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    /// Resolving settings, before the pipeline starts.
    Configure,
    /// Checking that required tools are invocable.
    Preflight,
    /// Downloading the archive, signature, and key.
    Fetch,
    /// Importing the signing key into the keyring.
    KeyImport,
    /// Checking the detached signature.
    Verify,
    /// Decompressing the verified archive.
    Unpack,
}

impl PipelineStage {
    /// Return the state reached when this stage succeeds.
    ///
    /// # Examples
    ///
    /// ```
    /// use unifont_fetch::pipeline::PipelineStage;
    ///
    /// assert_eq!(PipelineStage::Verify.completed_state(), "VERIFIED");
    /// ```
    #[must_use]
    pub fn completed_state(self) -> &'static str {
        match self {
            Self::Configure => "START",
            Self::Preflight => "PREFLIGHT_OK",
            Self::Fetch => "FETCHED",
            Self::KeyImport => "KEY_IMPORTED",
            Self::Verify => "VERIFIED",
            Self::Unpack => "UNPACKED",
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Configure => "configuration",
            Self::Preflight => "preflight",
            Self::Fetch => "fetch",
            Self::KeyImport => "key import",
            Self::Verify => "verify",
            Self::Unpack => "unpack",
        };
        f.write_str(name)
    }
}

/// External capabilities used by a run.
pub struct Capabilities<'a> {
    /// Runs tool probes.
    pub executor: &'a dyn CommandExecutor,
    /// Fetches remote artefacts.
    pub downloader: &'a dyn ArtefactDownloader,
    /// Imports keys and checks signatures.
    pub verifier: &'a dyn SignatureVerifier,
    /// Decompresses the verified archive.
    pub unpacker: &'a dyn ArtefactUnpacker,
}

/// Inputs for a single run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Remote artefacts to fetch.
    pub artefacts: ArtefactSet,
    /// Directory receiving downloads and the unpacked table.
    pub output_dir: Utf8PathBuf,
    /// Tools that must be invocable before anything is fetched.
    pub required_tools: Vec<String>,
    /// Persistent keyring directory; a per-run keyring is used when unset.
    pub keyring_dir: Option<Utf8PathBuf>,
    /// Suppress progress output.
    pub quiet: bool,
}

impl PipelineConfig {
    /// Build the run inputs from resolved settings.
    #[must_use]
    pub fn from_fetch_config(config: &FetchConfig, quiet: bool) -> Self {
        Self {
            artefacts: config.artefacts.clone(),
            output_dir: config.output_dir.clone(),
            required_tools: config.required_tools(),
            keyring_dir: config.keyring_dir.clone(),
            quiet,
        }
    }

    /// Return the final path of the unpacked table.
    #[must_use]
    pub fn output_path(&self) -> Utf8PathBuf {
        self.output_dir.join(self.artefacts.output_filename())
    }

    fn local_path(&self, artefact: &RemoteArtefact) -> Utf8PathBuf {
        self.output_dir.join(artefact.filename())
    }
}

/// Downloaded, not yet trusted, files.
struct Fetched {
    archive: Utf8PathBuf,
    archive_bytes: u64,
    signature: Utf8PathBuf,
    key: Utf8PathBuf,
}

struct Run<'a, 'w> {
    config: &'a PipelineConfig,
    caps: &'a Capabilities<'a>,
    stderr: &'w mut dyn Write,
    warnings: Vec<PipelineWarning>,
}

/// Run the pipeline to completion or to its first failure.
///
/// Progress lines and warnings are written to `stderr`.
///
/// # Errors
///
/// Returns the [`PipelineError`] of the first stage that fails.
pub fn run_pipeline(
    config: &PipelineConfig,
    caps: &Capabilities<'_>,
    stderr: &mut dyn Write,
) -> Result<RunSummary> {
    let mut run = Run {
        config,
        caps,
        stderr,
        warnings: Vec::new(),
    };

    run.preflight()?;
    let fetched = run.fetch()?;
    let keyring = run.open_keyring()?;
    run.import_key(&keyring, &fetched.key)?;
    let report = run.verify(&keyring, &fetched)?;
    drop(keyring);
    let archive_sha256 = compute_sha256(fetched.archive.as_std_path())
        .map_err(PipelineError::io(PipelineStage::Verify, &fetched.archive))?;

    // Nothing fallible may follow the unpack: it replaces the output.
    let (output, output_bytes) = run.unpack(&fetched.archive)?;
    Ok(RunSummary {
        version: config.artefacts.version().to_string(),
        archive: fetched.archive,
        archive_bytes: fetched.archive_bytes,
        archive_sha256,
        output,
        output_bytes,
        signer_fingerprint: report.fingerprint,
        signer: report.signer,
        signed_at: report.signed_at,
        warnings: run.warnings.iter().map(ToString::to_string).collect(),
    })
}

impl Run<'_, '_> {
    fn progress(&mut self, message: impl fmt::Display) {
        if !self.config.quiet {
            write_stderr_line(self.stderr, message);
        }
    }

    fn reached(stage: PipelineStage) {
        log::info!("pipeline state: {}", stage.completed_state());
    }

    fn preflight(&mut self) -> Result<()> {
        check_tools(self.caps.executor, &self.config.required_tools)?;
        Self::reached(PipelineStage::Preflight);
        Ok(())
    }

    fn fetch(&mut self) -> Result<Fetched> {
        let output_dir = &self.config.output_dir;
        std::fs::create_dir_all(output_dir)
            .map_err(PipelineError::io(PipelineStage::Fetch, output_dir))?;

        let artefacts = &self.config.artefacts;
        let (archive, archive_bytes) = self.fetch_one(artefacts.archive())?;
        let (signature, _) = self.fetch_one(artefacts.signature())?;
        let (key, _) = self.fetch_one(artefacts.public_key())?;

        Self::reached(PipelineStage::Fetch);
        Ok(Fetched {
            archive,
            archive_bytes,
            signature,
            key,
        })
    }

    fn fetch_one(&mut self, artefact: &RemoteArtefact) -> Result<(Utf8PathBuf, u64)> {
        let dest = self.config.local_path(artefact);
        self.progress(format!("Fetching {}...", artefact.filename()));
        log::debug!("GET {} -> {dest}", artefact.url());

        let bytes = self
            .caps
            .downloader
            .download(artefact.url(), dest.as_std_path())
            .map_err(|source| PipelineError::Fetch {
                artefact: artefact.filename().to_owned(),
                source,
            })?;
        log::debug!("fetched {} ({bytes} bytes)", artefact.filename());
        Ok((dest, bytes))
    }

    fn open_keyring(&self) -> Result<Keyring> {
        match &self.config.keyring_dir {
            Some(dir) => Keyring::persistent(dir)
                .map_err(PipelineError::io(PipelineStage::KeyImport, dir)),
            None => Keyring::ephemeral().map_err(PipelineError::io(
                PipelineStage::KeyImport,
                temp_dir_display(),
            )),
        }
    }

    fn import_key(&mut self, keyring: &Keyring, key: &Utf8Path) -> Result<()> {
        let import = self.caps.verifier.import_key(keyring, key)?;
        if import.is_empty() {
            let warning = PipelineWarning::TrustEstablishment {
                key_file: key.to_string(),
            };
            log::debug!("trust establishment: {warning}");
            write_stderr_line(self.stderr, format!("warning: {warning}"));
            self.warnings.push(warning);
        } else {
            log::debug!(
                "imported {} key(s): {}",
                import.fingerprints.len(),
                import.fingerprints.join(", ")
            );
        }
        Self::reached(PipelineStage::KeyImport);
        Ok(())
    }

    fn verify(&mut self, keyring: &Keyring, fetched: &Fetched) -> Result<SignatureReport> {
        self.progress("Verifying signature...");
        let report = self
            .caps
            .verifier
            .verify_detached(keyring, &fetched.signature, &fetched.archive)?;
        let signer = report.signer.as_deref().unwrap_or("unknown signer");
        self.progress(format!(
            "Good signature from {signer} ({})",
            report.fingerprint
        ));
        Self::reached(PipelineStage::Verify);
        Ok(report)
    }

    fn unpack(&mut self, archive: &Utf8Path) -> Result<(Utf8PathBuf, u64)> {
        let output = self.config.output_path();
        self.progress(format!("Unpacking to {output}..."));
        let bytes = self
            .caps
            .unpacker
            .unpack(archive.as_std_path(), output.as_std_path())?;
        Self::reached(PipelineStage::Unpack);
        Ok((output, bytes))
    }
}

fn temp_dir_display() -> Utf8PathBuf {
    Utf8PathBuf::from_path_buf(std::env::temp_dir())
        .unwrap_or_else(|path| Utf8PathBuf::from(path.to_string_lossy().into_owned()))
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
