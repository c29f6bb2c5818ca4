//! CLI argument definitions for the Unifont fetcher.
//!
//! This module defines the command-line interface using clap. It is separated
//! from the main entrypoint to keep the binary small and focused on
//! orchestration.

use crate::config::ConfigLayer;
use camino::Utf8PathBuf;
use clap::Parser;

/// Fetch, verify, and unpack a signed GNU Unifont glyph table.
#[derive(Parser, Debug, Clone)]
#[command(name = "unifont-fetch")]
#[command(about, disable_version_flag = true)]
#[command(long_about = concat!(
    "Fetch, verify, and unpack a signed GNU Unifont glyph table.\n\n",
    "Downloads unifont_all-<VERSION>.hex.gz, its detached signature, and the ",
    "release signing key, imports the key into a keyring that exists only for ",
    "this run, and checks the signature. The table is decompressed to ",
    "unifont_all-<VERSION>.hex only when the signature is good.\n\n",
    "Settings are taken from flags and environment variables first, then from ",
    "a TOML configuration file, then from built-in defaults.",
))]
#[command(after_help = concat!(
    "EXAMPLES:\n",
    "  Fetch the default release into the current directory:\n",
    "    $ unifont-fetch\n\n",
    "  Fetch a specific release into a build directory:\n",
    "    $ unifont-fetch --version 16.0.04 --output-dir build/fonts\n\n",
    "  Preview the resolved URLs without fetching:\n",
    "    $ unifont-fetch --dry-run\n\n",
    "  Emit a machine-readable summary:\n",
    "    $ unifont-fetch --json",
))]
pub struct Cli {
    /// Release to fetch [default: 17.0.03].
    #[arg(long = "version", value_name = "VERSION", env = "UNIFONT_VERSION")]
    pub release: Option<String>,

    /// Distribution directory URL; `{version}` is substituted.
    #[arg(long, value_name = "URL", env = "UNIFONT_BASE_URL")]
    pub base_url: Option<String>,

    /// Signing key URL.
    #[arg(long, value_name = "URL", env = "UNIFONT_KEY_URL")]
    pub key_url: Option<String>,

    /// Directory for downloads and the unpacked table [default: .].
    #[arg(short, long, value_name = "DIR")]
    pub output_dir: Option<Utf8PathBuf>,

    /// Per-download network timeout in seconds [default: 30].
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Signature verification program [default: gpg].
    #[arg(long, value_name = "PROGRAM", env = "UNIFONT_GPG")]
    pub gpg: Option<String>,

    /// Keep imported keys in DIR instead of a per-run keyring.
    #[arg(long, value_name = "DIR")]
    pub keyring_dir: Option<Utf8PathBuf>,

    /// Configuration file [default: platform config dir].
    #[arg(short, long, value_name = "FILE", env = "UNIFONT_FETCH_CONFIG")]
    pub config: Option<Utf8PathBuf>,

    /// Show the resolved plan and exit without fetching.
    #[arg(long)]
    pub dry_run: bool,

    /// Print the run summary as JSON on stdout.
    #[arg(long)]
    pub json: bool,

    /// Increase log verbosity (repeatable: -v, -vv).
    #[arg(
        short,
        long = "verbose",
        action = clap::ArgAction::Count,
        conflicts_with = "quiet"
    )]
    pub verbosity: u8,

    /// Suppress progress output (errors still shown).
    #[arg(short, long, conflicts_with = "verbosity")]
    pub quiet: bool,
}

impl Cli {
    /// Return the settings given on the command line or via environment.
    ///
    /// # Examples
    ///
    /// ```
    /// use clap::Parser;
    /// use unifont_fetch::cli::Cli;
    ///
    /// let cli = Cli::parse_from(["unifont-fetch", "--version", "16.0.04", "--timeout", "10"]);
    /// let layer = cli.overrides();
    /// assert_eq!(layer.version.as_deref(), Some("16.0.04"));
    /// assert_eq!(layer.timeout_secs, Some(10));
    /// ```
    #[must_use]
    pub fn overrides(&self) -> ConfigLayer {
        ConfigLayer {
            version: self.release.clone(),
            base_url: self.base_url.clone(),
            key_url: self.key_url.clone(),
            output_dir: self.output_dir.clone(),
            timeout_secs: self.timeout,
            gpg: self.gpg.clone(),
            keyring_dir: self.keyring_dir.clone(),
        }
    }

    /// Return the default log filter for the requested verbosity.
    #[must_use]
    pub fn log_filter(&self) -> &'static str {
        match (self.quiet, self.verbosity) {
            (true, _) => "error",
            (false, 0) => "warn",
            (false, 1) => "info",
            (false, _) => "debug",
        }
    }
}

impl Default for Cli {
    /// Creates a `Cli` with every setting unset and all flags disabled.
    fn default() -> Self {
        Self {
            release: None,
            base_url: None,
            key_url: None,
            output_dir: None,
            timeout: None,
            gpg: None,
            keyring_dir: None,
            config: None,
            dry_run: false,
            json: false,
            verbosity: 0,
            quiet: false,
        }
    }
}

#[cfg(test)]
#[path = "cli_tests.rs"]
mod tests;
