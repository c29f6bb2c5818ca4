//! Layered run configuration.
//!
//! Settings are resolved from three layers, highest precedence first:
//! command-line flags and their environment variables, an optional TOML
//! file, and built-in defaults. The file is either named explicitly or
//! discovered as `unifont-fetch.toml` in the platform configuration
//! directory.

use crate::artefact::error::ArtefactError;
use crate::artefact::naming::{ArtefactSet, ReleaseVersion};
use crate::signature::gpg::DEFAULT_GPG_PROGRAM;
use camino::{Utf8Path, Utf8PathBuf};
use directories_next::ProjectDirs;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

/// Release fetched when no version is configured.
pub const DEFAULT_VERSION: &str = "17.0.03";

/// Distribution directory template; `{version}` is substituted.
pub const DEFAULT_BASE_URL: &str =
    "https://unifoundry.com/pub/unifont/unifont-{version}/font-builds";

/// Location of the release signing key.
pub const DEFAULT_KEY_URL: &str = "https://unifoundry.com/1A09227B1F435A33.asc";

/// Network timeout applied to each download.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// File name looked up in the platform configuration directory.
pub const CONFIG_FILE_NAME: &str = "unifont-fetch.toml";

/// Errors raised while resolving configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A version or URL is unusable.
    #[error(transparent)]
    Artefact(#[from] ArtefactError),

    /// The timeout is zero.
    #[error("timeout must be at least one second")]
    ZeroTimeout,

    /// The configuration file could not be read.
    #[error("cannot read configuration file {path}: {reason}")]
    Read {
        /// The configuration file.
        path: Utf8PathBuf,
        /// The underlying I/O error.
        reason: String,
    },

    /// The configuration file is not valid TOML or has unknown keys.
    #[error("invalid configuration file {path}: {reason}")]
    Parse {
        /// The configuration file.
        path: Utf8PathBuf,
        /// The parser diagnostic.
        reason: String,
    },
}

/// One layer of optional settings.
///
/// This is both the TOML file schema and the shape of command-line
/// overrides; unset fields fall through to the layer below.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigLayer {
    /// Release to fetch.
    pub version: Option<String>,
    /// Distribution directory URL, optionally containing `{version}`.
    pub base_url: Option<String>,
    /// Signing key URL.
    pub key_url: Option<String>,
    /// Directory receiving downloads and the unpacked table.
    pub output_dir: Option<Utf8PathBuf>,
    /// Per-download timeout in seconds.
    pub timeout_secs: Option<u64>,
    /// Signature verification program.
    pub gpg: Option<String>,
    /// Persistent keyring directory; a per-run keyring is used when unset.
    pub keyring_dir: Option<Utf8PathBuf>,
}

impl ConfigLayer {
    /// Fill every unset field of `self` from `lower`.
    #[must_use]
    pub fn over(self, lower: Self) -> Self {
        Self {
            version: self.version.or(lower.version),
            base_url: self.base_url.or(lower.base_url),
            key_url: self.key_url.or(lower.key_url),
            output_dir: self.output_dir.or(lower.output_dir),
            timeout_secs: self.timeout_secs.or(lower.timeout_secs),
            gpg: self.gpg.or(lower.gpg),
            keyring_dir: self.keyring_dir.or(lower.keyring_dir),
        }
    }
}

/// Fully resolved settings for a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchConfig {
    /// Remote artefacts derived from the version and URLs.
    pub artefacts: ArtefactSet,
    /// Directory receiving downloads and the unpacked table.
    pub output_dir: Utf8PathBuf,
    /// Per-download timeout.
    pub timeout: Duration,
    /// Signature verification program.
    pub gpg_program: String,
    /// Persistent keyring directory, if requested.
    pub keyring_dir: Option<Utf8PathBuf>,
}

impl FetchConfig {
    /// Resolve `layer` against the built-in defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for an invalid version or URL, or a zero
    /// timeout.
    ///
    /// # Examples
    ///
    /// ```
    /// use unifont_fetch::config::{ConfigLayer, FetchConfig};
    ///
    /// let config = FetchConfig::resolve(ConfigLayer {
    ///     version: Some("16.0.04".to_owned()),
    ///     ..ConfigLayer::default()
    /// })?;
    /// assert_eq!(config.artefacts.archive().filename(), "unifont_all-16.0.04.hex.gz");
    /// assert_eq!(config.gpg_program, "gpg");
    /// # Ok::<(), unifont_fetch::config::ConfigError>(())
    /// ```
    pub fn resolve(layer: ConfigLayer) -> Result<Self, ConfigError> {
        let version = ReleaseVersion::try_from(
            layer.version.unwrap_or_else(|| DEFAULT_VERSION.to_owned()),
        )?;
        let base_url = layer
            .base_url
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_owned());
        let key_url = layer.key_url.unwrap_or_else(|| DEFAULT_KEY_URL.to_owned());
        let artefacts = ArtefactSet::new(&version, &base_url, &key_url)?;

        let timeout_secs = layer.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS);
        if timeout_secs == 0 {
            return Err(ConfigError::ZeroTimeout);
        }

        Ok(Self {
            artefacts,
            output_dir: layer.output_dir.unwrap_or_else(|| Utf8PathBuf::from(".")),
            timeout: Duration::from_secs(timeout_secs),
            gpg_program: layer
                .gpg
                .unwrap_or_else(|| DEFAULT_GPG_PROGRAM.to_owned()),
            keyring_dir: layer.keyring_dir,
        })
    }

    /// Return the external tools that must be invocable before fetching.
    #[must_use]
    pub fn required_tools(&self) -> Vec<String> {
        vec![self.gpg_program.clone()]
    }
}

/// Parse the TOML configuration file at `path`.
///
/// # Errors
///
/// Returns [`ConfigError::Read`] if the file cannot be read and
/// [`ConfigError::Parse`] if it is malformed or has unknown keys.
pub fn load_config_file(path: &Utf8Path) -> Result<ConfigLayer, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|err| ConfigError::Read {
        path: path.to_owned(),
        reason: err.to_string(),
    })?;
    toml::from_str(&text).map_err(|err| ConfigError::Parse {
        path: path.to_owned(),
        reason: err.message().to_owned(),
    })
}

/// Return the platform location of the configuration file, if known.
#[must_use]
pub fn default_config_path() -> Option<Utf8PathBuf> {
    let dirs = ProjectDirs::from("", "", "unifont-fetch")?;
    let path = dirs.config_dir().join(CONFIG_FILE_NAME);
    Utf8PathBuf::from_path_buf(path).ok()
}

/// Load the configuration file layer.
///
/// An explicit path must exist. Otherwise the `discovered` path is used when
/// a file exists there, and an empty layer is returned when it does not.
///
/// # Errors
///
/// Returns [`ConfigError`] if the chosen file cannot be read or parsed.
pub fn file_layer(
    explicit: Option<&Utf8Path>,
    discovered: Option<Utf8PathBuf>,
) -> Result<ConfigLayer, ConfigError> {
    if let Some(path) = explicit {
        return load_config_file(path);
    }
    match discovered {
        Some(path) if path.is_file() => {
            log::debug!("using configuration file {path}");
            load_config_file(&path)
        }
        _ => Ok(ConfigLayer::default()),
    }
}
