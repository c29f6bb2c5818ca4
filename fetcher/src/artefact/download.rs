//! Artefact download logic for release retrieval.
//!
//! Provides a trait-based abstraction for fetching a URL to a local file,
//! enabling dependency injection for testing. Downloaded bytes are written
//! verbatim and are untrusted until the signature check passes.

use std::path::Path;
use std::time::Duration;

/// Default network timeout for a single download.
pub const DEFAULT_DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(30);

/// Trait for downloading remote resources to local files.
///
/// Abstractions allow tests to fake HTTP behaviour without network access.
///
/// # Examples
///
/// ```
/// use unifont_fetch::artefact::download::{DEFAULT_DOWNLOAD_TIMEOUT, HttpDownloader};
///
/// let downloader = HttpDownloader::new(DEFAULT_DOWNLOAD_TIMEOUT);
/// // Use downloader.download(url, dest) in production
/// # let _ = downloader;
/// ```
#[cfg_attr(test, mockall::automock)]
pub trait ArtefactDownloader {
    /// Download `url` into `dest`, replacing any existing file.
    ///
    /// Returns the number of bytes written.
    ///
    /// # Errors
    ///
    /// Returns an error on a non-success HTTP status, a transport failure,
    /// or a failure writing `dest`.
    fn download(&self, url: &str, dest: &Path) -> Result<u64, DownloadError>;
}

/// Errors arising from download operations.
#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    /// The server answered with a non-success status.
    #[error("{url} returned HTTP {status}")]
    HttpStatus {
        /// The URL that was requested.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// The request failed before a status was received.
    #[error("download failed for {url}: {reason}")]
    Transport {
        /// The URL that was requested.
        url: String,
        /// A human-readable description of the failure.
        reason: String,
    },

    /// I/O error writing the downloaded file.
    #[error("I/O error writing download: {0}")]
    Io(#[from] std::io::Error),
}

/// HTTP-based downloader using `ureq`.
#[derive(Debug, Clone)]
pub struct HttpDownloader {
    agent: ureq::Agent,
}

impl HttpDownloader {
    /// Create a downloader whose requests are bounded by `timeout`.
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .build();
        Self {
            agent: ureq::Agent::new_with_config(config),
        }
    }

    /// Loopback downloader that ignores proxy settings from the environment.
    #[cfg(test)]
    fn direct(timeout: Duration) -> Self {
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .proxy(None)
            .build();
        Self {
            agent: ureq::Agent::new_with_config(config),
        }
    }
}

impl ArtefactDownloader for HttpDownloader {
    fn download(&self, url: &str, dest: &Path) -> Result<u64, DownloadError> {
        log::debug!("GET {url} -> {}", dest.display());
        let response = self
            .agent
            .get(url)
            .call()
            .map_err(|e| map_ureq_error(url, &e))?;
        let mut file = std::fs::File::create(dest)?;
        let written = std::io::copy(&mut response.into_body().as_reader(), &mut file)
            .map_err(|e| map_body_error(url, e))?;
        file.sync_all()?;
        Ok(written)
    }
}

/// Map a ureq error to a [`DownloadError`].
fn map_ureq_error(url: &str, err: &ureq::Error) -> DownloadError {
    match err {
        ureq::Error::StatusCode(status) => DownloadError::HttpStatus {
            url: url.to_owned(),
            status: *status,
        },
        other => DownloadError::Transport {
            url: url.to_owned(),
            reason: other.to_string(),
        },
    }
}

/// Classify a failure while streaming the body.
///
/// Body reads surface transport failures as I/O errors; only errors from the
/// local file are reported as [`DownloadError::Io`] by the caller's `?`.
fn map_body_error(url: &str, err: std::io::Error) -> DownloadError {
    DownloadError::Transport {
        url: url.to_owned(),
        reason: err.to_string(),
    }
}
