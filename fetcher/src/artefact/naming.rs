//! Release naming policy for Unifont glyph table artefacts.
//!
//! A release version drives every derived name in a run:
//! `unifont_all-<version>.hex.gz` for the compressed table,
//! `unifont_all-<version>.hex.gz.sig` for its detached signature, and
//! `unifont_all-<version>.hex` for the unpacked output. The signing key keeps
//! the base name of its remote resource.

use super::error::{ArtefactError, Result};
use std::fmt;

/// The fixed stem of every glyph table filename.
pub const ARTEFACT_STEM: &str = "unifont_all";

/// The extension of the unpacked glyph table.
pub const ARTEFACT_EXTENSION: &str = "hex";

/// The suffix appended by compression.
pub const COMPRESSION_SUFFIX: &str = ".gz";

/// The suffix of the detached signature.
pub const SIGNATURE_SUFFIX: &str = ".sig";

/// The placeholder substituted with the release version in URL templates.
pub const VERSION_PLACEHOLDER: &str = "{version}";

/// A validated release version such as `17.0.03`.
///
/// The value is substituted verbatim into filenames and URLs, so it must be
/// non-empty and free of path separators, whitespace, and parent references.
///
/// # Examples
///
/// ```
/// use unifont_fetch::artefact::naming::ReleaseVersion;
///
/// let version: ReleaseVersion = "17.0.03".try_into().expect("valid version");
/// assert_eq!(version.as_str(), "17.0.03");
/// assert!(ReleaseVersion::try_from("../17").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReleaseVersion(String);

impl ReleaseVersion {
    /// Return the version as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<&str> for ReleaseVersion {
    type Error = ArtefactError;

    fn try_from(value: &str) -> Result<Self> {
        validate_version(value)?;
        Ok(Self(value.to_owned()))
    }
}

impl TryFrom<String> for ReleaseVersion {
    type Error = ArtefactError;

    fn try_from(value: String) -> Result<Self> {
        validate_version(&value)?;
        Ok(Self(value))
    }
}

impl fmt::Display for ReleaseVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn validate_version(value: &str) -> Result<()> {
    let reject = |reason: &str| ArtefactError::InvalidVersion {
        value: value.to_owned(),
        reason: reason.to_owned(),
    };
    if value.is_empty() {
        return Err(reject("version must not be empty"));
    }
    if value.contains("..") {
        return Err(reject("version must not contain \"..\""));
    }
    if let Some(bad) = value
        .chars()
        .find(|c| c.is_whitespace() || c.is_control() || matches!(c, '/' | '\\'))
    {
        return Err(reject(&format!("version must not contain {bad:?}")));
    }
    Ok(())
}

/// A remote resource and the local filename it is fetched to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteArtefact {
    url: String,
    filename: String,
}

impl RemoteArtefact {
    /// Build a reference whose local filename is the URL's last path segment.
    ///
    /// # Errors
    ///
    /// Returns [`ArtefactError::InvalidUrl`] when the URL has no usable final
    /// segment.
    ///
    /// # Examples
    ///
    /// ```
    /// use unifont_fetch::artefact::naming::RemoteArtefact;
    ///
    /// let key = RemoteArtefact::from_url("https://example.test/keys/signer.asc?raw=1")
    ///     .expect("valid URL");
    /// assert_eq!(key.filename(), "signer.asc");
    /// ```
    pub fn from_url(url: &str) -> Result<Self> {
        let filename = base_name(url)?;
        Ok(Self {
            url: url.to_owned(),
            filename,
        })
    }

    /// Return the remote URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Return the local filename.
    #[must_use]
    pub fn filename(&self) -> &str {
        &self.filename
    }
}

impl fmt::Display for RemoteArtefact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.filename, self.url)
    }
}

/// Extract the final path segment of `url`, ignoring any query or fragment.
fn base_name(url: &str) -> Result<String> {
    let invalid = |reason: &str| ArtefactError::InvalidUrl {
        url: url.to_owned(),
        reason: reason.to_owned(),
    };
    let Some((scheme, rest)) = url.split_once("://") else {
        return Err(invalid("missing scheme"));
    };
    if scheme.is_empty() {
        return Err(invalid("missing scheme"));
    }
    let without_suffix = rest.split(['?', '#']).next().unwrap_or_default();
    let Some((_host, path)) = without_suffix.split_once('/') else {
        return Err(invalid("URL has no path"));
    };
    let segment = path.rsplit('/').next().unwrap_or_default();
    if segment.is_empty() || segment == "." || segment == ".." {
        return Err(invalid("URL path does not end in a filename"));
    }
    Ok(segment.to_owned())
}

/// The three remote resources fetched for one release.
///
/// # Examples
///
/// ```
/// use unifont_fetch::artefact::naming::{ArtefactSet, ReleaseVersion};
///
/// let version = ReleaseVersion::try_from("17.0.03").expect("valid version");
/// let set = ArtefactSet::new(
///     &version,
///     "https://example.test/unifont-{version}/font-builds/",
///     "https://example.test/signer.asc",
/// )
/// .expect("valid URLs");
///
/// assert_eq!(set.archive().filename(), "unifont_all-17.0.03.hex.gz");
/// assert_eq!(
///     set.archive().url(),
///     "https://example.test/unifont-17.0.03/font-builds/unifont_all-17.0.03.hex.gz"
/// );
/// assert_eq!(set.signature().filename(), "unifont_all-17.0.03.hex.gz.sig");
/// assert_eq!(set.output_filename(), "unifont_all-17.0.03.hex");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtefactSet {
    version: ReleaseVersion,
    archive: RemoteArtefact,
    signature: RemoteArtefact,
    public_key: RemoteArtefact,
}

impl ArtefactSet {
    /// Derive the artefact references for `version`.
    ///
    /// `base_url` may contain the `{version}` placeholder; a trailing slash is
    /// ignored. The key URL is used as given.
    ///
    /// # Errors
    ///
    /// Returns [`ArtefactError::InvalidUrl`] when either URL cannot yield a
    /// local filename.
    pub fn new(version: &ReleaseVersion, base_url: &str, key_url: &str) -> Result<Self> {
        let base = base_url
            .replace(VERSION_PLACEHOLDER, version.as_str())
            .trim_end_matches('/')
            .to_owned();
        let archive_name = archive_filename(version);
        let archive = RemoteArtefact::from_url(&format!("{base}/{archive_name}"))?;
        let signature =
            RemoteArtefact::from_url(&format!("{base}/{archive_name}{SIGNATURE_SUFFIX}"))?;
        let public_key = RemoteArtefact::from_url(key_url)?;

        Ok(Self {
            version: version.clone(),
            archive,
            signature,
            public_key,
        })
    }

    /// Return the release version.
    #[must_use]
    pub fn version(&self) -> &ReleaseVersion {
        &self.version
    }

    /// Return the compressed glyph table reference.
    #[must_use]
    pub fn archive(&self) -> &RemoteArtefact {
        &self.archive
    }

    /// Return the detached signature reference.
    #[must_use]
    pub fn signature(&self) -> &RemoteArtefact {
        &self.signature
    }

    /// Return the signing key reference.
    #[must_use]
    pub fn public_key(&self) -> &RemoteArtefact {
        &self.public_key
    }

    /// Return the references in fetch order: archive, signature, key.
    #[must_use]
    pub fn fetch_order(&self) -> [&RemoteArtefact; 3] {
        [&self.archive, &self.signature, &self.public_key]
    }

    /// Return the unpacked output filename (archive name minus `.gz`).
    #[must_use]
    pub fn output_filename(&self) -> String {
        let name = self.archive.filename();
        name.strip_suffix(COMPRESSION_SUFFIX)
            .unwrap_or(name)
            .to_owned()
    }
}

fn archive_filename(version: &ReleaseVersion) -> String {
    format!("{ARTEFACT_STEM}-{version}.{ARTEFACT_EXTENSION}{COMPRESSION_SUFFIX}")
}
