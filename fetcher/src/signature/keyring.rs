//! Keyring scoping for signature verification.
//!
//! The default keyring lives in a private temporary directory that is
//! removed when the [`Keyring`] is dropped, so a run trusts only the key it
//! fetched and leaves nothing behind. A persistent keyring directory can be
//! requested explicitly; keys imported into it survive the run, including
//! runs that later fail.

use camino::{Utf8Path, Utf8PathBuf};
use std::io;
use tempfile::TempDir;

/// A directory holding the keys trusted for a verification.
#[derive(Debug)]
pub struct Keyring {
    home: Utf8PathBuf,
    scratch: Option<TempDir>,
}

impl Keyring {
    /// Create an empty keyring scoped to this value's lifetime.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the temporary directory cannot be created or
    /// its path is not valid UTF-8.
    ///
    /// # Examples
    ///
    /// ```
    /// use unifont_fetch::signature::Keyring;
    ///
    /// let keyring = Keyring::ephemeral()?;
    /// let home = keyring.home().to_owned();
    /// assert!(keyring.is_ephemeral());
    /// drop(keyring);
    /// assert!(!home.exists());
    /// # Ok::<(), std::io::Error>(())
    /// ```
    pub fn ephemeral() -> io::Result<Self> {
        let scratch = tempfile::Builder::new()
            .prefix("unifont-keyring-")
            .tempdir()?;
        let home = Utf8PathBuf::try_from(scratch.path().to_path_buf())
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;
        restrict_permissions(&home)?;
        Ok(Self {
            home,
            scratch: Some(scratch),
        })
    }

    /// Use `dir` as a keyring that outlives the run, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the directory cannot be created or secured.
    pub fn persistent(dir: &Utf8Path) -> io::Result<Self> {
        std::fs::create_dir_all(dir)?;
        restrict_permissions(dir)?;
        Ok(Self {
            home: dir.to_owned(),
            scratch: None,
        })
    }

    /// Return the keyring directory.
    #[must_use]
    pub fn home(&self) -> &Utf8Path {
        &self.home
    }

    /// Return whether the keyring is removed when dropped.
    #[must_use]
    pub fn is_ephemeral(&self) -> bool {
        self.scratch.is_some()
    }
}

/// GnuPG refuses to use a home directory readable by other users.
#[cfg(unix)]
fn restrict_permissions(dir: &Utf8Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    std::fs::set_permissions(dir, std::fs::Permissions::from_mode(0o700))
}

#[cfg(not(unix))]
fn restrict_permissions(_dir: &Utf8Path) -> io::Result<()> {
    Ok(())
}
