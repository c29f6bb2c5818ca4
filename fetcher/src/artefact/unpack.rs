//! Gzip decompression of verified glyph tables.
//!
//! The decompressed stream is written to a temporary file beside the final
//! output and renamed into place only once the whole stream decoded, so a
//! failure never leaves a truncated file at the output path and never
//! disturbs a previous output.
//! The output takes the archive's permission bits, as `gunzip` does.

use flate2::read::MultiGzDecoder;
use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// The two magic bytes that open every gzip member.
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Trait for unpacking verified artefacts, enabling test mocking.
///
/// # Examples
///
/// ```
/// use unifont_fetch::artefact::unpack::GzipUnpacker;
///
/// let unpacker = GzipUnpacker;
/// // Use unpacker.unpack(archive_path, output_path) in production
/// # let _ = unpacker;
/// ```
#[cfg_attr(test, mockall::automock)]
pub trait ArtefactUnpacker {
    /// Decompress `archive_path` into `output_path`.
    ///
    /// Returns the number of decompressed bytes written.
    ///
    /// # Errors
    ///
    /// Returns [`UnpackError::NotCompressed`] when the input lacks a gzip
    /// header, [`UnpackError::Corrupt`] when the stream fails to decode, and
    /// [`UnpackError::Io`] or [`UnpackError::Persist`] on local I/O failures.
    fn unpack(&self, archive_path: &Path, output_path: &Path) -> Result<u64, UnpackError>;
}

/// Errors arising from decompression.
#[derive(Debug, thiserror::Error)]
pub enum UnpackError {
    /// The input does not start with a gzip header.
    #[error("{path} is not gzip-compressed")]
    NotCompressed {
        /// The rejected input.
        path: PathBuf,
    },

    /// The gzip stream is truncated or corrupt.
    #[error("corrupt gzip stream in {path}: {source}")]
    Corrupt {
        /// The rejected input.
        path: PathBuf,
        /// The decoder error.
        #[source]
        source: std::io::Error,
    },

    /// The decompressed file could not be moved into place.
    #[error("failed to replace {path}: {source}")]
    Persist {
        /// The final output path.
        path: PathBuf,
        /// The underlying rename error.
        #[source]
        source: std::io::Error,
    },

    /// Other I/O failure reading the input or writing the temporary output.
    #[error("unpack I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Default unpacker using the `flate2` crate.
///
/// Accepts multi-member gzip streams, matching `gunzip`.
#[derive(Debug, Clone, Copy, Default)]
pub struct GzipUnpacker;

impl ArtefactUnpacker for GzipUnpacker {
    fn unpack(&self, archive_path: &Path, output_path: &Path) -> Result<u64, UnpackError> {
        let archive = File::open(archive_path)?;
        let permissions = archive.metadata()?.permissions();
        let mut input = BufReader::new(archive);
        if !has_gzip_magic(&mut input)? {
            return Err(UnpackError::NotCompressed {
                path: archive_path.to_path_buf(),
            });
        }

        let parent = output_dir(output_path);
        let mut staged = NamedTempFile::new_in(parent)?;
        let mut decoder = MultiGzDecoder::new(input);
        let written =
            std::io::copy(&mut decoder, staged.as_file_mut()).map_err(|source| {
                UnpackError::Corrupt {
                    path: archive_path.to_path_buf(),
                    source,
                }
            })?;
        staged.as_file_mut().flush()?;
        // Temporary files are owner-only; publish with the archive's mode.
        staged.as_file().set_permissions(permissions)?;
        staged.as_file().sync_all()?;

        staged
            .persist(output_path)
            .map_err(|err| UnpackError::Persist {
                path: output_path.to_path_buf(),
                source: err.error,
            })?;
        log::debug!(
            "unpacked {} -> {} ({written} bytes)",
            archive_path.display(),
            output_path.display()
        );
        Ok(written)
    }
}

/// Peek at the buffered input without consuming it.
fn has_gzip_magic(input: &mut BufReader<File>) -> std::io::Result<bool> {
    let buffered = input.fill_buf()?;
    Ok(buffered.starts_with(&GZIP_MAGIC))
}

fn output_dir(output_path: &Path) -> &Path {
    match output_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}
