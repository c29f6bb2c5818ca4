//! Release artefact naming, retrieval, digest, and unpacking.
//!
//! # Sub-modules
//!
//! - [`error`] — Validation errors for versions and URLs.
//! - [`naming`] — Version newtype and remote artefact references.
//! - [`download`] — Artefact download trait and HTTP implementation.
//! - [`digest`] — SHA-256 digest of downloaded files.
//! - [`unpack`] — Gzip decompression with atomic replacement of the output.

pub mod digest;
pub mod download;
pub mod error;
pub mod naming;
pub mod unpack;
