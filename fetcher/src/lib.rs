//! Verified retrieval of GNU Unifont glyph tables.
//!
//! This crate fetches a compressed glyph table, its detached OpenPGP
//! signature, and the signer's public key, verifies the signature against a
//! per-run keyring, and unpacks the table only once the signature is good.
//! It is used by the `unifont-fetch` CLI binary and can be driven
//! programmatically with injected capabilities for testing.
//!
//! # Modules
//!
//! - [`artefact`] - Release naming, download, digest, and unpacking
//! - [`cli`] - Command-line argument definitions
//! - [`command`] - External command execution abstraction
//! - [`config`] - Layered configuration (defaults, TOML file, CLI)
//! - [`error`] - Pipeline error taxonomy and warnings
//! - [`output`] - Progress, dry-run, and summary formatting
//! - [`pipeline`] - Preflight → fetch → verify → unpack orchestration
//! - [`preflight`] - External tool availability checks
//! - [`signature`] - Keyring scoping and detached signature verification

pub mod artefact;
pub mod cli;
pub mod command;
pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod preflight;
pub mod signature;

#[cfg(any(test, feature = "test-support"))]
pub mod test_utils;
