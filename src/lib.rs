//! Release mirror library.
//!
//! This crate detects upstream releases that are missing from a mirror
//! package, repackages their archives under the mirror's own manifest, and
//! publishes them to npm. It is used by the `release-mirror` CLI binary and
//! can be consumed programmatically for testing or custom sync workflows.
//!
//! # Modules
//!
//! - [`catalog`] - Upstream and destination version catalogs
//! - [`cli`] - Command-line argument definitions
//! - [`command`] - External command execution
//! - [`config`] - Mirror configuration loading
//! - [`error`] - Error types
//! - [`extraction`] - Archive extraction with path-traversal checks
//! - [`fetch`] - HTTP downloads of catalogs and release archives
//! - [`manifest`] - Manifest template rewriting
//! - [`output`] - Progress and plan formatting
//! - [`pipeline`] - Sync planning and the per-version publish pipeline
//! - [`publish`] - `npm publish` invocation
//! - [`version`] - Calendar versions and the upstream/mirror diff

pub mod catalog;
pub mod cli;
pub mod command;
pub mod config;
pub mod error;
pub mod extraction;
pub mod fetch;
pub mod manifest;
pub mod output;
pub mod pipeline;
pub mod publish;
pub mod version;

#[cfg(any(test, feature = "test-support"))]
pub mod test_utils;
