//! Version catalogs for the upstream source and the mirror destination.
//!
//! # Sub-modules
//!
//! - [`registry`] - npm packages, queried through `npm view`.
//! - [`release`] - GitHub releases, queried through the REST API.

pub mod registry;
pub mod release;

use crate::error::Result;
use log::debug;

pub use registry::RegistryCatalog;
pub use release::{ReleaseAsset, ReleaseCatalog, ReleaseDescriptor};

/// A catalog that can list the versions it holds.
pub trait VersionCatalog {
    /// Human-readable catalog name for messages (package or repository).
    fn name(&self) -> &str;

    /// Lists raw version strings in catalog order.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying command or request fails, or if
    /// its output cannot be parsed. There is no retry.
    fn list_versions(&self) -> Result<Vec<String>>;
}

/// An upstream catalog that can also locate a version's artefact.
pub trait SourceCatalog: VersionCatalog {
    /// Resolves the download URL of the archive for `raw_version`.
    ///
    /// # Errors
    ///
    /// Returns an error if the lookup fails or yields no URL.
    fn resolve_download(&self, raw_version: &str) -> Result<String>;
}

/// Lists the raw upstream versions, in catalog order.
///
/// # Errors
///
/// Propagates the catalog's listing error.
pub fn list_source_versions(source: &dyn SourceCatalog) -> Result<Vec<String>> {
    let versions = source.list_versions()?;
    debug!("{} lists {} upstream version(s)", source.name(), versions.len());
    Ok(versions)
}

/// Lists the versions already published at the mirror destination.
///
/// # Errors
///
/// Propagates the catalog's listing error.
pub fn list_published_versions(destination: &dyn VersionCatalog) -> Result<Vec<String>> {
    let versions = destination.list_versions()?;
    debug!(
        "{} already has {} published version(s)",
        destination.name(),
        versions.len()
    );
    Ok(versions)
}
