//! Mirror sync orchestration.
//!
//! [`plan`] lists both catalogs and diffs them; [`run_sync`] then takes each
//! pending version through download, extraction, manifest rewrite, and
//! publish. Versions are processed one at a time in upstream order, each in
//! its own temporary directories, and the first failure ends the run.

use crate::catalog::{SourceCatalog, VersionCatalog, list_published_versions, list_source_versions};
use crate::error::{MirrorError, Result};
use crate::extraction::{ArchiveExtractor, ArchiveKind};
use crate::fetch::ArtefactDownloader;
use crate::manifest::ManifestTemplate;
use crate::output::{versions_line, write_stderr_line};
use crate::publish::Publisher;
use crate::version::{CalendarVersion, SourceVersion, index_source_versions, versions_to_publish};
use camino::{Utf8Path, Utf8PathBuf};
use log::debug;
use std::io::Write;
use std::path::Path;

/// File name used when a download URL has no usable final path segment.
const FALLBACK_ARCHIVE_NAME: &str = "artefact.tgz";

/// Upstream versions missing from the mirror, in publish order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishPlan {
    /// Upstream catalog name.
    pub source: String,
    /// Destination catalog name.
    pub destination: String,
    /// Versions to publish.
    pub versions: Vec<SourceVersion>,
}

impl PublishPlan {
    /// Returns true when the mirror is already up to date.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }

    /// The mirror versions that would be published.
    #[must_use]
    pub fn keys(&self) -> Vec<&str> {
        self.versions.iter().map(|version| version.key.as_str()).collect()
    }
}

/// Collaborators and settings for a sync run.
pub struct SyncContext<'a> {
    /// Upstream catalog, used to resolve download URLs.
    pub source: &'a dyn SourceCatalog,
    /// Fetches release archives.
    pub downloader: &'a dyn ArtefactDownloader,
    /// Unpacks release archives.
    pub extractor: &'a dyn ArchiveExtractor,
    /// Publishes prepared package directories.
    pub publisher: &'a Publisher<'a>,
    /// Manifest written into every package.
    pub template: &'a ManifestTemplate,
    /// Package directory inside the extracted archive; empty for the root.
    pub package_dir: &'a str,
    /// Suppress progress output.
    pub quiet: bool,
}

/// Outcome of a completed sync run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Versions published, in order.
    pub published: Vec<CalendarVersion>,
}

/// Lists both catalogs and computes the versions to publish.
///
/// # Errors
///
/// Returns an error if either catalog cannot be listed.
pub fn plan(source: &dyn SourceCatalog, destination: &dyn VersionCatalog) -> Result<PublishPlan> {
    let upstream = index_source_versions(list_source_versions(source)?);
    let published = list_published_versions(destination)?;
    Ok(PublishPlan {
        source: source.name().to_owned(),
        destination: destination.name().to_owned(),
        versions: versions_to_publish(&upstream, &published),
    })
}

/// Publishes every version in `plan`, stopping at the first failure.
///
/// Prints progress to stderr if not in quiet mode.
///
/// A non-zero exit from `npm publish` stops the run like any other error
/// instead of moving on to the next version, so the mirror never gains a
/// later date while an earlier one is missing. Rerunning resumes from the
/// failed version.
///
/// # Errors
///
/// Returns the first error raised while resolving, downloading, extracting,
/// rewriting, or publishing a version. Versions after it are not attempted.
pub fn run_sync(
    plan: &PublishPlan,
    context: &SyncContext<'_>,
    stderr: &mut dyn Write,
) -> Result<SyncReport> {
    if !context.quiet {
        write_stderr_line(stderr, versions_line(&plan.keys()));
    }

    let mut report = SyncReport::default();
    for version in &plan.versions {
        if !context.quiet {
            write_stderr_line(stderr, format!("Publishing {}", version.key));
        }
        publish_version(version, context, stderr)?;
        report.published.push(version.key.clone());
    }
    Ok(report)
}

/// Takes one version from upstream URL to published package.
fn publish_version(
    version: &SourceVersion,
    context: &SyncContext<'_>,
    stderr: &mut dyn Write,
) -> Result<()> {
    let url = context.source.resolve_download(&version.raw)?;
    if !context.quiet {
        write_stderr_line(stderr, format!("Downloading {}: {url}", version.raw));
    }

    let download_dir = tempfile::tempdir()?;
    let archive_name = archive_file_name(&url);
    let archive_path = download_dir.path().join(&archive_name);
    context.downloader.download_to_file(&url, &archive_path)?;

    let work_dir = tempfile::tempdir()?;
    let entries = context.extractor.extract(
        &archive_path,
        ArchiveKind::from_name(&archive_name),
        work_dir.path(),
    )?;
    debug!("extracted {} entries from {archive_name}", entries.len());

    let root = utf8_path(work_dir.path())?;
    let package_dir = locate_package_dir(&root, context.package_dir)?;
    context.template.write_into(&package_dir, version.key.as_str())?;
    context.publisher.publish(&package_dir, version.key.as_str())
}

/// Derives the local archive file name from the last URL path segment.
fn archive_file_name(url: &str) -> String {
    let path = url.split(['?', '#']).next().unwrap_or_default();
    path.rsplit('/')
        .next()
        .filter(|segment| !segment.is_empty() && *segment != "." && *segment != "..")
        .map_or_else(|| FALLBACK_ARCHIVE_NAME.to_owned(), str::to_owned)
}

/// Resolves the package directory inside the extraction root.
fn locate_package_dir(root: &Utf8Path, package_dir: &str) -> Result<Utf8PathBuf> {
    let candidate = if package_dir.is_empty() {
        root.to_owned()
    } else {
        root.join(package_dir)
    };
    if !candidate.is_dir() {
        return Err(MirrorError::PackageDirMissing { path: candidate });
    }
    Ok(candidate)
}

fn utf8_path(path: &Path) -> Result<Utf8PathBuf> {
    Utf8PathBuf::try_from(path.to_path_buf())
        .map_err(|e| MirrorError::NonUtf8Path(e.into_path_buf().display().to_string()))
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
