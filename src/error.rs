//! Error types for the release mirror.
//!
//! Module-level failures (download, extraction, manifest, configuration)
//! convert into [`MirrorError`] so the orchestrator can propagate them with
//! `?` and the binary can report a single message before exiting.

use crate::config::ConfigError;
use crate::extraction::ExtractionError;
use crate::fetch::DownloadError;
use crate::manifest::ManifestError;
use camino::Utf8PathBuf;
use thiserror::Error;

/// Errors that can occur while mirroring releases.
#[derive(Debug, Error)]
pub enum MirrorError {
    /// The configuration file could not be read or parsed.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// An external command exited unsuccessfully.
    #[error("`{command}` failed: {message}")]
    CommandFailed {
        /// The command line that was run.
        command: String,
        /// Trimmed stderr of the command, or its exit status.
        message: String,
    },

    /// A version catalog returned output that could not be interpreted.
    #[error("invalid version catalog for {catalog}: {reason}")]
    InvalidCatalog {
        /// The package or repository the catalog describes.
        catalog: String,
        /// Description of the parse failure.
        reason: String,
    },

    /// No release asset matched the configured name filter.
    #[error("release {tag} has no asset containing \"{filter}\"")]
    AssetNotFound {
        /// Tag of the release that was searched.
        tag: String,
        /// The asset-name substring that was looked for.
        filter: String,
    },

    /// Downloading an artefact or catalog failed.
    #[error(transparent)]
    Download(#[from] DownloadError),

    /// Extracting a downloaded archive failed.
    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    /// The manifest template could not be loaded or written.
    #[error(transparent)]
    Manifest(#[from] ManifestError),

    /// The extracted archive does not contain the expected package directory.
    #[error("package directory {path} not found in extracted archive")]
    PackageDirMissing {
        /// Where the package directory was expected.
        path: Utf8PathBuf,
    },

    /// A temporary path is not valid UTF-8.
    #[error("path is not valid UTF-8: {0}")]
    NonUtf8Path(String),

    /// The publish command failed for a version.
    #[error("publishing {version} failed: {message}")]
    PublishFailed {
        /// The mirror version that was being published.
        version: String,
        /// Trimmed stderr of the publish command.
        message: String,
    },

    /// An I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to write output.
    #[error("failed to write output")]
    WriteFailed {
        /// The underlying error that caused the write to fail.
        #[source]
        source: std::io::Error,
    },

    /// Test stub received an unexpected or mismatched command invocation.
    #[cfg(any(test, feature = "test-support"))]
    #[error("stub mismatch: {message}")]
    StubMismatch {
        /// Description of what was expected versus what was received.
        message: String,
    },
}

/// Result type alias using [`MirrorError`].
pub type Result<T> = std::result::Result<T, MirrorError>;
