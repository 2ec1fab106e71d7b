//! HTTP retrieval of release metadata and artefact archives.
//!
//! Provides a trait-based abstraction so catalog and pipeline code can be
//! exercised without network access.

use log::debug;
use std::path::Path;
use std::sync::OnceLock;
use std::time::Duration;

/// Network timeout for a single request, including the body transfer.
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(120);

/// Media type requested from JSON APIs.
const JSON_ACCEPT: &str = "application/vnd.github+json";

/// Sent with every request; the GitHub API rejects anonymous agents.
const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Trait for downloading metadata and archives.
///
/// # Examples
///
/// ```
/// use release_mirror::fetch::HttpDownloader;
///
/// let downloader = HttpDownloader::default();
/// // Use downloader.download_to_file(url, dest) in production
/// ```
#[cfg_attr(test, mockall::automock)]
pub trait ArtefactDownloader {
    /// Download `url` and return the body as text.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the body is not UTF-8.
    fn download_text(&self, url: &str) -> Result<String, DownloadError>;

    /// Download `url` into the file at `dest`.
    ///
    /// # Errors
    ///
    /// Returns an error if the download or file write fails.
    fn download_to_file(&self, url: &str, dest: &Path) -> Result<(), DownloadError>;
}

/// Errors arising from download operations.
#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    /// HTTP request failed.
    #[error("download failed for {url}: {reason}")]
    HttpError {
        /// The URL that was requested.
        url: String,
        /// A human-readable description of the failure.
        reason: String,
    },

    /// The requested resource was not found (HTTP 404).
    #[error("not found: {url}")]
    NotFound {
        /// The URL that returned 404.
        url: String,
    },

    /// I/O error writing the downloaded file.
    #[error("I/O error writing download: {0}")]
    Io(#[from] std::io::Error),
}

/// HTTP-based downloader using `ureq`.
///
/// An optional bearer token is attached to text (API) requests only;
/// archive downloads are fetched anonymously.
#[derive(Debug, Clone, Default)]
pub struct HttpDownloader {
    token: Option<String>,
}

impl HttpDownloader {
    /// Creates a downloader that authenticates API requests with `token`.
    #[must_use]
    pub fn with_token(token: Option<String>) -> Self {
        Self {
            token: token.filter(|value| !value.trim().is_empty()),
        }
    }
}

impl ArtefactDownloader for HttpDownloader {
    fn download_text(&self, url: &str) -> Result<String, DownloadError> {
        debug!("fetching {url}");
        let mut request = http_agent()
            .get(url)
            .header("User-Agent", USER_AGENT)
            .header("Accept", JSON_ACCEPT);
        if let Some(token) = &self.token {
            request = request.header("Authorization", &format!("Bearer {token}"));
        }
        let response = request.call().map_err(|e| map_ureq_error(url, &e))?;
        response
            .into_body()
            .read_to_string()
            .map_err(|e| DownloadError::HttpError {
                url: url.to_owned(),
                reason: e.to_string(),
            })
    }

    fn download_to_file(&self, url: &str, dest: &Path) -> Result<(), DownloadError> {
        debug!("downloading {url} to {}", dest.display());
        let response = http_agent()
            .get(url)
            .header("User-Agent", USER_AGENT)
            .call()
            .map_err(|e| map_ureq_error(url, &e))?;
        let mut file = std::fs::File::create(dest)?;
        std::io::copy(&mut response.into_body().as_reader(), &mut file)
            .map_err(DownloadError::Io)?;
        Ok(())
    }
}

/// Shared `ureq` agent with request timeout configuration.
fn http_agent() -> &'static ureq::Agent {
    static AGENT: OnceLock<ureq::Agent> = OnceLock::new();
    AGENT.get_or_init(|| {
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(DOWNLOAD_TIMEOUT))
            .build();
        ureq::Agent::new_with_config(config)
    })
}

/// Map a ureq error to a [`DownloadError`].
fn map_ureq_error(url: &str, err: &ureq::Error) -> DownloadError {
    match err {
        ureq::Error::StatusCode(404) => DownloadError::NotFound {
            url: url.to_owned(),
        },
        other => DownloadError::HttpError {
            url: url.to_owned(),
            reason: other.to_string(),
        },
    }
}
