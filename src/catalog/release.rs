//! GitHub release catalog.
//!
//! Upstream versions are release tags; a version's artefact is the first
//! release asset whose name contains the configured filter. The releases
//! endpoint lists newest first, so the list is reversed to give the
//! chronological order the mirror publishes in.

use super::{SourceCatalog, VersionCatalog};
use crate::error::{MirrorError, Result};
use crate::fetch::ArtefactDownloader;
use log::debug;
use serde::Deserialize;

/// Base URL of the GitHub REST API.
const API_BASE: &str = "https://api.github.com";

/// A published release as returned by the releases API.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReleaseDescriptor {
    /// Git tag the release was cut from.
    pub tag_name: String,
    /// Whether the release is an unpublished draft.
    #[serde(default)]
    pub draft: bool,
    /// Whether the release is marked as a prerelease.
    #[serde(default)]
    pub prerelease: bool,
    /// Files attached to the release.
    #[serde(default)]
    pub assets: Vec<ReleaseAsset>,
}

/// A downloadable file attached to a release.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReleaseAsset {
    /// Asset file name.
    pub name: String,
    /// Direct download URL.
    pub browser_download_url: String,
}

impl ReleaseDescriptor {
    /// Returns the first asset whose name contains `filter`.
    ///
    /// # Examples
    ///
    /// ```
    /// use release_mirror::catalog::{ReleaseAsset, ReleaseDescriptor};
    ///
    /// let release = ReleaseDescriptor {
    ///     tag_name: "nightly-2024-03-12".to_owned(),
    ///     draft: false,
    ///     prerelease: true,
    ///     assets: vec![ReleaseAsset {
    ///         name: "ruffle-nightly-2024_03_12-web-selfhosted.zip".to_owned(),
    ///         browser_download_url: "https://example.test/web.zip".to_owned(),
    ///     }],
    /// };
    /// assert!(release.select_asset("web-selfhosted").is_some());
    /// assert!(release.select_asset("linux-x86_64").is_none());
    /// ```
    #[must_use]
    pub fn select_asset(&self, filter: &str) -> Option<&ReleaseAsset> {
        self.assets.iter().find(|asset| asset.name.contains(filter))
    }
}

/// Releases of a GitHub repository.
pub struct ReleaseCatalog<'a> {
    repository: String,
    asset_filter: String,
    include_prereleases: bool,
    per_page: u8,
    downloader: &'a dyn ArtefactDownloader,
}

impl<'a> ReleaseCatalog<'a> {
    /// Creates a catalog over `repository` (`owner/name`) whose artefacts
    /// are the assets matching `asset_filter`.
    pub fn new(
        repository: impl Into<String>,
        asset_filter: impl Into<String>,
        downloader: &'a dyn ArtefactDownloader,
    ) -> Self {
        Self {
            repository: repository.into(),
            asset_filter: asset_filter.into(),
            include_prereleases: true,
            per_page: 30,
            downloader,
        }
    }

    /// Sets whether prereleases are listed.
    #[must_use]
    pub fn include_prereleases(mut self, include: bool) -> Self {
        self.include_prereleases = include;
        self
    }

    /// Sets how many releases are requested.
    #[must_use]
    pub fn per_page(mut self, per_page: u8) -> Self {
        self.per_page = per_page;
        self
    }

    /// URL listing the most recent releases.
    #[must_use]
    pub fn releases_url(&self) -> String {
        format!(
            "{API_BASE}/repos/{}/releases?per_page={}",
            self.repository, self.per_page
        )
    }

    /// URL of the release for `tag`.
    #[must_use]
    pub fn release_url(&self, tag: &str) -> String {
        format!("{API_BASE}/repos/{}/releases/tags/{tag}", self.repository)
    }

    fn fetch<T: for<'de> Deserialize<'de>>(&self, url: &str) -> Result<T> {
        let body = self.downloader.download_text(url)?;
        serde_json::from_str(&body).map_err(|e| MirrorError::InvalidCatalog {
            catalog: self.repository.clone(),
            reason: e.to_string(),
        })
    }
}

impl VersionCatalog for ReleaseCatalog<'_> {
    fn name(&self) -> &str {
        &self.repository
    }

    fn list_versions(&self) -> Result<Vec<String>> {
        let releases: Vec<ReleaseDescriptor> = self.fetch(&self.releases_url())?;
        let tags = releases
            .into_iter()
            .rev()
            .filter(|release| {
                let listed = !release.draft && (self.include_prereleases || !release.prerelease);
                if !listed {
                    debug!("ignoring release {}", release.tag_name);
                }
                listed
            })
            .map(|release| release.tag_name)
            .collect();
        Ok(tags)
    }
}

impl SourceCatalog for ReleaseCatalog<'_> {
    fn resolve_download(&self, raw_version: &str) -> Result<String> {
        let release: ReleaseDescriptor = self.fetch(&self.release_url(raw_version))?;
        release
            .select_asset(&self.asset_filter)
            .map(|asset| asset.browser_download_url.clone())
            .ok_or_else(|| MirrorError::AssetNotFound {
                tag: release.tag_name.clone(),
                filter: self.asset_filter.clone(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::{DownloadError, MockArtefactDownloader};

    const RELEASES_JSON: &str = r#"[
        {"tag_name": "nightly-2024-03-13", "draft": true, "prerelease": true, "assets": []},
        {"tag_name": "nightly-2024-03-12", "draft": false, "prerelease": true, "assets": []},
        {"tag_name": "v0.2.0", "draft": false, "prerelease": false, "assets": []},
        {"tag_name": "nightly-2024-03-11", "draft": false, "prerelease": true, "assets": []}
    ]"#;

    const RELEASE_JSON: &str = r#"{
        "tag_name": "nightly-2024-03-12",
        "prerelease": true,
        "assets": [
            {"name": "ruffle-nightly-2024_03_12-linux-x86_64.tar.gz",
             "browser_download_url": "https://example.test/linux.tar.gz"},
            {"name": "ruffle-nightly-2024_03_12-web-selfhosted.zip",
             "browser_download_url": "https://example.test/web-selfhosted.zip"}
        ]
    }"#;

    fn downloader_returning(url: &'static str, body: &'static str) -> MockArtefactDownloader {
        let mut downloader = MockArtefactDownloader::new();
        downloader
            .expect_download_text()
            .withf(move |requested| requested == url)
            .times(1)
            .returning(move |_| Ok(body.to_owned()));
        downloader
    }

    #[test]
    fn lists_tags_oldest_first_without_drafts() {
        let downloader = downloader_returning(
            "https://api.github.com/repos/ruffle-rs/ruffle/releases?per_page=30",
            RELEASES_JSON,
        );
        let catalog = ReleaseCatalog::new("ruffle-rs/ruffle", "web-selfhosted", &downloader);

        let tags = catalog.list_versions().expect("tags listed");
        assert_eq!(
            tags,
            vec!["nightly-2024-03-11", "v0.2.0", "nightly-2024-03-12"]
        );
    }

    #[test]
    fn prereleases_can_be_excluded() {
        let downloader = downloader_returning(
            "https://api.github.com/repos/ruffle-rs/ruffle/releases?per_page=5",
            RELEASES_JSON,
        );
        let catalog = ReleaseCatalog::new("ruffle-rs/ruffle", "web-selfhosted", &downloader)
            .include_prereleases(false)
            .per_page(5);

        let tags = catalog.list_versions().expect("tags listed");
        assert_eq!(tags, vec!["v0.2.0"]);
    }

    #[test]
    fn resolves_matching_asset_url() {
        let downloader = downloader_returning(
            "https://api.github.com/repos/ruffle-rs/ruffle/releases/tags/nightly-2024-03-12",
            RELEASE_JSON,
        );
        let catalog = ReleaseCatalog::new("ruffle-rs/ruffle", "web-selfhosted", &downloader);

        let url = catalog
            .resolve_download("nightly-2024-03-12")
            .expect("asset found");
        assert_eq!(url, "https://example.test/web-selfhosted.zip");
    }

    #[test]
    fn missing_asset_names_tag_and_filter() {
        let downloader = downloader_returning(
            "https://api.github.com/repos/ruffle-rs/ruffle/releases/tags/nightly-2024-03-12",
            RELEASE_JSON,
        );
        let catalog = ReleaseCatalog::new("ruffle-rs/ruffle", "macos", &downloader);

        let err = catalog
            .resolve_download("nightly-2024-03-12")
            .expect_err("no macos asset");
        match err {
            MirrorError::AssetNotFound { tag, filter } => {
                assert_eq!(tag, "nightly-2024-03-12");
                assert_eq!(filter, "macos");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn malformed_listing_is_an_invalid_catalog() {
        let downloader = downloader_returning(
            "https://api.github.com/repos/ruffle-rs/ruffle/releases?per_page=30",
            "{\"message\": \"API rate limit exceeded\"}",
        );
        let catalog = ReleaseCatalog::new("ruffle-rs/ruffle", "web-selfhosted", &downloader);

        let err = catalog.list_versions().expect_err("object is not a list");
        assert!(matches!(err, MirrorError::InvalidCatalog { .. }));
    }

    #[test]
    fn http_failures_propagate() {
        let mut downloader = MockArtefactDownloader::new();
        downloader.expect_download_text().returning(|url| {
            Err(DownloadError::HttpError {
                url: url.to_owned(),
                reason: "connection refused".to_owned(),
            })
        });
        let catalog = ReleaseCatalog::new("ruffle-rs/ruffle", "web-selfhosted", &downloader);

        let err = catalog.list_versions().expect_err("network down");
        assert!(matches!(err, MirrorError::Download(DownloadError::HttpError { .. })));
    }
}
