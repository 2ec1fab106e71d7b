//! Mirror configuration loaded from `release-mirror.toml`.
//!
//! Every key has a default, and the defaults describe the canonical
//! deployment (`@ruffle-rs/ruffle` republished as `ruffle-mirror`), so the
//! binary works without a configuration file. When a file is present its
//! values are deserialised with unknown keys rejected.

use camino::{Utf8Component, Utf8Path, Utf8PathBuf};
use log::debug;
use serde::Deserialize;
use thiserror::Error;

/// Configuration file looked up in the current directory when no path is
/// given explicitly.
pub const DEFAULT_CONFIG_FILE: &str = "release-mirror.toml";

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read configuration {path}: {source}")]
    Read {
        /// Path that was read.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid TOML for this schema.
    #[error("invalid configuration {path}: {source}")]
    Parse {
        /// Path that was parsed.
        path: Utf8PathBuf,
        /// Underlying TOML error.
        #[source]
        source: toml::de::Error,
    },

    /// A value parsed but violates a constraint.
    #[error("invalid configuration: {reason}")]
    Invalid {
        /// Description of the violated constraint.
        reason: String,
    },
}

/// Top-level mirror configuration.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct MirrorConfig {
    /// Manifest template whose `version` is rewritten for each publish.
    pub template: Utf8PathBuf,
    /// Where upstream versions and artefacts come from.
    pub source: SourceConfig,
    /// Where mirrored versions are published.
    pub destination: DestinationConfig,
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            template: Utf8PathBuf::from("package.json"),
            source: SourceConfig::default(),
            destination: DestinationConfig::default(),
        }
    }
}

/// Upstream catalog selection.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(tag = "kind", rename_all = "lowercase", deny_unknown_fields)]
pub enum SourceConfig {
    /// An npm package; versions from `npm view`, artefacts from `dist.tarball`.
    Registry {
        /// Upstream npm package name.
        package: String,
    },
    /// A GitHub repository's releases; artefacts are release assets.
    Release {
        /// `owner/name` of the repository.
        repository: String,
        /// Substring an asset name must contain to be downloaded.
        asset_filter: String,
        /// Whether prereleases count as upstream versions.
        #[serde(default = "default_true")]
        include_prereleases: bool,
        /// Releases requested per API page.
        #[serde(default = "default_per_page")]
        per_page: u8,
        /// Environment variable holding an optional API token.
        #[serde(default = "default_token_env")]
        token_env: String,
    },
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self::Registry {
            package: "@ruffle-rs/ruffle".to_owned(),
        }
    }
}

const fn default_true() -> bool {
    true
}

const fn default_per_page() -> u8 {
    30
}

fn default_token_env() -> String {
    "GITHUB_TOKEN".to_owned()
}

/// Mirror destination settings.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct DestinationConfig {
    /// npm package name the mirror publishes under.
    pub package: String,
    /// Directory inside the extracted archive that holds the package.
    /// Empty means the extraction root.
    pub package_dir: String,
    /// Extra arguments appended to `npm publish`.
    pub publish_args: Vec<String>,
}

impl Default for DestinationConfig {
    fn default() -> Self {
        Self {
            package: "ruffle-mirror".to_owned(),
            package_dir: "package".to_owned(),
            publish_args: Vec::new(),
        }
    }
}

impl MirrorConfig {
    /// Resolves the configuration for a run.
    ///
    /// An explicit path must exist. Without one, [`DEFAULT_CONFIG_FILE`] in
    /// the current directory is used when present, and the built-in
    /// defaults otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the chosen file cannot be read, parsed,
    /// or validated.
    pub fn resolve(explicit: Option<&Utf8Path>) -> Result<Self, ConfigError> {
        match explicit {
            Some(path) => Self::load(path),
            None => {
                let fallback = Utf8Path::new(DEFAULT_CONFIG_FILE);
                if fallback.is_file() {
                    Self::load(fallback)
                } else {
                    debug!("no {DEFAULT_CONFIG_FILE} found; using built-in defaults");
                    Ok(Self::default())
                }
            }
        }
    }

    /// Loads and validates the configuration at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read, parsed, or
    /// validated.
    pub fn load(path: &Utf8Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_owned(),
            source,
        })?;
        let config: Self = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_owned(),
            source,
        })?;
        config.validate()?;
        debug!("loaded configuration from {path}");
        Ok(config)
    }

    /// Parses configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] (with an empty path) for malformed
    /// TOML and [`ConfigError::Invalid`] for constraint violations.
    ///
    /// # Examples
    ///
    /// ```
    /// use release_mirror::config::MirrorConfig;
    ///
    /// let config = MirrorConfig::from_toml_str("[destination]\npackage = \"my-mirror\"\n")?;
    /// assert_eq!(config.destination.package, "my-mirror");
    /// assert_eq!(config.destination.package_dir, "package");
    /// # Ok::<(), release_mirror::config::ConfigError>(())
    /// ```
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(contents).map_err(|source| ConfigError::Parse {
            path: Utf8PathBuf::new(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.destination.package.trim().is_empty() {
            return Err(invalid("destination.package must not be empty"));
        }
        let package_dir = Utf8Path::new(&self.destination.package_dir);
        if package_dir.is_absolute()
            || package_dir
                .components()
                .any(|component| matches!(component, Utf8Component::ParentDir))
        {
            return Err(invalid(format!(
                "destination.package_dir must stay inside the archive, got \"{package_dir}\""
            )));
        }
        match &self.source {
            SourceConfig::Registry { package } if package.trim().is_empty() => {
                Err(invalid("source.package must not be empty"))
            }
            SourceConfig::Registry { .. } => Ok(()),
            SourceConfig::Release {
                repository,
                asset_filter,
                per_page,
                ..
            } => {
                let mut parts = repository.split('/');
                let well_formed = matches!(
                    (parts.next(), parts.next(), parts.next()),
                    (Some(owner), Some(name), None) if !owner.is_empty() && !name.is_empty()
                );
                if !well_formed {
                    return Err(invalid(format!(
                        "source.repository must be owner/name, got \"{repository}\""
                    )));
                }
                if asset_filter.is_empty() {
                    return Err(invalid("source.asset_filter must not be empty"));
                }
                if !(1..=100).contains(per_page) {
                    return Err(invalid(format!(
                        "source.per_page must be between 1 and 100, got {per_page}"
                    )));
                }
                Ok(())
            }
        }
    }
}

fn invalid(reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        reason: reason.into(),
    }
}
