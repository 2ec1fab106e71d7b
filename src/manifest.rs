//! Manifest template rewriting.
//!
//! The mirror publishes upstream files under its own package metadata. A
//! local `package.json` template supplies that metadata; for each release
//! only its `version` field changes. Field order is preserved so the
//! published manifest diffs cleanly against the template.

use camino::{Utf8Path, Utf8PathBuf};
use serde_json::{Map, Value};
use thiserror::Error;

/// File name the publish tooling reads from the package directory.
pub const MANIFEST_FILE: &str = "package.json";

/// Errors arising from manifest loading and writing.
#[derive(Debug, Error)]
pub enum ManifestError {
    /// The template could not be read.
    #[error("failed to read manifest template {path}: {source}")]
    Read {
        /// Template path.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The template is not valid JSON.
    #[error("manifest template {path} is not valid JSON: {source}")]
    Parse {
        /// Template path.
        path: Utf8PathBuf,
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// The template parsed but is not a JSON object.
    #[error("manifest template {path} must be a JSON object")]
    NotAnObject {
        /// Template path.
        path: Utf8PathBuf,
    },

    /// The rewritten manifest could not be written.
    #[error("failed to write manifest {path}: {source}")]
    Write {
        /// Destination path.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// A package manifest template.
#[derive(Debug, Clone, PartialEq)]
pub struct ManifestTemplate {
    fields: Map<String, Value>,
}

impl ManifestTemplate {
    /// Loads a template from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError`] if the file cannot be read, is not JSON,
    /// or is not a JSON object.
    pub fn load(path: &Utf8Path) -> Result<Self, ManifestError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ManifestError::Read {
            path: path.to_owned(),
            source,
        })?;
        let value: Value = serde_json::from_str(&contents).map_err(|source| ManifestError::Parse {
            path: path.to_owned(),
            source,
        })?;
        Self::from_value(value).ok_or_else(|| ManifestError::NotAnObject {
            path: path.to_owned(),
        })
    }

    /// Wraps a parsed JSON value, returning `None` unless it is an object.
    ///
    /// # Examples
    ///
    /// ```
    /// use release_mirror::manifest::ManifestTemplate;
    /// use serde_json::json;
    ///
    /// let template = ManifestTemplate::from_value(json!({"name": "ruffle-mirror"})).unwrap();
    /// assert_eq!(template.render("2024.3.12")["version"], "2024.3.12");
    /// assert!(ManifestTemplate::from_value(json!(["not", "an", "object"])).is_none());
    /// ```
    #[must_use]
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(fields) => Some(Self { fields }),
            _ => None,
        }
    }

    /// Returns a copy of the template with `version` set.
    ///
    /// An existing `version` keeps its position; a missing one is appended.
    #[must_use]
    pub fn render(&self, version: &str) -> Value {
        let mut fields = self.fields.clone();
        fields.insert("version".to_owned(), Value::String(version.to_owned()));
        Value::Object(fields)
    }

    /// Writes the rendered manifest to `<dir>/package.json`, replacing any
    /// manifest shipped in the upstream archive.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError::Write`] if the file cannot be written.
    pub fn write_into(&self, dir: &Utf8Path, version: &str) -> Result<Utf8PathBuf, ManifestError> {
        let path = dir.join(MANIFEST_FILE);
        let write_error = |source| ManifestError::Write {
            path: path.clone(),
            source,
        };
        let rendered = serde_json::to_string_pretty(&self.render(version))
            .map_err(|err| write_error(std::io::Error::other(err)))?;
        std::fs::write(&path, rendered).map_err(write_error)?;
        Ok(path)
    }
}
