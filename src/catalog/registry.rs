//! npm registry catalog.
//!
//! Versions come from `npm view <package> versions --json` and archive
//! URLs from `npm view <package>@<version> dist.tarball`, both run through
//! a [`CommandExecutor`].

use super::{SourceCatalog, VersionCatalog};
use crate::command::{CommandExecutor, capture_stdout};
use crate::error::{MirrorError, Result};
use serde_json::Value;

/// A package in the npm registry.
pub struct RegistryCatalog<'a> {
    package: String,
    executor: &'a dyn CommandExecutor,
}

impl<'a> RegistryCatalog<'a> {
    /// Creates a catalog for `package` that runs npm through `executor`.
    pub fn new(package: impl Into<String>, executor: &'a dyn CommandExecutor) -> Self {
        Self {
            package: package.into(),
            executor,
        }
    }
}

impl VersionCatalog for RegistryCatalog<'_> {
    fn name(&self) -> &str {
        &self.package
    }

    fn list_versions(&self) -> Result<Vec<String>> {
        let stdout = capture_stdout(
            self.executor,
            "npm",
            &["view", &self.package, "versions", "--json"],
        )?;
        parse_version_list(&self.package, &stdout)
    }
}

impl SourceCatalog for RegistryCatalog<'_> {
    fn resolve_download(&self, raw_version: &str) -> Result<String> {
        let spec = format!("{}@{raw_version}", self.package);
        let stdout = capture_stdout(self.executor, "npm", &["view", &spec, "dist.tarball"])?;
        let url = stdout.trim();
        if url.is_empty() {
            return Err(MirrorError::InvalidCatalog {
                catalog: spec,
                reason: "no dist.tarball URL".to_owned(),
            });
        }
        Ok(url.to_owned())
    }
}

/// Parses `npm view … versions --json` output.
///
/// npm prints an array, except for packages with exactly one version where
/// it prints a bare string. Empty output means no versions.
fn parse_version_list(package: &str, stdout: &str) -> Result<Vec<String>> {
    let trimmed = stdout.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }

    let invalid = |reason: String| MirrorError::InvalidCatalog {
        catalog: package.to_owned(),
        reason,
    };

    match serde_json::from_str::<Value>(trimmed).map_err(|e| invalid(e.to_string()))? {
        Value::String(version) => Ok(vec![version]),
        Value::Array(items) => items
            .into_iter()
            .map(|item| match item {
                Value::String(version) => Ok(version),
                other => Err(invalid(format!("expected a version string, got {other}"))),
            })
            .collect(),
        other => Err(invalid(format!("expected a version list, got {other}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::MockCommandExecutor;
    use crate::test_utils::{failure_output, stdout_output};
    use rstest::rstest;

    #[test]
    fn list_versions_runs_npm_view() {
        let mut executor = MockCommandExecutor::new();
        executor
            .expect_run()
            .withf(|cmd, args| {
                cmd == "npm" && args == ["view", "@ruffle-rs/ruffle", "versions", "--json"]
            })
            .times(1)
            .returning(|_, _| {
                Ok(stdout_output(
                    "[\n  \"0.1.0-nightly.2024.1.1\",\n  \"0.1.0-nightly.2024.1.2\"\n]\n",
                ))
            });

        let catalog = RegistryCatalog::new("@ruffle-rs/ruffle", &executor);
        let versions = catalog.list_versions().expect("versions listed");
        assert_eq!(
            versions,
            vec!["0.1.0-nightly.2024.1.1", "0.1.0-nightly.2024.1.2"]
        );
    }

    #[test]
    fn list_versions_propagates_npm_failure() {
        let mut executor = MockCommandExecutor::new();
        executor
            .expect_run()
            .returning(|_, _| Ok(failure_output("npm ERR! 404 Not Found")));

        let catalog = RegistryCatalog::new("ruffle-mirror", &executor);
        let err = catalog.list_versions().expect_err("npm failed");
        assert!(matches!(err, MirrorError::CommandFailed { .. }));
    }

    #[test]
    fn resolve_download_trims_tarball_url() {
        let mut executor = MockCommandExecutor::new();
        executor
            .expect_run()
            .withf(|cmd, args| {
                cmd == "npm"
                    && args == ["view", "@ruffle-rs/ruffle@0.1.0-nightly.2024.1.2", "dist.tarball"]
            })
            .times(1)
            .returning(|_, _| {
                Ok(stdout_output(
                    "https://registry.npmjs.org/@ruffle-rs/ruffle/-/ruffle-0.1.0-nightly.2024.1.2.tgz\n",
                ))
            });

        let catalog = RegistryCatalog::new("@ruffle-rs/ruffle", &executor);
        let url = catalog
            .resolve_download("0.1.0-nightly.2024.1.2")
            .expect("url resolved");
        assert_eq!(
            url,
            "https://registry.npmjs.org/@ruffle-rs/ruffle/-/ruffle-0.1.0-nightly.2024.1.2.tgz"
        );
    }

    #[test]
    fn resolve_download_rejects_empty_output() {
        let mut executor = MockCommandExecutor::new();
        executor.expect_run().returning(|_, _| Ok(stdout_output("\n")));

        let catalog = RegistryCatalog::new("@ruffle-rs/ruffle", &executor);
        let err = catalog.resolve_download("0.0.1").expect_err("no url");
        assert!(matches!(err, MirrorError::InvalidCatalog { .. }));
    }

    #[rstest]
    #[case::array("[\"2024.1.1\",\"2024.1.2\"]", vec!["2024.1.1", "2024.1.2"])]
    #[case::single_version("\"2024.1.1\"\n", vec!["2024.1.1"])]
    #[case::empty_output("", vec![])]
    #[case::empty_array("[]", vec![])]
    fn parses_npm_version_output(#[case] stdout: &str, #[case] expected: Vec<&str>) {
        let versions = parse_version_list("ruffle-mirror", stdout).expect("parses");
        assert_eq!(versions, expected);
    }

    #[rstest]
    #[case::not_json("npm WARN something")]
    #[case::object("{\"versions\":[]}")]
    #[case::non_string_item("[\"2024.1.1\", 3]")]
    fn rejects_unexpected_npm_output(#[case] stdout: &str) {
        let err = parse_version_list("ruffle-mirror", stdout).expect_err("rejected");
        assert!(matches!(err, MirrorError::InvalidCatalog { .. }));
    }
}
