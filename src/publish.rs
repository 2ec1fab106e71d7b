//! Publishing a prepared package directory to the destination registry.

use crate::command::{CommandExecutor, failure_message};
use crate::error::{MirrorError, Result};
use camino::Utf8Path;
use log::info;

/// Runs `npm publish` for prepared package directories.
pub struct Publisher<'a> {
    executor: &'a dyn CommandExecutor,
    extra_args: &'a [String],
    dry_run: bool,
}

impl<'a> Publisher<'a> {
    /// Creates a publisher that appends `extra_args` to every invocation.
    #[must_use]
    pub fn new(executor: &'a dyn CommandExecutor, extra_args: &'a [String], dry_run: bool) -> Self {
        Self {
            executor,
            extra_args,
            dry_run,
        }
    }

    /// Arguments passed to `npm`, ending in `--dry-run` when enabled.
    ///
    /// # Examples
    ///
    /// ```
    /// use release_mirror::command::SystemCommandExecutor;
    /// use release_mirror::publish::Publisher;
    ///
    /// let extra = vec!["--access".to_owned(), "public".to_owned()];
    /// let publisher = Publisher::new(&SystemCommandExecutor, &extra, true);
    /// assert_eq!(
    ///     publisher.arguments(),
    ///     vec!["publish", "--access", "public", "--dry-run"]
    /// );
    /// ```
    #[must_use]
    pub fn arguments(&self) -> Vec<&str> {
        let mut args = vec!["publish"];
        args.extend(self.extra_args.iter().map(String::as_str));
        if self.dry_run {
            args.push("--dry-run");
        }
        args
    }

    /// Publishes `package_dir` as `version`.
    ///
    /// The command runs with `package_dir` as its working directory.
    ///
    /// # Errors
    ///
    /// Returns [`MirrorError::PublishFailed`] carrying the trimmed stderr if
    /// npm exits unsuccessfully, or the spawn error if npm cannot be run.
    pub fn publish(&self, package_dir: &Utf8Path, version: &str) -> Result<()> {
        let output = self
            .executor
            .run_in(package_dir, "npm", &self.arguments())?;
        if !output.status.success() {
            return Err(MirrorError::PublishFailed {
                version: version.to_owned(),
                message: failure_message(&output),
            });
        }
        if self.dry_run {
            info!("dry-run publish of {version} succeeded");
        } else {
            info!("published {version}");
        }
        Ok(())
    }
}
