//! External command execution.
//!
//! Every subprocess the mirror starts (`npm view`, `npm publish`) goes
//! through [`CommandExecutor`] so catalog and publish logic can be tested
//! without a package manager on the host.

use crate::error::{MirrorError, Result};
use camino::Utf8Path;
use log::debug;
use std::process::{Command, Output};

/// Abstraction for running external commands.
#[cfg_attr(test, mockall::automock)]
pub trait CommandExecutor {
    /// Runs a command with arguments and returns the captured output.
    ///
    /// # Errors
    ///
    /// Returns any I/O errors encountered while spawning or running the command.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use release_mirror::command::{CommandExecutor, SystemCommandExecutor};
    ///
    /// let executor = SystemCommandExecutor;
    /// let output = executor.run("npm", &["--version"])?;
    /// assert!(output.status.success());
    /// # Ok::<(), release_mirror::error::MirrorError>(())
    /// ```
    fn run<'a>(&self, cmd: &str, args: &[&'a str]) -> Result<Output>;

    /// Runs a command with `dir` as the child's working directory.
    ///
    /// The working directory of the calling process is left untouched.
    ///
    /// # Errors
    ///
    /// Returns any I/O errors encountered while spawning or running the command.
    fn run_in<'a>(&self, dir: &Utf8Path, cmd: &str, args: &[&'a str]) -> Result<Output>;
}

/// Executes commands on the host system.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemCommandExecutor;

impl CommandExecutor for SystemCommandExecutor {
    fn run(&self, cmd: &str, args: &[&str]) -> Result<Output> {
        debug!("running `{}`", command_line(cmd, args));
        Command::new(cmd)
            .args(args)
            .output()
            .map_err(MirrorError::from)
    }

    fn run_in(&self, dir: &Utf8Path, cmd: &str, args: &[&str]) -> Result<Output> {
        debug!("running `{}` in {dir}", command_line(cmd, args));
        Command::new(cmd)
            .args(args)
            .current_dir(dir.as_std_path())
            .output()
            .map_err(MirrorError::from)
    }
}

/// Runs a command and returns its stdout when it exits successfully.
///
/// # Errors
///
/// Returns [`MirrorError::CommandFailed`] carrying the trimmed stderr when
/// the command exits with a non-zero status, or the spawn error otherwise.
pub fn capture_stdout(executor: &dyn CommandExecutor, cmd: &str, args: &[&str]) -> Result<String> {
    let output = executor.run(cmd, args)?;
    if !output.status.success() {
        return Err(MirrorError::CommandFailed {
            command: command_line(cmd, args),
            message: failure_message(&output),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Describes why a finished command failed, preferring its stderr.
pub(crate) fn failure_message(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let trimmed = stderr.trim();
    if trimmed.is_empty() {
        format!("exited with {}", output.status)
    } else {
        trimmed.to_owned()
    }
}

/// Renders a command and its arguments for messages.
pub(crate) fn command_line(cmd: &str, args: &[&str]) -> String {
    std::iter::once(cmd)
        .chain(args.iter().copied())
        .collect::<Vec<_>>()
        .join(" ")
}
