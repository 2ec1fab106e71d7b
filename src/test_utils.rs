//! Shared test utilities for the release mirror.

use crate::catalog::{SourceCatalog, VersionCatalog};
use crate::command::CommandExecutor;
use crate::error::{MirrorError, Result};
use crate::extraction::ArchiveKind;
use crate::fetch::{ArtefactDownloader, DownloadError};
use camino::{Utf8Path, Utf8PathBuf};
use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::io::{Cursor, Write};
use std::path::Path;
use std::process::{ExitStatus, Output};

/// Creates an `ExitStatus` from an exit code (Unix implementation).
#[cfg(unix)]
#[must_use]
pub fn exit_status(code: i32) -> ExitStatus {
    use std::os::unix::process::ExitStatusExt;

    ExitStatus::from_raw(code << 8)
}

/// Creates an `ExitStatus` from an exit code (Windows implementation).
#[cfg(windows)]
#[must_use]
pub fn exit_status(code: i32) -> ExitStatus {
    use std::os::windows::process::ExitStatusExt;

    ExitStatus::from_raw(code as u32)
}

/// Creates a successful command `Output` with empty stdout and stderr.
#[must_use]
pub fn success_output() -> Output {
    stdout_output("")
}

/// Creates a successful command `Output` with the given stdout.
#[must_use]
pub fn stdout_output(stdout: &str) -> Output {
    Output {
        status: exit_status(0),
        stdout: stdout.as_bytes().to_vec(),
        stderr: Vec::new(),
    }
}

/// Creates a failed command `Output` with the given stderr message.
#[must_use]
pub fn failure_output(stderr: &str) -> Output {
    Output {
        status: exit_status(1),
        stdout: Vec::new(),
        stderr: stderr.as_bytes().to_vec(),
    }
}

/// Represents an expected command invocation for testing.
#[derive(Debug)]
pub struct ExpectedCall {
    /// The command to execute (e.g., "npm").
    pub cmd: &'static str,
    /// The arguments to pass to the command.
    pub args: Vec<String>,
    /// Expected working directory, or `None` for [`CommandExecutor::run`].
    pub dir: Option<Utf8PathBuf>,
    /// The result to return when this command is invoked.
    pub result: Result<Output>,
}

impl ExpectedCall {
    /// Expects `cmd args…` run without a working directory.
    #[must_use]
    pub fn new(cmd: &'static str, args: &[&str], result: Result<Output>) -> Self {
        Self {
            cmd,
            args: args.iter().map(|arg| (*arg).to_owned()).collect(),
            dir: None,
            result,
        }
    }

    /// Expects `cmd args…` run with an arbitrary working directory.
    ///
    /// The directory is recorded by [`StubExecutor`] rather than matched,
    /// since callers usually publish from a temporary path.
    #[must_use]
    pub fn in_any_dir(cmd: &'static str, args: &[&str], result: Result<Output>) -> Self {
        Self {
            dir: Some(Utf8PathBuf::new()),
            ..Self::new(cmd, args, result)
        }
    }
}

/// A stub implementation of `CommandExecutor` for testing.
///
/// Records expected command invocations and returns predefined results,
/// allowing tests to verify command execution without side effects.
/// Working directories passed to [`CommandExecutor::run_in`] are kept so
/// tests can inspect the prepared package afterwards.
#[derive(Debug)]
pub struct StubExecutor {
    expected: RefCell<VecDeque<ExpectedCall>>,
    dirs: RefCell<Vec<Utf8PathBuf>>,
    inspect: Option<fn(&Utf8Path)>,
}

impl StubExecutor {
    /// Creates a new `StubExecutor` with the given expected calls.
    #[must_use]
    pub fn new(expected: Vec<ExpectedCall>) -> Self {
        Self {
            expected: RefCell::new(expected.into()),
            dirs: RefCell::new(Vec::new()),
            inspect: None,
        }
    }

    /// Runs `inspect` against each working directory passed to `run_in`,
    /// while the directory still exists.
    #[must_use]
    pub fn with_dir_inspector(mut self, inspect: fn(&Utf8Path)) -> Self {
        self.inspect = Some(inspect);
        self
    }

    /// Working directories seen by `run_in`, in call order.
    #[must_use]
    pub fn seen_dirs(&self) -> Vec<Utf8PathBuf> {
        self.dirs.borrow().clone()
    }

    /// Asserts that all expected command invocations have been consumed.
    ///
    /// # Panics
    ///
    /// Panics if there are remaining expected calls that were not invoked.
    pub fn assert_finished(&self) {
        assert!(
            self.expected.borrow().is_empty(),
            "expected no further command invocations"
        );
    }

    fn take_call(&self, cmd: &str, args: &[&str], in_dir: bool) -> Result<Output> {
        let Some(call) = self.expected.borrow_mut().pop_front() else {
            return Err(MirrorError::StubMismatch {
                message: format!("unexpected command invocation: {cmd} {}", args.join(" ")),
            });
        };

        if call.cmd != cmd || call.args != args || call.dir.is_some() != in_dir {
            return Err(MirrorError::StubMismatch {
                message: format!(
                    "expected {} {:?} (dir: {}), got {cmd} {args:?} (dir: {in_dir})",
                    call.cmd,
                    call.args,
                    call.dir.is_some()
                ),
            });
        }

        call.result
    }
}

impl CommandExecutor for StubExecutor {
    fn run(&self, cmd: &str, args: &[&str]) -> Result<Output> {
        self.take_call(cmd, args, false)
    }

    fn run_in(&self, dir: &Utf8Path, cmd: &str, args: &[&str]) -> Result<Output> {
        self.dirs.borrow_mut().push(dir.to_owned());
        if let Some(inspect) = self.inspect {
            inspect(dir);
        }
        self.take_call(cmd, args, true)
    }
}

/// A member of a fixture tarball.
#[derive(Debug, Clone, Copy)]
pub enum TarMember<'a> {
    /// A regular file.
    File {
        /// Path inside the archive.
        path: &'a str,
        /// File contents.
        contents: &'a [u8],
    },
    /// A symbolic link; `target` is relative to the link's directory.
    Symlink {
        /// Path inside the archive.
        path: &'a str,
        /// Link target, written verbatim.
        target: &'a str,
    },
    /// A hard link; `target` is relative to the archive root.
    HardLink {
        /// Path inside the archive.
        path: &'a str,
        /// Link target, written verbatim.
        target: &'a str,
    },
}

/// Builds an in-memory `.tgz` laid out like an npm tarball.
///
/// Each `(path, contents)` pair becomes a regular file entry; paths are
/// written verbatim so tests can include hostile names.
///
/// # Panics
///
/// Panics if the in-memory archive cannot be assembled.
#[must_use]
pub fn tarball(entries: &[(&str, &[u8])]) -> Vec<u8> {
    tarball_with_members(&file_members(entries))
}

/// Builds an in-memory `.tgz` from arbitrary members, links included.
///
/// # Panics
///
/// Panics if the in-memory archive cannot be assembled.
#[must_use]
#[expect(
    clippy::expect_used,
    reason = "fixture builders panic on in-memory I/O failures"
)]
pub fn tarball_with_members(members: &[TarMember<'_>]) -> Vec<u8> {
    let encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    write_tar(encoder, members).finish().expect("finish gzip")
}

/// Builds an in-memory archive of `kind` holding regular files.
///
/// # Panics
///
/// Panics if the in-memory archive cannot be assembled.
#[must_use]
#[expect(
    clippy::expect_used,
    reason = "fixture builders panic on in-memory I/O failures"
)]
pub fn archive(kind: ArchiveKind, entries: &[(&str, &[u8])]) -> Vec<u8> {
    match kind {
        ArchiveKind::TarGz => tarball(entries),
        ArchiveKind::TarZst => {
            let encoder = zstd::Encoder::new(Vec::new(), 0).expect("zstd encoder");
            write_tar(encoder, &file_members(entries))
                .finish()
                .expect("finish zstd")
        }
        ArchiveKind::Zip => {
            let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
            for (path, contents) in entries {
                writer
                    .start_file(*path, zip::write::SimpleFileOptions::default())
                    .expect("start zip entry");
                writer.write_all(contents).expect("write zip entry");
            }
            writer.finish().expect("finish zip").into_inner()
        }
    }
}

fn file_members<'a>(entries: &[(&'a str, &'a [u8])]) -> Vec<TarMember<'a>> {
    entries
        .iter()
        .map(|&(path, contents)| TarMember::File { path, contents })
        .collect()
}

#[expect(
    clippy::expect_used,
    reason = "fixture builders panic on in-memory I/O failures"
)]
fn write_tar<W: Write>(writer: W, members: &[TarMember<'_>]) -> W {
    let mut builder = tar::Builder::new(writer);
    for member in members {
        let mut header = tar::Header::new_gnu();
        let (path, contents): (&str, &[u8]) = match *member {
            TarMember::File { path, contents } => {
                header.set_entry_type(tar::EntryType::Regular);
                header.set_mode(0o644);
                (path, contents)
            }
            TarMember::Symlink { path, target } => {
                header.set_entry_type(tar::EntryType::Symlink);
                header.set_mode(0o777);
                write_raw_field(&mut header.as_old_mut().linkname, target);
                (path, b"".as_slice())
            }
            TarMember::HardLink { path, target } => {
                header.set_entry_type(tar::EntryType::Link);
                header.set_mode(0o644);
                write_raw_field(&mut header.as_old_mut().linkname, target);
                (path, b"".as_slice())
            }
        };
        header.set_size(contents.len() as u64);
        write_raw_field(&mut header.as_old_mut().name, path);
        header.set_cksum();
        builder.append(&header, contents).expect("append tar entry");
    }
    builder.into_inner().expect("finish tar")
}

/// Writes `value` into a header field without the `tar` crate's path
/// validation, so traversal fixtures can be produced.
fn write_raw_field(field: &mut [u8], value: &str) {
    let bytes = value.as_bytes();
    assert!(bytes.len() < field.len(), "fixture path too long: {value}");
    field.fill(0);
    for (slot, byte) in field.iter_mut().zip(bytes) {
        *slot = *byte;
    }
}

/// An in-memory catalog for pipeline tests.
///
/// Download URLs are `https://registry.test/<name>/-/<raw>.tgz` unless a
/// version is given an explicit URL.
#[derive(Debug, Clone, Default)]
pub struct StubCatalog {
    name: String,
    versions: Vec<String>,
    urls: HashMap<String, String>,
}

impl StubCatalog {
    /// Creates a catalog called `name` listing `versions` in order.
    #[must_use]
    pub fn new(name: &str, versions: &[&str]) -> Self {
        Self {
            name: name.to_owned(),
            versions: versions.iter().map(|version| (*version).to_owned()).collect(),
            urls: HashMap::new(),
        }
    }

    /// Overrides the download URL for `raw_version`.
    #[must_use]
    pub fn with_url(mut self, raw_version: &str, url: &str) -> Self {
        self.urls.insert(raw_version.to_owned(), url.to_owned());
        self
    }

    /// The URL [`SourceCatalog::resolve_download`] returns for `raw_version`.
    #[must_use]
    pub fn url_for(&self, raw_version: &str) -> String {
        self.urls
            .get(raw_version)
            .cloned()
            .unwrap_or_else(|| format!("https://registry.test/{}/-/{raw_version}.tgz", self.name))
    }
}

impl VersionCatalog for StubCatalog {
    fn name(&self) -> &str {
        &self.name
    }

    fn list_versions(&self) -> Result<Vec<String>> {
        Ok(self.versions.clone())
    }
}

impl SourceCatalog for StubCatalog {
    fn resolve_download(&self, raw_version: &str) -> Result<String> {
        if !self.versions.iter().any(|version| version == raw_version) {
            return Err(MirrorError::InvalidCatalog {
                catalog: self.name.clone(),
                reason: format!("unknown version {raw_version}"),
            });
        }
        Ok(self.url_for(raw_version))
    }
}

/// Serves canned responses by URL; unknown URLs are [`DownloadError::NotFound`].
#[derive(Debug, Default)]
pub struct StubDownloader {
    bodies: HashMap<String, Vec<u8>>,
    requested: RefCell<Vec<String>>,
}

impl StubDownloader {
    /// Creates a downloader with no responses.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Serves `body` for `url`.
    #[must_use]
    pub fn with_body(mut self, url: &str, body: impl Into<Vec<u8>>) -> Self {
        self.bodies.insert(url.to_owned(), body.into());
        self
    }

    /// URLs requested so far, in order.
    #[must_use]
    pub fn requested(&self) -> Vec<String> {
        self.requested.borrow().clone()
    }

    fn body(&self, url: &str) -> std::result::Result<&[u8], DownloadError> {
        self.requested.borrow_mut().push(url.to_owned());
        self.bodies
            .get(url)
            .map(Vec::as_slice)
            .ok_or_else(|| DownloadError::NotFound {
                url: url.to_owned(),
            })
    }
}

impl ArtefactDownloader for StubDownloader {
    fn download_text(&self, url: &str) -> std::result::Result<String, DownloadError> {
        let body = self.body(url)?;
        Ok(String::from_utf8_lossy(body).into_owned())
    }

    fn download_to_file(&self, url: &str, dest: &Path) -> std::result::Result<(), DownloadError> {
        let body = self.body(url)?;
        std::fs::write(dest, body)?;
        Ok(())
    }
}
