//! Archive extraction for downloaded release artefacts.
//!
//! Tarballs (gzip or zstd compressed) are checked in full before anything
//! is written: every member path, and every link target, must resolve
//! inside the destination directory without passing through a symlink
//! unpacked earlier from the same archive. Zip archives are unpacked by the
//! `zip` crate directly.

use log::debug;
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Component, Path, PathBuf};

/// Archive formats the mirror can unpack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    /// Gzip-compressed tarball (`.tgz`, `.tar.gz`); npm's format.
    TarGz,
    /// Zstandard-compressed tarball (`.tar.zst`).
    TarZst,
    /// Zip archive (`.zip`).
    Zip,
}

impl ArchiveKind {
    /// Infers the archive kind from a file name or URL.
    ///
    /// Unrecognised suffixes are treated as gzip tarballs, which is what
    /// npm's `dist.tarball` URLs point at.
    ///
    /// # Examples
    ///
    /// ```
    /// use release_mirror::extraction::ArchiveKind;
    ///
    /// assert_eq!(ArchiveKind::from_name("ruffle-1.0.0.tgz"), ArchiveKind::TarGz);
    /// assert_eq!(ArchiveKind::from_name("ruffle-web-selfhosted.zip"), ArchiveKind::Zip);
    /// ```
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        let lower = name.to_ascii_lowercase();
        if lower.ends_with(".zip") {
            Self::Zip
        } else if lower.ends_with(".tar.zst") || lower.ends_with(".tzst") {
            Self::TarZst
        } else {
            Self::TarGz
        }
    }
}

/// Trait for extracting artefact archives, enabling test mocking.
#[cfg_attr(test, mockall::automock)]
pub trait ArchiveExtractor {
    /// Extract the archive at `archive_path` into `dest_dir`.
    ///
    /// Returns the relative paths that were extracted.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractionError::PathTraversal`] if any tar entry
    /// attempts to escape the destination directory; in that case nothing
    /// is written. Returns [`ExtractionError::EmptyArchive`] if the archive
    /// has no entries.
    fn extract(
        &self,
        archive_path: &Path,
        kind: ArchiveKind,
        dest_dir: &Path,
    ) -> Result<Vec<String>, ExtractionError>;
}

/// Errors arising from archive extraction.
#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    /// I/O error during extraction.
    #[error("extraction I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The zip archive is malformed.
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// A path in the archive attempts to traverse outside the destination.
    #[error("path traversal detected: {path}")]
    PathTraversal {
        /// The offending path from the archive entry.
        path: String,
    },

    /// The archive contains no entries.
    #[error("archive contains no entries")]
    EmptyArchive,
}

/// Extractor that validates tar members before unpacking them.
#[derive(Debug, Clone, Copy, Default)]
pub struct SafeExtractor;

impl ArchiveExtractor for SafeExtractor {
    fn extract(
        &self,
        archive_path: &Path,
        kind: ArchiveKind,
        dest_dir: &Path,
    ) -> Result<Vec<String>, ExtractionError> {
        debug!("extracting {} as {kind:?}", archive_path.display());
        match kind {
            ArchiveKind::Zip => extract_zip(archive_path, dest_dir),
            ArchiveKind::TarGz | ArchiveKind::TarZst => {
                let planned = validate_tar(archive_path, kind)?;
                if planned == 0 {
                    return Err(ExtractionError::EmptyArchive);
                }
                unpack_tar(archive_path, kind, dest_dir)
            }
        }
    }
}

fn open_tar(path: &Path, kind: ArchiveKind) -> Result<tar::Archive<Box<dyn Read>>, ExtractionError> {
    let file = BufReader::new(File::open(path)?);
    let reader: Box<dyn Read> = match kind {
        ArchiveKind::TarZst => Box::new(zstd::Decoder::with_buffer(file)?),
        ArchiveKind::TarGz | ArchiveKind::Zip => Box::new(flate2::read::GzDecoder::new(file)),
    };
    Ok(tar::Archive::new(reader))
}

/// First pass: check every member without writing anything.
fn validate_tar(path: &Path, kind: ArchiveKind) -> Result<usize, ExtractionError> {
    let mut archive = open_tar(path, kind)?;
    let mut guard = MemberGuard::default();
    let mut count = 0;
    for entry_result in archive.entries()? {
        let entry = entry_result?;
        guard.check(&entry)?;
        count += 1;
    }
    Ok(count)
}

/// Second pass: unpack each member at its normalised location.
fn unpack_tar(
    path: &Path,
    kind: ArchiveKind,
    dest_dir: &Path,
) -> Result<Vec<String>, ExtractionError> {
    let mut archive = open_tar(path, kind)?;
    let root = dest_dir.canonicalize()?;
    let mut guard = MemberGuard::default();
    let mut extracted = Vec::new();

    for entry_result in archive.entries()? {
        let mut entry = entry_result?;
        let member = guard.check(&entry)?;
        if member.relative.as_os_str().is_empty() {
            continue;
        }

        let dest_path = root.join(&member.relative);
        if let Some(parent) = dest_path.parent() {
            std::fs::create_dir_all(parent)?;
            if !parent.canonicalize()?.starts_with(&root) {
                return Err(traversal(&member.relative));
            }
        }
        match &member.hard_link_target {
            Some(target) => std::fs::hard_link(root.join(target), &dest_path)?,
            None => {
                entry.unpack(&dest_path)?;
            }
        }
        extracted.push(member.relative.to_string_lossy().into_owned());
    }

    Ok(extracted)
}

/// A tar member that passed [`MemberGuard::check`].
#[derive(Debug)]
struct CheckedMember {
    /// Path relative to the extraction root.
    relative: PathBuf,
    /// Root-relative target when the member is a hard link.
    hard_link_target: Option<PathBuf>,
}

/// Validates tar members in archive order.
///
/// Symlinks accepted so far are remembered: a later member path or link
/// target that descends through one of them is rejected, since the link
/// may point anywhere once it exists on disk.
#[derive(Debug, Default)]
struct MemberGuard {
    symlinks: HashSet<PathBuf>,
}

impl MemberGuard {
    fn check<R: Read>(&mut self, entry: &tar::Entry<'_, R>) -> Result<CheckedMember, ExtractionError> {
        let raw_path = entry.path()?.into_owned();
        let relative = self.resolve(&raw_path).ok_or_else(|| traversal(&raw_path))?;

        let entry_type = entry.header().entry_type();
        if !entry_type.is_symlink() && !entry_type.is_hard_link() {
            return Ok(CheckedMember {
                relative,
                hard_link_target: None,
            });
        }

        let Some(link_name) = entry.link_name()? else {
            return Err(traversal(&raw_path));
        };
        if link_name.is_absolute() {
            return Err(traversal(&raw_path));
        }

        if entry_type.is_hard_link() {
            let target = self.resolve(&link_name).ok_or_else(|| traversal(&raw_path))?;
            return Ok(CheckedMember {
                relative,
                hard_link_target: Some(target),
            });
        }

        let link_base = relative.parent().map(Path::to_path_buf).unwrap_or_default();
        if self.resolve(&link_base.join(&link_name)).is_none() {
            return Err(traversal(&raw_path));
        }
        if !relative.as_os_str().is_empty() {
            self.symlinks.insert(relative.clone());
        }
        Ok(CheckedMember {
            relative,
            hard_link_target: None,
        })
    }

    fn resolve(&self, path: &Path) -> Option<PathBuf> {
        resolve_within_root(path, &self.symlinks)
    }
}

/// Lexically resolves `path` against the extraction root.
///
/// Returns `None` for absolute paths, for paths whose `..` components
/// climb above the root, and for paths that continue past one of
/// `symlinks`.
fn resolve_within_root(path: &Path, symlinks: &HashSet<PathBuf>) -> Option<PathBuf> {
    let mut resolved = PathBuf::new();
    for component in path.components() {
        if symlinks.contains(&resolved) {
            return None;
        }
        match component {
            Component::Normal(part) => resolved.push(part),
            Component::CurDir => {}
            Component::ParentDir => {
                if !resolved.pop() {
                    return None;
                }
            }
            Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    Some(resolved)
}

fn traversal(path: &Path) -> ExtractionError {
    ExtractionError::PathTraversal {
        path: path.display().to_string(),
    }
}

fn extract_zip(archive_path: &Path, dest_dir: &Path) -> Result<Vec<String>, ExtractionError> {
    let file = BufReader::new(File::open(archive_path)?);
    let mut archive = zip::ZipArchive::new(file)?;
    if archive.is_empty() {
        return Err(ExtractionError::EmptyArchive);
    }
    let names: Vec<String> = archive.file_names().map(str::to_owned).collect();
    archive.extract(dest_dir)?;
    Ok(names)
}
