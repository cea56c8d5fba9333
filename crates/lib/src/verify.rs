//! Verification of a manifest against what was actually stored.
//!
//! Entries are checked in manifest order and the first mismatch ends the run.
//! Per entry the checks are: existence, type, mode (directories and regular
//! files), modification time, content checksums (regular files) and link
//! target (symlinks).
//!
//! The checks run against anything implementing [`Observed`]: a tree on disk
//! ([`verify`]) or the members of a tar container (`Archive::verify`).

use std::fs::{self, Metadata};
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{ArchiveError, IntegrityReason};
use crate::manifest::{EntryKind, FileInfo, FileType, Manifest, Mtime};
use crate::platform;
use crate::util::hash::{ChecksumAlgorithm, Checksums, checksum_file, parse_algorithms};
use crate::Result;

/// The recorded state of one manifest entry, wherever it lives.
pub(crate) trait Observed {
  /// `None` for objects a manifest cannot describe.
  fn file_type(&self) -> Option<FileType>;
  fn mode(&self) -> u32;
  fn mtime_matches(&self, expected: Mtime) -> bool;
  fn size(&self) -> u64;
  fn checksums(&mut self, algorithms: &[ChecksumAlgorithm]) -> Result<Checksums>;
  fn link_target(&mut self) -> Result<PathBuf>;
}

/// Algorithms declared by `manifest`.
pub(crate) fn declared_algorithms(manifest: &Manifest) -> Result<Vec<ChecksumAlgorithm>> {
  parse_algorithms(manifest.checksums()).map_err(|e| ArchiveError::read(e.to_string()))
}

/// Check every non-metadata entry of `manifest` below `root`.
///
/// Entry paths are resolved relative to `root`. Returns the first
/// [`ArchiveError::Integrity`] found.
pub fn verify(manifest: &Manifest, root: &Path) -> Result<()> {
  let algorithms = declared_algorithms(manifest)?;

  let mut checked = 0usize;
  for entry in manifest.iter().filter(|fi| !manifest.is_metadata(&fi.path)) {
    debug!(path = %entry.path.display(), "verifying");
    let found = OnDisk::stat(root, entry)?;
    check_entry(entry, found, &algorithms)?;
    checked += 1;
  }

  info!(entries = checked, root = %root.display(), "verification passed");
  Ok(())
}

/// Compare one manifest entry with what was found for it.
pub(crate) fn check_entry<O: Observed>(
  entry: &FileInfo,
  found: Option<O>,
  algorithms: &[ChecksumAlgorithm],
) -> Result<()> {
  let fail = |reason| Err(ArchiveError::integrity(&entry.path, reason));
  let Some(mut found) = found else {
    return fail(IntegrityReason::Missing);
  };

  if found.file_type() != Some(entry.file_type()) {
    return fail(IntegrityReason::WrongType);
  }

  if entry.file_type() != FileType::Symlink && found.mode() != entry.mode {
    return fail(IntegrityReason::WrongMode);
  }

  if !found.mtime_matches(entry.mtime) {
    return fail(IntegrityReason::WrongMtime);
  }

  match &entry.kind {
    EntryKind::Regular { size, checksums } => {
      if found.size() != *size {
        return fail(IntegrityReason::Checksum);
      }
      let actual = found.checksums(algorithms)?;
      if !digests_match(checksums, &actual, algorithms) {
        return fail(IntegrityReason::Checksum);
      }
    }
    EntryKind::Symlink { target } => {
      if found.link_target()? != *target {
        return fail(IntegrityReason::WrongTarget);
      }
    }
    EntryKind::Directory => {}
  }

  Ok(())
}

/// Every declared algorithm needs a recorded digest equal to the computed one.
fn digests_match(recorded: &Checksums, actual: &Checksums, algorithms: &[ChecksumAlgorithm]) -> bool {
  algorithms.iter().all(|alg| {
    let name = alg.name();
    matches!((recorded.get(name), actual.get(name)), (Some(r), Some(a)) if r == a)
  })
}

/// An entry found below a verification root.
struct OnDisk<'a> {
  entry: &'a FileInfo,
  full_path: PathBuf,
  metadata: Metadata,
}

impl<'a> OnDisk<'a> {
  fn stat(root: &Path, entry: &'a FileInfo) -> Result<Option<Self>> {
    let full_path = root.join(&entry.path);
    match fs::symlink_metadata(&full_path) {
      Ok(metadata) => Ok(Some(Self {
        entry,
        full_path,
        metadata,
      })),
      Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
      Err(e) => Err(ArchiveError::read_io(&entry.path, e)),
    }
  }
}

impl Observed for OnDisk<'_> {
  fn file_type(&self) -> Option<FileType> {
    let ft = self.metadata.file_type();
    if ft.is_symlink() {
      Some(FileType::Symlink)
    } else if ft.is_dir() {
      Some(FileType::Directory)
    } else if ft.is_file() {
      Some(FileType::Regular)
    } else {
      None
    }
  }

  fn mode(&self) -> u32 {
    platform::mode(&self.metadata)
  }

  fn mtime_matches(&self, expected: Mtime) -> bool {
    platform::mtime(&self.metadata) == expected
  }

  fn size(&self) -> u64 {
    self.metadata.len()
  }

  fn checksums(&mut self, algorithms: &[ChecksumAlgorithm]) -> Result<Checksums> {
    checksum_file(&self.full_path, algorithms).map_err(|e| ArchiveError::read(e.to_string()))
  }

  fn link_target(&mut self) -> Result<PathBuf> {
    fs::read_link(&self.full_path).map_err(|e| ArchiveError::read_io(&self.entry.path, e))
  }
}
