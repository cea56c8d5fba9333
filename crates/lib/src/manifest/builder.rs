//! Building manifests from the filesystem.

use std::fs;
use std::path::{Component, Path, PathBuf};

use chrono::Utc;
use tracing::{debug, info};
use walkdir::WalkDir;

use super::types::{EntryKind, FileInfo, Manifest, ManifestHeader};
use crate::consts::{DEFAULT_CHECKSUMS, MANIFEST_VERSION};
use crate::error::ArchiveError;
use crate::platform;
use crate::util::hash::{ChecksumAlgorithm, checksum_file, parse_algorithms};
use crate::Result;

/// Walks directory trees and records every entry into a [`Manifest`].
///
/// Roots are relative paths, resolved against the working directory (the
/// current directory unless [`ManifestBuilder::workdir`] says otherwise), and
/// recorded in the manifest exactly as given.
#[derive(Debug, Clone)]
pub struct ManifestBuilder {
  workdir: PathBuf,
  checksums: Vec<String>,
  excludes: Vec<PathBuf>,
  metadata: Vec<PathBuf>,
  tags: Vec<String>,
}

impl Default for ManifestBuilder {
  fn default() -> Self {
    Self::new()
  }
}

impl ManifestBuilder {
  pub fn new() -> Self {
    Self {
      workdir: PathBuf::from("."),
      checksums: DEFAULT_CHECKSUMS.iter().map(|s| s.to_string()).collect(),
      excludes: Vec::new(),
      metadata: Vec::new(),
      tags: Vec::new(),
    }
  }

  pub fn workdir(mut self, dir: impl Into<PathBuf>) -> Self {
    self.workdir = dir.into();
    self
  }

  /// Checksum algorithms to compute for every regular file, in declaration order.
  pub fn checksums<I, S>(mut self, names: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.checksums = names.into_iter().map(Into::into).collect();
    self
  }

  /// Skip `path` and everything below it.
  pub fn exclude(mut self, path: impl Into<PathBuf>) -> Self {
    self.excludes.push(path.into());
    self
  }

  /// Record `path` as archive bookkeeping.
  pub fn metadata_path(mut self, path: impl Into<PathBuf>) -> Self {
    self.metadata.push(path.into());
    self
  }

  pub fn tag(mut self, tag: impl Into<String>) -> Self {
    self.tags.push(tag.into());
    self
  }

  /// Walk all `roots` and produce the manifest.
  ///
  /// Fails with [`ArchiveError::InvalidType`] on sockets, FIFOs and device nodes.
  pub fn build<P: AsRef<Path>>(&self, roots: &[P]) -> Result<Manifest> {
    let algorithms = parse_algorithms(&self.checksums).map_err(|e| ArchiveError::create(e.to_string()))?;
    if roots.is_empty() {
      return Err(ArchiveError::create("no paths to archive"));
    }

    let excludes = self
      .excludes
      .iter()
      .map(|ex| normalize_root(ex))
      .collect::<Result<Vec<_>>>()?;

    let mut entries = Vec::new();
    for root in roots {
      let root = normalize_root(root.as_ref())?;
      self.walk_root(&root, &excludes, &algorithms, &mut entries)?;
    }

    entries.sort_by(|a, b| a.path.cmp(&b.path));
    entries.dedup_by(|a, b| a.path == b.path);

    let header = ManifestHeader {
      version: MANIFEST_VERSION.to_string(),
      date: Utc::now(),
      checksums: algorithms.iter().map(|alg| alg.name().to_string()).collect(),
      metadata: self.metadata.clone(),
      tags: self.tags.clone(),
    };
    let manifest = Manifest::from_parts(header, entries);
    info!(entries = manifest.len(), "manifest built");
    Ok(manifest)
  }

  fn walk_root(
    &self,
    root: &Path,
    excludes: &[PathBuf],
    algorithms: &[ChecksumAlgorithm],
    entries: &mut Vec<FileInfo>,
  ) -> Result<()> {
    let abs_root = self.workdir.join(root);
    fs::symlink_metadata(&abs_root).map_err(|e| ArchiveError::create_io(root, e))?;

    let walker = WalkDir::new(&abs_root)
      .follow_links(false)
      .follow_root_links(false)
      .sort_by_file_name()
      .into_iter()
      .filter_entry(|e| {
        let rel = relative_path(root, &abs_root, e.path());
        let excluded = excludes.iter().any(|ex| *ex == rel);
        if excluded {
          debug!(path = %rel.display(), "excluding");
        }
        !excluded
      });

    for entry in walker {
      let entry = entry.map_err(|e| ArchiveError::create(e.to_string()))?;
      let path = relative_path(root, &abs_root, entry.path());
      let metadata = entry.metadata().map_err(|e| ArchiveError::create(e.to_string()))?;
      let file_type = entry.file_type();

      let kind = if file_type.is_file() {
        let checksums = checksum_file(entry.path(), algorithms).map_err(|e| ArchiveError::create(e.to_string()))?;
        EntryKind::Regular {
          size: metadata.len(),
          checksums,
        }
      } else if file_type.is_dir() {
        EntryKind::Directory
      } else if file_type.is_symlink() {
        let target = fs::read_link(entry.path()).map_err(|e| ArchiveError::create_io(&path, e))?;
        EntryKind::Symlink { target }
      } else {
        return Err(ArchiveError::InvalidType {
          path,
          kind: platform::unsupported_kind(&file_type),
        });
      };

      debug!(path = %path.display(), "adding entry");
      entries.push(FileInfo {
        path,
        mode: platform::mode(&metadata),
        mtime: platform::mtime(&metadata),
        kind,
      });
    }

    Ok(())
  }
}

/// Path of a walked entry as it is recorded: `root` followed by the part below it.
fn relative_path(root: &Path, abs_root: &Path, entry: &Path) -> PathBuf {
  match entry.strip_prefix(abs_root) {
    Ok(rest) if rest.as_os_str().is_empty() => root.to_path_buf(),
    Ok(rest) => root.join(rest),
    Err(_) => entry.to_path_buf(),
  }
}

/// Drop `.` components and reject anything that could leave the working directory.
pub(crate) fn normalize_root(root: &Path) -> Result<PathBuf> {
  let mut normalized = PathBuf::new();
  for component in root.components() {
    match component {
      Component::Normal(part) => normalized.push(part),
      Component::CurDir => {}
      Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
        return Err(ArchiveError::create(format!(
          "invalid path {}: must be relative and must not contain '..'",
          root.display()
        )));
      }
    }
  }
  if normalized.as_os_str().is_empty() {
    return Err(ArchiveError::create(format!("invalid path {}: empty", root.display())));
  }
  Ok(normalized)
}
