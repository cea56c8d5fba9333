//! Diff computation between manifests.
//!
//! [`diff_manifests`] merges two manifests entry by entry and lazily yields one
//! [`DiffItem`] per difference. Both entry lists are in path order, so a
//! two-pointer walk classifies every path in a single forward pass.
//!
//! When both manifests have a single base directory, entries are matched by
//! their path relative to it, so archives of the same tree stored under
//! different top-level names compare equal. Bookkeeping paths of either manifest are ignored.
//!
//! [`SkipDirContent`] is an optional stage on top of the raw stream that drops
//! everything below a directory that was just reported as missing.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::iter::Peekable;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::ArchiveError;
use crate::manifest::{EntryKind, FileInfo, FileType, Manifest};
use crate::Result;

/// Classification of a single difference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiffStatus {
  /// Present in B only.
  MissingA,
  /// Present in A only.
  MissingB,
  /// Entries of different type.
  Type,
  /// Symlinks pointing to different targets.
  SymlinkTarget,
  /// Regular files with different content.
  Content,
  /// Same content, different mode or modification time.
  Meta,
}

/// How serious a difference is. Ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
  Meta,
  Content,
  Structure,
}

impl DiffStatus {
  pub fn severity(self) -> Severity {
    match self {
      DiffStatus::Meta => Severity::Meta,
      DiffStatus::Content | DiffStatus::SymlinkTarget => Severity::Content,
      DiffStatus::MissingA | DiffStatus::MissingB | DiffStatus::Type => Severity::Structure,
    }
  }
}

/// One reported difference with the entry from each side that has one.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiffItem<'a> {
  pub status: DiffStatus,
  pub a: Option<&'a FileInfo>,
  pub b: Option<&'a FileInfo>,
}

impl<'a> DiffItem<'a> {
  /// Path of the entry this item is about, taken from A when A has it.
  pub fn path(&self) -> &'a Path {
    match (self.a, self.b) {
      (Some(fi), _) | (None, Some(fi)) => &fi.path,
      (None, None) => Path::new(""),
    }
  }

  /// The entry that exists only on one side, for `MissingA`/`MissingB`.
  fn present(&self) -> Option<&'a FileInfo> {
    match self.status {
      DiffStatus::MissingA => self.b,
      DiffStatus::MissingB => self.a,
      _ => None,
    }
  }
}

/// Pick the checksum algorithm to compare content with.
///
/// This is the first algorithm in A's declared order that B also declares.
pub fn common_checksum<'m>(a: &'m Manifest, b: &Manifest) -> Result<&'m str> {
  a.checksums()
    .iter()
    .find(|alg| b.checksums().contains(alg))
    .map(String::as_str)
    .ok_or_else(|| ArchiveError::read("No common checksum algorithm, cannot compare archive content."))
}

/// Negotiate a checksum algorithm and start diffing `a` against `b`.
///
/// Fails before producing anything when the manifests share no algorithm.
pub fn diff_manifests<'a>(a: &'a Manifest, b: &'a Manifest) -> Result<ManifestDiff<'a>> {
  let algorithm = common_checksum(a, b)?;
  debug!(algorithm, "comparing manifests");
  Ok(ManifestDiff::new(a, b, algorithm))
}

/// Path of an entry relative to its manifest's base directory.
fn relative_key<'p>(base: Option<&Path>, path: &'p Path) -> &'p Path {
  match base {
    Some(base) => path.strip_prefix(base).unwrap_or(path),
    None => path,
  }
}

/// Yields `(key, entry)` pairs of one manifest, skipping bookkeeping paths.
struct Keyed<'a> {
  entries: std::slice::Iter<'a, FileInfo>,
  base: Option<&'a Path>,
  skip: HashSet<PathBuf>,
}

impl<'a> Keyed<'a> {
  fn new(manifest: &'a Manifest, base: Option<&'a Path>, skip: HashSet<PathBuf>) -> Self {
    Self {
      entries: manifest.entries().iter(),
      base,
      skip,
    }
  }
}

impl<'a> Iterator for Keyed<'a> {
  type Item = (&'a Path, &'a FileInfo);

  fn next(&mut self) -> Option<Self::Item> {
    let base = self.base;
    let skip = &self.skip;
    self
      .entries
      .by_ref()
      .map(|fi| (relative_key(base, &fi.path), fi))
      .find(|(key, _)| !skip.contains(*key))
  }
}

/// Lazy two-pointer merge of two manifests.
///
/// Each call to `next` advances at least one side, so the stream ends after at
/// most `a.len() + b.len()` steps.
pub struct ManifestDiff<'a> {
  a: Peekable<Keyed<'a>>,
  b: Peekable<Keyed<'a>>,
  algorithm: &'a str,
}

impl<'a> ManifestDiff<'a> {
  /// Diff with an explicitly chosen algorithm. Prefer [`diff_manifests`].
  pub fn new(a: &'a Manifest, b: &'a Manifest, algorithm: &'a str) -> Self {
    // Base directories are only stripped when both sides have one.
    let (base_a, base_b) = match (a.base_dir(), b.base_dir()) {
      (Some(x), Some(y)) => (Some(x), Some(y)),
      _ => (None, None),
    };
    let skip: HashSet<PathBuf> = a
      .metadata()
      .iter()
      .map(|p| relative_key(base_a, p))
      .chain(b.metadata().iter().map(|p| relative_key(base_b, p)))
      .map(Path::to_path_buf)
      .collect();

    Self {
      a: Keyed::new(a, base_a, skip.clone()).peekable(),
      b: Keyed::new(b, base_b, skip).peekable(),
      algorithm,
    }
  }

  pub fn algorithm(&self) -> &'a str {
    self.algorithm
  }

  /// Compare two entries stored under the same path.
  fn compare(&self, a: &FileInfo, b: &FileInfo) -> Option<DiffStatus> {
    match (&a.kind, &b.kind) {
      _ if a.file_type() != b.file_type() => return Some(DiffStatus::Type),
      (EntryKind::Symlink { target: ta }, EntryKind::Symlink { target: tb }) if ta != tb => {
        return Some(DiffStatus::SymlinkTarget);
      }
      (EntryKind::Regular { size: sa, .. }, EntryKind::Regular { size: sb, .. })
        if sa != sb || a.checksum(self.algorithm) != b.checksum(self.algorithm) =>
      {
        return Some(DiffStatus::Content);
      }
      _ => {}
    }

    let mode_differs = a.file_type() != FileType::Symlink && a.mode != b.mode;
    (mode_differs || a.mtime != b.mtime).then_some(DiffStatus::Meta)
  }
}

impl<'a> Iterator for ManifestDiff<'a> {
  type Item = DiffItem<'a>;

  fn next(&mut self) -> Option<Self::Item> {
    loop {
      let order = match (self.a.peek(), self.b.peek()) {
        (None, None) => return None,
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (Some((ka, _)), Some((kb, _))) => ka.cmp(kb),
      };

      match order {
        Ordering::Less => {
          let (_, fa) = self.a.next()?;
          return Some(DiffItem {
            status: DiffStatus::MissingB,
            a: Some(fa),
            b: None,
          });
        }
        Ordering::Greater => {
          let (_, fb) = self.b.next()?;
          return Some(DiffItem {
            status: DiffStatus::MissingA,
            a: None,
            b: Some(fb),
          });
        }
        Ordering::Equal => {
          let (_, fa) = self.a.next()?;
          let (_, fb) = self.b.next()?;
          if let Some(status) = self.compare(fa, fb) {
            return Some(DiffItem {
              status,
              a: Some(fa),
              b: Some(fb),
            });
          }
        }
      }
    }
  }
}

/// Drops the content of directories reported as missing on one side.
///
/// Holds at most one directory at a time. Because a directory's descendants
/// directly follow it in path order, the directory stays active until the first
/// item outside of it, and nested missing directories are covered by the outer
/// one.
pub struct SkipDirContent<'a, I> {
  inner: I,
  skip: Option<&'a Path>,
}

impl<'a, I> Iterator for SkipDirContent<'a, I>
where
  I: Iterator<Item = DiffItem<'a>>,
{
  type Item = DiffItem<'a>;

  fn next(&mut self) -> Option<Self::Item> {
    for item in self.inner.by_ref() {
      if let Some(dir) = self.skip {
        let path = item.path();
        if path != dir && path.starts_with(dir) {
          continue;
        }
      }
      self.skip = item.present().filter(|fi| fi.is_dir()).map(|fi| fi.path.as_path());
      return Some(item);
    }
    None
  }
}

/// Adds [`skip_dir_content`](DiffExt::skip_dir_content) to any stream of diff items.
pub trait DiffExt<'a>: Iterator<Item = DiffItem<'a>> + Sized {
  fn skip_dir_content(self) -> SkipDirContent<'a, Self> {
    SkipDirContent { inner: self, skip: None }
  }
}

impl<'a, I: Iterator<Item = DiffItem<'a>>> DiffExt<'a> for I {}
