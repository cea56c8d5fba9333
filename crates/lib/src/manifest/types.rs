//! Manifest types.
//!
//! # Structure
//!
//! A [`Manifest`] holds:
//! - the format `version` it was written with
//! - the creation `date`
//! - the ordered list of checksum algorithm names every file digest was computed with
//! - `metadata` paths belonging to the archive's own bookkeeping (the manifest file
//!   itself), which verification and diffing skip
//! - free-form `tags`
//! - the entries, one [`FileInfo`] per filesystem object
//!
//! # Ordering
//!
//! Entries are kept sorted by [`Path`]'s own ordering, which compares path
//! components one by one. A directory therefore sorts directly before all of its
//! descendants and they form one contiguous run, which is what the two-pointer
//! merge in [`crate::diff`] and the subtree filter rely on.

use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::util::hash::Checksums;

/// Modification time with full nanosecond precision.
///
/// `nanos` is always added to `secs`, also for times before the epoch. The
/// serialized form is `"<secs>.<nanos>"` with nine nanosecond digits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Mtime {
  secs: i64,
  nanos: u32,
}

impl Mtime {
  pub fn new(secs: i64, nanos: u32) -> Self {
    Self {
      secs: secs + i64::from(nanos / 1_000_000_000),
      nanos: nanos % 1_000_000_000,
    }
  }

  pub fn secs(self) -> i64 {
    self.secs
  }

  pub fn nanos(self) -> u32 {
    self.nanos
  }

  /// Convert a floating point number of seconds, as found in legacy manifests.
  pub fn from_secs_f64(value: f64) -> Option<Self> {
    if !value.is_finite() {
      return None;
    }
    let secs = value.floor();
    let nanos = ((value - secs) * 1e9).round() as u32;
    Some(Self::new(secs as i64, nanos))
  }

  /// Seconds clamped to what a tar header can carry.
  pub fn tar_secs(self) -> u64 {
    u64::try_from(self.secs).unwrap_or(0)
  }
}

impl fmt::Display for Mtime {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}.{:09}", self.secs, self.nanos)
  }
}

impl FromStr for Mtime {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let invalid = || format!("invalid modification time '{}'", s);
    match s.split_once('.') {
      None => s.parse::<i64>().map(|secs| Mtime::new(secs, 0)).map_err(|_| invalid()),
      Some((secs, frac)) => {
        if frac.is_empty() || frac.len() > 9 || !frac.bytes().all(|b| b.is_ascii_digit()) {
          return Err(invalid());
        }
        let secs = secs.parse::<i64>().map_err(|_| invalid())?;
        let nanos = format!("{:0<9}", frac).parse::<u32>().map_err(|_| invalid())?;
        Ok(Mtime::new(secs, nanos))
      }
    }
  }
}

impl Serialize for Mtime {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(self)
  }
}

impl<'de> Deserialize<'de> for Mtime {
  fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    struct MtimeVisitor;

    impl Visitor<'_> for MtimeVisitor {
      type Value = Mtime;

      fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a modification time in seconds")
      }

      fn visit_i64<E: de::Error>(self, v: i64) -> Result<Mtime, E> {
        Ok(Mtime::new(v, 0))
      }

      fn visit_u64<E: de::Error>(self, v: u64) -> Result<Mtime, E> {
        i64::try_from(v)
          .map(|secs| Mtime::new(secs, 0))
          .map_err(|_| E::custom("modification time out of range"))
      }

      fn visit_f64<E: de::Error>(self, v: f64) -> Result<Mtime, E> {
        Mtime::from_secs_f64(v).ok_or_else(|| E::custom("modification time is not finite"))
      }

      fn visit_str<E: de::Error>(self, v: &str) -> Result<Mtime, E> {
        v.parse().map_err(E::custom)
      }
    }

    deserializer.deserialize_any(MtimeVisitor)
  }
}

/// Kind of a filesystem entry that can be recorded in a manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FileType {
  #[serde(rename = "f")]
  Regular,
  #[serde(rename = "d")]
  Directory,
  #[serde(rename = "l")]
  Symlink,
}

impl FileType {
  /// One-letter code used in the serialized manifest.
  pub fn code(self) -> char {
    match self {
      FileType::Regular => 'f',
      FileType::Directory => 'd',
      FileType::Symlink => 'l',
    }
  }
}

impl fmt::Display for FileType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      FileType::Regular => "regular file",
      FileType::Directory => "directory",
      FileType::Symlink => "symbolic link",
    };
    f.write_str(name)
  }
}

/// Type-specific attributes of an entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub enum EntryKind {
  #[serde(rename = "f")]
  Regular { size: u64, checksums: Checksums },
  #[serde(rename = "d")]
  Directory,
  #[serde(rename = "l")]
  Symlink { target: PathBuf },
}

/// Recorded attributes of one filesystem entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileInfo {
  /// Slash separated path, relative to the directory the manifest was built in.
  pub path: PathBuf,
  /// Permission bits. Recorded for symlinks too, but never compared for them.
  pub mode: u32,
  pub mtime: Mtime,
  #[serde(flatten)]
  pub kind: EntryKind,
}

impl FileInfo {
  pub fn file_type(&self) -> FileType {
    match self.kind {
      EntryKind::Regular { .. } => FileType::Regular,
      EntryKind::Directory => FileType::Directory,
      EntryKind::Symlink { .. } => FileType::Symlink,
    }
  }

  pub fn is_dir(&self) -> bool {
    matches!(self.kind, EntryKind::Directory)
  }

  pub fn size(&self) -> Option<u64> {
    match &self.kind {
      EntryKind::Regular { size, .. } => Some(*size),
      _ => None,
    }
  }

  pub fn checksums(&self) -> Option<&Checksums> {
    match &self.kind {
      EntryKind::Regular { checksums, .. } => Some(checksums),
      _ => None,
    }
  }

  /// Digest of a regular file under `algorithm`, if recorded.
  pub fn checksum(&self, algorithm: &str) -> Option<&str> {
    self.checksums()?.get(algorithm).map(String::as_str)
  }

  pub fn target(&self) -> Option<&Path> {
    match &self.kind {
      EntryKind::Symlink { target } => Some(target),
      _ => None,
    }
  }
}

/// Immutable snapshot of a directory tree.
#[derive(Debug, Clone, PartialEq)]
pub struct Manifest {
  version: String,
  date: DateTime<Utc>,
  checksums: Vec<String>,
  metadata: Vec<PathBuf>,
  tags: Vec<String>,
  entries: Vec<FileInfo>,
}

/// Archive-level fields of a manifest, everything but the entries.
#[derive(Debug, Clone, PartialEq)]
pub struct ManifestHeader {
  pub version: String,
  pub date: DateTime<Utc>,
  pub checksums: Vec<String>,
  pub metadata: Vec<PathBuf>,
  pub tags: Vec<String>,
}

impl Manifest {
  /// Assemble a manifest, putting the entries into path order.
  pub(crate) fn from_parts(header: ManifestHeader, mut entries: Vec<FileInfo>) -> Self {
    entries.sort_by(|a, b| a.path.cmp(&b.path));
    Self {
      version: header.version,
      date: header.date,
      checksums: header.checksums,
      metadata: header.metadata,
      tags: header.tags,
      entries,
    }
  }

  /// Record `path` as bookkeeping unless it already is.
  pub(crate) fn with_metadata_path(mut self, path: PathBuf) -> Self {
    if !self.metadata.contains(&path) {
      self.metadata.push(path);
    }
    self
  }

  pub fn version(&self) -> &str {
    &self.version
  }

  pub fn date(&self) -> DateTime<Utc> {
    self.date
  }

  /// Checksum algorithm names, in the order they were declared.
  pub fn checksums(&self) -> &[String] {
    &self.checksums
  }

  pub fn metadata(&self) -> &[PathBuf] {
    &self.metadata
  }

  pub fn tags(&self) -> &[String] {
    &self.tags
  }

  pub fn entries(&self) -> &[FileInfo] {
    &self.entries
  }

  pub fn iter(&self) -> std::slice::Iter<'_, FileInfo> {
    self.entries.iter()
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  /// Look up an entry by its exact path.
  pub fn find(&self, path: &Path) -> Option<&FileInfo> {
    self
      .entries
      .binary_search_by(|fi| fi.path.as_path().cmp(path))
      .ok()
      .map(|idx| &self.entries[idx])
  }

  /// Whether `path` is part of the archive's own bookkeeping.
  pub fn is_metadata(&self, path: &Path) -> bool {
    self.metadata.iter().any(|p| p == path)
  }

  /// The single top-level directory all entries live under, if there is one.
  pub fn base_dir(&self) -> Option<&Path> {
    let first = self.entries.first()?;
    let base = match first.path.components().next()? {
      c @ Component::Normal(_) => Path::new(c.as_os_str()),
      _ => return None,
    };
    self.entries.iter().all(|fi| fi.path.starts_with(base)).then_some(base)
  }

  /// First path that occurs more than once, if any.
  pub(crate) fn first_duplicate(&self) -> Option<&Path> {
    self
      .entries
      .windows(2)
      .find(|pair| pair[0].path == pair[1].path)
      .map(|pair| pair[0].path.as_path())
  }
}

impl<'a> IntoIterator for &'a Manifest {
  type Item = &'a FileInfo;
  type IntoIter = std::slice::Iter<'a, FileInfo>;

  fn into_iter(self) -> Self::IntoIter {
    self.entries.iter()
  }
}
