//! Serialized form of a manifest.
//!
//! The manifest travels as a YAML document. `version` is read first and picks
//! the decoder, so manifests written by every earlier format version stay
//! readable:
//!
//! - `1.0`: `mtime` is a float number of seconds, file digests are stored under
//!   `checksum`, `metadata` may be absent.
//! - `1.1`: `mtime` is the exact `"<secs>.<nanos>"` string, digests are stored
//!   under `checksums`, optional `tags`.
//!
//! Encoding always writes the current version.

use std::path::PathBuf;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use tracing::debug;

use super::types::{EntryKind, FileInfo, FileType, Manifest, ManifestHeader, Mtime};
use crate::consts::MANIFEST_VERSION;
use crate::error::ArchiveError;
use crate::util::hash::Checksums;
use crate::Result;

/// Every manifest version [`decode`] understands.
pub const SUPPORTED_VERSIONS: &[&str] = &["1.0", "1.1"];

#[derive(Debug, Deserialize)]
struct ManifestV1_0 {
  date: String,
  checksums: Vec<String>,
  #[serde(default)]
  metadata: Vec<PathBuf>,
  #[serde(default)]
  entries: Vec<EntryV1_0>,
}

#[derive(Debug, Deserialize)]
struct EntryV1_0 {
  path: PathBuf,
  #[serde(rename = "type")]
  file_type: FileType,
  mode: u32,
  mtime: Mtime,
  size: Option<u64>,
  #[serde(default)]
  checksum: Checksums,
  target: Option<PathBuf>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ManifestV1_1 {
  version: String,
  date: DateTime<Utc>,
  checksums: Vec<String>,
  #[serde(default)]
  metadata: Vec<PathBuf>,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  tags: Vec<String>,
  #[serde(default)]
  entries: Vec<EntryV1_1>,
}

#[derive(Debug, Serialize, Deserialize)]
struct EntryV1_1 {
  path: PathBuf,
  #[serde(rename = "type")]
  file_type: FileType,
  mode: u32,
  mtime: Mtime,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  size: Option<u64>,
  #[serde(default, skip_serializing_if = "Checksums::is_empty")]
  checksums: Checksums,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  target: Option<PathBuf>,
}

/// Type-dependent fields of a serialized entry, whatever version it came from.
struct RawEntry {
  path: PathBuf,
  file_type: FileType,
  mode: u32,
  mtime: Mtime,
  size: Option<u64>,
  checksums: Checksums,
  target: Option<PathBuf>,
}

impl RawEntry {
  fn into_file_info(self) -> Result<FileInfo> {
    let kind = match self.file_type {
      FileType::Regular => EntryKind::Regular {
        size: self.size.ok_or_else(|| invalid_entry(&self.path, "regular file without size"))?,
        checksums: self.checksums,
      },
      FileType::Directory => EntryKind::Directory,
      FileType::Symlink => EntryKind::Symlink {
        target: self
          .target
          .ok_or_else(|| invalid_entry(&self.path, "symbolic link without target"))?,
      },
    };
    Ok(FileInfo {
      path: self.path,
      mode: self.mode,
      mtime: self.mtime,
      kind,
    })
  }
}

impl From<EntryV1_0> for RawEntry {
  fn from(e: EntryV1_0) -> Self {
    RawEntry {
      path: e.path,
      file_type: e.file_type,
      mode: e.mode,
      mtime: e.mtime,
      size: e.size,
      checksums: e.checksum,
      target: e.target,
    }
  }
}

impl From<EntryV1_1> for RawEntry {
  fn from(e: EntryV1_1) -> Self {
    RawEntry {
      path: e.path,
      file_type: e.file_type,
      mode: e.mode,
      mtime: e.mtime,
      size: e.size,
      checksums: e.checksums,
      target: e.target,
    }
  }
}

impl From<&FileInfo> for EntryV1_1 {
  fn from(fi: &FileInfo) -> Self {
    let (size, checksums, target) = match &fi.kind {
      EntryKind::Regular { size, checksums } => (Some(*size), checksums.clone(), None),
      EntryKind::Directory => (None, Checksums::new(), None),
      EntryKind::Symlink { target } => (None, Checksums::new(), Some(target.clone())),
    };
    EntryV1_1 {
      path: fi.path.clone(),
      file_type: fi.file_type(),
      mode: fi.mode,
      mtime: fi.mtime,
      size,
      checksums,
      target,
    }
  }
}

fn invalid_entry(path: &std::path::Path, what: &str) -> ArchiveError {
  ArchiveError::read(format!("invalid manifest entry {}: {}", path.display(), what))
}

fn yaml_error(err: serde_yaml::Error) -> ArchiveError {
  ArchiveError::read(format!("invalid manifest: {}", err))
}

/// Read the `version` discriminant. Unquoted versions come back from YAML as numbers.
fn version_of(doc: &Value) -> Result<String> {
  match doc.get("version") {
    Some(Value::String(s)) => Ok(s.clone()),
    Some(Value::Number(n)) => Ok(n.as_f64().map(|f| format!("{:?}", f)).unwrap_or_else(|| n.to_string())),
    Some(_) => Err(ArchiveError::read("invalid manifest: version is not a string")),
    None => Err(ArchiveError::read("invalid manifest: missing version")),
  }
}

/// Legacy dates were written as plain `YYYY-MM-DD HH:MM:SS[.f]` timestamps.
fn parse_legacy_date(s: &str) -> Result<DateTime<Utc>> {
  if let Ok(date) = DateTime::parse_from_rfc3339(s) {
    return Ok(date.with_timezone(&Utc));
  }
  for fmt in ["%Y-%m-%d %H:%M:%S%.f%:z", "%Y-%m-%d %H:%M:%S%.f%z"] {
    if let Ok(date) = DateTime::parse_from_str(s, fmt) {
      return Ok(date.with_timezone(&Utc));
    }
  }
  NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f")
    .map(|naive| naive.and_utc())
    .map_err(|_| ArchiveError::read(format!("invalid manifest: bad date '{}'", s)))
}

/// Decode a serialized manifest of any supported version.
pub fn decode(bytes: &[u8]) -> Result<Manifest> {
  let doc: Value = serde_yaml::from_slice(bytes).map_err(yaml_error)?;
  let version = version_of(&doc)?;
  debug!(version = %version, "decoding manifest");

  let (header, raw): (ManifestHeader, Vec<RawEntry>) = match version.as_str() {
    "1.0" => {
      let m: ManifestV1_0 = serde_yaml::from_value(doc).map_err(yaml_error)?;
      let header = ManifestHeader {
        version,
        date: parse_legacy_date(&m.date)?,
        checksums: m.checksums,
        metadata: m.metadata,
        tags: Vec::new(),
      };
      (header, m.entries.into_iter().map(RawEntry::from).collect())
    }
    "1.1" => {
      let m: ManifestV1_1 = serde_yaml::from_value(doc).map_err(yaml_error)?;
      let header = ManifestHeader {
        version,
        date: m.date,
        checksums: m.checksums,
        metadata: m.metadata,
        tags: m.tags,
      };
      (header, m.entries.into_iter().map(RawEntry::from).collect())
    }
    other => {
      return Err(ArchiveError::read(format!("unsupported manifest version {}", other)));
    }
  };

  let entries = raw.into_iter().map(RawEntry::into_file_info).collect::<Result<Vec<_>>>()?;
  let manifest = Manifest::from_parts(header, entries);
  if let Some(path) = manifest.first_duplicate() {
    return Err(invalid_entry(path, "duplicate path"));
  }
  for fi in manifest.iter().filter(|fi| fi.file_type() == FileType::Regular) {
    if let Some(alg) = manifest.checksums().iter().find(|alg| fi.checksum(alg).is_none()) {
      return Err(invalid_entry(&fi.path, &format!("no {} checksum", alg)));
    }
  }
  Ok(manifest)
}

/// Serialize a manifest in the current format version.
pub fn encode(manifest: &Manifest) -> Result<Vec<u8>> {
  let doc = ManifestV1_1 {
    version: MANIFEST_VERSION.to_string(),
    date: manifest.date(),
    checksums: manifest.checksums().to_vec(),
    metadata: manifest.metadata().to_vec(),
    tags: manifest.tags().to_vec(),
    entries: manifest.iter().map(EntryV1_1::from).collect(),
  };
  let text = serde_yaml::to_string(&doc).map_err(|e| ArchiveError::create(format!("cannot encode manifest: {}", e)))?;
  Ok(text.into_bytes())
}
