//! Error types for archive operations.
//!
//! Every failure surfaces as one of four kinds. Lower-level errors (I/O, walkdir,
//! YAML, tar) are rendered into the message of a fresh value instead of being kept
//! as a source, so what the user sees is a single line describing what went wrong.

use std::fmt;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Why a manifest entry does not match the filesystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntegrityReason {
  Missing,
  WrongType,
  WrongMode,
  WrongMtime,
  Checksum,
  WrongTarget,
}

impl IntegrityReason {
  pub fn as_str(self) -> &'static str {
    match self {
      IntegrityReason::Missing => "missing",
      IntegrityReason::WrongType => "wrong type",
      IntegrityReason::WrongMode => "wrong mode",
      IntegrityReason::WrongMtime => "wrong modification time",
      IntegrityReason::Checksum => "checksum",
      IntegrityReason::WrongTarget => "wrong symlink target",
    }
  }
}

impl fmt::Display for IntegrityReason {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

#[derive(Debug, Error)]
pub enum ArchiveError {
  /// Building a manifest or writing a container failed.
  #[error("{message}")]
  Create { message: String },

  /// Opening or decoding a container or manifest failed.
  #[error("{message}")]
  Read { message: String },

  /// A manifest entry does not match what is on disk.
  #[error("{}: {reason}", path.display())]
  Integrity { path: PathBuf, reason: IntegrityReason },

  /// The builder met a filesystem object it cannot record.
  #[error("{}: unsupported file type {kind}", path.display())]
  InvalidType { path: PathBuf, kind: &'static str },
}

impl ArchiveError {
  pub fn create(message: impl Into<String>) -> Self {
    ArchiveError::Create {
      message: message.into(),
    }
  }

  pub fn read(message: impl Into<String>) -> Self {
    ArchiveError::Read {
      message: message.into(),
    }
  }

  pub fn integrity(path: &Path, reason: IntegrityReason) -> Self {
    ArchiveError::Integrity {
      path: path.to_path_buf(),
      reason,
    }
  }

  /// Wraps an I/O failure on `path` as a create error.
  pub(crate) fn create_io(path: &Path, err: impl fmt::Display) -> Self {
    Self::create(format!("{}: {}", path.display(), err))
  }

  /// Wraps an I/O failure on `path` as a read error.
  pub(crate) fn read_io(path: &Path, err: impl fmt::Display) -> Self {
    Self::read(format!("{}: {}", path.display(), err))
  }
}
