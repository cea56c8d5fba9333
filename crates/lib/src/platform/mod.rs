//! Filesystem attribute access.
//!
//! Permission bits, exact modification times and special file detection are
//! Unix concepts; everything that touches them goes through this module.

use std::fs::{self, Metadata};
use std::io;
use std::os::unix::fs::{FileTypeExt, MetadataExt, PermissionsExt};
use std::path::Path;

use rustix::fs::{AtFlags, CWD, Timespec, Timestamps};

use crate::manifest::Mtime;

/// Permission bits (including setuid, setgid and sticky) of an entry.
pub fn mode(metadata: &Metadata) -> u32 {
  metadata.mode() & 0o7777
}

/// Exact modification time of an entry.
pub fn mtime(metadata: &Metadata) -> Mtime {
  Mtime::new(metadata.mtime(), metadata.mtime_nsec() as u32)
}

/// Name of a file type that cannot be put into a manifest.
pub fn unsupported_kind(file_type: &fs::FileType) -> &'static str {
  if file_type.is_socket() {
    "socket"
  } else if file_type.is_fifo() {
    "fifo"
  } else if file_type.is_block_device() {
    "block device"
  } else if file_type.is_char_device() {
    "character device"
  } else {
    "unknown"
  }
}

pub fn set_mode(path: &Path, mode: u32) -> io::Result<()> {
  fs::set_permissions(path, fs::Permissions::from_mode(mode))
}

/// Set access and modification time of `path` to `mtime` without following symlinks.
pub fn set_mtime(path: &Path, mtime: Mtime) -> io::Result<()> {
  let ts = Timespec {
    tv_sec: mtime.secs(),
    tv_nsec: mtime.nanos() as _,
  };
  let times = Timestamps {
    last_access: ts,
    last_modification: ts,
  };
  rustix::fs::utimensat(CWD, path, &times, AtFlags::SYMLINK_NOFOLLOW)?;
  Ok(())
}
