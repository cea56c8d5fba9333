//! Attributes of container members.
//!
//! Tar headers only hold whole seconds. Every entry written by
//! `Archive::create` is preceded by a PAX extended header carrying the exact
//! `mtime`, which is read back here. Members without one are compared at
//! whole-second precision.

use std::borrow::Cow;
use std::io::{self, Read, Write};
use std::mem;
use std::path::{Path, PathBuf};

use tar::{Entry, EntryType, Header};

use crate::error::ArchiveError;
use crate::manifest::{FileType, Mtime};
use crate::util::hash::{ChecksumAlgorithm, Checksums, checksum_reader};
use crate::verify::Observed;
use crate::Result;

const PAX_MTIME: &str = "mtime";
const PAX_HEADER_NAME: &str = "PaxHeader";

/// One container member, as far as a manifest entry can describe it.
#[derive(Debug)]
pub(super) struct Member {
  pub(super) file_type: Option<FileType>,
  pub(super) mode: u32,
  pub(super) mtime: Mtime,
  exact_mtime: bool,
  size: u64,
  checksums: Checksums,
  target: Option<PathBuf>,
}

impl Member {
  /// Attributes from the header and its extensions. Leaves the content unread.
  pub(super) fn from_header<R: Read>(entry: &mut Entry<'_, R>, path: &Path) -> Result<Self> {
    let io_err = |e: io::Error| ArchiveError::read_io(path, e);

    let (mtime, exact_mtime) = member_mtime(entry).map_err(io_err)?;
    let header = entry.header();
    let file_type = match header.entry_type() {
      EntryType::Regular | EntryType::Continuous => Some(FileType::Regular),
      EntryType::Directory => Some(FileType::Directory),
      EntryType::Symlink => Some(FileType::Symlink),
      _ => None,
    };
    let mode = header.mode().map_err(io_err)? & 0o7777;
    let target = match file_type {
      Some(FileType::Symlink) => entry.link_name().map_err(io_err)?.map(Cow::into_owned),
      _ => None,
    };

    Ok(Self {
      file_type,
      mode,
      mtime,
      exact_mtime,
      size: entry.size(),
      checksums: Checksums::new(),
      target,
    })
  }

  /// Consume the content of a regular file member and record its digests.
  pub(super) fn digest<R: Read>(
    mut self,
    entry: &mut Entry<'_, R>,
    path: &Path,
    algorithms: &[ChecksumAlgorithm],
  ) -> Result<Self> {
    if self.file_type == Some(FileType::Regular) {
      self.checksums = checksum_reader(&mut *entry, algorithms, &path.display().to_string())
        .map_err(|e| ArchiveError::read(e.to_string()))?;
    }
    Ok(self)
  }
}

impl Observed for Member {
  fn file_type(&self) -> Option<FileType> {
    self.file_type
  }

  fn mode(&self) -> u32 {
    self.mode
  }

  fn mtime_matches(&self, expected: Mtime) -> bool {
    if self.exact_mtime {
      self.mtime == expected
    } else {
      self.mtime.secs() == expected.secs()
    }
  }

  fn size(&self) -> u64 {
    self.size
  }

  fn checksums(&mut self, _algorithms: &[ChecksumAlgorithm]) -> Result<Checksums> {
    Ok(mem::take(&mut self.checksums))
  }

  fn link_target(&mut self) -> Result<PathBuf> {
    Ok(self.target.take().unwrap_or_default())
  }
}

/// Modification time of `entry`, and whether it carries nanoseconds.
fn member_mtime<R: Read>(entry: &mut Entry<'_, R>) -> io::Result<(Mtime, bool)> {
  if let Some(extensions) = entry.pax_extensions()? {
    for extension in extensions {
      let extension = extension?;
      if extension.key() == Ok(PAX_MTIME) {
        let value = extension
          .value()
          .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        return parse_pax_time(value).map(|mtime| (mtime, true));
      }
    }
  }
  let secs = entry.header().mtime()?;
  let secs = i64::try_from(secs).map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "mtime out of range"))?;
  Ok((Mtime::new(secs, 0), false))
}

/// PAX times are decimal seconds; digits beyond nanoseconds are dropped.
fn parse_pax_time(value: &str) -> io::Result<Mtime> {
  let value = match value.split_once('.') {
    Some((secs, frac)) if frac.len() > 9 => Cow::Owned(format!("{secs}.{}", frac.get(..9).unwrap_or(frac))),
    _ => Cow::Borrowed(value),
  };
  value
    .parse()
    .map_err(|e: String| io::Error::new(io::ErrorKind::InvalidData, format!("bad pax mtime: {e}")))
}

/// A PAX record `"<len> <key>=<value>\n"`; `<len>` counts the whole record, itself included.
fn pax_record(key: &str, value: &str) -> Vec<u8> {
  let body = format!(" {key}={value}\n");
  let mut len = body.len() + 1;
  while len.to_string().len() + body.len() != len {
    len = len.to_string().len() + body.len();
  }
  format!("{len}{body}").into_bytes()
}

/// Write an extended header giving the next entry the exact `mtime`.
pub(super) fn append_pax_mtime<W: Write>(builder: &mut tar::Builder<W>, mtime: Mtime) -> io::Result<()> {
  let record = pax_record(PAX_MTIME, &mtime.to_string());
  let mut header = Header::new_ustar();
  header.set_entry_type(EntryType::XHeader);
  header.set_mode(0o644);
  header.set_mtime(mtime.tar_secs());
  header.set_size(record.len() as u64);
  builder.append_data(&mut header, PAX_HEADER_NAME, record.as_slice())
}
