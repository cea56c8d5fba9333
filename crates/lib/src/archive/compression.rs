//! Compression of the tar stream.

use std::fmt;
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Read, Write};
use std::path::Path;
use std::str::FromStr;

use bzip2::read::BzDecoder;
use bzip2::write::BzEncoder;
use flate2::Compression as GzLevel;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;

const GZIP_MAGIC: &[u8] = &[0x1f, 0x8b];
const ZSTD_MAGIC: &[u8] = &[0x28, 0xb5, 0x2f, 0xfd];
const BZIP2_MAGIC: &[u8] = b"BZh";
/// Start of the first compressed block, following the `BZh<level>` header.
const BZIP2_BLOCK_MAGIC: &[u8] = &[0x31, 0x41, 0x59, 0x26, 0x53, 0x59];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Compression {
  #[default]
  None,
  Gzip,
  Bzip2,
  Zstd,
}

impl Compression {
  pub fn name(self) -> &'static str {
    match self {
      Compression::None => "none",
      Compression::Gzip => "gzip",
      Compression::Bzip2 => "bzip2",
      Compression::Zstd => "zstd",
    }
  }

  /// Guess the compression from an archive file name.
  pub fn from_path(path: &Path) -> Self {
    let name = path.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
    if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
      Compression::Gzip
    } else if name.ends_with(".tar.bz2") || name.ends_with(".tbz2") {
      Compression::Bzip2
    } else if name.ends_with(".tar.zst") || name.ends_with(".tzst") {
      Compression::Zstd
    } else {
      Compression::None
    }
  }

  /// Identify the compression of a stream by its leading bytes.
  pub fn sniff(magic: &[u8]) -> Self {
    if magic.starts_with(GZIP_MAGIC) {
      Compression::Gzip
    } else if is_bzip2(magic) {
      Compression::Bzip2
    } else if magic.starts_with(ZSTD_MAGIC) {
      Compression::Zstd
    } else {
      Compression::None
    }
  }
}

impl fmt::Display for Compression {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.name())
  }
}

impl FromStr for Compression {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "none" => Ok(Compression::None),
      "gzip" | "gz" => Ok(Compression::Gzip),
      "bzip2" | "bz2" => Ok(Compression::Bzip2),
      "zstd" | "zst" => Ok(Compression::Zstd),
      other => Err(format!("unknown compression '{other}'")),
    }
  }
}

/// `BZh`, a block size digit, then the block magic. A plain tar could start
/// with `BZh` as part of an entry name, so the block magic is required too.
fn is_bzip2(magic: &[u8]) -> bool {
  magic.len() >= 10
    && magic.starts_with(BZIP2_MAGIC)
    && (b'1'..=b'9').contains(&magic[3])
    && magic[4..10] == *BZIP2_BLOCK_MAGIC
}

/// Output side of a container file.
pub(crate) enum ArchiveWriter {
  Plain(BufWriter<File>),
  Gzip(GzEncoder<BufWriter<File>>),
  Bzip2(BzEncoder<BufWriter<File>>),
  Zstd(zstd::Encoder<'static, BufWriter<File>>),
}

impl ArchiveWriter {
  pub(crate) fn new(file: File, compression: Compression) -> io::Result<Self> {
    let out = BufWriter::new(file);
    Ok(match compression {
      Compression::None => ArchiveWriter::Plain(out),
      Compression::Gzip => ArchiveWriter::Gzip(GzEncoder::new(out, GzLevel::default())),
      Compression::Bzip2 => ArchiveWriter::Bzip2(BzEncoder::new(out, bzip2::Compression::default())),
      Compression::Zstd => ArchiveWriter::Zstd(zstd::Encoder::new(out, 0)?),
    })
  }

  /// Write the compression trailer and flush everything to the file.
  pub(crate) fn finish(self) -> io::Result<()> {
    let mut out = match self {
      ArchiveWriter::Plain(out) => out,
      ArchiveWriter::Gzip(enc) => enc.finish()?,
      ArchiveWriter::Bzip2(enc) => enc.finish()?,
      ArchiveWriter::Zstd(enc) => enc.finish()?,
    };
    out.flush()
  }
}

impl Write for ArchiveWriter {
  fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
    match self {
      ArchiveWriter::Plain(w) => w.write(buf),
      ArchiveWriter::Gzip(w) => w.write(buf),
      ArchiveWriter::Bzip2(w) => w.write(buf),
      ArchiveWriter::Zstd(w) => w.write(buf),
    }
  }

  fn flush(&mut self) -> io::Result<()> {
    match self {
      ArchiveWriter::Plain(w) => w.flush(),
      ArchiveWriter::Gzip(w) => w.flush(),
      ArchiveWriter::Bzip2(w) => w.flush(),
      ArchiveWriter::Zstd(w) => w.flush(),
    }
  }
}

/// Open `file` for reading, decompressing according to its magic bytes.
pub(crate) fn open_reader(file: File) -> io::Result<(Box<dyn Read>, Compression)> {
  let mut input = BufReader::new(file);
  let compression = Compression::sniff(input.fill_buf()?);
  let reader: Box<dyn Read> = match compression {
    Compression::None => Box::new(input),
    Compression::Gzip => Box::new(GzDecoder::new(input)),
    Compression::Bzip2 => Box::new(BzDecoder::new(input)),
    Compression::Zstd => Box::new(zstd::Decoder::with_buffer(input)?),
  };
  Ok((reader, compression))
}
