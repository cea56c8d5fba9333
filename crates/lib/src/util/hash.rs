//! Checksum engine.
//!
//! Computes one or more digests over a byte stream in a single pass, so large
//! files are read exactly once no matter how many algorithms a manifest carries.
//!
//! Digests are keyed by algorithm name and rendered as lowercase hex.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io::{self, Read};
use std::path::Path;
use std::str::FromStr;

use sha2::{Digest, Sha224, Sha256, Sha384, Sha512};

use crate::consts::CHECKSUM_BUF_LEN;

/// Mapping from algorithm name to hex digest.
pub type Checksums = BTreeMap<String, String>;

/// A digest algorithm the engine knows how to compute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChecksumAlgorithm {
  Sha224,
  Sha256,
  Sha384,
  Sha512,
}

impl ChecksumAlgorithm {
  pub const ALL: [ChecksumAlgorithm; 4] = [
    ChecksumAlgorithm::Sha224,
    ChecksumAlgorithm::Sha256,
    ChecksumAlgorithm::Sha384,
    ChecksumAlgorithm::Sha512,
  ];

  pub fn name(self) -> &'static str {
    match self {
      ChecksumAlgorithm::Sha224 => "sha224",
      ChecksumAlgorithm::Sha256 => "sha256",
      ChecksumAlgorithm::Sha384 => "sha384",
      ChecksumAlgorithm::Sha512 => "sha512",
    }
  }

  fn hasher(self) -> Hasher {
    match self {
      ChecksumAlgorithm::Sha224 => Hasher::Sha224(Sha224::new()),
      ChecksumAlgorithm::Sha256 => Hasher::Sha256(Sha256::new()),
      ChecksumAlgorithm::Sha384 => Hasher::Sha384(Sha384::new()),
      ChecksumAlgorithm::Sha512 => Hasher::Sha512(Sha512::new()),
    }
  }
}

impl fmt::Display for ChecksumAlgorithm {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.name())
  }
}

impl FromStr for ChecksumAlgorithm {
  type Err = ChecksumError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    ChecksumAlgorithm::ALL
      .into_iter()
      .find(|alg| alg.name() == s)
      .ok_or_else(|| ChecksumError::Unsupported(s.to_string()))
  }
}

/// Error from the checksum engine.
#[derive(Debug, thiserror::Error)]
pub enum ChecksumError {
  #[error("unsupported checksum algorithm '{0}'")]
  Unsupported(String),

  #[error("no checksum algorithm requested")]
  NoAlgorithm,

  #[error("failed to read {path}: {message}")]
  Read { path: String, message: String },
}

enum Hasher {
  Sha224(Sha224),
  Sha256(Sha256),
  Sha384(Sha384),
  Sha512(Sha512),
}

impl Hasher {
  fn update(&mut self, data: &[u8]) {
    match self {
      Hasher::Sha224(h) => h.update(data),
      Hasher::Sha256(h) => h.update(data),
      Hasher::Sha384(h) => h.update(data),
      Hasher::Sha512(h) => h.update(data),
    }
  }

  fn finalize(self) -> String {
    match self {
      Hasher::Sha224(h) => hex::encode(h.finalize()),
      Hasher::Sha256(h) => hex::encode(h.finalize()),
      Hasher::Sha384(h) => hex::encode(h.finalize()),
      Hasher::Sha512(h) => hex::encode(h.finalize()),
    }
  }
}

/// Resolve algorithm names, failing on the first unknown one.
pub fn parse_algorithms<S: AsRef<str>>(names: &[S]) -> Result<Vec<ChecksumAlgorithm>, ChecksumError> {
  if names.is_empty() {
    return Err(ChecksumError::NoAlgorithm);
  }
  let mut algorithms: Vec<ChecksumAlgorithm> = Vec::with_capacity(names.len());
  for name in names {
    let alg = name.as_ref().parse()?;
    if !algorithms.contains(&alg) {
      algorithms.push(alg);
    }
  }
  Ok(algorithms)
}

/// Digest everything `reader` yields with each of `algorithms`.
///
/// The stream is consumed exactly once. `what` names the stream in read errors.
pub fn checksum_reader<R: Read>(
  reader: R,
  algorithms: &[ChecksumAlgorithm],
  what: &str,
) -> Result<Checksums, ChecksumError> {
  let mut hashing = HashingReader::new(reader, algorithms)?;
  let mut buffer = vec![0u8; CHECKSUM_BUF_LEN];

  loop {
    match hashing.read(&mut buffer) {
      Ok(0) => break,
      Ok(_) => {}
      Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
      Err(e) => {
        return Err(ChecksumError::Read {
          path: what.to_string(),
          message: e.to_string(),
        });
      }
    }
  }

  Ok(hashing.finish())
}

/// Reader adapter digesting every byte that passes through it.
///
/// Lets a stream be hashed while it is copied somewhere else.
pub struct HashingReader<R> {
  inner: R,
  hashers: Vec<(ChecksumAlgorithm, Hasher)>,
}

impl<R: Read> HashingReader<R> {
  pub fn new(inner: R, algorithms: &[ChecksumAlgorithm]) -> Result<Self, ChecksumError> {
    if algorithms.is_empty() {
      return Err(ChecksumError::NoAlgorithm);
    }
    Ok(Self {
      inner,
      hashers: algorithms.iter().map(|alg| (*alg, alg.hasher())).collect(),
    })
  }

  /// Digests of everything read so far.
  pub fn finish(self) -> Checksums {
    self
      .hashers
      .into_iter()
      .map(|(alg, hasher)| (alg.name().to_string(), hasher.finalize()))
      .collect()
  }
}

impl<R: Read> Read for HashingReader<R> {
  fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
    let n = self.inner.read(buf)?;
    for (_, hasher) in self.hashers.iter_mut() {
      hasher.update(&buf[..n]);
    }
    Ok(n)
  }
}

/// Digest a file's contents.
pub fn checksum_file(path: &Path, algorithms: &[ChecksumAlgorithm]) -> Result<Checksums, ChecksumError> {
  let file = fs::File::open(path).map_err(|e| ChecksumError::Read {
    path: path.display().to_string(),
    message: e.to_string(),
  })?;
  checksum_reader(file, algorithms, &path.display().to_string())
}
