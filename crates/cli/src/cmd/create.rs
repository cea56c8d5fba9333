//! Create command implementation.

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::Result;
use archivist::{Archive, Compression, CreateOptions};

use crate::output::{format_duration, print_success};

/// Flags of `archive-tool create` that turn into [`CreateOptions`].
pub struct CreateArgs {
  pub compression: Option<Compression>,
  pub checksums: Vec<String>,
  pub excludes: Vec<PathBuf>,
  pub tags: Vec<String>,
  pub workdir: PathBuf,
}

impl From<CreateArgs> for CreateOptions {
  fn from(args: CreateArgs) -> Self {
    let defaults = CreateOptions::default();
    CreateOptions {
      compression: args.compression,
      checksums: if args.checksums.is_empty() {
        defaults.checksums
      } else {
        args.checksums
      },
      workdir: args.workdir,
      excludes: args.excludes,
      tags: args.tags,
    }
  }
}

pub fn cmd_create(archive: &Path, paths: &[PathBuf], args: CreateArgs) -> Result<()> {
  let start = Instant::now();
  let options = CreateOptions::from(args);
  let created = Archive::create(archive, paths, &options)?;

  print_success(&format!(
    "Created {} ({} entries, {}) in {}",
    archive.display(),
    created.manifest().len(),
    created.compression(),
    format_duration(start.elapsed())
  ));
  Ok(())
}
