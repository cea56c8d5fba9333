//! Extract command implementation.

use std::path::Path;

use anyhow::Result;
use archivist::Archive;

use crate::output::print_success;

pub fn cmd_extract(archive: &Path, dest: &Path) -> Result<()> {
  let archive = Archive::open(archive)?;
  archive.extract(dest)?;
  print_success(&format!(
    "Extracted {} into {}",
    archive.path().display(),
    dest.join(archive.basedir()).display()
  ));
  Ok(())
}
