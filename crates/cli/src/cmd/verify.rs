//! Verify command implementation.
//!
//! Without `--target` the members of the container are checked against its
//! manifest. With `--target` a tree on disk is checked instead.

use std::path::Path;

use anyhow::Result;
use archivist::Archive;
use tracing::debug;

use crate::output::print_success;

pub fn cmd_verify(archive_path: &Path, target: Option<&Path>) -> Result<()> {
  let archive = Archive::open(archive_path)?;

  match target {
    Some(root) => {
      debug!(root = %root.display(), "verifying tree");
      archive.verify_tree(root)?;
    }
    None => archive.verify()?,
  }

  print_success(&format!("{}: OK", archive_path.display()));
  Ok(())
}
