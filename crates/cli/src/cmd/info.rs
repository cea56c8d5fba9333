//! Info command implementation.
//!
//! Displays the manifest header of an archive and entry statistics.

use std::path::Path;

use anyhow::Result;
use archivist::{Archive, FileType};

use crate::output::{OutputFormat, format_bytes, print_info, print_json, print_stat};

#[derive(Debug, Default, PartialEq)]
struct EntryCounts {
  directories: usize,
  files: usize,
  symlinks: usize,
  total_size: u64,
}

fn count_entries(archive: &Archive) -> EntryCounts {
  let manifest = archive.manifest();
  let mut counts = EntryCounts::default();
  for fi in manifest.iter().filter(|fi| !manifest.is_metadata(&fi.path)) {
    match fi.file_type() {
      FileType::Directory => counts.directories += 1,
      FileType::Regular => {
        counts.files += 1;
        counts.total_size += fi.size().unwrap_or(0);
      }
      FileType::Symlink => counts.symlinks += 1,
    }
  }
  counts
}

pub fn cmd_info(path: &Path, output: OutputFormat) -> Result<()> {
  let archive = Archive::open(path)?;
  let manifest = archive.manifest();
  let counts = count_entries(&archive);

  if output.is_json() {
    let json_output = serde_json::json!({
      "archive": path,
      "compression": archive.compression().name(),
      "basedir": archive.basedir(),
      "version": manifest.version(),
      "date": manifest.date(),
      "checksums": manifest.checksums(),
      "metadata": manifest.metadata(),
      "tags": manifest.tags(),
      "entries": {
        "directories": counts.directories,
        "files": counts.files,
        "symlinks": counts.symlinks,
      },
      "total_size_bytes": counts.total_size,
    });
    return print_json(&json_output);
  }

  print_info(&format!("Archive: {}", path.display()));
  print_stat("Compression", archive.compression().name());
  print_stat("Base directory", &archive.basedir().display().to_string());
  print_stat("Manifest version", manifest.version());
  print_stat("Created", &manifest.date().to_rfc3339());
  print_stat("Checksums", &manifest.checksums().join(", "));
  if !manifest.tags().is_empty() {
    print_stat("Tags", &manifest.tags().join(", "));
  }
  println!();
  print_stat("Directories", &counts.directories.to_string());
  print_stat("Files", &counts.files.to_string());
  print_stat("Symlinks", &counts.symlinks.to_string());
  print_stat("Total size", &format_bytes(counts.total_size));

  Ok(())
}
