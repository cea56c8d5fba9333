//! Ls command implementation.

use std::path::Path;

use anyhow::Result;
use archivist::{Archive, FileInfo};
use chrono::DateTime;

use crate::output::{OutputFormat, format_mode, print_json, symbols};

pub fn cmd_ls(archive: &Path, output: OutputFormat) -> Result<()> {
  let archive = Archive::open(archive)?;
  let manifest = archive.manifest();
  let entries: Vec<&FileInfo> = manifest.iter().filter(|fi| !manifest.is_metadata(&fi.path)).collect();

  if output.is_json() {
    return print_json(&entries);
  }

  for fi in entries {
    println!("{}", format_entry(fi));
  }
  Ok(())
}

fn format_entry(fi: &FileInfo) -> String {
  let mtime = DateTime::from_timestamp(fi.mtime.secs(), fi.mtime.nanos())
    .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
    .unwrap_or_else(|| fi.mtime.to_string());
  let mut line = format!(
    "{} {:>10} {} {}",
    format_mode(fi.file_type(), fi.mode),
    fi.size().unwrap_or(0),
    mtime,
    fi.path.display()
  );
  if let Some(target) = fi.target() {
    line.push_str(&format!(" {} {}", symbols::ARROW, target.display()));
  }
  line
}
