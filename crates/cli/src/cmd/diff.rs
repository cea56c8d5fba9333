//! Diff command implementation.
//!
//! Compares the manifests of two archives and prints one line per difference.
//! The exit status tells the most severe kind of difference reported:
//! 0 none, 100 metadata only, 101 content, 102 structure.

use std::path::Path;

use anyhow::Result;
use archivist::{Archive, DiffExt, DiffItem, DiffStatus, Severity, diff_manifests};

/// Exit status for a reported difference of the given severity.
fn exit_status(severity: Severity) -> u8 {
  match severity {
    Severity::Meta => 100,
    Severity::Content => 101,
    Severity::Structure => 102,
  }
}

pub fn cmd_diff(archive1: &Path, archive2: &Path, report_meta: bool, skip_dir_content: bool) -> Result<u8> {
  let first = Archive::open(archive1)?;
  let second = Archive::open(archive2)?;

  let diff = diff_manifests(first.manifest(), second.manifest())?;
  let items: Box<dyn Iterator<Item = DiffItem<'_>>> = if skip_dir_content {
    Box::new(diff.skip_dir_content())
  } else {
    Box::new(diff)
  };

  let mut status = 0;
  for item in items {
    if item.status == DiffStatus::Meta && !report_meta {
      continue;
    }
    if let Some(line) = format_item(&item, archive1, archive2) {
      println!("{line}");
      status = status.max(exit_status(item.status.severity()));
    }
  }
  Ok(status)
}

fn format_item(item: &DiffItem<'_>, archive1: &Path, archive2: &Path) -> Option<String> {
  let (a1, a2) = (archive1.display(), archive2.display());
  let line = match (item.status, item.a, item.b) {
    (DiffStatus::MissingA, _, Some(b)) => format!("Only in {}: {}", a2, b.path.display()),
    (DiffStatus::MissingB, Some(a), _) => format!("Only in {}: {}", a1, a.path.display()),
    (status, Some(a), Some(b)) => {
      let (p1, p2) = (a.path.display(), b.path.display());
      match status {
        DiffStatus::Type => format!("Entries {a1}:{p1} and {a2}:{p2} have different type"),
        DiffStatus::SymlinkTarget => format!("Symbol links {a1}:{p1} and {a2}:{p2} have different target"),
        DiffStatus::Content => format!("Files {a1}:{p1} and {a2}:{p2} differ"),
        DiffStatus::Meta => format!("File system metadata for {a1}:{p1} and {a2}:{p2} differ"),
        DiffStatus::MissingA | DiffStatus::MissingB => return None,
      }
    }
    _ => return None,
  };
  Some(line)
}
