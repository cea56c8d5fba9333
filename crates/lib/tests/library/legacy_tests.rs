//! Reading archives written with manifest format 1.0.

use std::fmt::Write as _;
use std::fs::File;
use std::path::{Path, PathBuf};

use archivist::{Archive, FileInfo, ManifestBuilder};
use flate2::Compression as GzLevel;
use flate2::write::GzEncoder;
use tar::{EntryType, Header};

use super::common::Fixture;

/// Render `entries` the way version 1.0 wrote them: float mtimes and a `checksum` map.
fn legacy_manifest(entries: &[FileInfo]) -> String {
  let mut out = String::from("version: '1.0'\ndate: 2019-08-06 14:34:13.602468\nchecksums:\n- sha256\n");
  out.push_str("metadata:\n- base/.manifest.yaml\nentries:\n");
  for fi in entries {
    let mtime = fi.mtime.secs() as f64 + f64::from(fi.mtime.nanos()) / 1e9;
    write!(
      out,
      "- path: {}\n  type: {}\n  mode: {}\n  mtime: {:?}\n",
      fi.path.display(),
      fi.file_type().code(),
      fi.mode,
      mtime
    )
    .unwrap();
    if let Some(size) = fi.size() {
      writeln!(out, "  size: {size}\n  checksum:\n    sha256: {}", fi.checksum("sha256").unwrap()).unwrap();
    }
    if let Some(target) = fi.target() {
      writeln!(out, "  target: {}", target.display()).unwrap();
    }
  }
  out
}

/// Write a gzip compressed tar of the fixture with a 1.0 manifest in front.
fn legacy_archive(fixture: &Fixture, dest: &Path) -> PathBuf {
  let manifest = ManifestBuilder::new().workdir(fixture.path()).build(&["base"]).unwrap();
  let yaml = legacy_manifest(manifest.entries());

  let path = dest.join("legacy-1_0.tar.gz");
  let encoder = GzEncoder::new(File::create(&path).unwrap(), GzLevel::default());
  let mut builder = tar::Builder::new(encoder);

  let mut header = Header::new_gnu();
  header.set_entry_type(EntryType::Regular);
  header.set_mode(0o444);
  header.set_size(yaml.len() as u64);
  builder
    .append_data(&mut header, "base/.manifest.yaml", yaml.as_bytes())
    .unwrap();
  builder.follow_symlinks(false);
  for fi in manifest.entries() {
    builder
      .append_path_with_name(fixture.path().join(&fi.path), &fi.path)
      .unwrap();
  }
  builder.into_inner().unwrap().finish().unwrap();
  path
}

#[test]
fn legacy_manifest_is_decoded() {
  let fixture = Fixture::new();
  let out = tempfile::tempdir().unwrap();
  let archive = Archive::open(&legacy_archive(&fixture, out.path())).unwrap();
  let manifest = archive.manifest();

  assert_eq!(manifest.version(), "1.0");
  assert_eq!(manifest.checksums(), ["sha256"]);
  assert_eq!(manifest.metadata(), [PathBuf::from("base/.manifest.yaml")]);
  assert_eq!(manifest.date().to_rfc3339(), "2019-08-06T14:34:13.602468+00:00");
  assert_eq!(archive.basedir(), Path::new("base"));
  assert!(manifest.tags().is_empty());
}

#[test]
fn legacy_archive_verifies() {
  let fixture = Fixture::new();
  let out = tempfile::tempdir().unwrap();
  let archive = Archive::open(&legacy_archive(&fixture, out.path())).unwrap();

  archive.verify().unwrap();
  archive.verify_tree(fixture.path()).unwrap();

  let dest = out.path().join("x");
  archive.extract(&dest).unwrap();
  archive.verify_tree(&dest).unwrap();
}

#[test]
fn legacy_and_current_manifests_have_no_diff() {
  let fixture = Fixture::new();
  let out = tempfile::tempdir().unwrap();
  let legacy = Archive::open(&legacy_archive(&fixture, out.path())).unwrap();
  let current = fixture.create(out.path(), "current.tar");

  let diff = archivist::diff_manifests(legacy.manifest(), current.manifest()).unwrap();
  assert_eq!(diff.count(), 0);
}
