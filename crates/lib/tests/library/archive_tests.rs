//! Create, open, extract and verify whole archives.

use std::fs;
use std::path::Path;

use archivist::manifest::Mtime;
use archivist::platform::set_mtime;
use archivist::{Archive, ArchiveError, Compression, FileType, IntegrityReason};

use super::common::{DIRS, FILES, Fixture, MSG, MTIME, SYMLINK};

#[test]
fn manifest_lists_every_entry() {
  let fixture = Fixture::new();
  let out = tempfile::tempdir().unwrap();
  let archive = fixture.create(out.path(), "archive.tar");
  let manifest = archive.manifest();

  assert_eq!(manifest.version(), "1.1");
  assert_eq!(manifest.checksums(), ["sha256"]);
  assert_eq!(manifest.len(), DIRS.len() + FILES.len() + 1);

  for (path, mode) in DIRS {
    let fi = manifest.find(Path::new(path)).unwrap();
    assert_eq!(fi.file_type(), FileType::Directory);
    assert_eq!(fi.mode, *mode);
  }
  for (path, mode) in FILES {
    let fi = manifest.find(Path::new(path)).unwrap();
    assert_eq!(fi.file_type(), FileType::Regular);
    assert_eq!(fi.mode, *mode);
    assert_eq!(fi.mtime, Mtime::new(MTIME, 0));
  }
  let link = manifest.find(Path::new(SYMLINK.0)).unwrap();
  assert_eq!(link.target(), Some(Path::new(SYMLINK.1)));

  let msg = manifest.find(Path::new("base/msg.txt")).unwrap();
  assert_eq!(msg.size(), Some(MSG.len() as u64));
  assert_eq!(
    msg.checksum("sha256"),
    Some("0ba904eae8773b70c75333db4de2f3ac45a8ad4ddba1b242f0b3cfc199391dd8")
  );
}

#[test]
fn extracted_tree_verifies_for_every_compression() {
  let fixture = Fixture::new();
  let out = tempfile::tempdir().unwrap();
  for name in ["a.tar", "a.tar.gz", "a.tar.bz2", "a.tar.zst"] {
    fixture.create(out.path(), name);
    let archive = Archive::open(&out.path().join(name)).unwrap();
    assert_eq!(archive.basedir(), Path::new("base"));
    archive.verify().unwrap();

    let dest = out.path().join(format!("{name}.d"));
    archive.extract(&dest).unwrap();
    archive.verify_tree(&dest).unwrap();
    assert_eq!(fs::read_to_string(dest.join("base/msg.txt")).unwrap(), MSG);
  }
  assert_eq!(
    Archive::open(&out.path().join("a.tar.gz")).unwrap().compression(),
    Compression::Gzip
  );
}

#[test]
fn several_checksums_are_recorded_in_order() {
  let fixture = Fixture::new();
  let out = tempfile::tempdir().unwrap();
  let mut options = fixture.options();
  options.checksums = vec!["sha512".into(), "sha256".into()];
  Archive::create(&out.path().join("a.tar"), &["base"], &options).unwrap();

  let archive = Archive::open(&out.path().join("a.tar")).unwrap();
  assert_eq!(archive.manifest().checksums(), ["sha512", "sha256"]);
  let rnd = archive.manifest().find(Path::new("base/data/rnd.dat")).unwrap();
  assert_eq!(rnd.checksums().unwrap().len(), 2);
}

#[test]
fn unknown_checksum_is_a_create_error() {
  let fixture = Fixture::new();
  let out = tempfile::tempdir().unwrap();
  let mut options = fixture.options();
  options.checksums = vec!["md42".into()];
  let err = Archive::create(&out.path().join("a.tar"), &["base"], &options).unwrap_err();
  assert!(matches!(err, ArchiveError::Create { .. }));
  assert!(err.to_string().contains("md42"));
}

#[test]
fn excludes_and_tags_are_kept() {
  let fixture = Fixture::new();
  let out = tempfile::tempdir().unwrap();
  let mut options = fixture.options();
  options.excludes = vec!["base/data".into()];
  options.tags = vec!["nightly".into(), "host:alpha".into()];
  Archive::create(&out.path().join("a.tar"), &["base"], &options).unwrap();

  let archive = Archive::open(&out.path().join("a.tar")).unwrap();
  let manifest = archive.manifest();
  assert!(manifest.find(Path::new("base/data")).is_none());
  assert!(manifest.find(Path::new("base/data/rnd.dat")).is_none());
  assert!(manifest.find(Path::new("base/s.dat")).is_some());
  assert_eq!(manifest.tags(), ["nightly", "host:alpha"]);
}

#[test]
fn verify_stops_at_first_mismatch() {
  let fixture = Fixture::new();
  let out = tempfile::tempdir().unwrap();
  let archive = fixture.create(out.path(), "a.tar");

  // Verify the original tree after breaking two entries; base/data sorts first.
  fs::write(fixture.join("base/msg.txt"), "Hello World!\n").unwrap();
  fs::remove_file(fixture.join("base/data/rnd.dat")).unwrap();
  fixture.touch_all();

  match archive.verify_tree(fixture.path()) {
    Err(ArchiveError::Integrity { path, reason }) => {
      assert_eq!(path, Path::new("base/data/rnd.dat"));
      assert_eq!(reason, IntegrityReason::Missing);
    }
    other => panic!("expected integrity error, got {other:?}"),
  }

  // The archive itself is unaffected.
  let dest = out.path().join("x");
  archive.extract(&dest).unwrap();
  archive.verify_tree(&dest).unwrap();
}

#[test]
fn verify_detects_checksum_with_same_size_and_mtime() {
  let fixture = Fixture::new();
  let out = tempfile::tempdir().unwrap();
  let archive = fixture.create(out.path(), "a.tar");

  fs::write(fixture.join("base/msg.txt"), "Hello World!\n").unwrap();
  set_mtime(&fixture.join("base/msg.txt"), Mtime::new(MTIME, 0)).unwrap();

  let err = archive.verify_tree(fixture.path()).unwrap_err();
  assert_eq!(err.to_string(), "base/msg.txt: checksum");
}
