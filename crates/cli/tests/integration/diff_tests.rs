//! `archive-tool diff` scenarios.

use std::fs;
use std::os::unix::fs::symlink;

use archivist::platform::set_mode;
use predicates::prelude::*;

use super::common::{RND2, TestEnv};

#[test]
fn equal_archives() {
  let env = TestEnv::new();
  env.create("new.tar.zst", "base");
  assert!(env.diff(&[], "new.tar.zst", 0).is_empty());
}

#[test]
fn equal_bzip2_archive() {
  let env = TestEnv::new();
  env.create("new.tar.bz2", "base");
  assert!(env.diff(&[], "new.tar.bz2", 0).is_empty());
}

#[test]
fn modified_file() {
  let env = TestEnv::new();
  fs::write(env.path("base/rnd.dat"), RND2).unwrap();
  env.create("new.tar.gz", "base");

  assert_eq!(
    env.diff(&[], "new.tar.gz", 101),
    ["Files archive.tar:base/rnd.dat and new.tar.gz:base/rnd.dat differ"]
  );
}

#[test]
fn symlink_target() {
  let env = TestEnv::new();
  fs::remove_file(env.path("base/s.dat")).unwrap();
  symlink("msg.txt", env.path("base/s.dat")).unwrap();
  env.create("new.tar", "base");

  assert_eq!(
    env.diff(&[], "new.tar", 101),
    ["Symbol links archive.tar:base/s.dat and new.tar:base/s.dat have different target"]
  );
}

#[test]
fn wrong_type() {
  let env = TestEnv::new();
  fs::remove_file(env.path("base/rnd.dat")).unwrap();
  symlink("data/rnd.dat", env.path("base/rnd.dat")).unwrap();
  env.create("new.tar", "base");

  assert_eq!(
    env.diff(&[], "new.tar", 102),
    ["Entries archive.tar:base/rnd.dat and new.tar:base/rnd.dat have different type"]
  );
}

#[test]
fn missing_files() {
  let env = TestEnv::new();
  fs::rename(env.path("base/rnd.dat"), env.path("base/a.dat")).unwrap();
  env.create("new.tar", "base");

  assert_eq!(
    env.diff(&[], "new.tar", 102),
    ["Only in new.tar: base/a.dat", "Only in archive.tar: base/rnd.dat"]
  );
}

#[test]
fn multiple_differences() {
  let env = TestEnv::new();
  fs::write(env.path("base/data/rnd.dat"), RND2).unwrap();
  fs::rename(env.path("base/msg.txt"), env.path("base/o.txt")).unwrap();
  env.create("new.tar", "base");

  assert_eq!(
    env.diff(&[], "new.tar", 102),
    [
      "Files archive.tar:base/data/rnd.dat and new.tar:base/data/rnd.dat differ",
      "Only in archive.tar: base/msg.txt",
      "Only in new.tar: base/o.txt",
    ]
  );
}

#[test]
fn metadata_is_reported_only_on_request() {
  let env = TestEnv::new();
  set_mode(&env.path("base/rnd.dat"), 0o444).unwrap();
  env.create("new.tar", "base");

  assert!(env.diff(&[], "new.tar", 0).is_empty());
  assert_eq!(
    env.diff(&["--report-meta"], "new.tar", 100),
    ["File system metadata for archive.tar:base/rnd.dat and new.tar:base/rnd.dat differ"]
  );
}

#[test]
fn different_basedir_equal() {
  let env = TestEnv::new();
  fs::rename(env.path("base"), env.path("newbase")).unwrap();
  env.touch("newbase");
  env.create("new.tar", "newbase");

  assert!(env.diff(&["--report-meta"], "new.tar", 0).is_empty());
}

#[test]
fn different_basedir_modified_file() {
  let env = TestEnv::new();
  fs::rename(env.path("base"), env.path("newbase")).unwrap();
  fs::write(env.path("newbase/rnd.dat"), RND2).unwrap();
  env.create("new.tar", "newbase");

  assert_eq!(
    env.diff(&[], "new.tar", 101),
    ["Files archive.tar:base/rnd.dat and new.tar:newbase/rnd.dat differ"]
  );
}

#[test]
fn skip_dir_content() {
  let env = TestEnv::new();
  fs::remove_file(env.path("base/s.dat")).unwrap();
  fs::remove_dir_all(env.path("base/data")).unwrap();
  env.mkdir("base/extra/deeper", 0o755);
  env.write_file("base/extra/deeper/f.txt", b"x", 0o644);
  env.create("new.tar", "base");

  assert_eq!(
    env.diff(&[], "new.tar", 102),
    [
      "Only in archive.tar: base/data",
      "Only in archive.tar: base/data/rnd.dat",
      "Only in new.tar: base/extra",
      "Only in new.tar: base/extra/deeper",
      "Only in new.tar: base/extra/deeper/f.txt",
      "Only in archive.tar: base/s.dat",
    ]
  );
  assert_eq!(
    env.diff(&["--skip-dir-content"], "new.tar", 102),
    [
      "Only in archive.tar: base/data",
      "Only in new.tar: base/extra",
      "Only in archive.tar: base/s.dat",
    ]
  );
}

#[test]
fn no_common_checksum_fails_before_output() {
  let env = TestEnv::new();
  env
    .cmd()
    .args(["create", "--checksum", "sha512", "new.tar", "base"])
    .assert()
    .success();

  env
    .cmd()
    .args(["diff", "archive.tar", "new.tar"])
    .assert()
    .code(1)
    .stdout(predicate::str::is_empty())
    .stderr(predicate::str::contains("No common checksum algorithm"));
}

#[test]
fn unreadable_archive_is_an_error() {
  let env = TestEnv::new();
  fs::write(env.path("junk.tar"), b"not an archive at all").unwrap();
  env
    .cmd()
    .args(["diff", "archive.tar", "junk.tar"])
    .assert()
    .code(1)
    .stderr(predicate::str::contains("error:"));
}
