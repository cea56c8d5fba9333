//! `create`, `ls`, `info`, `verify` and `extract` scenarios.

use std::fs;

use archivist::platform::set_mode;
use predicates::prelude::*;

use super::common::TestEnv;

#[test]
fn ls_lists_entries_in_order() {
  let env = TestEnv::new();
  let output = env.cmd().args(["ls", "archive.tar"]).assert().success().get_output().stdout.clone();
  let text = String::from_utf8(output).unwrap();
  let paths: Vec<&str> = text
    .lines()
    .map(|line| line.split_whitespace().nth(4).unwrap())
    .collect();
  assert_eq!(
    paths,
    [
      "base",
      "base/data",
      "base/data/rnd.dat",
      "base/empty",
      "base/msg.txt",
      "base/rnd.dat",
      "base/s.dat",
    ]
  );
  assert!(text.contains("drwxr-x---"));
  assert!(text.contains("base/s.dat -> data/rnd.dat"));
}

#[test]
fn ls_json() {
  let env = TestEnv::new();
  let output = env
    .cmd()
    .args(["ls", "-o", "json", "archive.tar"])
    .assert()
    .success()
    .get_output()
    .stdout
    .clone();
  let entries: serde_json::Value = serde_json::from_slice(&output).unwrap();
  let entries = entries.as_array().unwrap();
  assert_eq!(entries.len(), 7);
  assert_eq!(entries[2]["path"], "base/data/rnd.dat");
  assert_eq!(entries[2]["type"], "f");
  assert_eq!(entries[2]["size"], 1000);
  assert_eq!(entries[6]["target"], "data/rnd.dat");
}

#[test]
fn info_json() {
  let env = TestEnv::new();
  env
    .cmd()
    .args(["create", "--tag", "weekly", "--checksum", "sha512", "--checksum", "sha256", "t.tar.gz", "base"])
    .assert()
    .success();

  let output = env
    .cmd()
    .args(["info", "--output", "json", "t.tar.gz"])
    .assert()
    .success()
    .get_output()
    .stdout
    .clone();
  let info: serde_json::Value = serde_json::from_slice(&output).unwrap();
  assert_eq!(info["version"], "1.1");
  assert_eq!(info["compression"], "gzip");
  assert_eq!(info["basedir"], "base");
  assert_eq!(info["checksums"], serde_json::json!(["sha512", "sha256"]));
  assert_eq!(info["tags"], serde_json::json!(["weekly"]));
  assert_eq!(info["entries"]["files"], 3);
  assert_eq!(info["entries"]["directories"], 3);
  assert_eq!(info["entries"]["symlinks"], 1);
}

#[test]
fn info_text() {
  let env = TestEnv::new();
  env
    .cmd()
    .args(["info", "archive.tar"])
    .assert()
    .success()
    .stdout(predicate::str::contains("Manifest version: 1.1"))
    .stdout(predicate::str::contains("sha256"));
}

#[test]
fn verify_checks_archive_members() {
  let env = TestEnv::new();
  env
    .cmd()
    .args(["verify", "archive.tar"])
    .assert()
    .success()
    .stdout(predicate::str::contains("archive.tar: OK"));
}

#[test]
fn verify_against_target() {
  let env = TestEnv::new();
  env
    .cmd()
    .args(["verify", "--target", ".", "archive.tar"])
    .assert()
    .success();

  set_mode(&env.path("base/msg.txt"), 0o600).unwrap();
  env
    .cmd()
    .args(["verify", "--target", ".", "archive.tar"])
    .assert()
    .code(1)
    .stderr(predicate::str::contains("base/msg.txt: wrong mode"));
}

#[test]
fn extract_then_verify() {
  let env = TestEnv::new();
  env
    .cmd()
    .args(["extract", "-C", "out", "archive.tar"])
    .assert()
    .success();

  assert_eq!(fs::read_to_string(env.path("out/base/msg.txt")).unwrap(), "Hello world!\n");
  assert!(!env.path("out/base/.manifest.yaml").exists());
  env
    .cmd()
    .args(["verify", "--target", "out", "archive.tar"])
    .assert()
    .success();
}

#[test]
fn create_rejects_unknown_checksum() {
  let env = TestEnv::new();
  env
    .cmd()
    .args(["create", "--checksum", "crc1", "x.tar", "base"])
    .assert()
    .code(1)
    .stderr(predicate::str::contains("crc1"));
  assert!(!env.path("x.tar").exists());
}

#[test]
fn create_with_exclude_and_directory() {
  let env = TestEnv::new();
  env
    .cmd()
    .args(["create", "-C", env.root().to_str().unwrap(), "--exclude", "base/data", "x.tar", "base"])
    .assert()
    .success();

  let output = env.cmd().args(["ls", "x.tar"]).assert().success().get_output().stdout.clone();
  let text = String::from_utf8(output).unwrap();
  assert!(!text.lines().any(|l| l.ends_with(" base/data")));
  assert!(!text.contains("base/data/rnd.dat"));
}
