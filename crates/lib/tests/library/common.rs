//! Shared helpers for library integration tests.

use std::fs;
use std::os::unix::fs::symlink;
use std::path::{Path, PathBuf};

use archivist::manifest::Mtime;
use archivist::platform::{set_mode, set_mtime};
use archivist::{Archive, CreateOptions};
use tempfile::TempDir;

pub const MTIME: i64 = 1_565_100_853;
pub const MSG: &str = "Hello world!\n";

/// Directories, files and the symlink every test starts from, as `(path, mode)`.
pub const DIRS: &[(&str, u32)] = &[("base", 0o755), ("base/data", 0o750), ("base/empty", 0o755)];
pub const FILES: &[(&str, u32)] = &[("base/msg.txt", 0o644), ("base/data/rnd.dat", 0o600)];
pub const SYMLINK: (&str, &str) = ("base/s.dat", "data/rnd.dat");

/// A temporary working directory containing the test tree below `base/`.
pub struct Fixture {
  pub dir: TempDir,
}

impl Fixture {
  pub fn new() -> Self {
    let dir = TempDir::new().unwrap();
    let fixture = Self { dir };
    for (path, _) in DIRS {
      fs::create_dir_all(fixture.join(path)).unwrap();
    }
    fs::write(fixture.join("base/msg.txt"), MSG).unwrap();
    let rnd: Vec<u8> = (0..385u32).map(|i| (i * 7919 % 251) as u8).collect();
    fs::write(fixture.join("base/data/rnd.dat"), rnd).unwrap();
    symlink(SYMLINK.1, fixture.join(SYMLINK.0)).unwrap();

    for (path, mode) in FILES.iter().chain(DIRS.iter().rev()) {
      set_mode(&fixture.join(path), *mode).unwrap();
    }
    fixture.touch_all();
    fixture
  }

  pub fn path(&self) -> &Path {
    self.dir.path()
  }

  pub fn join(&self, rel: &str) -> PathBuf {
    self.dir.path().join(rel)
  }

  /// Reset every entry to [`MTIME`], deepest entries first.
  pub fn touch_all(&self) {
    let mut paths: Vec<&str> = DIRS
      .iter()
      .chain(FILES.iter())
      .map(|(p, _)| *p)
      .chain([SYMLINK.0])
      .collect();
    paths.sort_by_key(|p| std::cmp::Reverse(p.matches('/').count()));
    for path in paths {
      if self.join(path).symlink_metadata().is_ok() {
        set_mtime(&self.join(path), Mtime::new(MTIME, 0)).unwrap();
      }
    }
  }

  pub fn options(&self) -> CreateOptions {
    CreateOptions {
      workdir: self.path().to_path_buf(),
      ..CreateOptions::default()
    }
  }

  /// Archive the `base` tree into `out/name`.
  pub fn create(&self, out: &Path, name: &str) -> Archive {
    Archive::create(&out.join(name), &["base"], &self.options()).unwrap()
  }
}
