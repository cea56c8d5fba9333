//! Tar containers with an embedded manifest.
//!
//! An archive is a (optionally compressed) tar file whose first entry is the
//! serialized manifest at `<basedir>/.manifest.yaml`, followed by one entry per
//! manifest entry in manifest order. Each entry is preceded by a PAX header
//! holding its exact modification time.
//!
//! [`Archive::verify`] checks the members of the container against the
//! manifest; [`Archive::verify_tree`] checks a tree on disk.

mod compression;
mod members;

pub use compression::Compression;

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{self, Read};
use std::os::unix::fs::MetadataExt;
use std::path::{Component, Path, PathBuf};

use tar::{EntryType, Header};
use tracing::{debug, info, warn};

use crate::consts::{DEFAULT_CHECKSUMS, MANIFEST_FILENAME, MANIFEST_MODE};
use crate::error::ArchiveError;
use crate::manifest::{self, EntryKind, FileInfo, FileType, Manifest, ManifestBuilder, normalize_root};
use crate::platform;
use crate::util::hash::{ChecksumAlgorithm, HashingReader};
use crate::verify;
use crate::Result;
use compression::{ArchiveWriter, open_reader};
use members::{Member, append_pax_mtime};

/// Settings for [`Archive::create`].
#[derive(Debug, Clone)]
pub struct CreateOptions {
  /// Compression of the container. Inferred from the file name when unset.
  pub compression: Option<Compression>,
  /// Checksum algorithm names, in order of preference.
  pub checksums: Vec<String>,
  /// Directory the archived paths are relative to.
  pub workdir: PathBuf,
  /// Paths (relative to `workdir`) left out together with their subtrees.
  pub excludes: Vec<PathBuf>,
  pub tags: Vec<String>,
}

impl Default for CreateOptions {
  fn default() -> Self {
    Self {
      compression: None,
      checksums: DEFAULT_CHECKSUMS.iter().map(|s| s.to_string()).collect(),
      workdir: PathBuf::from("."),
      excludes: Vec::new(),
      tags: Vec::new(),
    }
  }
}

/// An archive file together with its decoded manifest.
#[derive(Debug)]
pub struct Archive {
  path: PathBuf,
  manifest: Manifest,
  basedir: PathBuf,
  compression: Compression,
}

impl Archive {
  /// Build a manifest of `roots` and write it and the tree into a new archive at `path`.
  ///
  /// All roots must be relative to `options.workdir` and share one top-level
  /// directory, which becomes the base directory of the archive.
  pub fn create<P: AsRef<Path>>(path: &Path, roots: &[P], options: &CreateOptions) -> Result<Archive> {
    let basedir = common_basedir(roots)?;
    let manifest_path = basedir.join(MANIFEST_FILENAME);

    let mut builder = ManifestBuilder::new()
      .workdir(&options.workdir)
      .checksums(&options.checksums)
      .metadata_path(&manifest_path);
    for exclude in &options.excludes {
      builder = builder.exclude(exclude);
    }
    for tag in &options.tags {
      builder = builder.tag(tag);
    }
    let manifest = builder.build(roots)?;

    if manifest.find(&manifest_path).is_some() {
      return Err(ArchiveError::create(format!(
        "{}: conflicts with the archive manifest",
        manifest_path.display()
      )));
    }

    let compression = options.compression.unwrap_or_else(|| Compression::from_path(path));
    let file = File::create(path).map_err(|e| ArchiveError::create_io(path, e))?;
    let written = write_container(file, compression, &manifest, &manifest_path, &options.workdir);
    if let Err(e) = written {
      let _ = fs::remove_file(path);
      return Err(e);
    }

    info!(
      archive = %path.display(),
      entries = manifest.len(),
      %compression,
      "archive created"
    );
    Ok(Archive {
      path: path.to_path_buf(),
      manifest,
      basedir,
      compression,
    })
  }

  /// Open an existing archive and decode its manifest.
  pub fn open(path: &Path) -> Result<Archive> {
    let file = File::open(path).map_err(|e| ArchiveError::read_io(path, e))?;
    let (reader, compression) = open_reader(file).map_err(|e| ArchiveError::read_io(path, e))?;
    let mut container = tar::Archive::new(reader);
    let mut entries = container.entries().map_err(|e| ArchiveError::read_io(path, e))?;

    let mut first = match entries.next() {
      Some(entry) => entry.map_err(|e| ArchiveError::read_io(path, e))?,
      None => return Err(ArchiveError::read(format!("{}: empty archive", path.display()))),
    };
    let manifest_path = first
      .path()
      .map_err(|e| ArchiveError::read_io(path, e))?
      .into_owned();
    let basedir = manifest_basedir(&manifest_path).ok_or_else(|| {
      ArchiveError::read(format!(
        "{}: invalid archive: first entry {} is not a manifest",
        path.display(),
        manifest_path.display()
      ))
    })?;

    let mut bytes = Vec::new();
    first
      .read_to_end(&mut bytes)
      .map_err(|e| ArchiveError::read_io(path, e))?;
    let manifest = manifest::decode(&bytes)?.with_metadata_path(manifest_path);

    if manifest.base_dir().is_some_and(|b| b != basedir) {
      return Err(ArchiveError::read(format!(
        "{}: invalid archive: manifest entries are not below {}",
        path.display(),
        basedir.display()
      )));
    }

    debug!(archive = %path.display(), %compression, version = manifest.version(), "archive opened");
    Ok(Archive {
      path: path.to_path_buf(),
      manifest,
      basedir,
      compression,
    })
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  pub fn manifest(&self) -> &Manifest {
    &self.manifest
  }

  /// Top-level directory holding the manifest and all entries.
  pub fn basedir(&self) -> &Path {
    &self.basedir
  }

  pub fn compression(&self) -> Compression {
    self.compression
  }

  fn container(&self) -> Result<tar::Archive<Box<dyn Read>>> {
    let file = File::open(&self.path).map_err(|e| ArchiveError::read_io(&self.path, e))?;
    let (reader, _) = open_reader(file).map_err(|e| ArchiveError::read_io(&self.path, e))?;
    Ok(tar::Archive::new(reader))
  }

  /// Manifest entry described by a container member, unless it is bookkeeping
  /// or not listed at all.
  fn listed(&self, entry_path: &Path) -> Option<&FileInfo> {
    if self.manifest.is_metadata(entry_path) {
      return None;
    }
    let found = self.manifest.find(entry_path);
    if found.is_none() {
      warn!(path = %entry_path.display(), "skipping entry not listed in manifest");
    }
    found
  }

  /// Unpack the archive below `dest`, then apply the modes and modification
  /// times stored in the container.
  pub fn extract(&self, dest: &Path) -> Result<()> {
    fs::create_dir_all(dest).map_err(|e| ArchiveError::create_io(dest, e))?;

    let mut container = self.container()?;
    container.set_preserve_mtime(false);
    container.set_overwrite(true);

    let mut unpacked_members = Vec::new();
    let entries = container.entries().map_err(|e| ArchiveError::read_io(&self.path, e))?;
    for entry in entries {
      let mut entry = entry.map_err(|e| ArchiveError::read_io(&self.path, e))?;
      let entry_path = entry
        .path()
        .map_err(|e| ArchiveError::read_io(&self.path, e))?
        .into_owned();

      if self.listed(&entry_path).is_none() {
        continue;
      }
      if !is_contained(&entry_path) {
        return Err(ArchiveError::read(format!(
          "{}: refusing to extract outside of the target directory",
          entry_path.display()
        )));
      }

      debug!(path = %entry_path.display(), "extracting");
      let member = Member::from_header(&mut entry, &entry_path)?;
      // Directories may be read-only; their modes are applied after all content is in place.
      if member.file_type == Some(FileType::Directory) {
        let target = dest.join(&entry_path);
        fs::create_dir_all(&target).map_err(|e| ArchiveError::create_io(&entry_path, e))?;
      } else {
        let unpacked = entry
          .unpack_in(dest)
          .map_err(|e| ArchiveError::create_io(&entry_path, e))?;
        if !unpacked {
          return Err(ArchiveError::read(format!(
            "{}: refusing to extract outside of the target directory",
            entry_path.display()
          )));
        }
      }
      unpacked_members.push((entry_path, member));
    }

    restore_attributes(dest, &unpacked_members)?;
    info!(archive = %self.path.display(), dest = %dest.display(), "archive extracted");
    Ok(())
  }

  /// Check the members of the container against the manifest.
  ///
  /// Entries are checked in manifest order and the first mismatch is
  /// returned, exactly like [`Archive::verify_tree`] does for a tree on disk.
  pub fn verify(&self) -> Result<()> {
    let algorithms = verify::declared_algorithms(&self.manifest)?;

    let mut found: HashMap<PathBuf, Member> = HashMap::new();
    let mut container = self.container()?;
    let entries = container.entries().map_err(|e| ArchiveError::read_io(&self.path, e))?;
    for entry in entries {
      let mut entry = entry.map_err(|e| ArchiveError::read_io(&self.path, e))?;
      let entry_path = entry
        .path()
        .map_err(|e| ArchiveError::read_io(&self.path, e))?
        .into_owned();
      let Some(fi) = self.listed(&entry_path) else {
        continue;
      };
      let member = Member::from_header(&mut entry, &entry_path)?.digest(&mut entry, &entry_path, &algorithms)?;
      found.insert(fi.path.clone(), member);
    }

    let mut checked = 0usize;
    for fi in self.manifest.iter().filter(|fi| !self.manifest.is_metadata(&fi.path)) {
      debug!(path = %fi.path.display(), "verifying member");
      verify::check_entry(fi, found.remove(&fi.path), &algorithms)?;
      checked += 1;
    }

    info!(archive = %self.path.display(), entries = checked, "verification passed");
    Ok(())
  }

  /// Verify a tree (usually an extracted copy of this archive) below `root`.
  pub fn verify_tree(&self, root: &Path) -> Result<()> {
    verify::verify(&self.manifest, root)
  }
}

/// Children come after their parents in the container, so walking it
/// backwards sets a directory's mtime after its content stopped changing.
fn restore_attributes(dest: &Path, members: &[(PathBuf, Member)]) -> Result<()> {
  for (path, member) in members.iter().rev() {
    let Some(file_type) = member.file_type else {
      continue;
    };
    let target = dest.join(path);
    if file_type != FileType::Symlink {
      platform::set_mode(&target, member.mode).map_err(|e| ArchiveError::create_io(path, e))?;
    }
    platform::set_mtime(&target, member.mtime).map_err(|e| ArchiveError::create_io(path, e))?;
  }
  Ok(())
}

/// The single first path component shared by all roots.
fn common_basedir<P: AsRef<Path>>(roots: &[P]) -> Result<PathBuf> {
  let mut basedir: Option<PathBuf> = None;
  for root in roots {
    let root = normalize_root(root.as_ref())?;
    let first = root
      .components()
      .next()
      .map(|c| PathBuf::from(c.as_os_str()))
      .ok_or_else(|| ArchiveError::create("no paths to archive"))?;
    match &basedir {
      Some(existing) if *existing != first => {
        return Err(ArchiveError::create(
          "all paths to archive must be below one common base directory",
        ));
      }
      Some(_) => {}
      None => basedir = Some(first),
    }
  }
  basedir.ok_or_else(|| ArchiveError::create("no paths to archive"))
}

/// `basedir` if `path` is `<basedir>/.manifest.yaml` with a single-component basedir.
fn manifest_basedir(path: &Path) -> Option<PathBuf> {
  let mut components = path.components();
  let base = match components.next()? {
    Component::Normal(base) => base,
    _ => return None,
  };
  match (components.next()?, components.next()) {
    (Component::Normal(name), None) if name == MANIFEST_FILENAME => Some(PathBuf::from(base)),
    _ => None,
  }
}

fn is_contained(path: &Path) -> bool {
  path
    .components()
    .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

fn write_container(
  file: File,
  compression: Compression,
  manifest: &Manifest,
  manifest_path: &Path,
  workdir: &Path,
) -> Result<()> {
  let create_err = |e: io::Error| ArchiveError::create(format!("writing archive failed: {e}"));

  let writer = ArchiveWriter::new(file, compression).map_err(create_err)?;
  let mut builder = tar::Builder::new(writer);

  let encoded = manifest::encode(manifest)?;
  let mut header = Header::new_gnu();
  header.set_entry_type(EntryType::Regular);
  header.set_mode(MANIFEST_MODE);
  header.set_mtime(manifest.date().timestamp().max(0) as u64);
  header.set_size(encoded.len() as u64);
  builder
    .append_data(&mut header, manifest_path, encoded.as_slice())
    .map_err(create_err)?;

  let algorithms = verify::declared_algorithms(manifest).map_err(|e| ArchiveError::create(e.to_string()))?;
  for fi in manifest.iter().filter(|fi| !manifest.is_metadata(&fi.path)) {
    append_entry(&mut builder, fi, workdir, &algorithms)?;
  }

  builder.into_inner().and_then(ArchiveWriter::finish).map_err(create_err)
}

fn append_entry(
  builder: &mut tar::Builder<ArchiveWriter>,
  fi: &FileInfo,
  workdir: &Path,
  algorithms: &[ChecksumAlgorithm],
) -> Result<()> {
  let source = workdir.join(&fi.path);
  let metadata = fs::symlink_metadata(&source).map_err(|e| ArchiveError::create_io(&fi.path, e))?;
  append_pax_mtime(builder, fi.mtime).map_err(|e| ArchiveError::create_io(&fi.path, e))?;

  let mut header = Header::new_gnu();
  header.set_mode(fi.mode);
  header.set_mtime(fi.mtime.tar_secs());
  header.set_uid(metadata.uid() as u64);
  header.set_gid(metadata.gid() as u64);
  header.set_size(0);

  let appended = match &fi.kind {
    EntryKind::Directory => {
      header.set_entry_type(EntryType::Directory);
      builder.append_data(&mut header, &fi.path, io::empty())
    }
    EntryKind::Regular { size, checksums } => {
      if metadata.len() != *size {
        return Err(changed_while_archiving(fi));
      }
      let file = File::open(&source).map_err(|e| ArchiveError::create_io(&fi.path, e))?;
      let mut content =
        HashingReader::new(file.take(*size), algorithms).map_err(|e| ArchiveError::create(e.to_string()))?;
      header.set_entry_type(EntryType::Regular);
      header.set_size(*size);
      builder
        .append_data(&mut header, &fi.path, &mut content)
        .map_err(|e| ArchiveError::create_io(&fi.path, e))?;
      // Same size is not enough: the file may have been rewritten since it was hashed.
      if content.finish() != *checksums {
        return Err(changed_while_archiving(fi));
      }
      Ok(())
    }
    EntryKind::Symlink { target } => {
      header.set_entry_type(EntryType::Symlink);
      builder.append_link(&mut header, &fi.path, target)
    }
  };
  appended.map_err(|e| ArchiveError::create_io(&fi.path, e))
}

fn changed_while_archiving(fi: &FileInfo) -> ArchiveError {
  ArchiveError::create(format!("{}: file changed while archiving", fi.path.display()))
}
