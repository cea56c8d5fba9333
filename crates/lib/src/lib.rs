//! archivist: content-addressed archive manifests
//!
//! This crate provides the building blocks of the `archive-tool` CLI:
//! - `Manifest`: a path-sorted record of a directory tree with per-file checksums
//! - `ManifestBuilder`: walks a tree and produces a manifest
//! - `verify`: checks a tree on disk against a manifest
//! - `diff`: lazily compares two manifests
//! - `Archive`: tar containers carrying their own manifest

pub mod archive;
pub mod consts;
pub mod diff;
pub mod error;
pub mod manifest;
pub mod platform;
pub mod util;
pub mod verify;

pub use archive::{Archive, Compression, CreateOptions};
pub use diff::{DiffExt, DiffItem, DiffStatus, Severity, diff_manifests};
pub use error::{ArchiveError, IntegrityReason};
pub use manifest::{FileInfo, FileType, Manifest, ManifestBuilder};

pub type Result<T> = std::result::Result<T, ArchiveError>;
