//! Manifest model, builder and serialized form.
//!
//! A manifest is an immutable, path-sorted snapshot of a directory tree: one
//! [`FileInfo`] per filesystem entry plus the archive-level header (version,
//! creation date, checksum algorithms, bookkeeping paths and tags).

mod builder;
mod codec;
mod types;

pub use builder::ManifestBuilder;
pub(crate) use builder::normalize_root;
pub use codec::{SUPPORTED_VERSIONS, decode, encode};
pub use types::*;
