//! Crate-wide constants.

/// File name of the serialized manifest inside the base directory of an archive.
pub const MANIFEST_FILENAME: &str = ".manifest.yaml";

/// Manifest format version written by this crate.
pub const MANIFEST_VERSION: &str = "1.1";

/// Permission bits of the manifest entry in the container (read-only for everyone).
pub const MANIFEST_MODE: u32 = 0o444;

/// Checksum algorithms used when the caller does not ask for specific ones.
pub const DEFAULT_CHECKSUMS: &[&str] = &["sha256"];

/// Read buffer size for streaming file content through the checksum engine.
pub const CHECKSUM_BUF_LEN: usize = 64 * 1024;
