//! Shared utilities.
//!
//! The checksum engine and test helpers.

pub mod hash;
