//! Common utilities for KPKA archive tooling.
//!
//! This crate provides the foundational pieces shared by the archive crates:
//!
//! - [`BinaryReader`] - Zero-copy binary reading from byte slices
//! - [`ReadExt`] - Fixed-layout struct reads from streams
//! - [`hash`] - MurmurHash3 path fingerprints

mod error;
mod reader;

pub mod hash;

pub use error::{Error, Result};
pub use reader::{BinaryReader, ReadExt};

/// Re-export zerocopy traits for convenience
pub use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};
