//! Error types for the PAK crate.

use thiserror::Error;

/// Errors that can occur when reading or extracting PAK archives.
///
/// Every variant is fatal for the extraction call that produced it.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Common library error.
    #[error("{0}")]
    Common(#[from] kpka_common::Error),

    /// The archive does not start with the `KPKA` magic.
    #[error("invalid PAK magic: expected {expected:#010x}, got {actual:#010x}")]
    InvalidMagic { expected: u32, actual: u32 },

    /// The header declares a negative entry count.
    #[error("invalid entry count: {0}")]
    InvalidEntryCount(i32),

    /// Unsupported major/minor version pair.
    #[error("unsupported PAK version: {major}.{minor}")]
    UnsupportedVersion { major: u8, minor: u8 },

    /// Unsupported header feature flags.
    #[error("unsupported feature flags: {0:#x}")]
    UnsupportedEncryption(i16),

    /// Unknown per-entry encryption id.
    #[error("unsupported resource encryption: {0}")]
    UnsupportedResourceEncryption(u8),

    /// Unknown per-entry compression id.
    #[error("unsupported compression method: {0}")]
    UnsupportedCompression(u8),

    /// An entry size falls outside the range a buffer can be allocated for.
    #[error("entry {hash:#018x} has unsupported size {size}")]
    SizeOverflow { hash: u64, size: i64 },

    /// Decompression error.
    #[error("decompression error: {0}")]
    Decompression(String),

    /// Encrypted resource payload does not have the expected block layout.
    #[error("malformed encrypted resource: {0}")]
    MalformedResource(String),

    /// The worker pool could not be created.
    #[error("failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    /// A blocking extraction task panicked or was aborted.
    #[cfg(feature = "async")]
    #[error("extraction task failed: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),

    /// Extraction was cancelled through a [`crate::CancellationToken`].
    #[error("extraction cancelled")]
    Cancelled,
}

/// Result type for PAK operations.
pub type Result<T> = std::result::Result<T, Error>;
