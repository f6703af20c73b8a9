//! Reader for KPKA game archives.
//!
//! A KPKA archive is a flat container of compressed, optionally encrypted
//! blobs. It stores no file names: every entry is identified by a 64-bit
//! hash of its logical path, so callers must supply the paths they want.
//! The format features:
//!
//! - Format versions 4.0, 4.1 and the legacy 2.0
//! - An entry table obfuscated with an RSA-style keystream
//! - Per-resource block encryption based on big-integer division
//! - Raw DEFLATE and Zstandard compression
//!
//! [`PakReader`] extracts requested paths from a stack of archives, letting
//! later (patch or mod) archives override earlier ones. Each archive is
//! extracted by several workers in parallel.
//!
//! # Example
//!
//! ```no_run
//! use kpka_pak::{PakReader, PakTable};
//!
//! // Inspect a single archive
//! let table = PakTable::open("re_chunk_000.pak", None)?;
//! println!("{} entries", table.entries().len());
//!
//! // Extract a path, preferring the patch archive
//! let mut reader = PakReader::new(["re_chunk_000.pak", "re_chunk_000.pak.patch_001.pak"]);
//! reader.add_file("natives/stm/gui/title.tex");
//! let report = reader.unpack("out")?;
//! assert!(report.missing.is_empty());
//! # Ok::<(), kpka_pak::Error>(())
//! ```

pub mod crypto;
mod decompress;
mod entry;
mod error;
mod header;
mod index;
mod pool;
mod reader;
mod schedule;
mod table;

#[cfg(test)]
mod test_support;

pub use decompress::decompress;
pub use entry::{CompressionMethod, EncryptionType, PakEntry, RawEntryV2, RawEntryV4};
pub use error::{Error, Result};
pub use header::{feature_flags, PakHeader};
pub use index::PathIndex;
pub use pool::{BufferPool, PooledBuffer};
pub use reader::{PakReader, UnpackReport, DEFAULT_DISABLED_ARCHIVE_THRESHOLD};
pub use schedule::{
    partition, thread_count, CancellationToken, FilterMode, MAX_BUFFER_LEN,
    MIN_ENTRIES_PER_THREAD,
};
pub use table::PakTable;

/// Re-export of the path hashing helpers.
pub use kpka_common::hash;
