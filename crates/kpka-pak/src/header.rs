//! Fixed archive header.

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::{Error, Result};

/// PAK file header (16 bytes, at offset 0).
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, packed)]
pub struct PakHeader {
    /// `KPKA` signature
    pub magic: u32,
    /// Major format version
    pub major_version: u8,
    /// Minor format version
    pub minor_version: u8,
    /// Table obfuscation flags
    pub feature_flags: i16,
    /// Number of entries in the table
    pub file_count: i32,
    /// Archive fingerprint (unused by the reader)
    pub fingerprint: u32,
}

/// Header feature flag values.
pub mod feature_flags {
    /// Plain entry table.
    pub const NONE: i16 = 0;
    /// Entry table obfuscated with the key-derived keystream.
    pub const ENCRYPTED_TABLE: i16 = 0x08;
    /// A 4-byte marker follows the entry table.
    pub const EXTRA_MARKER: i16 = 0x10;
    /// All flag combinations the reader understands.
    pub const SUPPORTED: [i16; 3] = [NONE, ENCRYPTED_TABLE, ENCRYPTED_TABLE | EXTRA_MARKER];
}

impl PakHeader {
    /// `KPKA` read as a little-endian u32.
    pub const SIGNATURE: u32 = 0x414B_504B;

    /// Supported `(major, minor)` pairs.
    pub const SUPPORTED_VERSIONS: [(u8, u8); 3] = [(4, 0), (4, 1), (2, 0)];

    /// Check magic, version and feature flags, in that order.
    pub fn validate(&self) -> Result<()> {
        let magic = self.magic;
        if magic != Self::SIGNATURE {
            return Err(Error::InvalidMagic {
                expected: Self::SIGNATURE,
                actual: magic,
            });
        }

        let version = (self.major_version, self.minor_version);
        if !Self::SUPPORTED_VERSIONS.contains(&version) {
            return Err(Error::UnsupportedVersion {
                major: version.0,
                minor: version.1,
            });
        }

        let flags = self.feature_flags;
        if !feature_flags::SUPPORTED.contains(&flags) {
            return Err(Error::UnsupportedEncryption(flags));
        }

        Ok(())
    }

    /// Size in bytes of one on-disk entry record.
    #[inline]
    pub fn entry_size(&self) -> usize {
        if self.major_version == 4 {
            48
        } else {
            24
        }
    }

    /// Number of entries as a usize.
    pub fn entry_count(&self) -> Result<usize> {
        let count = self.file_count;
        usize::try_from(count).map_err(|_| Error::InvalidEntryCount(count))
    }

    /// Whether the entry table is obfuscated.
    #[inline]
    pub fn has_encrypted_table(&self) -> bool {
        self.feature_flags != feature_flags::NONE
    }

    /// Whether a 4-byte marker follows the entry table.
    #[inline]
    pub fn has_extra_marker(&self) -> bool {
        self.feature_flags & feature_flags::EXTRA_MARKER != 0
    }
}
