//! PAK archive entries.

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use kpka_common::hash;

use crate::{Error, Result};

/// Compression method of an entry payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CompressionMethod {
    /// Stored without compression
    None = 0,
    /// Raw DEFLATE stream (no zlib header)
    Deflate = 1,
    /// Zstandard frame
    Zstd = 2,
}

impl TryFrom<u8> for CompressionMethod {
    type Error = u8;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::None),
            1 => Ok(Self::Deflate),
            2 => Ok(Self::Zstd),
            other => Err(other),
        }
    }
}

/// Resource encryption applied to an entry payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum EncryptionType {
    None = 0,
    Type1 = 1,
    Type2 = 2,
    Type3 = 3,
    Type4 = 4,
    Invalid = 5,
}

impl TryFrom<u8> for EncryptionType {
    type Error = u8;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::None),
            1 => Ok(Self::Type1),
            2 => Ok(Self::Type2),
            3 => Ok(Self::Type3),
            4 => Ok(Self::Type4),
            5 => Ok(Self::Invalid),
            other => Err(other),
        }
    }
}

/// On-disk entry record for format version 4.x (48 bytes).
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, packed)]
pub struct RawEntryV4 {
    /// Hash of the lowercased path
    pub hash_low: u32,
    /// Hash of the uppercased path
    pub hash_high: u32,
    /// Absolute payload offset
    pub offset: i64,
    /// Stored payload size
    pub compressed_size: i64,
    /// Size after decompression
    pub decompressed_size: i64,
    /// Packed compression (bits 0-3) and encryption (bits 16-23)
    pub attributes: i64,
    /// Payload checksum
    pub checksum: i64,
}

/// On-disk entry record for format version 2.0 (24 bytes).
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, packed)]
pub struct RawEntryV2 {
    pub offset: i64,
    pub compressed_size: i64,
    pub hash_high: u32,
    pub hash_low: u32,
}

/// A decoded archive entry.
///
/// This contains metadata about the file, not the file data itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PakEntry {
    /// Hash of the lowercased path
    pub hash_low: u32,
    /// Hash of the uppercased path
    pub hash_high: u32,
    /// Absolute payload offset
    pub offset: i64,
    /// Stored payload size
    pub compressed_size: i64,
    /// Size after decompression
    pub decompressed_size: i64,
    /// Payload checksum (zero for v2 archives)
    pub checksum: i64,
    /// Compression method
    pub compression: CompressionMethod,
    /// Resource encryption
    pub encryption: EncryptionType,
}

impl PakEntry {
    /// Decode a v4 record, rejecting unknown compression or encryption ids.
    pub fn from_v4(raw: &RawEntryV4) -> Result<Self> {
        let attributes = raw.attributes;
        let compression = CompressionMethod::try_from((attributes & 0xF) as u8)
            .map_err(Error::UnsupportedCompression)?;
        let encryption = EncryptionType::try_from(((attributes >> 16) & 0xFF) as u8)
            .map_err(Error::UnsupportedResourceEncryption)?;

        Ok(Self {
            hash_low: raw.hash_low,
            hash_high: raw.hash_high,
            offset: raw.offset,
            compressed_size: raw.compressed_size,
            decompressed_size: raw.decompressed_size,
            checksum: raw.checksum,
            compression,
            encryption,
        })
    }

    /// Decode a v2 record. These are always stored and unencrypted.
    pub fn from_v2(raw: &RawEntryV2) -> Self {
        Self {
            hash_low: raw.hash_low,
            hash_high: raw.hash_high,
            offset: raw.offset,
            compressed_size: raw.compressed_size,
            decompressed_size: raw.compressed_size,
            checksum: 0,
            compression: CompressionMethod::None,
            encryption: EncryptionType::None,
        }
    }

    /// Combined 64-bit path hash.
    #[inline]
    pub fn hash(&self) -> u64 {
        hash::combine(self.hash_low, self.hash_high)
    }

    /// Whether the payload needs resource decryption.
    #[inline]
    pub fn is_encrypted(&self) -> bool {
        self.encryption != EncryptionType::None
    }

    /// Whether the payload can be copied straight from the archive.
    #[inline]
    pub fn is_stored(&self) -> bool {
        self.compression == CompressionMethod::None && !self.is_encrypted()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_v4(attributes: i64) -> RawEntryV4 {
        RawEntryV4 {
            hash_low: 0x1111_2222,
            hash_high: 0x3333_4444,
            offset: 64,
            compressed_size: 10,
            decompressed_size: 20,
            attributes,
            checksum: 7,
        }
    }

    #[test]
    fn test_record_sizes() {
        assert_eq!(std::mem::size_of::<RawEntryV4>(), 48);
        assert_eq!(std::mem::size_of::<RawEntryV2>(), 24);
    }

    #[test]
    fn test_v4_attributes() {
        let entry = PakEntry::from_v4(&raw_v4(2 | (3 << 16))).unwrap();
        assert_eq!(entry.compression, CompressionMethod::Zstd);
        assert_eq!(entry.encryption, EncryptionType::Type3);
        assert_eq!(entry.hash(), 0x3333_4444_1111_2222);
        assert!(entry.is_encrypted());
        assert!(!entry.is_stored());
    }

    #[test]
    fn test_v4_invalid_encryption_is_representable() {
        let entry = PakEntry::from_v4(&raw_v4(5 << 16)).unwrap();
        assert_eq!(entry.encryption, EncryptionType::Invalid);
    }

    #[test]
    fn test_v4_unknown_ids_rejected() {
        assert!(matches!(
            PakEntry::from_v4(&raw_v4(3)),
            Err(Error::UnsupportedCompression(3))
        ));
        assert!(matches!(
            PakEntry::from_v4(&raw_v4(6 << 16)),
            Err(Error::UnsupportedResourceEncryption(6))
        ));
    }

    #[test]
    fn test_v2_defaults() {
        let entry = PakEntry::from_v2(&RawEntryV2 {
            offset: 100,
            compressed_size: 42,
            hash_high: 2,
            hash_low: 1,
        });
        assert_eq!(entry.decompressed_size, 42);
        assert_eq!(entry.checksum, 0);
        assert_eq!(entry.hash(), (2u64 << 32) | 1);
        assert!(entry.is_stored());
    }
}
