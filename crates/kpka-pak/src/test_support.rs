//! Synthetic archive authoring for tests.

use std::io::Write;
use std::path::Path;

use flate2::write::DeflateEncoder;
use flate2::Compression;
use zerocopy::IntoBytes;

use kpka_common::hash;

use crate::crypto::{self, KEY_SIZE};
use crate::entry::{CompressionMethod, EncryptionType, RawEntryV2, RawEntryV4};
use crate::header::PakHeader;

/// One file to place in a synthetic archive.
pub(crate) struct FileSpec {
    path: String,
    data: Vec<u8>,
    compression: CompressionMethod,
    encryption: EncryptionType,
    raw_attributes: Option<i64>,
}

impl FileSpec {
    pub(crate) fn new(path: &str, data: &[u8]) -> Self {
        Self {
            path: path.to_string(),
            data: data.to_vec(),
            compression: CompressionMethod::None,
            encryption: EncryptionType::None,
            raw_attributes: None,
        }
    }

    pub(crate) fn compression(mut self, compression: CompressionMethod) -> Self {
        self.compression = compression;
        self
    }

    pub(crate) fn encryption(mut self, encryption: EncryptionType) -> Self {
        self.encryption = encryption;
        self
    }

    /// Write `attributes` verbatim into the v4 record.
    pub(crate) fn raw_attributes(mut self, attributes: i64) -> Self {
        self.raw_attributes = Some(attributes);
        self
    }

    fn stored_bytes(&self) -> Vec<u8> {
        let compressed = match self.compression {
            CompressionMethod::None => self.data.clone(),
            CompressionMethod::Deflate => {
                let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
                encoder.write_all(&self.data).unwrap();
                encoder.finish().unwrap()
            }
            CompressionMethod::Zstd => zstd::encode_all(&self.data[..], 3).unwrap(),
        };

        if self.encryption == EncryptionType::None {
            compressed
        } else {
            crypto::tests::encrypt_resource(&compressed, 0x1_0001)
        }
    }

    fn attributes(&self) -> i64 {
        self.raw_attributes
            .unwrap_or((self.compression as i64) | ((self.encryption as i64) << 16))
    }
}

/// Builds archive bytes in the on-disk layout: header, entry table,
/// optional marker, optional key blob, then payloads.
pub(crate) struct ArchiveBuilder {
    version: (u8, u8),
    flags: i16,
    files: Vec<FileSpec>,
}

impl ArchiveBuilder {
    pub(crate) fn new(version: (u8, u8), flags: i16) -> Self {
        Self {
            version,
            flags,
            files: Vec::new(),
        }
    }

    pub(crate) fn file(mut self, file: FileSpec) -> Self {
        self.files.push(file);
        self
    }

    pub(crate) fn build(&self) -> Vec<u8> {
        let header = PakHeader {
            magic: PakHeader::SIGNATURE,
            major_version: self.version.0,
            minor_version: self.version.1,
            feature_flags: self.flags,
            file_count: self.files.len() as i32,
            fingerprint: 0xC0FF_EE00,
        };

        let mut data_offset = std::mem::size_of::<PakHeader>() + self.files.len() * header.entry_size();
        if header.has_extra_marker() {
            data_offset += 4;
        }
        if header.has_encrypted_table() {
            data_offset += KEY_SIZE;
        }

        let mut table = Vec::new();
        let mut payloads = Vec::new();
        for file in &self.files {
            let stored = file.stored_bytes();
            let offset = (data_offset + payloads.len()) as i64;
            let normalized = hash::normalize_path(&file.path);
            let hash_low = hash::hash_wide(&normalized.to_lowercase());
            let hash_high = hash::hash_wide(&normalized.to_uppercase());

            if self.version.0 == 4 {
                let raw = RawEntryV4 {
                    hash_low,
                    hash_high,
                    offset,
                    compressed_size: stored.len() as i64,
                    decompressed_size: file.data.len() as i64,
                    attributes: file.attributes(),
                    checksum: 0,
                };
                table.extend_from_slice(raw.as_bytes());
            } else {
                let raw = RawEntryV2 {
                    offset,
                    compressed_size: stored.len() as i64,
                    hash_high,
                    hash_low,
                };
                table.extend_from_slice(raw.as_bytes());
            }
            payloads.extend_from_slice(&stored);
        }

        let mut out = header.as_bytes().to_vec();
        let mut trailer = Vec::new();
        if header.has_extra_marker() {
            trailer.extend_from_slice(&[0xAA; 4]);
        }
        if header.has_encrypted_table() {
            let blob: [u8; KEY_SIZE] = std::array::from_fn(|i| (i as u8).wrapping_mul(31) ^ 0x5C);
            let key = crypto::decrypt_key(&blob);
            crypto::apply_table_keystream(&mut table, &key);
            trailer.extend_from_slice(&blob);
        }

        out.extend_from_slice(&table);
        out.extend_from_slice(&trailer);
        out.extend_from_slice(&payloads);
        out
    }

    pub(crate) fn write_to(&self, path: &Path) {
        std::fs::write(path, self.build()).unwrap();
    }
}
