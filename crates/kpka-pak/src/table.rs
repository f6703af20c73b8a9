//! Header and entry-table decoding.

use std::collections::HashSet;
use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use kpka_common::{BinaryReader, ReadExt};

use crate::crypto::{self, KEY_SIZE};
use crate::entry::{PakEntry, RawEntryV2, RawEntryV4};
use crate::header::PakHeader;
use crate::Result;

/// Decoded header and entries of one archive.
#[derive(Debug, Clone)]
pub struct PakTable {
    header: PakHeader,
    entries: Vec<PakEntry>,
}

impl PakTable {
    /// Open an archive file and decode its table.
    ///
    /// When `allow` is given, only entries whose combined hash it contains
    /// are kept.
    pub fn open<P: AsRef<Path>>(path: P, allow: Option<&HashSet<u64>>) -> Result<Self> {
        let mut reader = BufReader::new(File::open(path)?);
        Self::read(&mut reader, allow)
    }

    /// Decode the table from a stream positioned at the archive start.
    pub fn read<R: Read + Seek>(reader: &mut R, allow: Option<&HashSet<u64>>) -> Result<Self> {
        let header: PakHeader = reader.read_struct()?;
        header.validate()?;

        let count = header.entry_count()?;
        let table_len = count as u64 * header.entry_size() as u64;

        // The count is untrusted; grow only as far as the stream really goes.
        let mut buffer = Vec::new();
        reader.by_ref().take(table_len).read_to_end(&mut buffer)?;
        if (buffer.len() as u64) < table_len {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("entry table needs {table_len} bytes, found {}", buffer.len()),
            )
            .into());
        }

        if header.has_extra_marker() {
            reader.seek(SeekFrom::Current(4))?;
        }

        if header.has_encrypted_table() {
            let blob: [u8; KEY_SIZE] = reader.read_array()?;
            let key = crypto::decrypt_key(&blob);
            crypto::apply_table_keystream(&mut buffer, &key);
        }

        let entries = parse_entries(&header, &buffer, count, allow)?;

        Ok(Self { header, entries })
    }

    /// Get the archive header.
    #[inline]
    pub fn header(&self) -> &PakHeader {
        &self.header
    }

    /// Get the decoded entries.
    #[inline]
    pub fn entries(&self) -> &[PakEntry] {
        &self.entries
    }

    /// Consume the table, keeping only the entries.
    #[inline]
    pub fn into_entries(self) -> Vec<PakEntry> {
        self.entries
    }
}

fn parse_entries(
    header: &PakHeader,
    buffer: &[u8],
    count: usize,
    allow: Option<&HashSet<u64>>,
) -> Result<Vec<PakEntry>> {
    let mut reader = BinaryReader::new(buffer);
    let mut entries = Vec::with_capacity(allow.map_or(count, |a| a.len().min(count)));
    let wanted = |entry: &PakEntry| allow.map_or(true, |a| a.contains(&entry.hash()));

    for _ in 0..count {
        let entry = if header.major_version == 4 {
            let raw: RawEntryV4 = reader.read_struct()?;
            PakEntry::from_v4(&raw)?
        } else {
            let raw: RawEntryV2 = reader.read_struct()?;
            PakEntry::from_v2(&raw)
        };

        if wanted(&entry) {
            entries.push(entry);
        }
    }

    Ok(entries)
}
