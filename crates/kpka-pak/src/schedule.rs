//! Chunked parallel extraction of one archive.
//!
//! An archive's matched entries are split into contiguous chunks, one per
//! worker. Each worker opens its own handle on the archive, so no stream
//! position is ever shared. Results stay private to a chunk until every
//! chunk has finished; only then are they merged.

use std::borrow::Cow;
use std::fs::{self, File};
use std::io::{self, Read, Seek, SeekFrom};
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rayon::prelude::*;
use rayon::ThreadPool;
use regex::Regex;
use tracing::{debug, trace};

use kpka_common::hash;

use crate::crypto;
use crate::decompress;
use crate::entry::PakEntry;
use crate::index::PathIndex;
use crate::pool::BufferPool;
use crate::{Error, Result};

/// Minimum number of entries a worker is given before another is added.
pub const MIN_ENTRIES_PER_THREAD: usize = 64;

/// Largest payload size a single buffer may hold.
pub const MAX_BUFFER_LEN: i64 = 0x7FFF_FFC7;

/// What a path filter does to entries it rejects.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FilterMode {
    /// Rejected entries are not written and stay pending, so a
    /// lower-priority archive may still be asked for them.
    #[default]
    OutputOnly,
    /// Rejected entries are not written but count as resolved.
    Resolve,
}

/// Cooperative cancellation flag checked between entries.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Running workers stop before their next entry.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Number of workers for an archive with `entry_count` matched entries.
pub fn thread_count(max_threads: usize, entry_count: usize) -> usize {
    if max_threads <= 1 {
        return 1;
    }
    max_threads.clamp(1, (entry_count / MIN_ENTRIES_PER_THREAD).max(1))
}

/// Split `[0, n)` into `chunks` contiguous ranges of near-equal size.
///
/// Range `k` is `n*k/chunks .. n*(k+1)/chunks`; empty ranges are dropped.
pub fn partition(n: usize, chunks: usize) -> Vec<Range<usize>> {
    let chunks = chunks.max(1);
    (0..chunks)
        .map(|k| (n * k / chunks)..(n * (k + 1) / chunks))
        .filter(|r| !r.is_empty())
        .collect()
}

/// Everything a worker needs to extract part of one archive.
pub(crate) struct ExtractJob {
    pub archive: PathBuf,
    pub entries: Arc<[PakEntry]>,
    pub pending: Arc<PathIndex>,
    pub output: PathBuf,
    pub filter: Option<Regex>,
    pub filter_mode: FilterMode,
    pub cancel: CancellationToken,
    pub buffers: Arc<BufferPool>,
}

/// Result of one chunk, or of a whole archive after merging.
#[derive(Debug, Default)]
pub(crate) struct ChunkOutcome {
    pub resolved: Vec<u64>,
    pub extracted: usize,
}

impl ChunkOutcome {
    /// Combine per-chunk results.
    pub fn merge(outcomes: Vec<ChunkOutcome>) -> ChunkOutcome {
        outcomes
            .into_iter()
            .fold(ChunkOutcome::default(), |mut acc, chunk| {
                acc.resolved.extend(chunk.resolved);
                acc.extracted += chunk.extracted;
                acc
            })
    }
}

impl ExtractJob {
    /// Chunk ranges for this job given a thread budget.
    pub fn plan(&self, max_threads: usize) -> Vec<Range<usize>> {
        let n = self.entries.len();
        let chunks = partition(n, thread_count(max_threads, n));
        debug!(
            archive = %self.archive.display(),
            entries = n,
            chunks = chunks.len(),
            "planned extraction"
        );
        chunks
    }

    /// Extract one archive, fanning chunks out over `pool`.
    ///
    /// Returns only after every chunk has finished.
    pub fn run(&self, max_threads: usize, pool: Option<&ThreadPool>) -> Result<ChunkOutcome> {
        let chunks = self.plan(max_threads);

        let outcomes = match (chunks.len(), pool) {
            (0, _) => Vec::new(),
            (1, _) | (_, None) => chunks
                .into_iter()
                .map(|range| self.extract_chunk(range))
                .collect::<Result<Vec<_>>>()?,
            (_, Some(pool)) => pool.install(|| {
                chunks
                    .into_par_iter()
                    .map(|range| self.extract_chunk(range))
                    .collect::<Result<Vec<_>>>()
            })?,
        };

        Ok(ChunkOutcome::merge(outcomes))
    }

    /// Extract one archive with each chunk on tokio's blocking pool.
    ///
    /// Resolves only after every chunk task has finished.
    #[cfg(feature = "async")]
    pub async fn run_async(self: Arc<Self>, max_threads: usize) -> Result<ChunkOutcome> {
        let handles = self.plan(max_threads).into_iter().map(|range| {
            let job = Arc::clone(&self);
            tokio::task::spawn_blocking(move || job.extract_chunk(range))
        });

        let outcomes = futures::future::try_join_all(handles)
            .await?
            .into_iter()
            .collect::<Result<Vec<_>>>()?;

        Ok(ChunkOutcome::merge(outcomes))
    }

    /// Extract the entries in `range` through a private archive handle.
    pub fn extract_chunk(&self, range: Range<usize>) -> Result<ChunkOutcome> {
        let mut file = File::open(&self.archive)?;
        let mut outcome = ChunkOutcome::default();

        for entry in &self.entries[range] {
            if self.cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }

            let key = entry.hash();
            let Some(path) = self.pending.get(key) else {
                continue;
            };

            if let Some(filter) = &self.filter {
                if !filter.is_match(path) {
                    if self.filter_mode == FilterMode::Resolve {
                        outcome.resolved.push(key);
                    }
                    continue;
                }
            }

            self.extract_entry(&mut file, entry, path)?;
            outcome.resolved.push(key);
            outcome.extracted += 1;
        }

        Ok(outcome)
    }

    fn extract_entry(&self, file: &mut File, entry: &PakEntry, path: &str) -> Result<()> {
        let compressed_size = checked_size(entry.hash(), entry.compressed_size)?;
        let decompressed_size = checked_size(entry.hash(), entry.decompressed_size)?;
        let offset = u64::try_from(entry.offset).map_err(|_| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("negative offset {} for {path}", entry.offset),
            )
        })?;

        let read_len = if entry.is_stored() {
            decompressed_size
        } else {
            compressed_size
        };

        file.seek(SeekFrom::Start(offset))?;
        let mut stored = self.buffers.rent(read_len);
        file.read_exact(&mut stored)?;

        let output_path = output_path(&self.output, path);
        if let Some(parent) = output_path.parent() {
            fs::create_dir_all(parent)?;
        }

        if entry.is_stored() {
            fs::write(&output_path, &*stored)?;
        } else {
            let payload: Cow<'_, [u8]> = if entry.is_encrypted() {
                Cow::Owned(crypto::decrypt_resource(&stored)?)
            } else {
                Cow::Borrowed(&stored[..])
            };
            let data = decompress::decompress(entry.compression, &payload, decompressed_size)?;
            fs::write(&output_path, data)?;
        }

        trace!(path, size = decompressed_size, "extracted");
        Ok(())
    }
}

fn checked_size(hash: u64, size: i64) -> Result<usize> {
    if !(0..=MAX_BUFFER_LEN).contains(&size) {
        return Err(Error::SizeOverflow { hash, size });
    }
    usize::try_from(size).map_err(|_| Error::SizeOverflow { hash, size })
}

/// Location of a logical path under the output root.
///
/// Empty, `.` and `..` components are dropped so the result never leaves
/// `root`.
pub(crate) fn output_path(root: &Path, logical: &str) -> PathBuf {
    hash::normalize_path(logical)
        .split('/')
        .filter(|part| !matches!(*part, "" | "." | ".."))
        .fold(root.to_path_buf(), |path, part| path.join(part))
}
