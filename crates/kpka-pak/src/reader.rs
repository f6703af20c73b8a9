//! Layered extraction across several archives.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use rayon::{ThreadPool, ThreadPoolBuilder};
use regex::Regex;
use tracing::{debug, info, warn};

use crate::entry::PakEntry;
use crate::index::PathIndex;
use crate::pool::BufferPool;
use crate::schedule::{CancellationToken, ChunkOutcome, ExtractJob, FilterMode};
use crate::table::PakTable;
use crate::Result;

/// Archives at or below this size are treated as disabled placeholders.
pub const DEFAULT_DISABLED_ARCHIVE_THRESHOLD: u64 = 16;

/// Outcome of an [`PakReader::unpack`] call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnpackReport {
    /// Number of files written.
    pub extracted: usize,
    /// Requested paths not found in any archive, sorted.
    pub missing: Vec<String>,
}

/// Extracts requested paths from an ordered stack of archives.
///
/// Archives are given lowest priority first. Unpacking scans them from the
/// last (highest priority) to the first, so a path present in several
/// archives is taken from the one added last.
///
/// # Example
///
/// ```no_run
/// use kpka_pak::PakReader;
///
/// let mut reader = PakReader::new(["re_chunk_000.pak", "re_chunk_000.pak.patch_001.pak"])
///     .with_max_threads(8);
/// reader.add_files_from_list_file("paths.list")?;
///
/// let report = reader.unpack("out")?;
/// println!("{} extracted, {} missing", report.extracted, report.missing.len());
/// # Ok::<(), kpka_pak::Error>(())
/// ```
#[derive(Debug)]
pub struct PakReader {
    archives: Vec<PathBuf>,
    pending: PathIndex,
    filter: Option<Regex>,
    filter_mode: FilterMode,
    max_threads: usize,
    disabled_threshold: u64,
    cancel: CancellationToken,
    buffers: Arc<BufferPool>,
}

impl PakReader {
    /// Create a reader over archives ordered from lowest to highest priority.
    pub fn new<I, P>(archives: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let max_threads = std::thread::available_parallelism().map_or(1, |n| n.get());
        Self {
            archives: archives.into_iter().map(Into::into).collect(),
            pending: PathIndex::new(),
            filter: None,
            filter_mode: FilterMode::default(),
            max_threads,
            disabled_threshold: DEFAULT_DISABLED_ARCHIVE_THRESHOLD,
            cancel: CancellationToken::new(),
            buffers: Arc::new(BufferPool::new(max_threads * 2)),
        }
    }

    /// Set the maximum number of extraction workers per archive.
    pub fn with_max_threads(mut self, max_threads: usize) -> Self {
        self.max_threads = max_threads;
        self
    }

    /// Only write paths matching `filter`.
    pub fn with_filter(mut self, filter: Regex) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Choose whether filtered-out paths count as resolved.
    pub fn with_filter_mode(mut self, mode: FilterMode) -> Self {
        self.filter_mode = mode;
        self
    }

    /// Treat archives of at most `bytes` bytes as disabled.
    pub fn with_disabled_archive_threshold(mut self, bytes: u64) -> Self {
        self.disabled_threshold = bytes;
        self
    }

    /// Use an externally owned cancellation token.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Append an archive with higher priority than all existing ones.
    pub fn add_archive(&mut self, path: impl Into<PathBuf>) {
        self.archives.push(path.into());
    }

    /// Request a logical path.
    pub fn add_file(&mut self, path: impl Into<String>) {
        self.pending.insert(path);
    }

    /// Request several logical paths.
    pub fn add_files<I, S>(&mut self, paths: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for path in paths {
            self.pending.insert(path);
        }
    }

    /// Request every path listed in a newline-delimited file.
    pub fn add_files_from_list_file<P: AsRef<Path>>(&mut self, list: P) -> Result<usize> {
        let list = list.as_ref();
        let added = self.pending.insert_from_list_file(list)?;
        debug!(list = %list.display(), added, "loaded path list");
        Ok(added)
    }

    /// Archives in storage order (lowest priority first).
    pub fn archives(&self) -> &[PathBuf] {
        &self.archives
    }

    /// Paths still waiting to be resolved.
    pub fn pending(&self) -> &PathIndex {
        &self.pending
    }

    /// Token that cancels a running unpack.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Extract all pending paths into `output`, blocking until done.
    ///
    /// Resolved paths are removed from the pending set; the rest are
    /// reported as missing. Any decode or I/O error aborts the call; files
    /// written before the error stay on disk.
    pub fn unpack<P: AsRef<Path>>(&mut self, output: P) -> Result<UnpackReport> {
        let output = output.as_ref();
        let pool = self.worker_pool()?;
        let mut extracted = 0;

        for archive in self.archives_by_priority() {
            if self.pending.is_empty() {
                break;
            }
            let Some(entries) = self.matching_entries(&archive)? else {
                continue;
            };

            let max_threads = self.max_threads;
            let outcome = self.with_job(&archive, entries, output, |job| {
                job.run(max_threads, pool.as_ref())
            })?;
            extracted += self.merge(&archive, outcome);
        }

        Ok(self.report(extracted))
    }

    /// Async variant of [`PakReader::unpack`].
    ///
    /// Chunks run on tokio's blocking pool and are awaited together, so the
    /// caller's task is suspended rather than blocked at the join.
    #[cfg(feature = "async")]
    pub async fn unpack_async<P: AsRef<Path>>(&mut self, output: P) -> Result<UnpackReport> {
        let output = output.as_ref();
        let mut extracted = 0;

        for archive in self.archives_by_priority() {
            if self.pending.is_empty() {
                break;
            }
            let Some(entries) = self.matching_entries(&archive)? else {
                continue;
            };

            let job = Arc::new(self.job(&archive, entries, output));
            let result = Arc::clone(&job).run_async(self.max_threads).await;
            self.restore_pending(job);
            extracted += self.merge(&archive, result?);
        }

        Ok(self.report(extracted))
    }

    fn worker_pool(&self) -> Result<Option<ThreadPool>> {
        if self.max_threads <= 1 {
            return Ok(None);
        }
        let pool = ThreadPoolBuilder::new()
            .num_threads(self.max_threads)
            .thread_name(|i| format!("kpka-extract-{i}"))
            .build()?;
        Ok(Some(pool))
    }

    fn archives_by_priority(&self) -> Vec<PathBuf> {
        self.archives.iter().rev().cloned().collect()
    }

    /// Decode an archive's table restricted to pending hashes.
    ///
    /// Returns `None` for disabled archives and archives with no match.
    fn matching_entries(&self, archive: &Path) -> Result<Option<Vec<PakEntry>>> {
        let size = std::fs::metadata(archive)?.len();
        if size <= self.disabled_threshold {
            warn!(archive = %archive.display(), size, "skipping disabled archive");
            return Ok(None);
        }

        let allow = self.pending.hashes();
        let entries = PakTable::open(archive, Some(&allow))?.into_entries();
        debug!(
            archive = %archive.display(),
            matched = entries.len(),
            pending = allow.len(),
            "decoded entry table"
        );

        Ok((!entries.is_empty()).then_some(entries))
    }

    fn job(&mut self, archive: &Path, entries: Vec<PakEntry>, output: &Path) -> ExtractJob {
        ExtractJob {
            archive: archive.to_path_buf(),
            entries: entries.into(),
            pending: Arc::new(std::mem::take(&mut self.pending)),
            output: output.to_path_buf(),
            filter: self.filter.clone(),
            filter_mode: self.filter_mode,
            cancel: self.cancel.clone(),
            buffers: Arc::clone(&self.buffers),
        }
    }

    /// Lend the pending set to a job for its parallel phase, then take it back.
    fn with_job<F>(
        &mut self,
        archive: &Path,
        entries: Vec<PakEntry>,
        output: &Path,
        run: F,
    ) -> Result<ChunkOutcome>
    where
        F: FnOnce(&ExtractJob) -> Result<ChunkOutcome>,
    {
        let job = self.job(archive, entries, output);
        let result = run(&job);
        self.pending = unwrap_pending(job.pending);
        result
    }

    /// Take the pending set back from a job shared with async tasks.
    #[cfg(feature = "async")]
    fn restore_pending(&mut self, job: Arc<ExtractJob>) {
        let pending = match Arc::try_unwrap(job) {
            Ok(job) => job.pending,
            Err(shared) => Arc::clone(&shared.pending),
        };
        self.pending = unwrap_pending(pending);
    }

    /// Remove resolved hashes after every chunk of an archive has finished.
    fn merge(&mut self, archive: &Path, outcome: ChunkOutcome) -> usize {
        let removed = self.pending.remove_all(outcome.resolved);
        info!(
            archive = %archive.display(),
            extracted = outcome.extracted,
            resolved = removed,
            remaining = self.pending.len(),
            "archive done"
        );
        outcome.extracted
    }

    fn report(&self, extracted: usize) -> UnpackReport {
        let missing = self.pending.remaining_paths();
        info!(extracted, missing = missing.len(), "unpack finished");
        UnpackReport { extracted, missing }
    }
}

fn unwrap_pending(pending: Arc<PathIndex>) -> PathIndex {
    Arc::try_unwrap(pending).unwrap_or_else(|shared| (*shared).clone())
}
