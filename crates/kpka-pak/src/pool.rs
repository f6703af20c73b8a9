//! Reusable read buffers shared by extraction workers.

use std::ops::{Deref, DerefMut};

use parking_lot::Mutex;

/// Buffers above this capacity are freed instead of being kept.
const MAX_RETAINED_CAPACITY: usize = 16 * 1024 * 1024;

/// A rent/return pool of byte buffers.
///
/// Workers rent a buffer per payload read and hand it back on drop, so
/// peak memory tracks the number of concurrent workers rather than the
/// number of entries.
#[derive(Debug)]
pub struct BufferPool {
    free: Mutex<Vec<Vec<u8>>>,
    max_retained: usize,
}

impl BufferPool {
    /// Create a pool that keeps at most `max_retained` idle buffers.
    pub fn new(max_retained: usize) -> Self {
        Self {
            free: Mutex::new(Vec::with_capacity(max_retained)),
            max_retained,
        }
    }

    /// Rent a zero-initialised buffer of exactly `len` bytes.
    pub fn rent(&self, len: usize) -> PooledBuffer<'_> {
        let mut buf = self.free.lock().pop().unwrap_or_default();
        buf.clear();
        buf.resize(len, 0);
        PooledBuffer { buf, pool: self }
    }

    fn give_back(&self, buf: Vec<u8>) {
        if buf.capacity() > MAX_RETAINED_CAPACITY {
            return;
        }
        let mut free = self.free.lock();
        if free.len() < self.max_retained {
            free.push(buf);
        }
    }

    /// Number of idle buffers currently held.
    pub fn idle(&self) -> usize {
        self.free.lock().len()
    }
}

/// A buffer on loan from a [`BufferPool`].
pub struct PooledBuffer<'a> {
    buf: Vec<u8>,
    pool: &'a BufferPool,
}

impl Deref for PooledBuffer<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.buf
    }
}

impl DerefMut for PooledBuffer<'_> {
    fn deref_mut(&mut self) -> &mut [u8] {
        &mut self.buf
    }
}

impl Drop for PooledBuffer<'_> {
    fn drop(&mut self) {
        self.pool.give_back(std::mem::take(&mut self.buf));
    }
}
