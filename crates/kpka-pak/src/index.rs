//! Requested path index.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

use kpka_common::hash;

use crate::Result;

/// Maps combined path hashes to the logical paths a caller asked for.
///
/// Archives only carry hashes, so this index is the only place a readable
/// name exists. Entries are removed as archives resolve them.
#[derive(Debug, Clone, Default)]
pub struct PathIndex {
    paths: HashMap<u64, String>,
}

impl PathIndex {
    /// Create an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a logical path. Returns its combined hash.
    ///
    /// The original spelling is kept; a later path with the same hash
    /// replaces it.
    pub fn insert(&mut self, path: impl Into<String>) -> u64 {
        let path = path.into();
        let key = hash::path_hash(&path);
        self.paths.insert(key, path);
        key
    }

    /// Add every path listed in a newline-delimited file.
    ///
    /// Blank lines and lines starting with `#` are ignored. Returns the
    /// number of paths read.
    pub fn insert_from_list_file<P: AsRef<Path>>(&mut self, list: P) -> Result<usize> {
        let contents = fs::read_to_string(list)?;
        Ok(self.insert_from_list(&contents))
    }

    /// Add every path in a newline-delimited list.
    pub fn insert_from_list(&mut self, contents: &str) -> usize {
        let mut added = 0;
        for line in contents.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            self.insert(line);
            added += 1;
        }
        added
    }

    /// Look up the path for a combined hash.
    #[inline]
    pub fn get(&self, hash: u64) -> Option<&str> {
        self.paths.get(&hash).map(String::as_str)
    }

    #[inline]
    pub fn contains(&self, hash: u64) -> bool {
        self.paths.contains_key(&hash)
    }

    /// Number of pending paths.
    #[inline]
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Snapshot of all pending hashes, used as a table allow-list.
    pub fn hashes(&self) -> HashSet<u64> {
        self.paths.keys().copied().collect()
    }

    /// Remove resolved hashes. Returns how many were actually pending.
    pub fn remove_all<I: IntoIterator<Item = u64>>(&mut self, resolved: I) -> usize {
        resolved
            .into_iter()
            .filter(|h| self.paths.remove(h).is_some())
            .count()
    }

    /// Remaining paths, sorted.
    pub fn remaining_paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.paths.values().cloned().collect();
        paths.sort();
        paths
    }
}
