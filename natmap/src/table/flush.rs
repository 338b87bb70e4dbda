// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Flushing a table in bounded batches

use super::buckets::BucketArray;
use super::{MapTable, TableEditor};
use crate::errors::NatmapError;
use concurrency::thread;
use std::sync::Arc;
use tracing::debug;

/// Buckets processed per hold of the structural lock
const FLUSH_BATCH: usize = 64;

/// What a flush does to the entries it visits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushMode {
    /// Unlink every entry
    Entries,
    /// Reset counters, keep entries
    Stats,
}

impl MapTable {
    /// Flush the whole table. The structural lock is released and the thread yields between
    /// batches of buckets, so other editors and the packet path make progress during long flushes.
    /// If the table grows while the lock is released, the walk starts over on the new array.
    ///
    /// Returns the number of entries visited.
    ///
    /// # Errors
    ///
    /// Returns [`NatmapError::TableRetired`] if the table is being destroyed.
    pub fn flush(&self, mode: FlushMode) -> Result<usize, NatmapError> {
        if self.is_retired() {
            return Err(NatmapError::TableRetired(self.name.clone()));
        }
        Ok(self.flush_all(mode))
    }

    pub(crate) fn flush_all(&self, mode: FlushMode) -> usize {
        let mut visited = 0;
        let mut next = 0;
        let mut walking: Option<Arc<BucketArray>> = None;
        loop {
            let mut editor = self.editor();
            let index = self.index.load_full();
            if !walking
                .as_ref()
                .is_some_and(|current| Arc::ptr_eq(current, &index))
            {
                if walking.is_some() {
                    debug!("Table <{}> resized during flush, restarting", self.name);
                }
                next = 0;
                walking = Some(Arc::clone(&index));
            }
            if next >= index.len() {
                break;
            }
            let end = (next + FLUSH_BATCH).min(index.len());
            for idx in next..end {
                visited += editor.flush_bucket(&index, idx, mode);
            }
            next = end;
            drop(editor);
            thread::yield_now();
        }
        visited
    }
}

impl TableEditor<'_> {
    fn flush_bucket(&mut self, index: &BucketArray, idx: usize, mode: FlushMode) -> usize {
        match mode {
            FlushMode::Stats => index.snapshot(idx).map_or(0, |chain| {
                chain.iter().for_each(|entry| entry.reset_stats());
                chain.len()
            }),
            FlushMode::Entries => index.take(idx).map_or(0, |chain| {
                chain.iter().for_each(|entry| self.forget(entry.key()));
                chain.len()
            }),
        }
    }
}
