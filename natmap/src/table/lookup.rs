// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Lock-free lookups

use super::MapTable;
use crate::cidr::{self, MAX_PREFIX_LEN};
use crate::entry::{Entry, EntryKey};
use concurrency::sync::atomic::Ordering;
use std::sync::Arc;

impl MapTable {
    /// Longest-prefix match of `key`, trying prefix lengths from 32 down to `min_prefix`. Prefix
    /// lengths with no entry are skipped without touching the index.
    #[must_use]
    pub fn find(&self, key: u32, min_prefix: u8) -> Option<Arc<Entry>> {
        self.scan(key, min_prefix, Arc::clone)
    }

    /// Exact match on `(addr, prefix)`
    #[must_use]
    pub fn get(&self, key: EntryKey) -> Option<Arc<Entry>> {
        self.index.load().find(key)
    }

    /// Run `visit` on the longest-prefix match of `key`, if any, while the chain holding it is
    /// pinned.
    pub(crate) fn scan<R>(
        &self,
        key: u32,
        min_prefix: u8,
        visit: impl FnOnce(&Arc<Entry>) -> R,
    ) -> Option<R> {
        let index = self.index.load();
        for len in (min_prefix..=MAX_PREFIX_LEN).rev() {
            if self.population[usize::from(len)].load(Ordering::Acquire) == 0 {
                continue;
            }
            let masked = key & cidr::mask(len);
            let chain = index.chain(index.index_of(masked, len));
            if let Some(entry) = chain
                .as_deref()
                .and_then(|chain| chain.iter().find(|entry| entry.key().matches(masked, len)))
            {
                return Some(visit(entry));
            }
        }
        None
    }
}
