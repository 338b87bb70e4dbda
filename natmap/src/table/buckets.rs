// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Bucket array of a mapping table.
//!
//! Each bucket holds an immutable chain of entries. Writers replace a whole chain when they link or
//! unlink an entry; readers load whatever chain is current and keep it alive for as long as they
//! look at it.

use crate::entry::{Entry, EntryKey};
use crate::errors::NatmapError;
use ahash::RandomState;
use arc_swap::{ArcSwapOption, Guard};
use std::sync::{Arc, OnceLock};

pub(crate) type Chain = Vec<Arc<Entry>>;

static HASHER: OnceLock<RandomState> = OnceLock::new();

fn hasher() -> &'static RandomState {
    HASHER.get_or_init(|| {
        RandomState::with_seeds(
            0x6e61_746d_6170_0001,
            0x9e37_79b9_7f4a_7c15,
            0xc2b2_ae3d_27d4_eb4f,
            0x1656_67b1_9e37_79f9,
        )
    })
}

/// Bucket for `(addr, prefix)` in an array of `size` buckets. The hash is scaled into the bucket
/// range with a multiply-shift rather than a modulo.
#[allow(clippy::cast_possible_truncation)]
pub(crate) fn bucket_index(size: usize, addr: u32, prefix: u8) -> usize {
    let hash = u64::from(hasher().hash_one((addr, prefix)) as u32);
    ((hash * size as u64) >> 32) as usize
}

pub(crate) struct BucketArray {
    buckets: Box<[ArcSwapOption<Chain>]>,
}

impl BucketArray {
    fn alloc(size: usize) -> Result<Vec<ArcSwapOption<Chain>>, NatmapError> {
        let mut buckets = Vec::new();
        buckets
            .try_reserve_exact(size)
            .map_err(|_| NatmapError::OutOfMemory)?;
        Ok(buckets)
    }

    /// Array of `size` empty buckets
    pub(crate) fn try_new(size: usize) -> Result<Self, NatmapError> {
        let mut buckets = Self::alloc(size)?;
        buckets.resize_with(size, ArcSwapOption::empty);
        Ok(Self {
            buckets: buckets.into_boxed_slice(),
        })
    }

    /// Array whose bucket `i` holds `chains[i]`
    pub(crate) fn from_chains(chains: Vec<Chain>) -> Result<Self, NatmapError> {
        let mut buckets = Self::alloc(chains.len())?;
        buckets.extend(chains.into_iter().map(|chain| {
            if chain.is_empty() {
                ArcSwapOption::empty()
            } else {
                ArcSwapOption::from_pointee(chain)
            }
        }));
        Ok(Self {
            buckets: buckets.into_boxed_slice(),
        })
    }

    pub(crate) fn len(&self) -> usize {
        self.buckets.len()
    }

    pub(crate) fn index_of(&self, addr: u32, prefix: u8) -> usize {
        bucket_index(self.len(), addr, prefix)
    }

    /// Cheap read of a chain, for lookups
    pub(crate) fn chain(&self, idx: usize) -> Guard<Option<Arc<Chain>>> {
        self.buckets[idx].load()
    }

    /// Owned handle on a chain, for callers that hold on to it
    pub(crate) fn snapshot(&self, idx: usize) -> Option<Arc<Chain>> {
        self.buckets[idx].load_full()
    }

    pub(crate) fn find(&self, key: EntryKey) -> Option<Arc<Entry>> {
        let chain = self.chain(self.index_of(key.addr(), key.prefix()));
        chain
            .as_deref()?
            .iter()
            .find(|entry| entry.key() == key)
            .map(Arc::clone)
    }

    // The methods below rewrite chains and must only run under the table's structural lock.

    pub(crate) fn link(&self, entry: Arc<Entry>) {
        let key = entry.key();
        let slot = &self.buckets[self.index_of(key.addr(), key.prefix())];
        let mut chain: Chain = slot.load().as_deref().cloned().unwrap_or_default();
        chain.push(entry);
        slot.store(Some(Arc::new(chain)));
    }

    pub(crate) fn unlink(&self, key: EntryKey) -> Option<Arc<Entry>> {
        let slot = &self.buckets[self.index_of(key.addr(), key.prefix())];
        let current = slot.load_full()?;
        let pos = current.iter().position(|entry| entry.key() == key)?;
        let mut chain = Chain::clone(&current);
        let entry = chain.remove(pos);
        slot.store((!chain.is_empty()).then(|| Arc::new(chain)));
        Some(entry)
    }

    /// Detach a whole chain, leaving the bucket empty
    pub(crate) fn take(&self, idx: usize) -> Option<Arc<Chain>> {
        self.buckets[idx].swap(None)
    }
}
