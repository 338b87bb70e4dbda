// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Growing the bucket array

use super::TableEditor;
use super::buckets::{BucketArray, Chain, bucket_index};
use crate::errors::NatmapError;
use std::sync::Arc;
use tracing::info;

impl TableEditor<'_> {
    /// Double the bucket count and rehash every entry into the new array, then publish it. Entries
    /// are shared between the old and new arrays, so lookups running against the old one keep
    /// finding everything that was linked when they started. Returns the new bucket count.
    ///
    /// # Errors
    ///
    /// Returns [`NatmapError::OutOfMemory`] if the new array can't be allocated, in which case the
    /// table is left untouched.
    pub fn grow(&mut self) -> Result<usize, NatmapError> {
        let old = self.table.index.load_full();
        let size = old.len().checked_mul(2).ok_or(NatmapError::OutOfMemory)?;
        info!(
            "Growing hash size of table <{}>: {} -> {size}",
            self.table.name,
            old.len()
        );

        let mut chains: Vec<Chain> = Vec::new();
        chains
            .try_reserve_exact(size)
            .map_err(|_| NatmapError::OutOfMemory)?;
        chains.resize_with(size, Vec::new);
        for idx in 0..old.len() {
            let Some(chain) = old.snapshot(idx) else {
                continue;
            };
            for entry in chain.iter() {
                let key = entry.key();
                chains[bucket_index(size, key.addr(), key.prefix())].push(Arc::clone(entry));
            }
        }

        self.table
            .index
            .store(Arc::new(BucketArray::from_chains(chains)?));
        Ok(size)
    }
}

#[cfg(test)]
#[concurrency::concurrency_mode(std)]
mod tests {
    use crate::entry::{EntryKey, MapTarget};
    use crate::table::{KeyMode, MapTable, ModeFlags};
    use std::net::Ipv4Addr;

    #[test]
    fn test_grow_keeps_entries() {
        let table = MapTable::new("grow", KeyMode::Addr, ModeFlags::empty(), 256).unwrap();
        let mut editor = table.lock().unwrap();
        for host in 0..100u32 {
            editor
                .insert(
                    EntryKey::host(0x0a00_0000 | host),
                    MapTarget::single(Ipv4Addr::new(1, 1, 1, 1)),
                )
                .unwrap();
        }
        assert_eq!(editor.grow().unwrap(), 512);
        assert_eq!(table.bucket_count(), 512);
        assert_eq!(table.len(), 100);
        for host in 0..100u32 {
            assert!(table.get(EntryKey::host(0x0a00_0000 | host)).is_some());
        }
    }

    #[test]
    fn test_old_array_stays_readable() {
        let table = MapTable::new("grow", KeyMode::Addr, ModeFlags::empty(), 256).unwrap();
        let mut editor = table.lock().unwrap();
        let key = EntryKey::host(0xc0a8_0101);
        editor
            .insert(key, MapTarget::single(Ipv4Addr::new(1, 1, 1, 1)))
            .unwrap();
        let pinned = table.index.load_full();
        editor.grow().unwrap();
        editor.remove(key);
        assert_eq!(pinned.len(), 256);
        assert_eq!(pinned.find(key).map(|entry| entry.key()), Some(key));
        assert!(table.get(key).is_none());
    }

    #[test]
    #[tracing_test::traced_test]
    fn test_load_factor_triggers_growth() {
        let table = MapTable::new("auto", KeyMode::Addr, ModeFlags::empty(), 256).unwrap();
        let mut editor = table.lock().unwrap();
        for host in 0..=192u32 {
            editor
                .insert(
                    EntryKey::host(host),
                    MapTarget::single(Ipv4Addr::new(1, 1, 1, 1)),
                )
                .unwrap();
        }
        // 193 entries stay within 0.75 of 256 buckets until the 194th insert.
        assert_eq!(table.bucket_count(), 256);
        editor
            .insert(
                EntryKey::host(1000),
                MapTarget::single(Ipv4Addr::new(1, 1, 1, 1)),
            )
            .unwrap();
        assert_eq!(table.bucket_count(), 512);
        assert!(logs_contain("Growing hash size of table <auto>: 256 -> 512"));
    }
}
