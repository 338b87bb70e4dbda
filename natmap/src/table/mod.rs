// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Mapping table: a resizable hash index of [`Entry`]s with longest-prefix-match lookups.
//!
//! The packet path only ever reads. It loads the current bucket array and the chains it walks
//! through [`arc_swap`], so it never waits on a writer and never sees a freed entry: writers build
//! new chains (or a whole new bucket array when growing) and swap them in, and what they replace is
//! released once the last reader holding it is done.
//!
//! Writers go through a [`TableEditor`], which holds the table's structural lock for as long as it
//! lives. At most one editor exists per table at any time.

mod buckets;
mod flush;
mod listing;
mod lookup;
mod resize;

pub use flush::FlushMode;
pub use listing::{Listing, Summary};

use crate::cidr::PREFIX_SLOTS;
use crate::entry::{Entry, EntryKey, MapTarget};
use crate::errors::{NatmapError, ValidationError};
use crate::params::clamp_hash_size;
use arc_swap::ArcSwap;
use bitflags::bitflags;
use buckets::BucketArray;
use concurrency::sync::atomic::{AtomicBool, AtomicU8, AtomicU32, AtomicUsize, Ordering};
use concurrency::sync::{Mutex, MutexGuard};
use std::fmt::{Debug, Display};
use std::str::FromStr;
use std::sync::{Arc, PoisonError};
use tracing::{debug, warn};

/// How the prenat key of a packet is obtained, fixed for the lifetime of a table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyMode {
    /// IPv4 source address, matched by prefix
    Addr,
    /// Packet mark, matched exactly
    Mark,
    /// Priority tag `MAJ:MIN`, matched exactly
    Prio,
}

impl KeyMode {
    /// Render a key the way control commands spell it
    #[must_use]
    pub fn render(self, key: EntryKey) -> String {
        match self {
            KeyMode::Addr => key.to_string(),
            KeyMode::Mark => format!("0x{:x}", key.addr()),
            KeyMode::Prio => format!("{:04x}:{:04x}", key.addr() >> 16, key.addr() & 0xffff),
        }
    }
}

impl Display for KeyMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KeyMode::Addr => write!(f, "addr"),
            KeyMode::Mark => write!(f, "mark"),
            KeyMode::Prio => write!(f, "prio"),
        }
    }
}

impl FromStr for KeyMode {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "addr" => Ok(KeyMode::Addr),
            "mark" => Ok(KeyMode::Mark),
            "prio" => Ok(KeyMode::Prio),
            other => Err(format!("unknown key mode '{other}' (expected addr, mark or prio)")),
        }
    }
}

bitflags! {
    /// Behaviour flags of a table, toggled at runtime through the control protocol
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
    pub struct ModeFlags: u8 {
        /// Keep the table when its last rule goes away
        const PERSISTENT = 1 << 0;
        /// Drop packets that match no entry
        const HOTDROP = 1 << 1;
        /// Partition ports among sources sharing a netmap address
        const CGNAT = 1 << 2;
    }
}

/// A named mapping table
pub struct MapTable {
    name: String,
    key_mode: KeyMode,
    flags: AtomicU8,
    index: ArcSwap<BucketArray>,
    population: [AtomicU32; PREFIX_SLOTS],
    entries: AtomicUsize,
    retired: AtomicBool,
    lock: Mutex<()>,
}

impl MapTable {
    /// Create an empty table. `initial_size` is clamped as described in [`clamp_hash_size`].
    ///
    /// # Errors
    ///
    /// Returns [`NatmapError::OutOfMemory`] if the bucket array can't be allocated.
    pub fn new(
        name: &str,
        key_mode: KeyMode,
        flags: ModeFlags,
        initial_size: u32,
    ) -> Result<Self, NatmapError> {
        let index = BucketArray::try_new(clamp_hash_size(initial_size))?;
        Ok(Self {
            name: name.to_string(),
            key_mode,
            flags: AtomicU8::new(flags.bits()),
            index: ArcSwap::from_pointee(index),
            population: std::array::from_fn(|_| AtomicU32::new(0)),
            entries: AtomicUsize::new(0),
            retired: AtomicBool::new(false),
            lock: Mutex::new(()),
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn key_mode(&self) -> KeyMode {
        self.key_mode
    }

    #[must_use]
    pub fn flags(&self) -> ModeFlags {
        ModeFlags::from_bits_truncate(self.flags.load(Ordering::Acquire))
    }

    /// Number of entries currently linked
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current size of the bucket array
    #[must_use]
    pub fn bucket_count(&self) -> usize {
        self.index.load().len()
    }

    /// Number of entries with the given prefix length
    #[must_use]
    pub fn prefix_population(&self, prefix: u8) -> u32 {
        self.population
            .get(usize::from(prefix))
            .map_or(0, |slot| slot.load(Ordering::Acquire))
    }

    /// Tell whether the table has been detached for destruction
    #[must_use]
    pub fn is_retired(&self) -> bool {
        self.retired.load(Ordering::Acquire)
    }

    fn editor(&self) -> TableEditor<'_> {
        TableEditor {
            table: self,
            _guard: self.lock.lock().unwrap_or_else(PoisonError::into_inner),
        }
    }

    /// Take the structural lock, blocking until other editors are done.
    ///
    /// # Errors
    ///
    /// Returns [`NatmapError::TableRetired`] if the table is being destroyed.
    pub fn lock(&self) -> Result<TableEditor<'_>, NatmapError> {
        let editor = self.editor();
        if self.is_retired() {
            return Err(NatmapError::TableRetired(self.name.clone()));
        }
        Ok(editor)
    }

    /// Refuse any further edit, then drop every entry.
    ///
    /// # Panics
    ///
    /// Panics if entries are left behind once the flush completes.
    pub(crate) fn retire(&self) {
        {
            let _editor = self.editor();
            self.retired.store(true, Ordering::Release);
        }
        let removed = self.flush_all(FlushMode::Entries);
        debug!("Retired table <{}>, {removed} entries dropped", self.name);
        let left = self.len();
        assert!(
            left == 0,
            "table <{}> destroyed with {left} entries still linked",
            self.name
        );
    }

    fn needs_growth(&self) -> bool {
        self.len() * 4 > self.bucket_count() * 3
    }
}

impl Debug for MapTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MapTable")
            .field("name", &self.name)
            .field("key_mode", &self.key_mode)
            .field("flags", &self.flags())
            .field("entries", &self.len())
            .field("buckets", &self.bucket_count())
            .finish_non_exhaustive()
    }
}

/// Exclusive write access to a [`MapTable`], holding its structural lock until dropped
pub struct TableEditor<'a> {
    table: &'a MapTable,
    _guard: MutexGuard<'a, ()>,
}

impl TableEditor<'_> {
    #[must_use]
    pub fn table(&self) -> &MapTable {
        self.table
    }

    /// Exact match on `(addr, prefix)`
    #[must_use]
    pub fn get(&self, key: EntryKey) -> Option<Arc<Entry>> {
        self.table.get(key)
    }

    /// Link a new entry. The table grows first if that would push it over a 0.75 load factor;
    /// failing to grow is not an error, the table just stays at its current size.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::KeyExists`] if an entry with the same key is already linked.
    pub fn insert(&mut self, key: EntryKey, target: MapTarget) -> Result<Arc<Entry>, NatmapError> {
        if self.get(key).is_some() {
            return Err(ValidationError::KeyExists(self.table.key_mode.render(key)).into());
        }
        if self.table.needs_growth()
            && let Err(e) = self.grow()
        {
            warn!(
                "Could not grow table <{}>, keeping {} buckets: {e}",
                self.table.name,
                self.table.bucket_count()
            );
        }
        let entry = Arc::new(Entry::new(key, target));
        self.table.index.load().link(Arc::clone(&entry));
        self.table.population[usize::from(key.prefix())].fetch_add(1, Ordering::AcqRel);
        self.table.entries.fetch_add(1, Ordering::AcqRel);
        Ok(entry)
    }

    /// Unlink the entry with this exact key. Lookups already holding it keep a valid reference; its
    /// memory goes away with the last of them.
    pub fn remove(&mut self, key: EntryKey) -> Option<Arc<Entry>> {
        let entry = self.table.index.load().unlink(key)?;
        self.forget(key);
        Some(entry)
    }

    /// Set or clear behaviour flags
    pub fn set_flags(&mut self, flags: ModeFlags, enable: bool) {
        if enable {
            self.table.flags.fetch_or(flags.bits(), Ordering::AcqRel);
        } else {
            self.table.flags.fetch_and(!flags.bits(), Ordering::AcqRel);
        }
    }

    // Account for an entry that was just unlinked
    fn forget(&mut self, key: EntryKey) {
        let slot = &self.table.population[usize::from(key.prefix())];
        let count = slot.load(Ordering::Acquire);
        assert!(
            count > 0,
            "prefix population underflow for /{} in table <{}>",
            key.prefix(),
            self.table.name
        );
        slot.store(count - 1, Ordering::Release);

        let total = self.table.entries.load(Ordering::Acquire);
        assert!(
            total > 0,
            "entry count underflow in table <{}>",
            self.table.name
        );
        self.table.entries.store(total - 1, Ordering::Release);
    }
}
