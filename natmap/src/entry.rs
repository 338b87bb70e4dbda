// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Mapping entries: one prenat key, its postnat target and its counters.

use crate::cidr::{self, MAX_PREFIX_LEN};
use crate::errors::ValidationError;
use concurrency::sync::{Mutex, MutexGuard};
use std::fmt::{Debug, Display};
use std::net::Ipv4Addr;
use std::sync::PoisonError;

/// Prenat key of an entry: a value and the prefix length it is matched with.
///
/// The value is always stored masked to its prefix length. Marks and priority tags use a prefix
/// length of 32.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntryKey {
    addr: u32,
    prefix: u8,
}

impl EntryKey {
    /// Build a key from a value and a prefix length in 1..=32. Host bits are cleared.
    ///
    /// # Errors
    ///
    /// Fails if the prefix length is out of range.
    pub fn new(addr: u32, prefix: u8) -> Result<Self, ValidationError> {
        if !cidr::is_valid_prefix(u32::from(prefix)) {
            return Err(ValidationError::PrefixOutOfRange(u32::from(prefix)));
        }
        Ok(Self {
            addr: addr & cidr::mask(prefix),
            prefix,
        })
    }

    /// Key matching a single value exactly
    #[must_use]
    pub fn host(addr: u32) -> Self {
        Self {
            addr,
            prefix: MAX_PREFIX_LEN,
        }
    }

    #[must_use]
    pub fn addr(&self) -> u32 {
        self.addr
    }

    #[must_use]
    pub fn prefix(&self) -> u8 {
        self.prefix
    }

    /// Number of values covered by this key
    #[must_use]
    pub fn block_size(&self) -> u64 {
        1u64 << (32 - u32::from(self.prefix))
    }

    pub(crate) fn matches(self, masked: u32, prefix: u8) -> bool {
        self.prefix == prefix && self.addr == masked
    }
}

impl Display for EntryKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", Ipv4Addr::from(self.addr), self.prefix)
    }
}

/// Postnat side of an entry.
///
/// A plain target is an inclusive address range `from..=to`. A netmap target encodes a network:
/// `from` is the network address and `to` its broadcast address, so that `from ^ to` gives the host
/// bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MapTarget {
    from: Ipv4Addr,
    to: Ipv4Addr,
    netmap: bool,
}

impl MapTarget {
    /// Target translating to one fixed address
    #[must_use]
    pub fn single(addr: Ipv4Addr) -> Self {
        Self {
            from: addr,
            to: addr,
            netmap: false,
        }
    }

    /// Target translating to any address of `from..=to`
    ///
    /// # Errors
    ///
    /// Fails if `to` is lower than `from`.
    pub fn range(from: Ipv4Addr, to: Ipv4Addr) -> Result<Self, ValidationError> {
        if to < from {
            return Err(ValidationError::InvertedRange { from, to });
        }
        Ok(Self {
            from,
            to,
            netmap: false,
        })
    }

    /// Netmap target remapping sources onto network `base/prefix`, keeping their host bits
    ///
    /// # Errors
    ///
    /// Fails if the prefix length is not in 1..=32.
    pub fn netmap(base: Ipv4Addr, prefix: u8) -> Result<Self, ValidationError> {
        if !cidr::is_valid_prefix(u32::from(prefix)) {
            return Err(ValidationError::PrefixOutOfRange(u32::from(prefix)));
        }
        let network = u32::from(base) & cidr::mask(prefix);
        Ok(Self {
            from: Ipv4Addr::from(network),
            to: Ipv4Addr::from(network ^ cidr::hostmask(prefix)),
            netmap: true,
        })
    }

    #[must_use]
    pub fn from(&self) -> Ipv4Addr {
        self.from
    }

    #[must_use]
    pub fn to(&self) -> Ipv4Addr {
        self.to
    }

    #[must_use]
    pub fn is_netmap(&self) -> bool {
        self.netmap
    }

    /// Network bits of a netmap target
    #[must_use]
    pub fn netmask(&self) -> u32 {
        !(u32::from(self.from) ^ u32::from(self.to))
    }

    /// Number of addresses spanned by the target
    #[must_use]
    pub fn host_count(&self) -> u64 {
        if self.netmap {
            u64::from(u32::from(self.from) ^ u32::from(self.to)) + 1
        } else {
            u64::from(u32::from(self.to) - u32::from(self.from)) + 1
        }
    }
}

/// Per-entry traffic counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EntryStats {
    pub packets: u64,
    pub bytes: u64,
}

#[derive(Debug)]
struct EntryState {
    target: MapTarget,
    stats: EntryStats,
}

/// A prenat key mapped to a postnat target.
///
/// The key never changes once the entry is linked into a table. Target and counters sit behind a
/// lock of their own so that packets hitting distinct entries never contend.
pub struct Entry {
    key: EntryKey,
    state: Mutex<EntryState>,
}

impl Entry {
    pub(crate) fn new(key: EntryKey, target: MapTarget) -> Self {
        Self {
            key,
            state: Mutex::new(EntryState {
                target,
                stats: EntryStats::default(),
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, EntryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn key(&self) -> EntryKey {
        self.key
    }

    #[must_use]
    pub fn target(&self) -> MapTarget {
        self.state().target
    }

    #[must_use]
    pub fn stats(&self) -> EntryStats {
        self.state().stats
    }

    /// Consistent view of target and counters
    #[must_use]
    pub fn snapshot(&self) -> (MapTarget, EntryStats) {
        let state = self.state();
        (state.target, state.stats)
    }

    /// Replace the target in place, keeping the counters
    pub(crate) fn retarget(&self, target: MapTarget) {
        self.state().target = target;
    }

    pub(crate) fn reset_stats(&self) {
        self.state().stats = EntryStats::default();
    }

    /// Account one packet of `bytes` bytes and run `decide` on the target, under the entry lock.
    pub(crate) fn hit<R>(&self, bytes: u64, decide: impl FnOnce(&MapTarget) -> R) -> R {
        let mut state = self.state();
        let decision = decide(&state.target);
        state.stats.packets = state.stats.packets.wrapping_add(1);
        state.stats.bytes = state.stats.bytes.wrapping_add(bytes);
        decision
    }
}

impl Debug for Entry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (target, stats) = self.snapshot();
        f.debug_struct("Entry")
            .field("key", &self.key)
            .field("target", &target)
            .field("stats", &stats)
            .finish_non_exhaustive()
    }
}
