// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Packet path: turn a matched entry into the NAT range handed to the NAT subsystem.

use crate::entry::{EntryKey, MapTarget};
use crate::errors::SetupError;
use crate::table::{KeyMode, MapTable, ModeFlags};
use bitflags::bitflags;
use metrics::counter;
use std::net::Ipv4Addr;

/// First port handed out in CG-NAT mode
pub const CGNAT_MIN_PORT: u16 = 1536;
/// Number of ports shared among the sources of a CG-NAT address
pub const CGNAT_PORT_SPAN: u32 = 64_000;

bitflags! {
    /// Flags of a [`NatRange`]
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
    pub struct RangeFlags: u8 {
        /// The range carries addresses to map to
        const MAP_IPS = 1 << 0;
        /// The range carries ports to map to
        const PROTO_SPECIFIED = 1 << 1;
        /// Randomize source port selection
        const PROTO_RANDOM = 1 << 2;
        /// Give a source the same address for all its connections
        const PERSISTENT = 1 << 3;
        /// Fully randomize source port selection
        const PROTO_RANDOM_FULLY = 1 << 4;
    }
}

/// Inclusive range of layer 4 ports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortRange {
    min: u16,
    max: u16,
}

impl PortRange {
    /// Returns `None` if `max < min`
    #[must_use]
    pub fn new(min: u16, max: u16) -> Option<Self> {
        (min <= max).then_some(Self { min, max })
    }

    /// Every port, 0 to 65535
    #[must_use]
    pub const fn full() -> Self {
        Self {
            min: 0,
            max: u16::MAX,
        }
    }

    #[must_use]
    pub fn min(&self) -> u16 {
        self.min
    }

    #[must_use]
    pub fn max(&self) -> u16 {
        self.max
    }

    /// Number of ports in the range
    #[must_use]
    pub fn count(&self) -> u32 {
        u32::from(self.max - self.min) + 1
    }

    #[must_use]
    pub fn contains(&self, port: u16) -> bool {
        (self.min..=self.max).contains(&port)
    }

    #[must_use]
    pub fn overlaps(&self, other: &PortRange) -> bool {
        self.min <= other.max && other.min <= self.max
    }
}

impl Default for PortRange {
    fn default() -> Self {
        Self::full()
    }
}

/// What the NAT subsystem is asked to do with a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NatRange {
    pub flags: RangeFlags,
    pub min_addr: Ipv4Addr,
    pub max_addr: Ipv4Addr,
    pub ports: PortRange,
}

impl NatRange {
    /// Base range of a rule that maps addresses and leaves ports to the NAT subsystem
    #[must_use]
    pub fn map_ips() -> Self {
        Self {
            flags: RangeFlags::MAP_IPS,
            min_addr: Ipv4Addr::UNSPECIFIED,
            max_addr: Ipv4Addr::UNSPECIFIED,
            ports: PortRange::full(),
        }
    }
}

/// Outcome of running a packet through a mapping table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Source-translate the connection within this range
    Translate(NatRange),
    /// Let the packet through untouched
    Accept,
    /// Discard the packet
    Drop,
}

/// The packet properties a mapping lookup needs
pub trait FlowPacket {
    fn source(&self) -> Ipv4Addr;
    fn mark(&self) -> u32;
    fn priority(&self) -> u32;
    /// Length accounted in the byte counter of the matched entry
    fn wire_len(&self) -> usize;
}

/// The NAT subsystem, as seen by a mapping rule
pub trait NatSetup {
    /// Set up source translation of the current connection within `range`.
    ///
    /// # Errors
    ///
    /// Fails if the NAT subsystem can't honour the range.
    fn setup(&mut self, range: &NatRange) -> Result<(), SetupError>;
}

/// Minimal [`FlowPacket`], for callers that already extracted the fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketMeta {
    pub source: Ipv4Addr,
    pub mark: u32,
    pub priority: u32,
    pub len: usize,
}

impl PacketMeta {
    /// Packet from `source`, no mark nor priority
    #[must_use]
    pub fn from_source(source: Ipv4Addr, len: usize) -> Self {
        Self {
            source,
            mark: 0,
            priority: 0,
            len,
        }
    }
}

impl FlowPacket for PacketMeta {
    fn source(&self) -> Ipv4Addr {
        self.source
    }
    fn mark(&self) -> u32 {
        self.mark
    }
    fn priority(&self) -> u32 {
        self.priority
    }
    fn wire_len(&self) -> usize {
        self.len
    }
}

/// Address `source` is remapped to by a netmap target: network bits from the target, host bits
/// from the source.
#[must_use]
pub fn netmap_address(target: &MapTarget, source: Ipv4Addr) -> Ipv4Addr {
    let netmask = target.netmask();
    Ipv4Addr::from((u32::from(source) & !netmask) | (u32::from(target.from()) & netmask))
}

/// Port band of `source` in CG-NAT mode.
///
/// The prenat block of `key` is spread over the addresses of the netmap `target`; the sources that
/// end up sharing one postnat address split [`CGNAT_PORT_SPAN`] ports starting at
/// [`CGNAT_MIN_PORT`] evenly. When the target has at least as many addresses as the prenat block,
/// no sharing happens and the source gets the whole span.
#[must_use]
pub fn cgnat_ports(key: EntryKey, target: &MapTarget, source: Ipv4Addr) -> PortRange {
    let sharing = key.block_size() / target.host_count();
    let first = u32::from(CGNAT_MIN_PORT);
    if sharing == 0 {
        return PortRange::new(CGNAT_MIN_PORT, u16::MAX).unwrap_or_default();
    }
    let per_source = (u64::from(CGNAT_PORT_SPAN) / sharing).max(1);
    let bands = u64::from(CGNAT_PORT_SPAN) / per_source;
    // Sources past the last full band wrap around instead of running past port 65535.
    let slot = (u64::from(u32::from(source) ^ key.addr()) % sharing) % bands;
    let low = u64::from(first) + slot * per_source;
    let high = low + per_source - 1;
    match (u16::try_from(low), u16::try_from(high)) {
        (Ok(low), Ok(high)) => PortRange::new(low, high).unwrap_or_default(),
        _ => PortRange::default(),
    }
}

/// Range for a packet from `source` that matched `key -> target`
pub(crate) fn decide(
    key: EntryKey,
    target: &MapTarget,
    source: Ipv4Addr,
    base: &NatRange,
    cgnat: bool,
) -> NatRange {
    let mut flags = base.flags | RangeFlags::MAP_IPS | RangeFlags::PERSISTENT;
    if target.is_netmap() {
        let addr = netmap_address(target, source);
        let ports = if cgnat {
            flags |= RangeFlags::PROTO_SPECIFIED;
            cgnat_ports(key, target, source)
        } else {
            base.ports
        };
        NatRange {
            flags,
            min_addr: addr,
            max_addr: addr,
            ports,
        }
    } else {
        NatRange {
            flags: flags | RangeFlags::PROTO_RANDOM_FULLY,
            min_addr: target.from(),
            max_addr: target.to(),
            ports: base.ports,
        }
    }
}

impl MapTable {
    /// The prenat key of a packet for this table's key mode
    pub fn packet_key<P: FlowPacket>(&self, packet: &P) -> u32 {
        match self.key_mode() {
            KeyMode::Addr => u32::from(packet.source()),
            KeyMode::Mark => packet.mark(),
            KeyMode::Prio => packet.priority(),
        }
    }

    /// Look the packet up and build its verdict. A hit bumps the counters of the matched entry.
    pub fn translate<P: FlowPacket>(&self, packet: &P, base: &NatRange) -> Verdict {
        let flags = self.flags();
        let source = packet.source();
        let bytes = packet.wire_len() as u64;
        let hit = self.scan(self.packet_key(packet), 1, |entry| {
            entry.hit(bytes, |target| {
                decide(
                    entry.key(),
                    target,
                    source,
                    base,
                    flags.contains(ModeFlags::CGNAT),
                )
            })
        });
        match hit {
            Some(range) => {
                counter!("natmap_hits").increment(1);
                Verdict::Translate(range)
            }
            None if flags.contains(ModeFlags::HOTDROP) => {
                counter!("natmap_drops").increment(1);
                Verdict::Drop
            }
            None => {
                counter!("natmap_misses").increment(1);
                Verdict::Accept
            }
        }
    }
}
