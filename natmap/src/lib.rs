// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

#![deny(clippy::all, clippy::pedantic)]
#![deny(rustdoc::all)]

//! Rule-driven source NAT mappings.
//!
//! A mapping table associates prenat keys (source prefixes, packet marks or priority tags) with
//! postnat targets: a single address, an address range, or a network whose host bits are kept
//! (netmap). Packets are matched against the table with a longest-prefix-match lookup and leave with
//! a [`Verdict`]: translate within a [`NatRange`], accept untouched, or drop.
//!
//! Tables live in a per-namespace [`Registry`] and are shared by the rules naming them. They are
//! edited at runtime through a line-oriented [`control`] protocol while lookups proceed without
//! taking any lock.
//!
//! # Example
//!
//! ```
//! use natmap_engine::params::ModuleParams;
//! use natmap_engine::{PacketMeta, Registry, RuleSpecBuilder, Verdict};
//! use std::net::Ipv4Addr;
//!
//! let registry = Registry::new("default", ModuleParams::default());
//! let spec = RuleSpecBuilder::default().name("office").build().unwrap();
//! let rule = registry.attach(&spec).unwrap();
//! rule.table()
//!     .apply_script("+192.168.1.0/24=10.0.0.0/24\n")
//!     .unwrap();
//!
//! let packet = PacketMeta::from_source(Ipv4Addr::new(192, 168, 1, 42), 64);
//! match rule.evaluate(&packet) {
//!     Verdict::Translate(range) => assert_eq!(range.min_addr, Ipv4Addr::new(10, 0, 0, 42)),
//!     other => panic!("unexpected {other:?}"),
//! }
//! registry.detach(rule);
//! ```

pub mod cidr;
pub mod control;
pub mod entry;
pub mod errors;
pub mod params;
pub mod registry;
pub mod table;
pub mod translate;

#[cfg(test)]
mod test;

pub use entry::{Entry, EntryKey, EntryStats, MapTarget};
pub use errors::{ControlError, NatmapError, SetupError, ValidationError};
pub use registry::{NatmapRule, Registry, RuleSpec, RuleSpecBuilder, RuleSpecBuilderError};
pub use table::{FlushMode, KeyMode, MapTable, ModeFlags, TableEditor};
pub use translate::{FlowPacket, NatRange, NatSetup, PacketMeta, PortRange, RangeFlags, Verdict};
