// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Human readable dump of a table

use super::buckets::BucketArray;
use super::{KeyMode, MapTable, ModeFlags, TableEditor};
use crate::entry::Entry;
use std::collections::VecDeque;
use std::fmt::Display;
use std::net::Ipv4Addr;
use std::sync::Arc;

/// Summary line of a table, as printed first in its listing
pub struct Summary<'a>(&'a MapTable);

impl Display for Summary<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let table = self.0;
        let flags = table.flags();
        let sign = |flag| if flags.contains(flag) { '+' } else { '-' };
        write!(
            f,
            "# name: {}; entities: {}; hash size: {}; mode: {}; flags: {}persistent, {}hotdrop, {}cg-nat",
            table.name(),
            table.len(),
            table.bucket_count(),
            table.key_mode(),
            sign(ModeFlags::PERSISTENT),
            sign(ModeFlags::HOTDROP),
            sign(ModeFlags::CGNAT),
        )
    }
}

/// One listing line for an entry
pub(crate) fn entry_line(mode: KeyMode, entry: &Entry) -> String {
    let key = entry.key();
    let (target, stats) = entry.snapshot();
    let key = match mode {
        KeyMode::Addr => format!(
            "{:>16}/{:<2}",
            Ipv4Addr::from(key.addr()),
            key.prefix()
        ),
        KeyMode::Mark => format!("0x{:08x}", key.addr()),
        KeyMode::Prio => format!("{:04x}:{:04x}", key.addr() >> 16, key.addr() & 0xffff),
    };
    format!(
        "{key} --> {:>15} - {:<15}  stat: {}/{}",
        target.from(),
        target.to(),
        stats.packets,
        stats.bytes
    )
}

/// Lines of a table listing: the summary, then one line per entry, bucket by bucket.
///
/// The table's structural lock is held until the listing is dropped, so the output is a consistent
/// view; do not edit the same table from the thread consuming it.
pub struct Listing<'a> {
    table: &'a MapTable,
    _editor: TableEditor<'a>,
    index: Arc<BucketArray>,
    next_bucket: usize,
    summary_done: bool,
    pending: VecDeque<String>,
}

impl Iterator for Listing<'_> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        if !self.summary_done {
            self.summary_done = true;
            return Some(self.table.summary().to_string());
        }
        loop {
            if let Some(line) = self.pending.pop_front() {
                return Some(line);
            }
            if self.next_bucket >= self.index.len() {
                return None;
            }
            let idx = self.next_bucket;
            self.next_bucket += 1;
            if let Some(chain) = self.index.snapshot(idx) {
                let mode = self.table.key_mode();
                self.pending
                    .extend(chain.iter().map(|entry| entry_line(mode, entry)));
            }
        }
    }
}

impl MapTable {
    #[must_use]
    pub fn summary(&self) -> Summary<'_> {
        Summary(self)
    }

    /// List the table. Works on retired tables too.
    #[must_use]
    pub fn listing(&self) -> Listing<'_> {
        let editor = self.editor();
        Listing {
            table: self,
            _editor: editor,
            index: self.index.load_full(),
            next_bucket: 0,
            summary_done: false,
            pending: VecDeque::new(),
        }
    }
}

#[cfg(test)]
#[concurrency::concurrency_mode(std)]
mod tests {
    use crate::table::{KeyMode, MapTable, ModeFlags};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_summary() {
        let table = MapTable::new("office", KeyMode::Addr, ModeFlags::HOTDROP, 256).unwrap();
        assert_eq!(
            table.summary().to_string(),
            "# name: office; entities: 0; hash size: 256; mode: addr; flags: -persistent, +hotdrop, -cg-nat"
        );
    }

    #[test]
    fn test_addr_listing() {
        let table = MapTable::new("office", KeyMode::Addr, ModeFlags::empty(), 256).unwrap();
        table.execute("+192.168.1.0/24=10.0.0.0/24").unwrap();
        let lines: Vec<String> = table.listing().collect();
        assert_eq!(
            lines,
            vec![
                "# name: office; entities: 1; hash size: 256; mode: addr; flags: -persistent, -hotdrop, -cg-nat".to_string(),
                "     192.168.1.0/24 -->        10.0.0.0 - 10.0.0.255       stat: 0/0".to_string(),
            ]
        );
    }

    #[test]
    fn test_mark_and_prio_listing() {
        let table = MapTable::new("marks", KeyMode::Mark, ModeFlags::empty(), 256).unwrap();
        table.execute("+0x2a=10.0.0.1").unwrap();
        let lines: Vec<String> = table.listing().skip(1).collect();
        assert_eq!(
            lines,
            vec!["0x0000002a -->        10.0.0.1 - 10.0.0.1         stat: 0/0".to_string()]
        );

        let table = MapTable::new("prio", KeyMode::Prio, ModeFlags::CGNAT, 256).unwrap();
        table.execute("+1:10=10.0.0.1-10.0.0.4").unwrap();
        let lines: Vec<String> = table.listing().skip(1).collect();
        assert_eq!(
            lines,
            vec!["0001:0010 -->        10.0.0.1 - 10.0.0.4         stat: 0/0".to_string()]
        );
    }

    #[test]
    fn test_listing_covers_every_entry() {
        let table = MapTable::new("many", KeyMode::Addr, ModeFlags::empty(), 256).unwrap();
        for host in 0..=255 {
            table.execute(&format!("+10.0.{host}.0/24=1.1.1.1")).unwrap();
        }
        let listing = table.listing();
        assert_eq!(listing.count(), 257);
    }
}
