// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

#[concurrency::concurrency_mode(std)]
mod scenarios {
    use crate::cidr;
    use crate::entry::{EntryKey, MapTarget};
    use crate::params::ModuleParams;
    use crate::registry::{Registry, RuleSpecBuilder};
    use crate::table::{FlushMode, KeyMode, MapTable, ModeFlags};
    use crate::translate::{NatRange, PacketMeta, Verdict};
    use std::collections::BTreeSet;
    use std::net::Ipv4Addr;

    fn table() -> MapTable {
        MapTable::new("scenario", KeyMode::Addr, ModeFlags::empty(), 256).unwrap()
    }

    fn check_counts(table: &MapTable) {
        let total: u32 = (0..=32).map(|len| table.prefix_population(len)).sum();
        assert_eq!(total as usize, table.len());
        let listed = table.listing().count() - 1;
        assert_eq!(listed, table.len());
    }

    fn translate(table: &MapTable, source: Ipv4Addr) -> Verdict {
        table.translate(&PacketMeta::from_source(source, 64), &NatRange::map_ips())
    }

    #[test]
    fn test_office_netmap() {
        let registry = Registry::new("default", ModuleParams::default());
        let spec = RuleSpecBuilder::default().name("office").build().unwrap();
        let rule = registry.attach(&spec).unwrap();
        rule.table()
            .apply_script("# office uplink\n+192.168.1.0/30=10.0.0.0/30\n")
            .unwrap();
        match rule.evaluate(&PacketMeta::from_source(Ipv4Addr::new(192, 168, 1, 1), 64)) {
            Verdict::Translate(range) => {
                assert_eq!(range.min_addr, Ipv4Addr::new(10, 0, 0, 1));
                assert_eq!(range.max_addr, Ipv4Addr::new(10, 0, 0, 1));
            }
            other => panic!("unexpected {other:?}"),
        }
        registry.detach(rule);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_more_specific_entry_added_later_wins() {
        let table = table();
        table.execute("+10.0.0.0/8=1.1.1.1").unwrap();
        let early = table.find(u32::from(Ipv4Addr::new(10, 0, 0, 5)), 1).unwrap();
        table.execute("+10.0.0.0/24=2.2.2.2").unwrap();

        // a reader holding the old match keeps using it
        assert_eq!(early.key().prefix(), 8);
        assert!(matches!(
            translate(&table, Ipv4Addr::new(10, 0, 0, 5)),
            Verdict::Translate(range) if range.min_addr == Ipv4Addr::new(2, 2, 2, 2)
        ));
        table.execute("-10.0.0.0/24").unwrap();
        assert!(matches!(
            translate(&table, Ipv4Addr::new(10, 0, 0, 5)),
            Verdict::Translate(range) if range.min_addr == Ipv4Addr::new(1, 1, 1, 1)
        ));
        check_counts(&table);
    }

    #[test]
    fn test_growth_keeps_everything_findable() {
        let table = table();
        let mut script = String::new();
        for i in 0..2000u32 {
            let addr = Ipv4Addr::from(0x0a00_0000 | (i << 8));
            script.push_str(&format!("+{addr}/24={}\n", Ipv4Addr::from(0x6440_0000 | i)));
        }
        assert_eq!(table.apply_script(&script), Ok(2000));
        assert!(table.bucket_count() >= 2048);
        assert!(table.len() * 4 <= table.bucket_count() * 3);
        for i in 0..2000u32 {
            let hit = table.find(0x0a00_0000 | (i << 8) | 0x42, 1).unwrap();
            assert_eq!(hit.target().from(), Ipv4Addr::from(0x6440_0000 | i));
        }
        check_counts(&table);
    }

    #[test]
    fn test_flush_modes() {
        let table = table();
        table
            .apply_script("+10.0.0.1=1.1.1.1\n+10.0.0.2=1.1.1.1\n")
            .unwrap();
        translate(&table, Ipv4Addr::new(10, 0, 0, 1));
        table.execute(":").unwrap();
        assert_eq!(table.len(), 2);
        assert!(
            table
                .listing()
                .skip(1)
                .all(|line| line.ends_with("stat: 0/0"))
        );
        table.execute("/").unwrap();
        assert!(table.is_empty());
        assert_eq!(translate(&table, Ipv4Addr::new(10, 0, 0, 1)), Verdict::Accept);
        check_counts(&table);
    }

    #[test]
    fn test_hotdrop() {
        let table = table();
        table.apply_script("+hotdrop\n+10.0.0.1=1.1.1.1\n").unwrap();
        assert_eq!(translate(&table, Ipv4Addr::new(10, 0, 0, 2)), Verdict::Drop);
        assert!(matches!(
            translate(&table, Ipv4Addr::new(10, 0, 0, 1)),
            Verdict::Translate(_)
        ));
    }

    #[test]
    fn test_cgnat_office() {
        let table = table();
        table
            .apply_script("+cgnat\n+10.0.0.0/30=100.64.0.1/32\n")
            .unwrap();
        let mut bands = Vec::new();
        for host in 0..4 {
            match translate(&table, Ipv4Addr::new(10, 0, 0, host)) {
                Verdict::Translate(range) => {
                    assert_eq!(range.min_addr, Ipv4Addr::new(100, 64, 0, 1));
                    assert_eq!(range.ports.count(), 16_000);
                    bands.push(range.ports);
                }
                other => panic!("unexpected {other:?}"),
            }
        }
        for (i, a) in bands.iter().enumerate() {
            for b in &bands[i + 1..] {
                assert!(!a.overlaps(b));
            }
        }
    }

    #[test]
    fn test_listing_after_traffic() {
        let table = table();
        table.execute("+192.168.1.1=10.0.0.1").unwrap();
        translate(&table, Ipv4Addr::new(192, 168, 1, 1));
        translate(&table, Ipv4Addr::new(192, 168, 1, 1));
        let lines: Vec<String> = table.listing().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("# name: scenario; entities: 1;"));
        assert!(lines[1].ends_with("stat: 2/128"));
    }

    fn longest_match(keys: &BTreeSet<EntryKey>, probe: u32) -> Option<EntryKey> {
        keys.iter()
            .filter(|key| probe & cidr::mask(key.prefix()) == key.addr())
            .max_by_key(|key| key.prefix())
            .copied()
    }

    #[test]
    fn test_lookup_is_longest_prefix_match() {
        bolero::check!()
            .with_type::<(Vec<(u32, u8)>, Vec<u32>)>()
            .for_each(|(inserts, probes)| {
                let table = table();
                let mut model = BTreeSet::new();
                let mut editor = table.lock().unwrap();
                for (addr, prefix) in inserts {
                    // keep keys clustered so that probes hit more than one prefix length
                    let key = EntryKey::new(addr & 0xff00_ffff, prefix % 32 + 1).unwrap();
                    if model.insert(key) {
                        editor
                            .insert(key, MapTarget::single(Ipv4Addr::LOCALHOST))
                            .unwrap();
                    }
                }
                drop(editor);
                let probes = probes
                    .iter()
                    .map(|probe| probe & 0xff00_ffff)
                    .chain(model.iter().map(EntryKey::addr));
                for probe in probes {
                    assert_eq!(
                        table.find(probe, 1).map(|entry| entry.key()),
                        longest_match(&model, probe)
                    );
                }
            });
    }

    #[test]
    fn test_counts_follow_edits() {
        bolero::check!()
            .with_type::<Vec<(bool, u8, u8)>>()
            .for_each(|ops| {
                let table = table();
                let mut model = BTreeSet::new();
                for (add, host, prefix) in ops {
                    let key =
                        EntryKey::new(u32::from(*host) << 24, prefix % 8 + 1).unwrap();
                    let mut editor = table.lock().unwrap();
                    if *add {
                        let inserted = editor
                            .insert(key, MapTarget::single(Ipv4Addr::LOCALHOST))
                            .is_ok();
                        assert_eq!(inserted, model.insert(key));
                    } else {
                        assert_eq!(editor.remove(key).is_some(), model.remove(&key));
                    }
                }
                assert_eq!(table.len(), model.len());
                for len in 1..=8u8 {
                    let expected = model.iter().filter(|key| key.prefix() == len).count();
                    assert_eq!(table.prefix_population(len) as usize, expected);
                }
                check_counts(&table);
                assert_eq!(table.flush(FlushMode::Entries), Ok(model.len()));
                assert!(table.is_empty());
            });
    }
}
