// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Lookups racing every kind of table edit on real threads.

#![cfg(not(feature = "shuttle"))]

use natmap_engine::params::ModuleParams;
use natmap_engine::{
    EntryKey, FlushMode, KeyMode, MapTable, MapTarget, ModeFlags, Registry, RuleSpecBuilder,
};
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;

const STABLE: u32 = 0x0a00_0000;

#[test]
fn lookups_race_edits() {
    let table = Arc::new(MapTable::new("stress", KeyMode::Addr, ModeFlags::empty(), 256).unwrap());
    // covering entry, only gone briefly around full flushes
    table.execute("+10.0.0.0/8=192.0.2.1").unwrap();

    let stop = Arc::new(AtomicBool::new(false));
    let lookups = Arc::new(AtomicUsize::new(0));

    let readers: Vec<_> = (0..4u32)
        .map(|seed| {
            let table = Arc::clone(&table);
            let stop = Arc::clone(&stop);
            let lookups = Arc::clone(&lookups);
            thread::spawn(move || {
                let mut state = seed;
                while !stop.load(Ordering::Relaxed) {
                    state = state.wrapping_mul(1_103_515_245).wrapping_add(12_345);
                    let addr = STABLE | (state & 0x00ff_ffff);
                    if let Some(entry) = table.find(addr, 1) {
                        let key = entry.key();
                        assert_eq!(addr & mask(key.prefix()), key.addr());
                        assert_eq!(entry.target().from(), expected_target(key));
                        lookups.fetch_add(1, Ordering::Relaxed);
                    }
                }
            })
        })
        .collect();

    let writer = {
        let table = Arc::clone(&table);
        thread::spawn(move || {
            for round in 0..20u32 {
                for host in 0..600u32 {
                    let addr = STABLE | (round << 16) | (host << 4);
                    let key = EntryKey::new(addr, 28).unwrap();
                    let mut editor = table.lock().unwrap();
                    if editor.get(key).is_none() {
                        editor
                            .insert(key, MapTarget::single(Ipv4Addr::LOCALHOST))
                            .unwrap();
                    }
                }
                for host in (0..600u32).step_by(2) {
                    let key = EntryKey::new(STABLE | (round << 16) | (host << 4), 28).unwrap();
                    table.lock().unwrap().remove(key);
                }
                if round % 5 == 4 {
                    table.flush(FlushMode::Entries).unwrap();
                    table.execute("+10.0.0.0/8=192.0.2.1").unwrap();
                } else {
                    table.flush(FlushMode::Stats).unwrap();
                }
            }
        })
    };

    writer.join().unwrap();
    stop.store(true, Ordering::Relaxed);
    for reader in readers {
        reader.join().unwrap();
    }

    assert!(lookups.load(Ordering::Relaxed) > 0);
    let total: u32 = (0..=32).map(|len| table.prefix_population(len)).sum();
    assert_eq!(total as usize, table.len());
    assert_eq!(table.listing().count(), table.len() + 1);
}

fn mask(len: u8) -> u32 {
    natmap_engine::cidr::mask(len)
}

fn expected_target(key: EntryKey) -> Ipv4Addr {
    if key.prefix() == 8 {
        Ipv4Addr::new(192, 0, 2, 1)
    } else {
        Ipv4Addr::LOCALHOST
    }
}

#[test]
fn pinned_entry_found_through_growth() {
    let table = Arc::new(MapTable::new("growth", KeyMode::Addr, ModeFlags::empty(), 256).unwrap());
    // outside 10.0.0.0/8, where the writer works, and never removed
    table.execute("+172.16.5.0/24=192.0.2.7").unwrap();
    let pinned = u32::from(Ipv4Addr::new(172, 16, 5, 9));

    let stop = Arc::new(AtomicBool::new(false));
    let misses = Arc::new(AtomicUsize::new(0));
    let lookups = Arc::new(AtomicUsize::new(0));

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let table = Arc::clone(&table);
            let stop = Arc::clone(&stop);
            let misses = Arc::clone(&misses);
            let lookups = Arc::clone(&lookups);
            thread::spawn(move || {
                while !stop.load(Ordering::Relaxed) {
                    match table.find(pinned, 1) {
                        Some(entry) => {
                            assert_eq!(entry.key().prefix(), 24);
                            assert_eq!(entry.target().from(), Ipv4Addr::new(192, 0, 2, 7));
                        }
                        None => {
                            misses.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                    lookups.fetch_add(1, Ordering::Relaxed);
                }
            })
        })
        .collect();

    let writer = {
        let table = Arc::clone(&table);
        let lookups = Arc::clone(&lookups);
        thread::spawn(move || {
            while lookups.load(Ordering::Relaxed) == 0 {
                thread::yield_now();
            }
            for host in 0..50_000u32 {
                let key = EntryKey::host(STABLE | host);
                let mut editor = table.lock().unwrap();
                editor
                    .insert(key, MapTarget::single(Ipv4Addr::LOCALHOST))
                    .unwrap();
                if host % 3 == 0 {
                    editor.remove(key);
                }
            }
        })
    };

    writer.join().unwrap();
    stop.store(true, Ordering::Relaxed);
    for reader in readers {
        reader.join().unwrap();
    }

    assert!(table.bucket_count() >= 32_768);
    assert!(lookups.load(Ordering::Relaxed) > 0);
    assert_eq!(misses.load(Ordering::Relaxed), 0);
}

#[test]
fn attach_detach_from_many_threads() {
    let registry = Arc::new(Registry::new("stress", ModuleParams::default()));
    let workers: Vec<_> = (0..8)
        .map(|i| {
            let registry = Arc::clone(&registry);
            thread::spawn(move || {
                let name = format!("table-{}", i % 2);
                let spec = RuleSpecBuilder::default().name(name).build().unwrap();
                for _ in 0..50 {
                    let rule = registry.attach(&spec).unwrap();
                    rule.table().execute("@+10.0.0.1=192.0.2.1").unwrap();
                    registry.detach(rule);
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }
    assert!(registry.is_empty());
}
