// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

use natmap::control::parse_key;
use natmap::{KeyMode, ModeFlags};
use std::net::Ipv4Addr;
use std::path::PathBuf;

pub(crate) use clap::Parser;

fn parse_mark(text: &str) -> Result<u32, String> {
    parse_key(text, KeyMode::Mark)
        .map(|key| key.addr())
        .map_err(|e| e.to_string())
}

fn parse_priority(text: &str) -> Result<u32, String> {
    parse_key(text, KeyMode::Prio)
        .map(|key| key.addr())
        .map_err(|e| e.to_string())
}

#[derive(Parser, Debug)]
#[command(name = "natmapd")]
#[command(version)]
#[command(about = "Load a NAT mapping table from a control script and query it", long_about = None)]
#[allow(clippy::struct_excessive_bools)]
pub(crate) struct CmdArgs {
    #[arg(long, value_name = "buckets", default_value_t = natmap::params::DEFAULT_HASH_SIZE)]
    hashsize: u32,
    #[arg(long, value_name = "namespace", default_value = "default")]
    namespace: String,
    #[arg(long, value_name = "table name", default_value = "natmap")]
    table: String,
    #[arg(long, value_name = "addr|mark|prio", default_value = "addr")]
    key_mode: KeyMode,
    #[arg(long, help = "Create the table persistent")]
    persistent: bool,
    #[arg(long, help = "Drop packets matching no entry")]
    hotdrop: bool,
    #[arg(long, help = "Split ports among sources sharing a netmap address")]
    cgnat: bool,
    #[arg(
        long,
        value_name = "PATH",
        help = "Control script to load, one command per line. Read from stdin if not given"
    )]
    script: Option<PathBuf>,
    #[arg(long, value_name = "source address", help = "Source address to look up")]
    lookup: Vec<Ipv4Addr>,
    #[arg(long, value_name = "0xMARK", value_parser = parse_mark, help = "Mark carried by looked up packets")]
    mark: Option<u32>,
    #[arg(long, value_name = "MAJ:MIN", value_parser = parse_priority, help = "Priority of looked up packets")]
    priority: Option<u32>,
    #[arg(long, help = "Print the table listing once the script is loaded")]
    list: bool,
    #[arg(
        long,
        value_name = "filter",
        default_value = "info",
        help = "Log filter, e.g. 'info' or 'natmap_engine=debug'. RUST_LOG takes precedence"
    )]
    log_level: String,
}

impl CmdArgs {
    pub fn hashsize(&self) -> u32 {
        self.hashsize
    }
    pub fn namespace(&self) -> &str {
        &self.namespace
    }
    pub fn table(&self) -> &str {
        &self.table
    }
    pub fn key_mode(&self) -> KeyMode {
        self.key_mode
    }
    pub fn flags(&self) -> ModeFlags {
        let mut flags = ModeFlags::empty();
        flags.set(ModeFlags::PERSISTENT, self.persistent);
        flags.set(ModeFlags::HOTDROP, self.hotdrop);
        flags.set(ModeFlags::CGNAT, self.cgnat);
        flags
    }
    pub fn script(&self) -> Option<&PathBuf> {
        self.script.as_ref()
    }
    pub fn lookups(&self) -> impl Iterator<Item = Ipv4Addr> {
        self.lookup.iter().copied()
    }
    pub fn mark(&self) -> u32 {
        self.mark.unwrap_or_default()
    }
    pub fn priority(&self) -> u32 {
        self.priority.unwrap_or_default()
    }
    pub fn list(&self) -> bool {
        self.list
    }
    pub fn log_level(&self) -> &str {
        &self.log_level
    }
}
