// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

#![deny(clippy::all, clippy::pedantic)]
#![deny(rustdoc::all)]
#![allow(rustdoc::missing_crate_level_docs)]

mod args;

use crate::args::{CmdArgs, Parser};
use natmap::params::{ModuleParamsBuilder, ModuleParamsBuilderError};
use natmap::{
    ControlError, NatmapError, NatmapRule, PacketMeta, Registry, RuleSpecBuilder,
    RuleSpecBuilderError, Verdict,
};
use std::io::Read;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug, thiserror::Error)]
enum RunError {
    #[error("invalid parameters: {0}")]
    Params(#[from] ModuleParamsBuilderError),
    #[error("invalid rule: {0}")]
    Rule(#[from] RuleSpecBuilderError),
    #[error(transparent)]
    Natmap(#[from] NatmapError),
    #[error("control script: {0}")]
    Control(#[from] ControlError),
    #[error("could not read control script: {0}")]
    Io(#[from] std::io::Error),
}

fn init_logging(filter: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .with_thread_names(true)
        .with_line_number(true)
        .init();
}

fn describe(verdict: &Verdict) -> String {
    match verdict {
        Verdict::Translate(range) if range.min_addr == range.max_addr => format!(
            "translate to {} ports {}-{}",
            range.min_addr,
            range.ports.min(),
            range.ports.max()
        ),
        Verdict::Translate(range) => format!(
            "translate to {}-{} ports {}-{}",
            range.min_addr,
            range.max_addr,
            range.ports.min(),
            range.ports.max()
        ),
        Verdict::Accept => "accept".to_string(),
        Verdict::Drop => "drop".to_string(),
    }
}

fn read_script(args: &CmdArgs) -> Result<String, std::io::Error> {
    match args.script() {
        Some(path) => std::fs::read_to_string(path),
        None => {
            let mut script = String::new();
            std::io::stdin().read_to_string(&mut script)?;
            Ok(script)
        }
    }
}

fn query(args: &CmdArgs, rule: &NatmapRule) -> Result<(), RunError> {
    let script = read_script(args)?;
    let lines = rule.table().apply_script(&script)?;
    info!("Loaded {lines} control lines into table <{}>", args.table());

    for source in args.lookups() {
        let packet = PacketMeta {
            source,
            mark: args.mark(),
            priority: args.priority(),
            len: 0,
        };
        println!("{source}: {}", describe(&rule.evaluate(&packet)));
    }
    if args.list() {
        for line in rule.table().listing() {
            println!("{line}");
        }
    }
    Ok(())
}

fn run(args: &CmdArgs) -> Result<(), RunError> {
    let params = ModuleParamsBuilder::default()
        .hashsize(args.hashsize())
        .build()?;
    let registry = Registry::new(args.namespace(), params);
    let spec = RuleSpecBuilder::default()
        .name(args.table())
        .key_mode(args.key_mode())
        .flags(args.flags())
        .build()?;
    let rule = registry.attach(&spec)?;
    let result = query(args, &rule);
    registry.detach(rule);
    registry.teardown();
    result
}

fn main() -> ExitCode {
    let args = CmdArgs::parse();
    init_logging(args.log_level());
    info!("Starting natmapd, namespace {}", args.namespace());
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}
