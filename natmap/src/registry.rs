// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Named tables of one namespace, and the rules that use them.
//!
//! A table comes into existence with the first rule that names it and goes away with the last one,
//! unless it is persistent. Rules in other namespaces never see it.

use crate::errors::NatmapError;
use crate::params::ModuleParams;
use crate::table::{KeyMode, MapTable, ModeFlags};
use crate::translate::{FlowPacket, NatRange, NatSetup, RangeFlags, Verdict};
use concurrency::sync::{Mutex, MutexGuard};
use derive_builder::Builder;
use metrics::counter;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError};
use tracing::{error, info, warn};

/// Longest table name accepted
pub const MAX_TABLE_NAME_LEN: usize = 31;

/// Check a table name: 1 to 31 printable ASCII characters, no `/`
///
/// # Errors
///
/// Returns [`NatmapError::InvalidTableName`] otherwise.
pub fn validate_table_name(name: &str) -> Result<(), NatmapError> {
    let printable = name.bytes().all(|b| b.is_ascii_graphic() || b == b' ');
    if name.is_empty() || name.len() > MAX_TABLE_NAME_LEN || !printable || name.contains('/') {
        return Err(NatmapError::InvalidTableName(name.to_string()));
    }
    Ok(())
}

/// Configuration of a mapping rule
#[derive(Builder, Debug, Clone, PartialEq, Eq)]
#[builder(pattern = "owned")]
pub struct RuleSpec {
    /// Table the rule uses
    #[builder(setter(into))]
    name: String,
    #[builder(default = "KeyMode::Addr")]
    key_mode: KeyMode,
    /// Flags a table created for this rule starts with
    #[builder(default)]
    flags: ModeFlags,
    /// Range whose flags and ports are merged into every translation
    #[builder(default = "NatRange::map_ips()")]
    range: NatRange,
}

impl RuleSpec {
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
        self.flags
    }
    #[must_use]
    pub fn range(&self) -> &NatRange {
        &self.range
    }
}

/// A rule attached to a table
#[derive(Debug)]
pub struct NatmapRule {
    table: Arc<MapTable>,
    base: NatRange,
}

impl NatmapRule {
    #[must_use]
    pub fn table(&self) -> &Arc<MapTable> {
        &self.table
    }

    #[must_use]
    pub fn base(&self) -> &NatRange {
        &self.base
    }

    /// Verdict for a packet, without involving the NAT subsystem
    pub fn evaluate<P: FlowPacket>(&self, packet: &P) -> Verdict {
        self.table.translate(packet, &self.base)
    }

    /// Run a packet through the rule, setting up NAT on a hit. A packet whose NAT setup fails is
    /// accepted untranslated.
    pub fn process<P: FlowPacket, N: NatSetup>(&self, packet: &P, nat: &mut N) -> Verdict {
        match self.evaluate(packet) {
            Verdict::Translate(range) => match nat.setup(&range) {
                Ok(()) => Verdict::Translate(range),
                Err(e) => {
                    counter!("natmap_setup_failures").increment(1);
                    error!("Table <{}>: {e}", self.table.name());
                    Verdict::Accept
                }
            },
            verdict => verdict,
        }
    }
}

struct Slot {
    table: Arc<MapTable>,
    users: usize,
}

/// The tables of one namespace
pub struct Registry {
    namespace: String,
    params: ModuleParams,
    tables: Mutex<HashMap<String, Slot>>,
}

impl Registry {
    #[must_use]
    pub fn new(namespace: &str, params: ModuleParams) -> Self {
        Self {
            namespace: namespace.to_string(),
            params,
            tables: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    fn tables(&self) -> MutexGuard<'_, HashMap<String, Slot>> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Attach a rule, creating its table if it doesn't exist yet.
    ///
    /// # Errors
    ///
    /// Fails if the table name is invalid, the base range doesn't map addresses, the table exists
    /// with another key mode, or a new table can't be allocated.
    pub fn attach(&self, spec: &RuleSpec) -> Result<NatmapRule, NatmapError> {
        validate_table_name(&spec.name)?;
        if !spec.range.flags.contains(RangeFlags::MAP_IPS) {
            return Err(NatmapError::InvalidRule(
                "the base range must map addresses",
            ));
        }

        let mut tables = self.tables();
        if let Some(slot) = tables.get_mut(&spec.name) {
            if slot.table.key_mode() != spec.key_mode {
                warn!(
                    "Table <{}> in namespace {} uses key mode {}, rule asked for {}",
                    spec.name,
                    self.namespace,
                    slot.table.key_mode(),
                    spec.key_mode
                );
                return Err(NatmapError::KeyModeMismatch(spec.name.clone()));
            }
            slot.users += 1;
            return Ok(NatmapRule {
                table: Arc::clone(&slot.table),
                base: spec.range,
            });
        }

        let table = Arc::new(MapTable::new(
            &spec.name,
            spec.key_mode,
            spec.flags,
            self.params.hashsize(),
        )?);
        info!(
            "Created table <{}> in namespace {}: {} buckets, key mode {}",
            spec.name,
            self.namespace,
            table.bucket_count(),
            spec.key_mode
        );
        tables.insert(
            spec.name.clone(),
            Slot {
                table: Arc::clone(&table),
                users: 1,
            },
        );
        Ok(NatmapRule {
            table,
            base: spec.range,
        })
    }

    /// Detach a rule. The table is destroyed with its last rule unless it is persistent.
    pub fn detach(&self, rule: NatmapRule) {
        let NatmapRule { table, .. } = rule;
        let mut tables = self.tables();
        let Some(slot) = tables
            .get_mut(table.name())
            .filter(|slot| Arc::ptr_eq(&slot.table, &table))
        else {
            // torn down already
            return;
        };
        slot.users = slot.users.saturating_sub(1);
        if slot.users > 0 || table.flags().contains(ModeFlags::PERSISTENT) {
            return;
        }
        if tables.remove(table.name()).is_some() {
            table.retire();
            info!(
                "Destroyed table <{}> in namespace {}",
                table.name(),
                self.namespace
            );
        }
    }

    /// Table by name
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<MapTable>> {
        self.tables().get(name).map(|slot| Arc::clone(&slot.table))
    }

    /// Number of rules using a table
    #[must_use]
    pub fn users(&self, name: &str) -> Option<usize> {
        self.tables().get(name).map(|slot| slot.users)
    }

    /// Names of all tables, sorted
    #[must_use]
    pub fn table_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tables().keys().cloned().collect();
        names.sort();
        names
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tables().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tables().is_empty()
    }

    /// Destroy every table, persistent or in use. Rules still holding one see an empty table that
    /// refuses edits.
    pub fn teardown(&self) {
        let drained: Vec<Slot> = self.tables().drain().map(|(_, slot)| slot).collect();
        for slot in drained {
            if slot.users > 0 {
                warn!(
                    "Destroying table <{}> with {} rules still attached",
                    slot.table.name(),
                    slot.users
                );
            }
            slot.table.retire();
        }
        info!("Namespace {} torn down", self.namespace);
    }
}

impl Drop for Registry {
    fn drop(&mut self) {
        if !self.is_empty() {
            self.teardown();
        }
    }
}
