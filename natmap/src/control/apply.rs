// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Applying control commands to a table

use super::parse::{Command, ControlLine, parse_line};
use crate::errors::{NatmapError, ValidationError};
use crate::table::{FlushMode, MapTable};
use tracing::{info, warn};

/// What a control command did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Blank line or comment
    Ignored,
    /// Entries removed by a flush
    Flushed(usize),
    /// Entries whose counters were reset
    StatsCleared(usize),
    FlagsChanged,
    Added,
    /// Quiet add of an existing key: target replaced, counters kept
    Updated,
    Deleted,
    /// Quiet delete of a missing key
    Unchanged,
}

impl MapTable {
    /// Apply a parsed control line.
    ///
    /// # Errors
    ///
    /// Fails without changing the table if an add names an existing key or a delete a missing one
    /// (unless the line is quiet), or if the table is being destroyed.
    pub fn apply(&self, line: &ControlLine) -> Result<Outcome, NatmapError> {
        self.apply_command(line)
            .inspect_err(|e| warn!("Table <{}>: {e}", self.name()))
    }

    fn apply_command(&self, line: &ControlLine) -> Result<Outcome, NatmapError> {
        let mode = self.key_mode();
        match line.command {
            Command::Nop => Ok(Outcome::Ignored),
            Command::Flush => {
                let removed = self.flush(FlushMode::Entries)?;
                info!("Flushed table <{}>: {removed} entries", self.name());
                Ok(Outcome::Flushed(removed))
            }
            Command::ClearStats => {
                let cleared = self.flush(FlushMode::Stats)?;
                info!("Cleared stats of table <{}>", self.name());
                Ok(Outcome::StatsCleared(cleared))
            }
            Command::SetFlag { flag, enable } => {
                self.lock()?.set_flags(flag, enable);
                info!(
                    "Table <{}> flags now {:?}",
                    self.name(),
                    self.flags()
                );
                Ok(Outcome::FlagsChanged)
            }
            Command::Add { key, target } => {
                let mut editor = self.lock()?;
                if let Some(entry) = editor.get(key) {
                    if !line.quiet {
                        return Err(ValidationError::KeyExists(mode.render(key)).into());
                    }
                    entry.retarget(target);
                    info!(
                        "Updated {} -> {}-{} in table <{}>",
                        mode.render(key),
                        target.from(),
                        target.to(),
                        self.name()
                    );
                    return Ok(Outcome::Updated);
                }
                editor.insert(key, target)?;
                info!(
                    "Added {} -> {}-{} to table <{}>",
                    mode.render(key),
                    target.from(),
                    target.to(),
                    self.name()
                );
                Ok(Outcome::Added)
            }
            Command::Delete { key } => {
                if self.lock()?.remove(key).is_some() {
                    info!("Deleted {} from table <{}>", mode.render(key), self.name());
                    Ok(Outcome::Deleted)
                } else if line.quiet {
                    Ok(Outcome::Unchanged)
                } else {
                    Err(ValidationError::KeyNotFound(mode.render(key)).into())
                }
            }
        }
    }

    /// Parse and apply one control line
    ///
    /// # Errors
    ///
    /// See [`parse_line`] and [`MapTable::apply`].
    pub fn execute(&self, line: &str) -> Result<Outcome, NatmapError> {
        let line = parse_line(line, self.key_mode())
            .inspect_err(|e| warn!("Table <{}>: {e}", self.name()))?;
        self.apply(&line)
    }
}
