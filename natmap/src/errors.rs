// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Error types for the natmap engine

use std::net::Ipv4Addr;

/// Reasons for rejecting a control command. No table state is changed when one of these is
/// returned.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("command contains non-ASCII bytes")]
    NotAscii,
    #[error("rule should start with '+', '-', '/', ':' or '@'")]
    UnknownCommand,
    #[error("add op must contain '=' in the rule")]
    MissingTarget,
    #[error("syntax error: {0}")]
    Syntax(String),
    #[error("invalid IPv4 address '{0}'")]
    BadAddress(String),
    #[error("invalid mark '{0}', it should be: 0xMARK")]
    BadMark(String),
    #[error("invalid priority '{0}', it should be: MAJ:MIN")]
    BadPriority(String),
    #[error("prefix {0} out of range 1..32")]
    PrefixOutOfRange(u32),
    #[error("second postnat address {to} must not be lower than the first one {from}")]
    InvertedRange { from: Ipv4Addr, to: Ipv4Addr },
    #[error("add op references existing key {0}")]
    KeyExists(String),
    #[error("delete op does not reference any existing key {0}")]
    KeyNotFound(String),
    #[error("command longer than {0} bytes")]
    TooLong(usize),
}

/// Errors from table and registry operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NatmapError {
    #[error("out of memory")]
    OutOfMemory,
    #[error("invalid table name '{0}'")]
    InvalidTableName(String),
    #[error("invalid rule: {0}")]
    InvalidRule(&'static str),
    #[error("table '{0}' already exists with a different key mode")]
    KeyModeMismatch(String),
    #[error("table '{0}' is being destroyed")]
    TableRetired(String),
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Failure reported for a write on a table control channel. Commands before the failing one remain
/// applied.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ControlError {
    #[error("rule should end with '\\n'")]
    Unterminated,
    #[error("line {line}: {source}")]
    Line {
        line: usize,
        #[source]
        source: NatmapError,
    },
}

impl ControlError {
    /// The 1-based line of the failing command, if the failure is tied to one
    #[must_use]
    pub fn line(&self) -> Option<usize> {
        match self {
            ControlError::Unterminated => None,
            ControlError::Line { line, .. } => Some(*line),
        }
    }
}

/// Error reported by the NAT subsystem when it can't honour a translation range
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SetupError {
    #[error("no free tuples to set up NAT")]
    TuplesExhausted,
    #[error("NAT setup rejected: {0}")]
    Rejected(String),
}
