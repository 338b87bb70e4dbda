// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Parser for control lines

use crate::cidr::{MAX_PREFIX_LEN, is_valid_prefix};
use crate::entry::{EntryKey, MapTarget};
use crate::errors::ValidationError;
use crate::table::{KeyMode, ModeFlags};
use std::net::Ipv4Addr;

/// A control command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Blank line or comment
    Nop,
    /// Remove every entry
    Flush,
    /// Reset the counters of every entry
    ClearStats,
    /// Set or clear table mode flags
    SetFlag { flag: ModeFlags, enable: bool },
    /// Map `key` to `target`
    Add { key: EntryKey, target: MapTarget },
    /// Remove the entry with exactly this key
    Delete { key: EntryKey },
}

/// A parsed control line: its command and whether it was prefixed with `@`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlLine {
    pub quiet: bool,
    pub command: Command,
}

/// Parse one control line, without its terminating newline. Keys are read according to the key
/// mode of the table the line is meant for.
///
/// ```
/// use natmap_engine::control::{Command, parse_line};
/// use natmap_engine::table::KeyMode;
///
/// let line = parse_line("@+10.0.0.0/8=192.0.2.1\n".trim_end(), KeyMode::Addr).unwrap();
/// assert!(line.quiet);
/// assert!(matches!(line.command, Command::Add { .. }));
/// ```
///
/// # Errors
///
/// Returns a [`ValidationError`] describing the first problem found.
pub fn parse_line(line: &str, mode: KeyMode) -> Result<ControlLine, ValidationError> {
    if !line.is_ascii() {
        return Err(ValidationError::NotAscii);
    }
    let line = line.trim_end();
    let (quiet, body) = match line.strip_prefix('@') {
        Some("") => {
            return Err(ValidationError::Syntax(
                "'@' must be followed by a command".to_string(),
            ));
        }
        Some(rest) => (true, rest),
        None => (false, line),
    };
    let command = match body.as_bytes().first() {
        None | Some(b'#') => Command::Nop,
        Some(b'/') => bare(body, Command::Flush)?,
        Some(b':') => bare(body, Command::ClearStats)?,
        Some(b'+') => toggle(&body[1..], true).map_or_else(|| parse_add(&body[1..], mode), Ok)?,
        Some(b'-') => toggle(&body[1..], false).map_or_else(|| parse_delete(&body[1..], mode), Ok)?,
        Some(_) => return Err(ValidationError::UnknownCommand),
    };
    Ok(ControlLine { quiet, command })
}

fn bare(body: &str, command: Command) -> Result<Command, ValidationError> {
    if body.len() == 1 {
        Ok(command)
    } else {
        Err(ValidationError::Syntax(format!(
            "unexpected text after '{}'",
            &body[..1]
        )))
    }
}

fn toggle(word: &str, enable: bool) -> Option<Command> {
    let flag = match word {
        "persistent" => ModeFlags::PERSISTENT,
        "hotdrop" => ModeFlags::HOTDROP,
        "cgnat" => ModeFlags::CGNAT,
        _ => return None,
    };
    Some(Command::SetFlag { flag, enable })
}

fn parse_add(rule: &str, mode: KeyMode) -> Result<Command, ValidationError> {
    let (key, target) = rule.split_once('=').ok_or(ValidationError::MissingTarget)?;
    Ok(Command::Add {
        key: parse_key(key, mode)?,
        target: parse_target(target)?,
    })
}

// Whatever follows '=' on a delete is not looked at
fn parse_delete(rule: &str, mode: KeyMode) -> Result<Command, ValidationError> {
    let key = rule.split_once('=').map_or(rule, |(key, _)| key);
    Ok(Command::Delete {
        key: parse_key(key, mode)?,
    })
}

/// Parse a prenat key as written for a table of the given key mode
///
/// # Errors
///
/// Fails if `text` isn't a valid key for `mode`.
pub fn parse_key(text: &str, mode: KeyMode) -> Result<EntryKey, ValidationError> {
    match mode {
        KeyMode::Addr => {
            let (addr, prefix) = match text.split_once('/') {
                Some((addr, prefix)) => (addr, parse_prefix(prefix)?),
                None => (text, MAX_PREFIX_LEN),
            };
            EntryKey::new(u32::from(parse_addr(addr)?), prefix)
        }
        KeyMode::Mark => {
            let bad = || ValidationError::BadMark(text.to_string());
            let hex = text
                .strip_prefix("0x")
                .or_else(|| text.strip_prefix("0X"))
                .ok_or_else(bad)?;
            let mark = parse_hex(hex).ok_or_else(bad)?;
            Ok(EntryKey::host(mark))
        }
        KeyMode::Prio => {
            let bad = || ValidationError::BadPriority(text.to_string());
            let (major, minor) = text.split_once(':').ok_or_else(bad)?;
            let major = parse_hex(major)
                .and_then(|v| u16::try_from(v).ok())
                .ok_or_else(bad)?;
            let minor = parse_hex(minor)
                .and_then(|v| u16::try_from(v).ok())
                .ok_or_else(bad)?;
            Ok(EntryKey::host((u32::from(major) << 16) | u32::from(minor)))
        }
    }
}

fn parse_hex(text: &str) -> Option<u32> {
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    u32::from_str_radix(text, 16).ok()
}

fn parse_addr(text: &str) -> Result<Ipv4Addr, ValidationError> {
    text.parse()
        .map_err(|_| ValidationError::BadAddress(text.to_string()))
}

fn parse_prefix(text: &str) -> Result<u8, ValidationError> {
    let len: u32 = text
        .parse()
        .map_err(|_| ValidationError::Syntax(format!("invalid prefix length '{text}'")))?;
    if !is_valid_prefix(len) {
        return Err(ValidationError::PrefixOutOfRange(len));
    }
    u8::try_from(len).map_err(|_| ValidationError::PrefixOutOfRange(len))
}

/// Parse a postnat target: `A`, `A-B` or `A/p`
///
/// # Errors
///
/// Fails on malformed addresses or prefix lengths, or on a range whose bounds are inverted.
pub fn parse_target(text: &str) -> Result<MapTarget, ValidationError> {
    if let Some((from, to)) = text.split_once('-') {
        MapTarget::range(parse_addr(from)?, parse_addr(to)?)
    } else if let Some((base, prefix)) = text.split_once('/') {
        MapTarget::netmap(parse_addr(base)?, parse_prefix(prefix)?)
    } else {
        Ok(MapTarget::single(parse_addr(text)?))
    }
}
