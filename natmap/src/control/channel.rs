// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Write side of a table control channel.
//!
//! A write hands over a buffer of newline-terminated commands. They are applied one by one, in
//! order; the first failure stops processing and is reported with its line number, while the
//! commands before it stay applied.

use crate::errors::{ControlError, ValidationError};
use crate::table::MapTable;
use tracing::{error, warn};

/// Bytes taken from the caller per write; anything beyond is left for the next write
pub const CONTROL_BUFFER_LEN: usize = 100;

impl MapTable {
    /// Process one write. Returns the number of bytes consumed, which only covers complete lines:
    /// a trailing fragment without a newline is left for the caller to send again.
    ///
    /// # Errors
    ///
    /// [`ControlError::Unterminated`] if the buffer doesn't hold a single complete line, or
    /// [`ControlError::Line`] for the first command that fails.
    pub fn write_control(&self, input: &[u8]) -> Result<usize, ControlError> {
        self.write_lines(input).map(|(consumed, _)| consumed)
    }

    // Bytes consumed and lines applied by one write
    fn write_lines(&self, input: &[u8]) -> Result<(usize, usize), ControlError> {
        let buf = &input[..input.len().min(CONTROL_BUFFER_LEN)];
        let mut consumed = 0;
        let mut line = 0;
        while consumed < buf.len() {
            let rest = &buf[consumed..];
            let Some(end) = rest.iter().position(|&b| b == b'\n') else {
                if consumed == 0 {
                    error!("Rule for table <{}> should end with '\\n'", self.name());
                    return Err(ControlError::Unterminated);
                }
                break;
            };
            line += 1;
            let text = std::str::from_utf8(&rest[..end]).map_err(|_| {
                warn!("Table <{}>: {}", self.name(), ValidationError::NotAscii);
                ControlError::Line {
                    line,
                    source: ValidationError::NotAscii.into(),
                }
            })?;
            self.execute(text)
                .map_err(|source| ControlError::Line { line, source })?;
            consumed += end + 1;
        }
        Ok((consumed, line))
    }

    /// Feed a whole script through [`MapTable::write_control`], as many writes as it takes. A
    /// final line without newline is accepted. Returns the number of lines processed.
    ///
    /// # Errors
    ///
    /// [`ControlError::Line`] for the first command that fails, numbered from the start of the
    /// script. A line too long to fit one write fails with [`ValidationError::TooLong`].
    pub fn apply_script(&self, script: &str) -> Result<usize, ControlError> {
        let mut owned;
        let mut bytes = script.as_bytes();
        if !bytes.is_empty() && !script.ends_with('\n') {
            owned = script.to_string();
            owned.push('\n');
            bytes = owned.as_bytes();
        }
        let mut offset = 0;
        let mut lines = 0;
        while offset < bytes.len() {
            let (consumed, applied) = self.write_lines(&bytes[offset..]).map_err(|e| match e {
                ControlError::Unterminated => ControlError::Line {
                    line: lines + 1,
                    source: ValidationError::TooLong(CONTROL_BUFFER_LEN).into(),
                },
                ControlError::Line { line, source } => ControlError::Line {
                    line: lines + line,
                    source,
                },
            })?;
            lines += applied;
            offset += consumed;
        }
        Ok(lines)
    }
}
