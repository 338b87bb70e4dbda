// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Line-oriented control protocol of a mapping table.
//!
//! | Line                  | Effect                                               |
//! |-----------------------|------------------------------------------------------|
//! | `# ...` or empty      | nothing                                              |
//! | `/`                   | remove every entry                                   |
//! | `:`                   | reset every counter                                  |
//! | `+hotdrop` / `-hotdrop`, `+persistent` / `-persistent`, `+cgnat` / `-cgnat` | toggle a mode flag |
//! | `+KEY=A`              | map `KEY` to address `A`                             |
//! | `+KEY=A-B`            | map `KEY` to the range `A` to `B`                    |
//! | `+KEY=A/p`            | netmap `KEY` onto network `A/p`                      |
//! | `-KEY`                | unmap `KEY`                                          |
//!
//! `KEY` is `a.b.c.d[/p]` for address tables, `0xMARK` for mark tables and `MAJ:MIN` (hex) for
//! priority tables. A leading `@` makes a line quiet: adding an existing key then updates it, and
//! deleting a missing key is not an error.

mod apply;
mod channel;
mod parse;

pub use apply::Outcome;
pub use channel::CONTROL_BUFFER_LEN;
pub use parse::{Command, ControlLine, parse_key, parse_line, parse_target};
