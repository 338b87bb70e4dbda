// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Synchronization facade for the natmap engine.
//!
//! Code that takes locks, bumps atomics or spawns threads imports them from here rather than from
//! `std` directly. With the `shuttle` feature enabled, the very same code runs against
//! [`shuttle`](https://docs.rs/shuttle) primitives so that randomized schedules can be explored in
//! tests.

#![deny(
    unsafe_code,
    missing_docs,
    clippy::all,
    clippy::pedantic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic
)]

mod macros;

#[cfg(not(feature = "shuttle"))]
pub use std::sync;

#[cfg(not(feature = "shuttle"))]
pub use std::thread;

#[cfg(feature = "shuttle")]
pub use shuttle::sync;

#[cfg(feature = "shuttle")]
pub use shuttle::thread;

pub use concurrency_macros::concurrency_mode;
