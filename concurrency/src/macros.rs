// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

/// Compile the wrapped items only when this crate is built with the `shuttle` feature.
///
/// The feature flag checked is the one of the *concurrency* crate, not the one of the crate
/// invoking the macro.
///
/// # Example
/// ```
/// # use natmap_concurrency::with_shuttle;
/// with_shuttle! {
///     fn only_compiled_with_shuttle() {}
/// }
/// ```
#[cfg(feature = "shuttle")]
#[macro_export]
macro_rules! with_shuttle {
    ($($item:item)*) => {
        $(
            $item
        )*
    };
}

/// Compile the wrapped items only when this crate is built with the `shuttle` feature.
///
/// # Example
/// ```
/// # use natmap_concurrency::with_shuttle;
/// with_shuttle! {
///     fn only_compiled_with_shuttle() {}
/// }
/// ```
#[cfg(not(feature = "shuttle"))]
#[macro_export]
macro_rules! with_shuttle {
    ($($item:item)*) => {};
}

/// Compile the wrapped items only when this crate is built against `std` primitives.
///
/// With `silence_clippy` (enabled by `--all-features`) the items are kept as well so that lints
/// cover both flavours in a single run.
///
/// # Example
/// ```
/// # use natmap_concurrency::with_std;
/// with_std! {
///     fn only_compiled_with_std() {}
/// }
/// ```
#[cfg(any(not(feature = "shuttle"), feature = "silence_clippy"))]
#[macro_export]
macro_rules! with_std {
    ($($item:item)*) => {
        $(
            $item
        )*
    };
}

/// Compile the wrapped items only when this crate is built against `std` primitives.
///
/// # Example
/// ```
/// # use natmap_concurrency::with_std;
/// with_std! {
///     fn only_compiled_with_std() {}
/// }
/// ```
#[cfg(all(feature = "shuttle", not(feature = "silence_clippy")))]
#[macro_export]
macro_rules! with_std {
    ($($item:item)*) => {};
}
