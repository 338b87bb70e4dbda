// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Startup parameters of the natmap engine

use derive_builder::Builder;

/// Bucket count of a new table when none or an unusable one is configured
pub const DEFAULT_HASH_SIZE: u32 = 8192;
/// Smallest configurable initial bucket count
pub const MIN_HASH_SIZE: u32 = 256;
/// Largest configurable initial bucket count
pub const MAX_HASH_SIZE: u32 = 1_000_000;

/// Engine-wide parameters, fixed at startup and shared by every namespace.
///
/// ```
/// use natmap_engine::params::ModuleParamsBuilder;
///
/// let params = ModuleParamsBuilder::default().hashsize(1024).build().unwrap();
/// assert_eq!(params.initial_buckets(), 1024);
/// ```
#[derive(Builder, Debug, Clone, Copy, PartialEq, Eq)]
#[builder(default)]
pub struct ModuleParams {
    /// Default initial bucket count for newly created tables
    hashsize: u32,
}

impl Default for ModuleParams {
    fn default() -> Self {
        Self {
            hashsize: DEFAULT_HASH_SIZE,
        }
    }
}

impl ModuleParams {
    /// Configured hash size, as given
    #[must_use]
    pub fn hashsize(&self) -> u32 {
        self.hashsize
    }

    /// Bucket count to allocate for a new table
    #[must_use]
    pub fn initial_buckets(&self) -> usize {
        clamp_hash_size(self.hashsize)
    }
}

/// Map a requested bucket count to the one actually used: values outside
/// `MIN_HASH_SIZE..=MAX_HASH_SIZE` fall back to [`DEFAULT_HASH_SIZE`].
#[must_use]
pub fn clamp_hash_size(requested: u32) -> usize {
    let size = if (MIN_HASH_SIZE..=MAX_HASH_SIZE).contains(&requested) {
        requested
    } else {
        DEFAULT_HASH_SIZE
    };
    size as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_params() {
        let params = ModuleParams::default();
        assert_eq!(params.hashsize(), DEFAULT_HASH_SIZE);
        assert_eq!(params.initial_buckets(), 8192);

        let built = ModuleParamsBuilder::default().build().unwrap();
        assert_eq!(built, params);
    }

    #[test]
    fn test_clamp_hash_size() {
        assert_eq!(clamp_hash_size(0), 8192);
        assert_eq!(clamp_hash_size(255), 8192);
        assert_eq!(clamp_hash_size(256), 256);
        assert_eq!(clamp_hash_size(1_000_000), 1_000_000);
        assert_eq!(clamp_hash_size(1_000_001), 8192);
    }
}
