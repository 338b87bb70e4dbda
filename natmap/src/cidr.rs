// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Prefix length to netmask table for IPv4, in host byte order.

/// Longest IPv4 prefix length
pub const MAX_PREFIX_LEN: u8 = 32;

/// Number of distinct prefix lengths, 0 to 32 included
pub const PREFIX_SLOTS: usize = MAX_PREFIX_LEN as usize + 1;

const fn build_masks() -> [u32; PREFIX_SLOTS] {
    let mut masks = [0u32; PREFIX_SLOTS];
    let mut len = 1;
    while len < PREFIX_SLOTS {
        masks[len] = u32::MAX << (32 - len);
        len += 1;
    }
    masks
}

static CIDR_MASKS: [u32; PREFIX_SLOTS] = build_masks();

/// Netmask for a prefix length. Lengths above 32 saturate to the host mask.
#[must_use]
pub fn mask(len: u8) -> u32 {
    CIDR_MASKS[usize::from(len.min(MAX_PREFIX_LEN))]
}

/// Host bits for a prefix length: the complement of [`mask`]
#[must_use]
pub fn hostmask(len: u8) -> u32 {
    !mask(len)
}

/// Tell whether `len` is usable as the prefix length of a mapping
#[must_use]
pub fn is_valid_prefix(len: u32) -> bool {
    (1..=u32::from(MAX_PREFIX_LEN)).contains(&len)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_bounds() {
        assert_eq!(mask(0), 0);
        assert_eq!(mask(32), u32::MAX);
        assert_eq!(mask(8), 0xff00_0000);
        assert_eq!(mask(24), 0xffff_ff00);
        assert_eq!(mask(33), u32::MAX);
        assert_eq!(hostmask(30), 0b11);
    }

    #[test]
    fn test_mask_matches_shift() {
        for len in 1..=32u8 {
            assert_eq!(mask(len), u32::MAX << (32 - u32::from(len)));
            assert_eq!(mask(len).count_ones(), u32::from(len));
        }
    }

    #[test]
    fn test_valid_prefix() {
        assert!(!is_valid_prefix(0));
        assert!(is_valid_prefix(1));
        assert!(is_valid_prefix(32));
        assert!(!is_valid_prefix(33));
    }
}
