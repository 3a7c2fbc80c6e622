//! Key utilities.
//!
//! The segmented store uses 64-bit integer keys serialized big-endian, so
//! their byte representation sorts lexicographically in the same order as
//! the integers. The page-chain store accepts arbitrary byte-string keys;
//! the helpers here bridge between the two representations.

/// A 64-bit integer key used by the segmented store.
pub type Key = u64;

/// Serializes a key into its big-endian byte representation.
#[inline]
#[must_use]
pub fn key_to_bytes(key: Key) -> [u8; 8] {
    key.to_be_bytes()
}

/// Deserializes a key from its big-endian byte representation.
///
/// # Panics
///
/// Panics if `bytes` is shorter than 8 bytes.
#[inline]
#[must_use]
pub fn key_from_bytes(bytes: &[u8]) -> Key {
    Key::from_be_bytes(bytes[..8].try_into().expect("key must be 8 bytes"))
}

/// Extracts an 8-byte order-preserving head of a byte-string key.
///
/// Keys shorter than 8 bytes are left-aligned and zero-padded, so the result
/// compares in the same order as the lexicographic comparison of the
/// original byte strings (up to the first 8 bytes).
#[must_use]
pub fn extract_head64(key: &[u8]) -> u64 {
    let mut head = 0u64;
    for (i, byte) in key.iter().take(8).enumerate() {
        head |= u64::from(*byte) << (56 - 8 * i);
    }
    head
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_round_trip() {
        for key in [0u64, 1, 255, 1 << 40, u64::MAX] {
            assert_eq!(key_from_bytes(&key_to_bytes(key)), key);
        }
    }

    #[test]
    fn test_byte_order_matches_integer_order() {
        let keys = [0u64, 1, 2, 255, 256, 1 << 16, 1 << 40, u64::MAX];
        for pair in keys.windows(2) {
            assert!(key_to_bytes(pair[0]) < key_to_bytes(pair[1]));
        }
    }

    #[test]
    fn test_extract_head64_full_key() {
        let key = key_to_bytes(0x0102_0304_0506_0708);
        assert_eq!(extract_head64(&key), 0x0102_0304_0506_0708);
    }

    #[test]
    fn test_extract_head64_short_key() {
        assert_eq!(extract_head64(&[]), 0);
        assert_eq!(extract_head64(&[0xAB]), 0xAB00_0000_0000_0000);
        assert_eq!(extract_head64(&[0x01, 0x02, 0x03]), 0x0102_0300_0000_0000);
    }

    #[test]
    fn test_extract_head64_preserves_order() {
        let a: &[u8] = &[0x01];
        let b: &[u8] = &[0x01, 0x00, 0x01];
        let c: &[u8] = &[0x02];
        assert!(extract_head64(a) <= extract_head64(b));
        assert!(extract_head64(b) < extract_head64(c));
    }
}
