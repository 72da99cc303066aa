//! Fletcher-16 payload checksum.
//!
//! DATA packets carry a Fletcher-16 checksum over their payload. Both running
//! sums accumulate modulo 256 and are combined as `(sum1 << 8) | sum2`,
//! matching the wire format byte for byte.

/// Compute the Fletcher-16 checksum of `data`.
pub fn fletcher16(data: &[u8]) -> u16 {
    let mut sum1: u8 = 0;
    let mut sum2: u8 = 0;
    for &byte in data {
        sum1 = sum1.wrapping_add(byte);
        sum2 = sum2.wrapping_add(sum1);
    }
    (u16::from(sum1) << 8) | u16::from(sum2)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_payload_is_zero() {
        assert_eq!(fletcher16(&[]), 0);
    }

    #[test]
    fn test_known_values() {
        // Hand-computed with sums modulo 256.
        assert_eq!(fletcher16(b"abcde"), 0xEFC3);
        assert_eq!(fletcher16(b"hello"), 0x1427);
        assert_eq!(fletcher16(&[0x01]), 0x0101);
        assert_eq!(fletcher16(&[0xFF, 0x01]), 0x00FF);
    }

    #[test]
    fn test_single_byte_mutation_changes_checksum() {
        let payload = b"The quick brown fox jumps over the lazy dog".to_vec();
        let original = fletcher16(&payload);

        for i in 0..payload.len() {
            let mut mutated = payload.clone();
            mutated[i] ^= 0x01;
            assert_ne!(fletcher16(&mutated), original, "mutation at byte {i} went undetected");
        }
    }

    #[test]
    fn test_order_sensitive() {
        assert_ne!(fletcher16(b"ab"), fletcher16(b"ba"));
    }
}
