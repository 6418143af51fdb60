use std::cmp::Ordering;

/// Total order over fixed-width key blobs, injected into the B+Tree.
pub trait KeyComparator: Send + Sync {
    fn compare(&self, a: &[u8], b: &[u8]) -> Ordering;
}

/// Orders keys by the signed 64-bit integer stored in their first 8 bytes
/// (little-endian). Requires a key width of at least 8.
pub struct IntegerComparator;

impl KeyComparator for IntegerComparator {
    fn compare(&self, a: &[u8], b: &[u8]) -> Ordering {
        decode_integer_key(a).cmp(&decode_integer_key(b))
    }
}

/// Orders keys lexicographically over their raw bytes.
pub struct BytewiseComparator;

impl KeyComparator for BytewiseComparator {
    fn compare(&self, a: &[u8], b: &[u8]) -> Ordering {
        a.cmp(b)
    }
}

/// Writes an integer key into a fixed-width key buffer, zero-padding the
/// tail. Companion to `IntegerComparator`.
pub fn encode_integer_key(value: i64, key: &mut [u8]) {
    assert!(key.len() >= 8, "integer keys need a key width of at least 8");
    key.fill(0);
    key[..8].copy_from_slice(&value.to_le_bytes());
}

pub fn decode_integer_key(key: &[u8]) -> i64 {
    assert!(key.len() >= 8, "integer keys need a key width of at least 8");
    i64::from_le_bytes(key[..8].try_into().unwrap())
}
