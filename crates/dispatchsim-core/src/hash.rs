//! FNV-1a hashing used for configuration identity and Zipf scrambling.

const FNV_OFFSET_BASIS: u64 = 0xcbf29ce484222325;
const FNV_PRIME: u64 = 0x100000001b3;

/// 64-bit FNV-1a over a byte slice.
pub fn fnv1a_64(bytes: &[u8]) -> u64 {
    let mut hash = FNV_OFFSET_BASIS;
    for &byte in bytes {
        hash ^= byte as u64;
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// FNV-1a over the little-endian bytes of a `u64`.
pub fn fnv1a_u64(value: u64) -> u64 {
    fnv1a_64(&value.to_le_bytes())
}
