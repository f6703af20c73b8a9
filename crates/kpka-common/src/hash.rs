//! Path fingerprints.
//!
//! Archives never store file names. Each entry is keyed by a 64-bit
//! combined hash: MurmurHash3 (x86, 32-bit) of the lowercased path in the
//! low word and of the uppercased path in the high word. Paths are hashed
//! as UTF-16LE code units with a seed of `0xFFFFFFFF`, after converting
//! backslashes to forward slashes.

use std::borrow::Cow;

/// Seed used for all path hashes.
pub const PATH_SEED: u32 = 0xFFFF_FFFF;

const C1: u32 = 0xCC9E_2D51;
const C2: u32 = 0x1B87_3593;

/// Compute MurmurHash3 x86-32 of a byte slice.
pub fn murmur3_32(data: &[u8], seed: u32) -> u32 {
    let mut h = seed;

    let mut blocks = data.chunks_exact(4);
    for block in &mut blocks {
        let k = u32::from_le_bytes([block[0], block[1], block[2], block[3]]);
        h ^= mix_k(k);
        h = h.rotate_left(13).wrapping_mul(5).wrapping_add(0xE654_6B64);
    }

    let tail = blocks.remainder();
    if !tail.is_empty() {
        let mut k = 0u32;
        for (i, &b) in tail.iter().enumerate() {
            k |= (b as u32) << (8 * i);
        }
        h ^= mix_k(k);
    }

    h ^= data.len() as u32;
    fmix32(h)
}

#[inline]
fn mix_k(k: u32) -> u32 {
    k.wrapping_mul(C1).rotate_left(15).wrapping_mul(C2)
}

#[inline]
fn fmix32(mut h: u32) -> u32 {
    h ^= h >> 16;
    h = h.wrapping_mul(0x85EB_CA6B);
    h ^= h >> 13;
    h = h.wrapping_mul(0xC2B2_AE35);
    h ^= h >> 16;
    h
}

/// Hash a string as UTF-16LE code units with the path seed.
pub fn hash_wide(s: &str) -> u32 {
    let bytes: Vec<u8> = s.encode_utf16().flat_map(u16::to_le_bytes).collect();
    murmur3_32(&bytes, PATH_SEED)
}

/// Convert backslash separators to forward slashes.
#[inline]
pub fn normalize_path(path: &str) -> Cow<'_, str> {
    if path.contains('\\') {
        Cow::Owned(path.replace('\\', "/"))
    } else {
        Cow::Borrowed(path)
    }
}

/// Compute the combined 64-bit hash of a logical path.
///
/// The result is `hash(upper) << 32 | hash(lower)`.
pub fn path_hash(path: &str) -> u64 {
    let normalized = normalize_path(path);
    let lower = hash_wide(&normalized.to_lowercase());
    let upper = hash_wide(&normalized.to_uppercase());
    combine(lower, upper)
}

/// Join the two halves of a combined hash.
#[inline]
pub const fn combine(low: u32, high: u32) -> u64 {
    ((high as u64) << 32) | low as u64
}
