//! Hash functions for domain and token keys
//!
//! Domains are keyed by a 64-bit composite of two Murmur3 passes with different
//! seeds. Tokens use a single 32-bit pass. Both are computed over ASCII-lowercased
//! input so the index and the request path agree regardless of case.

/// 64-bit hash represented as two 32-bit parts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct Hash64 {
    pub lo: u32,
    pub hi: u32,
}

impl Hash64 {
    #[inline]
    pub const fn to_u64(&self) -> u64 {
        ((self.hi as u64) << 32) | (self.lo as u64)
    }
}

const SEED_LO: u32 = 0x9e3779b9; // Golden ratio
const SEED_HI: u32 = 0x85ebca6b; // Murmur3 constant
const SEED_TOKEN: u32 = 0x811c9dc5;

/// Murmur3 32-bit hash.
#[inline]
pub fn murmur3_32(data: &[u8], seed: u32) -> u32 {
    let len = data.len();
    let mut h = seed;

    let mut chunks = data.chunks_exact(4);
    for chunk in &mut chunks {
        let k = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        h ^= scramble(k);
        h = h.rotate_left(13);
        h = h.wrapping_mul(5).wrapping_add(0xe6546b64);
    }

    let tail = chunks.remainder();
    if !tail.is_empty() {
        let mut k: u32 = 0;
        for (i, &b) in tail.iter().enumerate() {
            k ^= (b as u32) << (8 * i);
        }
        h ^= scramble(k);
    }

    h ^= len as u32;
    h ^= h >> 16;
    h = h.wrapping_mul(0x85ebca6b);
    h ^= h >> 13;
    h = h.wrapping_mul(0xc2b2ae35);
    h ^= h >> 16;

    h
}

#[inline]
fn scramble(k: u32) -> u32 {
    k.wrapping_mul(0xcc9e2d51)
        .rotate_left(15)
        .wrapping_mul(0x1b873593)
}

/// Compute a 64-bit hash as a (lo, hi) pair using two Murmur3 passes.
#[inline]
pub fn hash64(data: &[u8]) -> Hash64 {
    Hash64 {
        lo: murmur3_32(data, SEED_LO),
        hi: murmur3_32(data, SEED_HI),
    }
}

/// Hash a domain for bucket and constraint lookups (case-insensitive).
#[inline]
pub fn hash_domain(domain: &str) -> Hash64 {
    with_lowercase(domain.as_bytes(), hash64)
}

/// Hash a token (case-insensitive). Never returns 0.
#[inline]
pub fn hash_token(token: &str) -> u32 {
    hash_token_bytes(token.as_bytes())
}

/// Hash raw token bytes (case-insensitive). Never returns 0.
#[inline]
pub fn hash_token_bytes(token: &[u8]) -> u32 {
    let h = with_lowercase(token, |bytes| murmur3_32(bytes, SEED_TOKEN));
    if h == 0 {
        1
    } else {
        h
    }
}

/// Run `f` over an ASCII-lowercased copy of `bytes`, on the stack when it fits.
#[inline]
fn with_lowercase<T>(bytes: &[u8], f: impl FnOnce(&[u8]) -> T) -> T {
    let mut stack_buf = [0u8; 128];
    if bytes.len() <= stack_buf.len() {
        for (dst, &b) in stack_buf.iter_mut().zip(bytes) {
            *dst = b.to_ascii_lowercase();
        }
        f(&stack_buf[..bytes.len()])
    } else {
        f(&bytes.to_ascii_lowercase())
    }
}
