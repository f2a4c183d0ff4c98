//! Short, deterministic fingerprints for context call sites.
//!
//! The digest is MurmurHash2 rendered in base 36, computed over the low byte of
//! every UTF-16 code unit, the same digest `@emotion/hash` computes. Only the
//! digest is shared with the JavaScript tooling: the hashed input here is the
//! path relative to the package root, so identities differ from a Babel build
//! that hashes paths relative to the manifest file.

const M: u32 = 0x5bd1_e995;
const BASE36: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Identity of one context declaration: `"<relative path>@<binding>"`, hashed.
pub fn context_identity(relative_path: &str, binding: &str) -> String {
    murmur2_base36(&format!("{relative_path}@{binding}"))
}

pub fn murmur2_base36(input: &str) -> String {
    to_base36(murmur2(input))
}

fn murmur2(input: &str) -> u32 {
    let units: Vec<u32> = input.encode_utf16().map(|u| u32::from(u) & 0xff).collect();

    let mut h: u32 = 0;
    let mut chunks = units.chunks_exact(4);
    for c in &mut chunks {
        let mut k = c[0] | (c[1] << 8) | (c[2] << 16) | (c[3] << 24);
        k = k.wrapping_mul(M);
        k ^= k >> 24;
        h = k.wrapping_mul(M) ^ h.wrapping_mul(M);
    }

    let tail = chunks.remainder();
    if tail.len() >= 3 {
        h ^= tail[2] << 16;
    }
    if tail.len() >= 2 {
        h ^= tail[1] << 8;
    }
    if !tail.is_empty() {
        h ^= tail[0];
        h = h.wrapping_mul(M);
    }

    h ^= h >> 13;
    h = h.wrapping_mul(M);
    h ^ (h >> 15)
}

fn to_base36(mut n: u32) -> String {
    if n == 0 {
        return "0".to_string();
    }
    let mut digits = Vec::new();
    while n > 0 {
        digits.push(BASE36[(n % 36) as usize]);
        n /= 36;
    }
    digits.reverse();
    String::from_utf8(digits).unwrap_or_default()
}
