//! MurmurHash3 (x86, 32-bit) for percentage bucketing.
//!
//! Keys are hashed one byte per UTF-16 code unit (the low byte), which is
//! what browser-side implementations built on `charCodeAt(i) & 0xff` do. For
//! ASCII keys this is plain MurmurHash3 over the UTF-8 bytes.

const C1: u32 = 0xcc9e_2d51;
const C2: u32 = 0x1b87_3593;

pub fn murmur3_32(key: &str, seed: u32) -> u32 {
    let bytes: Vec<u8> = key.encode_utf16().map(|unit| (unit & 0xff) as u8).collect();
    let mut h1 = seed;

    let mut blocks = bytes.chunks_exact(4);
    for block in &mut blocks {
        let k1 = u32::from_le_bytes([block[0], block[1], block[2], block[3]]);
        h1 ^= scramble(k1);
        h1 = h1.rotate_left(13).wrapping_mul(5).wrapping_add(0xe654_6b64);
    }

    let tail = blocks.remainder();
    let mut k1 = 0u32;
    if tail.len() >= 3 {
        k1 ^= u32::from(tail[2]) << 16;
    }
    if tail.len() >= 2 {
        k1 ^= u32::from(tail[1]) << 8;
    }
    if let Some(&first) = tail.first() {
        k1 ^= u32::from(first);
        h1 ^= scramble(k1);
    }

    h1 ^= bytes.len() as u32;
    fmix32(h1)
}

fn scramble(k1: u32) -> u32 {
    k1.wrapping_mul(C1).rotate_left(15).wrapping_mul(C2)
}

fn fmix32(mut h: u32) -> u32 {
    h ^= h >> 16;
    h = h.wrapping_mul(0x85eb_ca6b);
    h ^= h >> 13;
    h = h.wrapping_mul(0xc2b2_ae35);
    h ^= h >> 16;
    h
}

/// Stable rollout bucket in `1..=100`.
pub fn bucket(user_id: &str, seed: u32) -> u32 {
    murmur3_32(user_id, seed) % 100 + 1
}

/// Integer seed from a string with radix-less `parseInt` rules: leading
/// whitespace, optional sign, an optional `0x`/`0X` prefix selecting hex,
/// then as many digits as present. No digits means 0. Values wrap modulo
/// 2^32, negatives included.
pub fn parse_seed(raw: &str) -> u32 {
    let s = raw.trim_start();
    let (negative, unsigned) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };
    let (radix, digits) = match unsigned.get(..2) {
        Some("0x" | "0X") => (16, &unsigned[2..]),
        _ => (10, unsigned),
    };
    let value = digits
        .chars()
        .map_while(|c| c.to_digit(radix))
        .fold(0u32, |acc, d| acc.wrapping_mul(radix).wrapping_add(d));
    if negative {
        value.wrapping_neg()
    } else {
        value
    }
}
