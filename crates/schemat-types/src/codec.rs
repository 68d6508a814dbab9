//! **Binary codec** – order-preserving encoding of integers for index keys.
//!
//! The encodings in this module are designed so that unsigned
//! lexicographic comparison of the produced byte strings matches the
//! numeric ordering of the encoded values (spec §4.A). Length detection
//! uses a descending chain of power-of-256 comparisons rather than a
//! floating-point `log` call, which is the whole point of hand-rolling
//! this instead of reaching for a general-purpose varint crate.

use thiserror::Error;

/// Errors produced by the binary codec.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// The value does not fit in the requested fixed width, including the
    /// reserved null slot when one was requested.
    #[error("value does not fit in a {width}-byte fixed-width field")]
    ValueOutOfRange {
        /// Width, in bytes, that was requested.
        width: u8,
    },
    /// A fixed width outside `1..=8` was requested.
    #[error("fixed width must be between 1 and 8 bytes, got {0}")]
    InvalidWidth(u8),
    /// The adaptive byte string was truncated or malformed.
    #[error("malformed adaptive integer encoding")]
    Malformed,
}

/// Number of bytes needed to hold `magnitude`, found via a descending
/// chain of power-of-256 comparisons (2–5x faster than a log-based length
/// check, per spec §4.A).
fn byte_length(magnitude: u64) -> u8 {
    if magnitude >= 1u64 << 56 {
        8
    } else if magnitude >= 1u64 << 48 {
        7
    } else if magnitude >= 1u64 << 40 {
        6
    } else if magnitude >= 1u64 << 32 {
        5
    } else if magnitude >= 1u64 << 24 {
        4
    } else if magnitude >= 1u64 << 16 {
        3
    } else if magnitude >= 1u64 << 8 {
        2
    } else {
        1
    }
}

//─────────────────────────────
//  Adaptive signed integer
//─────────────────────────────

/// Adaptive-length tag marking a null value (no payload bytes follow).
const TAG_NULL: u8 = 0x80;
/// First tag byte used for positive magnitudes of length 1.
const TAG_POS_BASE: u8 = 0x80;
/// First tag byte used for negative magnitudes of length 1, counting down.
const TAG_NEG_BASE: u8 = 0x80;

/// Encode a signed integer with adaptive length.
///
/// `None` encodes as the single byte `0x80` ("length = 0"), sorting
/// strictly between all negative and all positive encodings. Sign is
/// carried in the tag byte; magnitude length in `1..=8` is carried in the
/// distance of the tag from `0x80`. Negative magnitudes are bit-inverted so
/// that a larger magnitude (a more negative number) sorts before a smaller
/// one, and more bytes (a larger magnitude) moves the tag further from
/// `0x80`, keeping longer negative encodings smallest.
pub fn encode_i64_adaptive(value: Option<i64>) -> Vec<u8> {
    let Some(v) = value else {
        return vec![TAG_NULL];
    };
    if v >= 0 {
        let magnitude = v as u64;
        let len = byte_length(magnitude);
        let mut out = Vec::with_capacity(1 + len as usize);
        out.push(TAG_POS_BASE + len);
        out.extend_from_slice(&magnitude.to_be_bytes()[8 - len as usize..]);
        out
    } else {
        let magnitude = v.unsigned_abs();
        let len = byte_length(magnitude);
        let mut out = Vec::with_capacity(1 + len as usize);
        out.push(TAG_NEG_BASE - len);
        let inverted = !magnitude;
        out.extend_from_slice(&inverted.to_be_bytes()[8 - len as usize..]);
        out
    }
}

/// Decode a value previously produced by [`encode_i64_adaptive`].
pub fn decode_i64_adaptive(bytes: &[u8]) -> Result<Option<i64>, CodecError> {
    let &tag = bytes.first().ok_or(CodecError::Malformed)?;
    if tag == TAG_NULL {
        return Ok(None);
    }
    if tag > TAG_POS_BASE {
        let len = (tag - TAG_POS_BASE) as usize;
        let payload = bytes.get(1..1 + len).ok_or(CodecError::Malformed)?;
        let mut buf = [0u8; 8];
        buf[8 - len..].copy_from_slice(payload);
        Ok(Some(u64::from_be_bytes(buf) as i64))
    } else {
        let len = (TAG_NEG_BASE - tag) as usize;
        let payload = bytes.get(1..1 + len).ok_or(CodecError::Malformed)?;
        let mut buf = [0u8; 8];
        buf[8 - len..].copy_from_slice(payload);
        let inverted = u64::from_be_bytes(buf);
        let magnitude = !inverted;
        Ok(Some(-(magnitude as i64)))
    }
}

//─────────────────────────────
//  Adaptive unsigned integer
//─────────────────────────────

/// Encode an unsigned integer with adaptive length; `None` is the single
/// byte `0x00` ("length = 0").
pub fn encode_u64_adaptive(value: Option<u64>) -> Vec<u8> {
    let Some(v) = value else {
        return vec![0u8];
    };
    let len = if v == 0 { 1 } else { byte_length(v) };
    let mut out = Vec::with_capacity(1 + len as usize);
    out.push(len);
    out.extend_from_slice(&v.to_be_bytes()[8 - len as usize..]);
    out
}

/// Decode a value previously produced by [`encode_u64_adaptive`].
pub fn decode_u64_adaptive(bytes: &[u8]) -> Result<Option<u64>, CodecError> {
    let &len = bytes.first().ok_or(CodecError::Malformed)?;
    if len == 0 {
        return Ok(None);
    }
    let len = len as usize;
    let payload = bytes.get(1..1 + len).ok_or(CodecError::Malformed)?;
    let mut buf = [0u8; 8];
    buf[8 - len..].copy_from_slice(payload);
    Ok(Some(u64::from_be_bytes(buf)))
}

//─────────────────────────────
//  Fixed-width signed integer
//─────────────────────────────

/// Encode a signed integer into a fixed `width` (1–8 bytes), reserving the
/// all-zero pattern for `None` via a `+1` offset-binary shift (spec §4.A).
///
/// Because the shift needs one extra representable slot, `width == 8`
/// cannot represent `i64::MAX` when nullability is required; callers
/// needing the full `i64` range with nulls should use the adaptive
/// encoding instead.
pub fn encode_i64_fixed(value: Option<i64>, width: u8) -> Result<Vec<u8>, CodecError> {
    if !(1..=8).contains(&width) {
        return Err(CodecError::InvalidWidth(width));
    }
    let shifted: u128 = match value {
        None => 0,
        Some(v) => (v as i128 - i64::MIN as i128) as u128 + 1,
    };
    let max_representable = (1u128 << (8 * width as u32)) - 1;
    if shifted > max_representable {
        return Err(CodecError::ValueOutOfRange { width });
    }
    let bytes16 = shifted.to_be_bytes();
    Ok(bytes16[16 - width as usize..].to_vec())
}

/// Decode a value previously produced by [`encode_i64_fixed`].
pub fn decode_i64_fixed(bytes: &[u8]) -> Result<Option<i64>, CodecError> {
    if bytes.is_empty() || bytes.len() > 8 {
        return Err(CodecError::Malformed);
    }
    let mut buf = [0u8; 16];
    buf[16 - bytes.len()..].copy_from_slice(bytes);
    let shifted = u128::from_be_bytes(buf);
    if shifted == 0 {
        return Ok(None);
    }
    let v = (shifted - 1) as i128 + i64::MIN as i128;
    Ok(Some(v as i64))
}

//─────────────────────────────
//  Byte-slice comparison (`compare_bin`)
//─────────────────────────────

/// Compare two optional byte slices the way index keys are compared.
///
/// `None` stands for a "null slice" and sorts as positive infinity; an
/// empty slice sorts as negative infinity; otherwise comparison is plain
/// unsigned lexicographic order (spec §4.A, testable properties in §8).
pub fn compare_bin(a: Option<&[u8]>, b: Option<&[u8]>) -> std::cmp::Ordering {
    use std::cmp::Ordering::*;
    match (a, b) {
        (None, None) => Equal,
        (None, Some(_)) => Greater,
        (Some(_), None) => Less,
        (Some(a), Some(b)) => a.cmp(b),
    }
}

/// 32-bit FNV-1a hash.
pub fn fnv1a_32(data: &[u8]) -> u32 {
    const OFFSET_BASIS: u32 = 0x811c_9dc5;
    const PRIME: u32 = 0x0100_0193;
    let mut hash = OFFSET_BASIS;
    for &byte in data {
        hash ^= byte as u32;
        hash = hash.wrapping_mul(PRIME);
    }
    hash
}
