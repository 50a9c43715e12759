//! Per-type column codecs.
//!
//! Each codec maps a typed column to a byte payload (and back), choosing
//! a compression strategy from the caller's 0-100 compression level and
//! delegating block handling to the streamer. The missing-value
//! sentinels are fixed by the format and stored bit-exactly; conversion
//! to and from explicit `Option`s happens here, at the codec boundary.

pub mod character;
pub mod double;
pub mod factor;
pub mod integer;
pub mod logical;

pub use crate::compress::INT_NA;

/// Bit pattern of the missing-value double: a NaN with payload 1954.
pub const DOUBLE_NA_BITS: u64 = 0x7FF0_0000_0000_07A2;

pub(crate) fn int_bytes(values: &[i32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(values.len() * 4);
    for v in values {
        out.extend_from_slice(&v.to_le_bytes());
    }
    out
}

pub(crate) fn ints_from_bytes(bytes: &[u8]) -> Vec<i32> {
    bytes
        .chunks_exact(4)
        .map(|c| i32::from_le_bytes(c.try_into().unwrap()))
        .collect()
}

pub(crate) fn double_bytes(values: &[f64]) -> Vec<u8> {
    let mut out = Vec::with_capacity(values.len() * 8);
    for v in values {
        out.extend_from_slice(&v.to_le_bytes());
    }
    out
}

pub(crate) fn doubles_from_bytes(bytes: &[u8]) -> Vec<f64> {
    bytes
        .chunks_exact(8)
        .map(|c| f64::from_le_bytes(c.try_into().unwrap()))
        .collect()
}

/// Integer column to sentinel form.
pub(crate) fn encode_opt_ints(values: &[Option<i32>]) -> Vec<i32> {
    values.iter().map(|v| v.unwrap_or(INT_NA)).collect()
}

/// Sentinel form back to explicit options.
pub(crate) fn decode_opt_ints(values: Vec<i32>) -> Vec<Option<i32>> {
    values
        .into_iter()
        .map(|v| if v == INT_NA { None } else { Some(v) })
        .collect()
}

/// Logical column to the tri-state i32 form the Logic64 packer expects.
pub(crate) fn encode_opt_bools(values: &[Option<bool>]) -> Vec<i32> {
    values
        .iter()
        .map(|v| match v {
            Some(true) => 1,
            Some(false) => 0,
            None => INT_NA,
        })
        .collect()
}

pub(crate) fn decode_opt_bools(values: Vec<i32>) -> Vec<Option<bool>> {
    values
        .into_iter()
        .map(|v| match v {
            0 => Some(false),
            v if v == INT_NA => None,
            _ => Some(true),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn double_na_is_a_nan() {
        assert!(f64::from_bits(DOUBLE_NA_BITS).is_nan());
    }

    #[test]
    fn opt_int_sentinel_roundtrip() {
        let values = vec![Some(1), None, Some(-5), Some(0)];
        let encoded = encode_opt_ints(&values);
        assert_eq!(encoded, vec![1, INT_NA, -5, 0]);
        assert_eq!(decode_opt_ints(encoded), values);
    }

    #[test]
    fn opt_bool_sentinel_roundtrip() {
        let values = vec![Some(true), Some(false), None];
        let encoded = encode_opt_bools(&values);
        assert_eq!(encoded, vec![1, 0, INT_NA]);
        assert_eq!(decode_opt_bools(encoded), values);
    }
}
