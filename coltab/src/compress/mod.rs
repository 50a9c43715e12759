//! Compression algorithm registry.
//!
//! A closed enumeration of block compression algorithms. Each id binds a
//! compress function, a decompress function, and an upper bound on the
//! compressed size. The id is what lands in block-position indexes, so
//! the numbering is part of the on-disk format and must never change.
//!
//! "Shuffle" variants transpose byte planes before the entropy coder so
//! same-significance bytes sit together; "Logic64" packs tri-state
//! logical values at 2 bits per element and is the fixed-ratio
//! algorithm: its output size is a pure function of its input size.

pub mod compressor;

use crate::{err_format, Result};

pub use compressor::{CompositeCompressor, SingleCompressor};

const ALGO_NONE: u8 = 0;
const ALGO_LZ4: u8 = 1;
const ALGO_LZ4_SHUF4: u8 = 2;
const ALGO_ZSTD: u8 = 3;
const ALGO_ZSTD_SHUF4: u8 = 4;
const ALGO_ZSTD_SHUF8: u8 = 5;
const ALGO_LOGIC64: u8 = 6;
const ALGO_LZ4_LOGIC64: u8 = 7;
const ALGO_ZSTD_LOGIC64: u8 = 8;

/// Block compression algorithm id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CompAlgo {
    None = ALGO_NONE,
    Lz4 = ALGO_LZ4,
    Lz4Shuf4 = ALGO_LZ4_SHUF4,
    Zstd = ALGO_ZSTD,
    ZstdShuf4 = ALGO_ZSTD_SHUF4,
    ZstdShuf8 = ALGO_ZSTD_SHUF8,
    Logic64 = ALGO_LOGIC64,
    Lz4Logic64 = ALGO_LZ4_LOGIC64,
    ZstdLogic64 = ALGO_ZSTD_LOGIC64,
}

impl CompAlgo {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            ALGO_NONE => Some(CompAlgo::None),
            ALGO_LZ4 => Some(CompAlgo::Lz4),
            ALGO_LZ4_SHUF4 => Some(CompAlgo::Lz4Shuf4),
            ALGO_ZSTD => Some(CompAlgo::Zstd),
            ALGO_ZSTD_SHUF4 => Some(CompAlgo::ZstdShuf4),
            ALGO_ZSTD_SHUF8 => Some(CompAlgo::ZstdShuf8),
            ALGO_LOGIC64 => Some(CompAlgo::Logic64),
            ALGO_LZ4_LOGIC64 => Some(CompAlgo::Lz4Logic64),
            ALGO_ZSTD_LOGIC64 => Some(CompAlgo::ZstdLogic64),
            _ => None,
        }
    }

    /// True if compressed size is a pure function of input size, which
    /// permits an index-free column layout.
    pub fn is_fixed_ratio(self) -> bool {
        matches!(self, CompAlgo::None | CompAlgo::Logic64)
    }

    /// Compressed size for fixed-ratio algorithms.
    pub fn fixed_compressed_size(self, src_len: usize) -> usize {
        match self {
            CompAlgo::None => src_len,
            CompAlgo::Logic64 => logic64_packed_size(src_len / 4),
            _ => unreachable!("not a fixed-ratio algorithm"),
        }
    }

    /// Upper bound on the compressed size of `src_len` input bytes.
    pub fn max_compressed_size(self, src_len: usize) -> usize {
        match self {
            CompAlgo::None => src_len,
            CompAlgo::Lz4 | CompAlgo::Lz4Shuf4 => {
                lz4_flex::block::get_maximum_output_size(src_len)
            }
            CompAlgo::Zstd | CompAlgo::ZstdShuf4 | CompAlgo::ZstdShuf8 => {
                zstd::zstd_safe::compress_bound(src_len)
            }
            CompAlgo::Logic64 => logic64_packed_size(src_len / 4),
            CompAlgo::Lz4Logic64 => {
                lz4_flex::block::get_maximum_output_size(logic64_packed_size(src_len / 4))
            }
            CompAlgo::ZstdLogic64 => {
                zstd::zstd_safe::compress_bound(logic64_packed_size(src_len / 4))
            }
        }
    }

    /// Compress `src` into `dst`, returning the number of bytes written.
    /// `strength` is 0-100 and only affects the zstd family.
    pub fn compress(self, src: &[u8], dst: &mut [u8], strength: i32) -> Result<usize> {
        match self {
            CompAlgo::None => {
                dst[..src.len()].copy_from_slice(src);
                Ok(src.len())
            }
            CompAlgo::Lz4 => lz4_compress(src, dst),
            CompAlgo::Zstd => zstd_compress(src, dst, strength),
            CompAlgo::Lz4Shuf4 => {
                let shuffled = shuffle(src, 4);
                lz4_compress(&shuffled, dst)
            }
            CompAlgo::ZstdShuf4 => {
                let shuffled = shuffle(src, 4);
                zstd_compress(&shuffled, dst, strength)
            }
            CompAlgo::ZstdShuf8 => {
                let shuffled = shuffle(src, 8);
                zstd_compress(&shuffled, dst, strength)
            }
            CompAlgo::Logic64 => {
                let packed = logic64_pack(src)?;
                dst[..packed.len()].copy_from_slice(&packed);
                Ok(packed.len())
            }
            CompAlgo::Lz4Logic64 => {
                let packed = logic64_pack(src)?;
                lz4_compress(&packed, dst)
            }
            CompAlgo::ZstdLogic64 => {
                let packed = logic64_pack(src)?;
                zstd_compress(&packed, dst, strength)
            }
        }
    }

    /// Decompress `src` into `dst`; `dst` must be exactly the
    /// uncompressed size (known from block arithmetic). Returns the
    /// number of bytes written.
    pub fn decompress(self, src: &[u8], dst: &mut [u8]) -> Result<usize> {
        match self {
            CompAlgo::None => {
                if src.len() != dst.len() {
                    return Err(err_format("uncompressed block size mismatch"));
                }
                dst.copy_from_slice(src);
                Ok(dst.len())
            }
            CompAlgo::Lz4 => lz4_decompress(src, dst),
            CompAlgo::Zstd => zstd_decompress(src, dst),
            CompAlgo::Lz4Shuf4 => {
                let mut shuffled = vec![0u8; dst.len()];
                lz4_decompress(src, &mut shuffled)?;
                unshuffle_into(&shuffled, 4, dst);
                Ok(dst.len())
            }
            CompAlgo::ZstdShuf4 => {
                let mut shuffled = vec![0u8; dst.len()];
                zstd_decompress(src, &mut shuffled)?;
                unshuffle_into(&shuffled, 4, dst);
                Ok(dst.len())
            }
            CompAlgo::ZstdShuf8 => {
                let mut shuffled = vec![0u8; dst.len()];
                zstd_decompress(src, &mut shuffled)?;
                unshuffle_into(&shuffled, 8, dst);
                Ok(dst.len())
            }
            CompAlgo::Logic64 => {
                logic64_unpack(src, dst)?;
                Ok(dst.len())
            }
            CompAlgo::Lz4Logic64 => {
                let mut packed = vec![0u8; logic64_packed_size(dst.len() / 4)];
                lz4_decompress(src, &mut packed)?;
                logic64_unpack(&packed, dst)?;
                Ok(dst.len())
            }
            CompAlgo::ZstdLogic64 => {
                let mut packed = vec![0u8; logic64_packed_size(dst.len() / 4)];
                zstd_decompress(src, &mut packed)?;
                logic64_unpack(&packed, dst)?;
                Ok(dst.len())
            }
        }
    }
}

// ============================================================================
// Backend wrappers
// ============================================================================

fn lz4_compress(src: &[u8], dst: &mut [u8]) -> Result<usize> {
    lz4_flex::block::compress_into(src, dst)
        .map_err(|e| err_format(format!("LZ4 compress failed: {}", e)))
}

fn lz4_decompress(src: &[u8], dst: &mut [u8]) -> Result<usize> {
    let written = lz4_flex::block::decompress_into(src, dst)
        .map_err(|e| err_format(format!("LZ4 decompress failed: {}", e)))?;
    if written != dst.len() {
        return Err(err_format("LZ4 block decompressed to unexpected size"));
    }
    Ok(written)
}

/// Map a 0-100 strength onto zstd levels 1-19; the ultra levels need
/// outsized windows that buy nothing at 16 KiB blocks.
fn zstd_level(strength: i32) -> i32 {
    let strength = strength.clamp(0, 100);
    1 + strength * 18 / 100
}

fn zstd_compress(src: &[u8], dst: &mut [u8], strength: i32) -> Result<usize> {
    zstd::bulk::compress_to_buffer(src, dst, zstd_level(strength))
        .map_err(|e| err_format(format!("zstd compress failed: {}", e)))
}

fn zstd_decompress(src: &[u8], dst: &mut [u8]) -> Result<usize> {
    let written = zstd::bulk::decompress_to_buffer(src, dst)
        .map_err(|e| err_format(format!("zstd decompress failed: {}", e)))?;
    if written != dst.len() {
        return Err(err_format("zstd block decompressed to unexpected size"));
    }
    Ok(written)
}

// ============================================================================
// Byte shuffle
// ============================================================================

/// Transpose byte planes of `elem_size`-wide elements: all byte 0s, then
/// all byte 1s, and so on. A tail shorter than one element is copied
/// verbatim after the shuffled body.
pub fn shuffle(src: &[u8], elem_size: usize) -> Vec<u8> {
    let n = src.len() / elem_size;
    let mut out = vec![0u8; src.len()];
    for plane in 0..elem_size {
        for i in 0..n {
            out[plane * n + i] = src[i * elem_size + plane];
        }
    }
    let tail = n * elem_size;
    out[tail..].copy_from_slice(&src[tail..]);
    out
}

/// Inverse of [`shuffle`].
pub fn unshuffle_into(src: &[u8], elem_size: usize, dst: &mut [u8]) {
    let n = src.len() / elem_size;
    for plane in 0..elem_size {
        for i in 0..n {
            dst[i * elem_size + plane] = src[plane * n + i];
        }
    }
    let tail = n * elem_size;
    dst[tail..].copy_from_slice(&src[tail..]);
}

// ============================================================================
// Logic64 tri-state packing
// ============================================================================

/// Missing-value sentinel for integer and logical columns.
pub const INT_NA: i32 = i32::MIN;

/// Packed size for `n` logical elements: 2 bits each, 4 per byte.
pub fn logic64_packed_size(n: usize) -> usize {
    (n + 3) / 4
}

/// Pack i32 tri-state values {0, 1, INT_NA} at 2 bits per element:
/// 00 = false, 01 = true, 10 = missing.
pub fn logic64_pack(src: &[u8]) -> Result<Vec<u8>> {
    if src.len() % 4 != 0 {
        return Err(err_format("logical block is not a whole number of elements"));
    }
    let n = src.len() / 4;
    let mut out = vec![0u8; logic64_packed_size(n)];
    for i in 0..n {
        let v = i32::from_le_bytes(src[i * 4..i * 4 + 4].try_into().unwrap());
        let bits: u8 = if v == INT_NA {
            0b10
        } else if v != 0 {
            0b01
        } else {
            0b00
        };
        out[i / 4] |= bits << ((i % 4) * 2);
    }
    Ok(out)
}

/// Unpack 2-bit tri-state values back to i32 sentinels. `dst` length
/// fixes the element count; trailing bits in the last byte are ignored.
pub fn logic64_unpack(src: &[u8], dst: &mut [u8]) -> Result<()> {
    if dst.len() % 4 != 0 {
        return Err(err_format("logical output is not a whole number of elements"));
    }
    let n = dst.len() / 4;
    if src.len() < logic64_packed_size(n) {
        return Err(err_format("packed logical block is too short"));
    }
    for i in 0..n {
        let bits = (src[i / 4] >> ((i % 4) * 2)) & 0b11;
        let v: i32 = match bits {
            0b00 => 0,
            0b01 => 1,
            _ => INT_NA,
        };
        dst[i * 4..i * 4 + 4].copy_from_slice(&v.to_le_bytes());
    }
    Ok(())
}
