//! Double column codec (8-byte elements, 2048 per block).

use std::io::{Read, Seek, Write};

use super::{double_bytes, doubles_from_bytes};
use crate::compress::{CompAlgo, CompositeCompressor, SingleCompressor};
use crate::format::BLOCK_ELEMS_8;
use crate::stream;
use crate::Result;

/// Through level 50 a rising share of blocks gets shuffled zstd at a
/// gentle strength; past 50 every block is zstd and the blend moves
/// toward a higher strength. Raising the level can only shrink output.
fn strategy(level: u32) -> Option<CompositeCompressor> {
    match level {
        0 => None,
        1..=50 => Some(CompositeCompressor::new(
            SingleCompressor::new(CompAlgo::None, 0),
            SingleCompressor::new(CompAlgo::ZstdShuf8, level as i32 / 5),
            2 * level,
        )),
        _ => Some(CompositeCompressor::new(
            SingleCompressor::new(CompAlgo::ZstdShuf8, 10),
            SingleCompressor::new(CompAlgo::ZstdShuf8, 10 + 9 * (level as i32 - 50) / 5),
            2 * (level - 50),
        )),
    }
}

pub(crate) fn write_doubles<W: Write + Seek>(w: &mut W, values: &[f64], level: u32) -> Result<()> {
    let data = double_bytes(values);
    let n = values.len() as u64;
    match strategy(level) {
        None => stream::stream_uncompressed(w, &data, n, 8, BLOCK_ELEMS_8, None),
        Some(comp) => stream::stream_compressed(w, &data, n, 8, &comp, BLOCK_ELEMS_8),
    }
}

pub(crate) fn read_doubles<R: Read + Seek>(
    r: &mut R,
    block_pos: u64,
    start_row: u64,
    length: u64,
    total_rows: u64,
) -> Result<Vec<f64>> {
    let mut out = vec![0u8; length as usize * 8];
    stream::read_column(r, &mut out, block_pos, start_row, length, total_rows, 8)?;
    Ok(doubles_from_bytes(&out))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::DOUBLE_NA_BITS;
    use std::io::Cursor;

    fn roundtrip_bits(values: &[f64], level: u32) {
        let mut file = Cursor::new(Vec::new());
        write_doubles(&mut file, values, level).unwrap();
        let file = file.into_inner();

        let mut cursor = Cursor::new(file.as_slice());
        let n = values.len() as u64;
        let back = read_doubles(&mut cursor, 0, 0, n, n).unwrap();
        assert_eq!(back.len(), values.len());
        for (a, b) in values.iter().zip(back.iter()) {
            assert_eq!(a.to_bits(), b.to_bits(), "level {}", level);
        }
    }

    #[test]
    fn roundtrip_preserves_nan_bits() {
        let values = vec![
            1.0,
            -0.0,
            f64::INFINITY,
            f64::from_bits(DOUBLE_NA_BITS),
            f64::NAN,
            2.5e-300,
        ];
        for level in [0, 30, 50, 80, 100] {
            roundtrip_bits(&values, level);
        }
    }

    #[test]
    fn roundtrip_long_column_with_slice() {
        let values: Vec<f64> = (0..6000).map(|i| (i as f64).sqrt()).collect();
        roundtrip_bits(&values, 60);

        let mut file = Cursor::new(Vec::new());
        write_doubles(&mut file, &values, 60).unwrap();
        let file = file.into_inner();
        let mut cursor = Cursor::new(file.as_slice());
        let back = read_doubles(&mut cursor, 0, 2040, 20, 6000).unwrap();
        for (a, b) in values[2040..2060].iter().zip(back.iter()) {
            assert_eq!(a.to_bits(), b.to_bits());
        }
    }
}
