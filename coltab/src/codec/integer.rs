//! Integer column codec (4-byte elements, 4096 per block).

use std::io::{Read, Seek, Write};

use super::{int_bytes, ints_from_bytes};
use crate::compress::{CompAlgo, CompositeCompressor, SingleCompressor};
use crate::format::BLOCK_ELEMS_4;
use crate::stream;
use crate::Result;

/// Compression strategy by level: uncompressed below level 1, a rising
/// share of shuffled LZ4 through level 50, then LZ4 blending into
/// shuffled zstd of increasing strength up to level 100.
fn strategy(level: u32) -> Option<CompositeCompressor> {
    match level {
        0 => None,
        1..=50 => Some(CompositeCompressor::new(
            SingleCompressor::new(CompAlgo::None, 0),
            SingleCompressor::new(CompAlgo::Lz4Shuf4, 100),
            2 * level,
        )),
        _ => Some(CompositeCompressor::new(
            SingleCompressor::new(CompAlgo::Lz4Shuf4, 100),
            SingleCompressor::new(CompAlgo::ZstdShuf4, (22 + 8 * (level as i32 - 50) / 5).min(100)),
            2 * (level - 50),
        )),
    }
}

pub(crate) fn write_integers<W: Write + Seek>(
    w: &mut W,
    values: &[i32],
    level: u32,
) -> Result<()> {
    let data = int_bytes(values);
    let n = values.len() as u64;
    match strategy(level) {
        None => stream::stream_uncompressed(w, &data, n, 4, BLOCK_ELEMS_4, None),
        Some(comp) => stream::stream_compressed(w, &data, n, 4, &comp, BLOCK_ELEMS_4),
    }
}

pub(crate) fn read_integers<R: Read + Seek>(
    r: &mut R,
    block_pos: u64,
    start_row: u64,
    length: u64,
    total_rows: u64,
) -> Result<Vec<i32>> {
    let mut out = vec![0u8; length as usize * 4];
    stream::read_column(r, &mut out, block_pos, start_row, length, total_rows, 4)?;
    Ok(ints_from_bytes(&out))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compress::INT_NA;
    use std::io::Cursor;

    fn roundtrip(values: &[i32], level: u32) {
        let mut file = Cursor::new(Vec::new());
        write_integers(&mut file, values, level).unwrap();
        let file = file.into_inner();

        let mut cursor = Cursor::new(file.as_slice());
        let n = values.len() as u64;
        let back = read_integers(&mut cursor, 0, 0, n, n).unwrap();
        assert_eq!(back, values, "level {}", level);

        // a mid-column slice crossing a block boundary
        if n > 5000 {
            let mut cursor = Cursor::new(file.as_slice());
            let back = read_integers(&mut cursor, 0, 4090, 20, n).unwrap();
            assert_eq!(back, &values[4090..4110]);
        }
    }

    #[test]
    fn roundtrip_all_levels() {
        let values: Vec<i32> = (0..10_000)
            .map(|i| if i % 997 == 0 { INT_NA } else { i * 3 - 5000 })
            .collect();
        for level in [0, 1, 25, 50, 51, 75, 100] {
            roundtrip(&values, level);
        }
    }

    #[test]
    fn roundtrip_short_column() {
        roundtrip(&[1, 2, 3, INT_NA, 5], 0);
        roundtrip(&[1, 2, 3, INT_NA, 5], 100);
    }
}
