//! Logical column codec (tri-state, 4096 per block).
//!
//! Logicals are always reduced by the Logic64 packer first: 2 bits per
//! element, a 16:1 reduction over the i32 in-memory form. At level 0 the
//! packed form is written as-is through the fixed-ratio layout; higher
//! levels layer LZ4 and then zstd over the packed bytes.

use std::io::{Read, Seek, Write};

use super::{int_bytes, ints_from_bytes};
use crate::compress::{CompAlgo, CompositeCompressor, SingleCompressor};
use crate::format::BLOCK_ELEMS_LOGICAL;
use crate::stream;
use crate::Result;

fn strategy(level: u32) -> Option<CompositeCompressor> {
    match level {
        0 => None,
        1..=50 => Some(CompositeCompressor::new(
            SingleCompressor::new(CompAlgo::Logic64, 0),
            SingleCompressor::new(CompAlgo::Lz4Logic64, 100),
            2 * level,
        )),
        _ => Some(CompositeCompressor::new(
            SingleCompressor::new(CompAlgo::Lz4Logic64, 100),
            SingleCompressor::new(CompAlgo::ZstdLogic64, 30 + 7 * (level as i32 - 50) / 5),
            2 * (level - 50),
        )),
    }
}

pub(crate) fn write_logicals<W: Write + Seek>(
    w: &mut W,
    values: &[i32],
    level: u32,
) -> Result<()> {
    let data = int_bytes(values);
    let n = values.len() as u64;
    match strategy(level) {
        None => stream::stream_uncompressed(
            w,
            &data,
            n,
            4,
            BLOCK_ELEMS_LOGICAL,
            Some(CompAlgo::Logic64),
        ),
        Some(comp) => stream::stream_compressed(w, &data, n, 4, &comp, BLOCK_ELEMS_LOGICAL),
    }
}

pub(crate) fn read_logicals<R: Read + Seek>(
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

    fn tri_state(n: usize) -> Vec<i32> {
        (0..n)
            .map(|i| match i % 5 {
                0 | 3 => 0,
                1 => 1,
                _ => INT_NA,
            })
            .collect()
    }

    #[test]
    fn roundtrip_all_levels() {
        let values = tri_state(9000);
        for level in [0, 1, 30, 50, 51, 100] {
            let mut file = Cursor::new(Vec::new());
            write_logicals(&mut file, &values, level).unwrap();
            let file = file.into_inner();

            let mut cursor = Cursor::new(file.as_slice());
            let back = read_logicals(&mut cursor, 0, 0, 9000, 9000).unwrap();
            assert_eq!(back, values, "level {}", level);

            let mut cursor = Cursor::new(file.as_slice());
            let back = read_logicals(&mut cursor, 0, 4000, 200, 9000).unwrap();
            assert_eq!(back, &values[4000..4200], "level {}", level);
        }
    }

    #[test]
    fn level_zero_payload_is_packed() {
        // 4 logicals pack into a single byte behind the 8-byte header
        let values = vec![1, 0, INT_NA, 1];
        let mut file = Cursor::new(Vec::new());
        write_logicals(&mut file, &values, 0).unwrap();
        let file = file.into_inner();
        assert_eq!(file.len() as u64, stream::VERTICAL_HEADER_SIZE + 1);
    }
}
