//! Factor column codec: a text payload of level strings followed by an
//! integer payload of 1-based level codes, written back to back. The
//! level strings are always decoded in full; the codes honor the
//! requested row range.

use std::io::{Read, Seek, SeekFrom, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use super::{character, integer};
use crate::{err_format, Result};

const FACTOR_HEADER_SIZE: u64 = 16;

pub(crate) fn write_factor<W: Write + Seek>(
    w: &mut W,
    levels: &[String],
    codes: &[i32],
    level: u32,
) -> Result<()> {
    let header_pos = w.stream_position()?;
    w.write_all(&[0u8; FACTOR_HEADER_SIZE as usize])?;

    let levels_start = w.stream_position()?;
    let refs: Vec<Option<&str>> = levels.iter().map(|s| Some(s.as_str())).collect();
    character::write_text(w, &refs, level)?;
    let levels_size = w.stream_position()? - levels_start;

    integer::write_integers(w, codes, level)?;

    let end_pos = w.stream_position()?;
    w.seek(SeekFrom::Start(header_pos))?;
    w.write_u32::<LittleEndian>(levels.len() as u32)?;
    w.write_u32::<LittleEndian>(0)?;
    w.write_u64::<LittleEndian>(levels_size)?;
    w.seek(SeekFrom::Start(end_pos))?;
    Ok(())
}

pub(crate) fn read_factor<R: Read + Seek>(
    r: &mut R,
    block_pos: u64,
    start_row: u64,
    length: u64,
    total_rows: u64,
) -> Result<(Vec<String>, Vec<i32>)> {
    r.seek(SeekFrom::Start(block_pos))?;
    let nr_of_levels = r.read_u32::<LittleEndian>()? as u64;
    let _reserved = r.read_u32::<LittleEndian>()?;
    let levels_size = r.read_u64::<LittleEndian>()?;

    let levels = character::read_text(r, block_pos + FACTOR_HEADER_SIZE, 0, nr_of_levels, nr_of_levels)?
        .into_iter()
        .map(|s| s.ok_or_else(|| err_format("factor level string is missing")))
        .collect::<Result<Vec<String>>>()?;

    let codes = integer::read_integers(
        r,
        block_pos + FACTOR_HEADER_SIZE + levels_size,
        start_row,
        length,
        total_rows,
    )?;
    Ok((levels, codes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compress::INT_NA;
    use std::io::Cursor;

    #[test]
    fn roundtrip_with_missing_codes() {
        let levels: Vec<String> = vec!["low".into(), "mid".into(), "high".into()];
        let codes: Vec<i32> = (0..5000)
            .map(|i| if i % 11 == 0 { INT_NA } else { (i % 3) as i32 + 1 })
            .collect();

        for level in [0, 45, 85] {
            let mut file = Cursor::new(Vec::new());
            write_factor(&mut file, &levels, &codes, level).unwrap();
            let file = file.into_inner();

            let mut cursor = Cursor::new(file.as_slice());
            let (got_levels, got_codes) = read_factor(&mut cursor, 0, 0, 5000, 5000).unwrap();
            assert_eq!(got_levels, levels);
            assert_eq!(got_codes, codes);

            let mut cursor = Cursor::new(file.as_slice());
            let (got_levels, got_codes) = read_factor(&mut cursor, 0, 4100, 50, 5000).unwrap();
            assert_eq!(got_levels, levels, "levels decode in full for any range");
            assert_eq!(got_codes, &codes[4100..4150]);
        }
    }

    #[test]
    fn zero_level_factor() {
        let codes = vec![INT_NA, INT_NA, INT_NA];
        let mut file = Cursor::new(Vec::new());
        write_factor(&mut file, &[], &codes, 30).unwrap();
        let file = file.into_inner();

        let mut cursor = Cursor::new(file.as_slice());
        let (levels, got) = read_factor(&mut cursor, 0, 0, 3, 3).unwrap();
        assert!(levels.is_empty());
        assert_eq!(got, codes);
    }
}
