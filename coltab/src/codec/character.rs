//! Text column codec (variable-length strings, 2047 per block).
//!
//! Unlike the fixed-width codecs this one owns its whole layout: blocks
//! hold a fixed count of strings, and each block stores a length index
//! (4-byte cumulative end offsets, bit 31 flagging a missing value)
//! followed by the concatenated UTF-8 bytes. Index and character bytes
//! are compressed independently, per block, with the algorithm recorded
//! in the block table.
//!
//! Column payload:
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │ Column header (8 bytes)                                      │
//! │   - Block count: u32                                         │
//! │   - Strings in final block: u16                              │
//! │   - Version: u8                                              │
//! │   - Reserved: u8                                             │
//! ├──────────────────────────────────────────────────────────────┤
//! │ Block table (16 bytes per block, backfilled)                 │
//! │   - Length-index compressed size: u32                        │
//! │   - Character bytes compressed size: u32                     │
//! │   - Character bytes uncompressed size: u32                   │
//! │   - Length-index algorithm: u8                               │
//! │   - Character algorithm: u8                                  │
//! │   - Reserved: u16                                            │
//! ├──────────────────────────────────────────────────────────────┤
//! │ Blocks: [length index][character bytes], back to back        │
//! └──────────────────────────────────────────────────────────────┘
//! ```

use std::io::{Read, Seek, SeekFrom, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::compress::CompAlgo;
use crate::format::{TEXT_BLOCK_CHARS, TEXT_BLOCK_STRINGS};
use crate::{err_arg, err_format, Result};

const NA_FLAG: u32 = 0x8000_0000;
const TEXT_CODEC_VERSION: u8 = 1;
const BLOCK_TABLE_ENTRY_SIZE: u64 = 16;

#[derive(Debug, Clone, Copy, Default)]
struct BlockEntry {
    meta_size: u32,
    char_size: u32,
    raw_char_size: u32,
    meta_algo: u8,
    char_algo: u8,
}

impl BlockEntry {
    fn write_to<W: Write>(&self, w: &mut W) -> Result<()> {
        w.write_u32::<LittleEndian>(self.meta_size)?;
        w.write_u32::<LittleEndian>(self.char_size)?;
        w.write_u32::<LittleEndian>(self.raw_char_size)?;
        w.write_u8(self.meta_algo)?;
        w.write_u8(self.char_algo)?;
        w.write_u16::<LittleEndian>(0)?;
        Ok(())
    }

    fn read_from<R: Read>(r: &mut R) -> Result<Self> {
        let meta_size = r.read_u32::<LittleEndian>()?;
        let char_size = r.read_u32::<LittleEndian>()?;
        let raw_char_size = r.read_u32::<LittleEndian>()?;
        let meta_algo = r.read_u8()?;
        let char_algo = r.read_u8()?;
        let _reserved = r.read_u16::<LittleEndian>()?;
        Ok(BlockEntry { meta_size, char_size, raw_char_size, meta_algo, char_algo })
    }
}

/// Algorithm and strength for both streams of a block at this level.
fn block_algo(level: u32) -> (CompAlgo, i32) {
    match level {
        0 => (CompAlgo::None, 0),
        1..=50 => (CompAlgo::Lz4, 100),
        _ => (CompAlgo::Zstd, level.min(100) as i32),
    }
}

fn text_blocks(n: usize) -> (usize, usize) {
    if n == 0 {
        return (0, 0);
    }
    let blocks = (n + TEXT_BLOCK_STRINGS - 1) / TEXT_BLOCK_STRINGS;
    (blocks, n - (blocks - 1) * TEXT_BLOCK_STRINGS)
}

fn compress_stream(raw: &[u8], algo: CompAlgo, strength: i32) -> Result<(u8, Vec<u8>)> {
    if raw.is_empty() {
        return Ok((CompAlgo::None as u8, Vec::new()));
    }
    match algo {
        CompAlgo::None => Ok((CompAlgo::None as u8, raw.to_vec())),
        _ => {
            let mut dst = vec![0u8; algo.max_compressed_size(raw.len())];
            let written = algo.compress(raw, &mut dst, strength)?;
            dst.truncate(written);
            Ok((algo as u8, dst))
        }
    }
}

fn decompress_stream<R: Read>(r: &mut R, comp_size: u32, raw_size: usize, algo: u8) -> Result<Vec<u8>> {
    let algo = CompAlgo::from_u8(algo)
        .ok_or_else(|| err_format("unknown algorithm id in text block table"))?;
    let mut compressed = vec![0u8; comp_size as usize];
    r.read_exact(&mut compressed)?;
    if algo == CompAlgo::None {
        if compressed.len() != raw_size {
            return Err(err_format("uncompressed text stream size mismatch"));
        }
        return Ok(compressed);
    }
    let mut raw = vec![0u8; raw_size];
    algo.decompress(&compressed, &mut raw)?;
    Ok(raw)
}

/// Write a text column. `None` entries are missing values, distinct from
/// empty strings.
pub(crate) fn write_text<W: Write + Seek>(
    w: &mut W,
    strings: &[Option<&str>],
    level: u32,
) -> Result<()> {
    let (blocks, last_block_len) = text_blocks(strings.len());

    w.write_u32::<LittleEndian>(blocks as u32)?;
    w.write_u16::<LittleEndian>(last_block_len as u16)?;
    w.write_u8(TEXT_CODEC_VERSION)?;
    w.write_u8(0)?;

    let table_pos = w.stream_position()?;
    w.write_all(&vec![0u8; blocks * BLOCK_TABLE_ENTRY_SIZE as usize])?;

    let (algo, strength) = block_algo(level);
    let mut entries = Vec::with_capacity(blocks);

    for chunk in strings.chunks(TEXT_BLOCK_STRINGS) {
        let mut offsets = Vec::with_capacity(chunk.len() * 4);
        let mut chars: Vec<u8> = Vec::with_capacity(TEXT_BLOCK_CHARS);
        let mut running: u32 = 0;
        for s in chunk {
            let entry = match s {
                Some(s) => {
                    let new_total = (running as u64) + s.len() as u64;
                    if new_total >= NA_FLAG as u64 {
                        return Err(err_arg("text block exceeds the maximum character count"));
                    }
                    running = new_total as u32;
                    chars.extend_from_slice(s.as_bytes());
                    running
                }
                None => running | NA_FLAG,
            };
            offsets.extend_from_slice(&entry.to_le_bytes());
        }

        let (meta_algo, meta_comp) = compress_stream(&offsets, algo, strength)?;
        let (char_algo, char_comp) = compress_stream(&chars, algo, strength)?;
        entries.push(BlockEntry {
            meta_size: meta_comp.len() as u32,
            char_size: char_comp.len() as u32,
            raw_char_size: chars.len() as u32,
            meta_algo,
            char_algo,
        });
        w.write_all(&meta_comp)?;
        w.write_all(&char_comp)?;
    }

    let end_pos = w.stream_position()?;
    w.seek(SeekFrom::Start(table_pos))?;
    for entry in &entries {
        entry.write_to(w)?;
    }
    w.seek(SeekFrom::Start(end_pos))?;
    Ok(())
}

/// Decode the row slice `[start_row, start_row + length)` of a text
/// column. The slice may start and stop mid-block; untouched blocks are
/// never read.
pub(crate) fn read_text<R: Read + Seek>(
    r: &mut R,
    block_pos: u64,
    start_row: u64,
    length: u64,
    total_rows: u64,
) -> Result<Vec<Option<String>>> {
    if length == 0 {
        return Ok(Vec::new());
    }
    if start_row + length > total_rows {
        return Err(err_format("row slice exceeds column length"));
    }

    r.seek(SeekFrom::Start(block_pos))?;
    let blocks = r.read_u32::<LittleEndian>()? as usize;
    let last_block_len = r.read_u16::<LittleEndian>()? as usize;
    let version = r.read_u8()?;
    let _reserved = r.read_u8()?;

    if version != TEXT_CODEC_VERSION {
        return Err(err_format("unsupported text codec version"));
    }
    let (expect_blocks, expect_last) = text_blocks(total_rows as usize);
    if blocks != expect_blocks || last_block_len != expect_last {
        return Err(err_format("text block count disagrees with row count"));
    }

    let mut entries = Vec::with_capacity(blocks);
    for _ in 0..blocks {
        entries.push(BlockEntry::read_from(r)?);
    }

    // prefix sums over the block table give each block's byte offset
    let mut block_offsets = Vec::with_capacity(blocks + 1);
    let mut cum = 0u64;
    for entry in &entries {
        block_offsets.push(cum);
        cum += entry.meta_size as u64 + entry.char_size as u64;
    }
    block_offsets.push(cum);

    let blocks_base = block_pos + 8 + blocks as u64 * BLOCK_TABLE_ENTRY_SIZE;
    let block_strings = TEXT_BLOCK_STRINGS as u64;
    let first_block = start_row / block_strings;
    let last_block = (start_row + length - 1) / block_strings;

    let mut out = Vec::with_capacity(length as usize);
    for k in first_block..=last_block {
        let entry = &entries[k as usize];
        let strings_in_block = (total_rows - k * block_strings).min(block_strings) as usize;

        r.seek(SeekFrom::Start(blocks_base + block_offsets[k as usize]))?;
        let meta_raw = decompress_stream(r, entry.meta_size, strings_in_block * 4, entry.meta_algo)?;
        let char_raw = decompress_stream(
            r,
            entry.char_size,
            entry.raw_char_size as usize,
            entry.char_algo,
        )?;

        let offsets: Vec<u32> = meta_raw
            .chunks_exact(4)
            .map(|c| u32::from_le_bytes(c.try_into().unwrap()))
            .collect();

        let lo = (start_row.max(k * block_strings) - k * block_strings) as usize;
        let hi = ((start_row + length).min(k * block_strings + strings_in_block as u64)
            - k * block_strings) as usize;

        for i in lo..hi {
            let prev = if i == 0 { 0 } else { offsets[i - 1] & !NA_FLAG } as usize;
            let cur_entry = offsets[i];
            let cur = (cur_entry & !NA_FLAG) as usize;
            if cur < prev || cur > char_raw.len() {
                return Err(err_format("text length index is not monotonic"));
            }
            if cur_entry & NA_FLAG != 0 {
                out.push(None);
            } else {
                let s = std::str::from_utf8(&char_raw[prev..cur])
                    .map_err(|_| err_format("text block holds invalid UTF-8"))?;
                out.push(Some(s.to_string()));
            }
        }
    }
    Ok(out)
}

/// Write a list of plain names (never missing) at level 0; used for the
/// column-name block of the table header region.
pub(crate) fn write_names<W: Write + Seek>(w: &mut W, names: &[String]) -> Result<()> {
    let refs: Vec<Option<&str>> = names.iter().map(|s| Some(s.as_str())).collect();
    write_text(w, &refs, 0)
}

pub(crate) fn read_names<R: Read + Seek>(
    r: &mut R,
    block_pos: u64,
    count: u64,
) -> Result<Vec<String>> {
    let decoded = read_text(r, block_pos, 0, count, count)?;
    Ok(decoded
        .into_iter()
        .map(|s| s.unwrap_or_default())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn roundtrip(strings: &[Option<&str>], level: u32) -> Vec<Option<String>> {
        let mut file = Cursor::new(Vec::new());
        write_text(&mut file, strings, level).unwrap();
        let file = file.into_inner();
        let mut cursor = Cursor::new(file.as_slice());
        let n = strings.len() as u64;
        read_text(&mut cursor, 0, 0, n, n).unwrap()
    }

    fn expected(strings: &[Option<&str>]) -> Vec<Option<String>> {
        strings.iter().map(|s| s.map(|s| s.to_string())).collect()
    }

    #[test]
    fn roundtrip_preserves_empty_and_missing() {
        let strings = vec![Some("x"), Some(""), Some("yy"), None, Some("zzz")];
        for level in [0, 50, 100] {
            assert_eq!(roundtrip(&strings, level), expected(&strings), "level {}", level);
        }
    }

    #[test]
    fn roundtrip_unicode() {
        let strings = vec![Some("héllo"), Some("wörld"), Some("日本語"), None];
        assert_eq!(roundtrip(&strings, 40), expected(&strings));
    }

    #[test]
    fn multi_block_slice_starts_mid_block() {
        let owned: Vec<String> = (0..5000).map(|i| format!("value-{}", i)).collect();
        let strings: Vec<Option<&str>> = owned
            .iter()
            .enumerate()
            .map(|(i, s)| if i % 13 == 0 { None } else { Some(s.as_str()) })
            .collect();

        let mut file = Cursor::new(Vec::new());
        write_text(&mut file, &strings, 70).unwrap();
        let file = file.into_inner();

        // crosses the first block boundary at 2047, starts and ends mid-block
        let mut cursor = Cursor::new(file.as_slice());
        let got = read_text(&mut cursor, 0, 2000, 100, 5000).unwrap();
        assert_eq!(got, expected(&strings[2000..2100]));

        // final block only
        let mut cursor = Cursor::new(file.as_slice());
        let got = read_text(&mut cursor, 0, 4999, 1, 5000).unwrap();
        assert_eq!(got, expected(&strings[4999..5000]));
    }

    #[test]
    fn all_missing_block() {
        let strings: Vec<Option<&str>> = vec![None; 10];
        assert_eq!(roundtrip(&strings, 50), vec![None; 10]);
    }

    #[test]
    fn names_roundtrip() {
        let names: Vec<String> = vec!["a".into(), "value".into(), "k".into()];
        let mut file = Cursor::new(Vec::new());
        write_names(&mut file, &names).unwrap();
        let file = file.into_inner();
        let mut cursor = Cursor::new(file.as_slice());
        assert_eq!(read_names(&mut cursor, 0, 3).unwrap(), names);
    }
}
