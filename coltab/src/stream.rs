//! Block streamer: slices a column's bytes into fixed-count blocks,
//! compresses each, and maintains the block-position index that makes
//! decompression O(1) in the number of touched blocks.
//!
//! Column payload layout:
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │ Vertical header (8 bytes)                                    │
//! │   - Element count: u32                                       │
//! │   - Block size (elements): u16                               │
//! │   - Algorithm: u8 (0 = raw, 0xFF = indexed, else fixed-ratio)│
//! │   - Reserved: u8                                             │
//! ├──────────────────────────────────────────────────────────────┤
//! │ Block-position index (indexed layout only)                   │
//! │   (nrOfBlocks + 1) x u64: algo id in the high 8 bits,        │
//! │   cumulative compressed offset in the low 56 bits; the final │
//! │   entry is a terminator holding the total compressed size    │
//! ├──────────────────────────────────────────────────────────────┤
//! │ Blocks, back to back                                         │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Raw and fixed-ratio layouts have no index: block offsets follow from
//! arithmetic alone.

use std::io::{Read, Seek, SeekFrom, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::compress::{CompAlgo, CompositeCompressor};
use crate::{err_format, Result};

/// Vertical-header algorithm byte marking an indexed column.
const INDEXED_MARKER: u8 = 0xFF;

/// Size of the vertical header.
pub const VERTICAL_HEADER_SIZE: u64 = 8;

const OFFSET_MASK: u64 = (1 << 56) - 1;

#[derive(Debug, Clone, Copy)]
struct VerticalHeader {
    n_elements: u32,
    block_size: u16,
    algo: u8,
}

impl VerticalHeader {
    fn write_to<W: Write>(&self, w: &mut W) -> Result<()> {
        w.write_u32::<LittleEndian>(self.n_elements)?;
        w.write_u16::<LittleEndian>(self.block_size)?;
        w.write_u8(self.algo)?;
        w.write_u8(0)?;
        Ok(())
    }

    fn read_from<R: Read>(r: &mut R) -> Result<Self> {
        let n_elements = r.read_u32::<LittleEndian>()?;
        let block_size = r.read_u16::<LittleEndian>()?;
        let algo = r.read_u8()?;
        let _reserved = r.read_u8()?;
        Ok(VerticalHeader { n_elements, block_size, algo })
    }
}

fn pack_entry(algo: CompAlgo, offset: u64) -> u64 {
    ((algo as u64) << 56) | (offset & OFFSET_MASK)
}

fn entry_offset(entry: u64) -> u64 {
    entry & OFFSET_MASK
}

fn entry_algo(entry: u64) -> Result<CompAlgo> {
    CompAlgo::from_u8((entry >> 56) as u8)
        .ok_or_else(|| err_format("unknown algorithm id in block index"))
}

fn nr_of_blocks(n_elements: u64, block_size: u64) -> u64 {
    (n_elements + block_size - 1) / block_size
}

fn elems_in_block(block: u64, n_elements: u64, block_size: u64) -> u64 {
    (n_elements - block * block_size).min(block_size)
}

/// Write a column without a block index: either raw bytes or a
/// fixed-ratio algorithm whose per-block output size is derivable.
pub fn stream_uncompressed<W: Write + Seek>(
    w: &mut W,
    data: &[u8],
    n_elements: u64,
    elem_size: usize,
    block_size: usize,
    fixed: Option<CompAlgo>,
) -> Result<()> {
    debug_assert_eq!(data.len() as u64, n_elements * elem_size as u64);
    let header = VerticalHeader {
        n_elements: n_elements as u32,
        block_size: block_size as u16,
        algo: fixed.map(|a| a as u8).unwrap_or(CompAlgo::None as u8),
    };
    header.write_to(w)?;

    match fixed {
        None => {
            w.write_all(data)?;
        }
        Some(algo) => {
            debug_assert!(algo.is_fixed_ratio());
            let block_bytes = block_size * elem_size;
            let mut scratch = vec![0u8; algo.max_compressed_size(block_bytes)];
            for chunk in data.chunks(block_bytes) {
                let written = algo.compress(chunk, &mut scratch, 0)?;
                w.write_all(&scratch[..written])?;
            }
        }
    }
    Ok(())
}

/// Write a column with a block-position index. The index is emitted as
/// placeholder zeros, blocks follow, then a seek-back fills the index.
pub fn stream_compressed<W: Write + Seek>(
    w: &mut W,
    data: &[u8],
    n_elements: u64,
    elem_size: usize,
    comp: &CompositeCompressor,
    block_size: usize,
) -> Result<()> {
    debug_assert_eq!(data.len() as u64, n_elements * elem_size as u64);
    let header = VerticalHeader {
        n_elements: n_elements as u32,
        block_size: block_size as u16,
        algo: INDEXED_MARKER,
    };
    header.write_to(w)?;

    let blocks = nr_of_blocks(n_elements, block_size as u64) as usize;
    let index_pos = w.stream_position()?;
    let placeholder = vec![0u8; (blocks + 1) * 8];
    w.write_all(&placeholder)?;

    let block_bytes = block_size * elem_size;
    let mut scratch = vec![0u8; comp.max_compressed_size(block_bytes).max(block_bytes)];
    let mut entries = Vec::with_capacity(blocks + 1);
    let mut offset = 0u64;

    for (k, chunk) in data.chunks(block_bytes).enumerate() {
        let (algo, written) = comp.compress_block(k as u64, chunk, &mut scratch)?;
        entries.push(pack_entry(algo, offset));
        w.write_all(&scratch[..written])?;
        offset += written as u64;
    }
    entries.push(pack_entry(CompAlgo::None, offset));

    let end_pos = w.stream_position()?;
    w.seek(SeekFrom::Start(index_pos))?;
    for entry in &entries {
        w.write_u64::<LittleEndian>(*entry)?;
    }
    w.seek(SeekFrom::Start(end_pos))?;
    Ok(())
}

/// Decode the row slice `[start_row, start_row + length)` of a column
/// into `out` (`length * elem_size` bytes), reading only the blocks the
/// slice intersects.
pub fn read_column<R: Read + Seek>(
    r: &mut R,
    out: &mut [u8],
    block_pos: u64,
    start_row: u64,
    length: u64,
    total_rows: u64,
    elem_size: usize,
) -> Result<()> {
    debug_assert_eq!(out.len() as u64, length * elem_size as u64);
    if length == 0 {
        return Ok(());
    }

    r.seek(SeekFrom::Start(block_pos))?;
    let header = VerticalHeader::read_from(r)?;
    if header.n_elements as u64 != total_rows {
        return Err(err_format("column element count disagrees with table header"));
    }
    if header.block_size == 0 {
        return Err(err_format("column block size is zero"));
    }
    let block_size = header.block_size as u64;
    let blocks = nr_of_blocks(total_rows, block_size);
    if start_row + length > total_rows {
        return Err(err_format("row slice exceeds column length"));
    }

    let first_block = start_row / block_size;
    let last_block = (start_row + length - 1) / block_size;

    if header.algo == CompAlgo::None as u8 {
        // Raw layout: one contiguous byte range.
        let byte_start = block_pos + VERTICAL_HEADER_SIZE + start_row * elem_size as u64;
        r.seek(SeekFrom::Start(byte_start))?;
        r.read_exact(out)?;
        return Ok(());
    }

    if header.algo == INDEXED_MARKER {
        let mut index = Vec::with_capacity(blocks as usize + 1);
        for _ in 0..=blocks {
            index.push(r.read_u64::<LittleEndian>()?);
        }
        for pair in index.windows(2) {
            if entry_offset(pair[1]) < entry_offset(pair[0]) {
                return Err(err_format("block positions are not monotonically non-decreasing"));
            }
        }
        let blocks_base = block_pos + VERTICAL_HEADER_SIZE + (blocks + 1) * 8;

        let block_bytes = block_size as usize * elem_size;
        let mut raw = vec![0u8; block_bytes];
        let mut compressed = Vec::new();

        for k in first_block..=last_block {
            let algo = entry_algo(index[k as usize])?;
            let from = entry_offset(index[k as usize]);
            let to = entry_offset(index[k as usize + 1]);
            let elems = elems_in_block(k, total_rows, block_size);
            let raw_len = elems as usize * elem_size;

            r.seek(SeekFrom::Start(blocks_base + from))?;
            compressed.resize((to - from) as usize, 0);
            r.read_exact(&mut compressed)?;
            algo.decompress(&compressed, &mut raw[..raw_len])?;

            copy_intersection(out, &raw[..raw_len], k, block_size, start_row, length, elem_size);
        }
        return Ok(());
    }

    // Fixed-ratio layout: per-block compressed sizes follow from the
    // block's element count alone.
    let algo = CompAlgo::from_u8(header.algo)
        .ok_or_else(|| err_format("unknown algorithm id in column header"))?;
    if !algo.is_fixed_ratio() {
        return Err(err_format("column header names a non-fixed-ratio algorithm"));
    }
    let full_block_compressed = algo.fixed_compressed_size(block_size as usize * elem_size) as u64;

    let block_bytes = block_size as usize * elem_size;
    let mut raw = vec![0u8; block_bytes];
    let mut compressed = Vec::new();

    for k in first_block..=last_block {
        let elems = elems_in_block(k, total_rows, block_size);
        let raw_len = elems as usize * elem_size;
        let comp_len = algo.fixed_compressed_size(raw_len);

        r.seek(SeekFrom::Start(
            block_pos + VERTICAL_HEADER_SIZE + k * full_block_compressed,
        ))?;
        compressed.resize(comp_len, 0);
        r.read_exact(&mut compressed)?;
        algo.decompress(&compressed, &mut raw[..raw_len])?;

        copy_intersection(out, &raw[..raw_len], k, block_size, start_row, length, elem_size);
    }
    Ok(())
}

/// Copy the intersection of block `k` with the requested row slice from
/// the decoded block bytes into the output buffer.
fn copy_intersection(
    out: &mut [u8],
    raw: &[u8],
    block: u64,
    block_size: u64,
    start_row: u64,
    length: u64,
    elem_size: usize,
) {
    let block_first = block * block_size;
    let copy_first = start_row.max(block_first);
    let copy_last = (start_row + length).min(block_first + raw.len() as u64 / elem_size as u64);
    debug_assert!(copy_first < copy_last);

    let src_from = (copy_first - block_first) as usize * elem_size;
    let src_to = (copy_last - block_first) as usize * elem_size;
    let dst_from = (copy_first - start_row) as usize * elem_size;
    out[dst_from..dst_from + (src_to - src_from)].copy_from_slice(&raw[src_from..src_to]);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compress::SingleCompressor;
    use std::io::Cursor;

    fn int_bytes(values: &[i32]) -> Vec<u8> {
        let mut out = Vec::with_capacity(values.len() * 4);
        for v in values {
            out.extend_from_slice(&v.to_le_bytes());
        }
        out
    }

    fn ints_back(bytes: &[u8]) -> Vec<i32> {
        bytes
            .chunks_exact(4)
            .map(|c| i32::from_le_bytes(c.try_into().unwrap()))
            .collect()
    }

    fn roundtrip_slice(
        file: &[u8],
        start: u64,
        length: u64,
        total: u64,
    ) -> Vec<i32> {
        let mut out = vec![0u8; length as usize * 4];
        let mut cursor = Cursor::new(file);
        read_column(&mut cursor, &mut out, 0, start, length, total, 4).unwrap();
        ints_back(&out)
    }

    #[test]
    fn raw_stream_reads_any_slice() {
        let values: Vec<i32> = (0..1000).collect();
        let mut file = Cursor::new(Vec::new());
        stream_uncompressed(&mut file, &int_bytes(&values), 1000, 4, 64, None).unwrap();
        let file = file.into_inner();

        assert_eq!(roundtrip_slice(&file, 0, 1000, 1000), values);
        assert_eq!(roundtrip_slice(&file, 500, 10, 1000), (500..510).collect::<Vec<_>>());
        assert_eq!(roundtrip_slice(&file, 999, 1, 1000), vec![999]);
        assert_eq!(roundtrip_slice(&file, 0, 0, 1000), Vec::<i32>::new());
    }

    #[test]
    fn indexed_stream_roundtrips_all_boundaries() {
        let values: Vec<i32> = (0..1000).map(|i| i * 7).collect();
        let comp = CompositeCompressor::new(
            SingleCompressor::new(CompAlgo::None, 0),
            SingleCompressor::new(CompAlgo::Lz4Shuf4, 0),
            50,
        );
        let mut file = Cursor::new(Vec::new());
        stream_compressed(&mut file, &int_bytes(&values), 1000, 4, &comp, 64).unwrap();
        let file = file.into_inner();

        // full read
        assert_eq!(roundtrip_slice(&file, 0, 1000, 1000), values);
        // block-aligned
        assert_eq!(roundtrip_slice(&file, 64, 64, 1000), values[64..128].to_vec());
        // mid-block start and end
        assert_eq!(roundtrip_slice(&file, 70, 100, 1000), values[70..170].to_vec());
        // single element in the final, short block
        assert_eq!(roundtrip_slice(&file, 999, 1, 1000), vec![999 * 7]);
        // single full block
        assert_eq!(roundtrip_slice(&file, 128, 64, 1000), values[128..192].to_vec());
    }

    #[test]
    fn fixed_ratio_stream_roundtrips() {
        let values: Vec<i32> = (0..300)
            .map(|i| match i % 3 {
                0 => 0,
                1 => 1,
                _ => crate::compress::INT_NA,
            })
            .collect();
        let mut file = Cursor::new(Vec::new());
        stream_uncompressed(&mut file, &int_bytes(&values), 300, 4, 64, Some(CompAlgo::Logic64))
            .unwrap();
        let file = file.into_inner();

        assert_eq!(roundtrip_slice(&file, 0, 300, 300), values);
        assert_eq!(roundtrip_slice(&file, 65, 70, 300), values[65..135].to_vec());
        assert_eq!(roundtrip_slice(&file, 256, 44, 300), values[256..300].to_vec());
    }

    #[test]
    fn single_block_column() {
        let values: Vec<i32> = (0..10).collect();
        let comp = CompositeCompressor::single(SingleCompressor::new(CompAlgo::Lz4, 0));
        let mut file = Cursor::new(Vec::new());
        stream_compressed(&mut file, &int_bytes(&values), 10, 4, &comp, 64).unwrap();
        let file = file.into_inner();

        assert_eq!(roundtrip_slice(&file, 0, 10, 10), values);
        assert_eq!(roundtrip_slice(&file, 3, 4, 10), values[3..7].to_vec());
    }

    #[test]
    fn element_count_mismatch_is_bad_format() {
        let values: Vec<i32> = (0..100).collect();
        let mut file = Cursor::new(Vec::new());
        stream_uncompressed(&mut file, &int_bytes(&values), 100, 4, 64, None).unwrap();
        let file = file.into_inner();

        let mut out = vec![0u8; 4];
        let mut cursor = Cursor::new(file.as_slice());
        let err = read_column(&mut cursor, &mut out, 0, 0, 1, 99, 4).unwrap_err();
        assert!(matches!(err, crate::ColtabError::BadFormat(_)));
    }

    #[test]
    fn corrupt_block_index_is_bad_format() {
        let values: Vec<i32> = (0..1000).collect();
        let comp = CompositeCompressor::single(SingleCompressor::new(CompAlgo::Lz4, 0));
        let mut file = Cursor::new(Vec::new());
        stream_compressed(&mut file, &int_bytes(&values), 1000, 4, &comp, 64).unwrap();
        let mut file = file.into_inner();

        // swap two index entries so offsets decrease
        let hdr = VERTICAL_HEADER_SIZE as usize;
        let mut a = [0u8; 8];
        let mut b = [0u8; 8];
        a.copy_from_slice(&file[hdr + 8..hdr + 16]);
        b.copy_from_slice(&file[hdr + 16..hdr + 24]);
        file[hdr + 8..hdr + 16].copy_from_slice(&b);
        file[hdr + 16..hdr + 24].copy_from_slice(&a);

        let mut out = vec![0u8; 1000 * 4];
        let mut cursor = Cursor::new(file.as_slice());
        let err = read_column(&mut cursor, &mut out, 0, 0, 1000, 1000, 4).unwrap_err();
        assert!(matches!(err, crate::ColtabError::BadFormat(_)));
    }
}
