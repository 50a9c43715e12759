//! On-disk format constants and the table header.
//!
//! The header is a fixed-position struct serialized through a byte-order
//! aware writer; offsets match the layout documented in the crate root.

use std::io::{Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::table::ColumnType;
use crate::{err_format, ColtabError, Result};

/// Current format version.
pub const FORMAT_VERSION: u32 = 1;

/// Identifies a v1 file; absent in legacy v0 files.
pub const FILE_ID: u64 = 0xa91c12f8b245a71d;

/// Reserved chunk slots in the header.
pub const CHUNK_SLOTS: usize = 8;

/// Bytes per compression block for fixed-width types.
pub const BLOCK_BYTES: usize = 16384;

/// Elements per block: 32-bit types.
pub const BLOCK_ELEMS_4: usize = BLOCK_BYTES / 4;

/// Elements per block: 64-bit types.
pub const BLOCK_ELEMS_8: usize = BLOCK_BYTES / 8;

/// Logicals per compression block.
pub const BLOCK_ELEMS_LOGICAL: usize = 4096;

/// Strings per text block.
pub const TEXT_BLOCK_STRINGS: usize = 2047;

/// Initial character buffer size for a text block; blocks with longer
/// strings grow past this.
pub const TEXT_BLOCK_CHARS: usize = 32768;

/// Fixed 24-byte header prefix, read first to dispatch legacy files.
#[derive(Debug, Clone, Copy)]
pub struct HeaderPrefix {
    pub nr_of_cols: i32,
    pub key_length: i32,
    pub version: u32,
    pub chunks_per_index_row: u32,
    pub file_id: u64,
}

impl HeaderPrefix {
    pub fn read_from<R: Read>(r: &mut R) -> Result<Self> {
        Ok(HeaderPrefix {
            nr_of_cols: r.read_i32::<LittleEndian>()?,
            key_length: r.read_i32::<LittleEndian>()?,
            version: r.read_u32::<LittleEndian>()?,
            chunks_per_index_row: r.read_u32::<LittleEndian>()?,
            file_id: r.read_u64::<LittleEndian>()?,
        })
    }

    pub fn is_current_format(&self) -> bool {
        self.file_id == FILE_ID
    }
}

/// Complete v1 table header.
#[derive(Debug, Clone)]
pub struct TableHeader {
    pub nr_of_cols: i32,
    pub key_length: i32,
    pub version: u32,
    pub chunks_per_index_row: u32,
    pub file_id: u64,
    /// Slot 0 holds the column-position index offset once known.
    pub chunk_pos: [u64; CHUNK_SLOTS],
    /// Slot 0 holds the row count.
    pub chunk_rows: [u64; CHUNK_SLOTS],
    pub nr_of_chunks: u32,
    pub key_col_pos: Vec<i32>,
    pub col_types: Vec<u16>,
}

impl TableHeader {
    pub fn new(col_types: Vec<u16>, key_col_pos: Vec<i32>, nr_of_rows: u64) -> Self {
        let mut chunk_rows = [0u64; CHUNK_SLOTS];
        chunk_rows[0] = nr_of_rows;
        TableHeader {
            nr_of_cols: col_types.len() as i32,
            key_length: key_col_pos.len() as i32,
            version: FORMAT_VERSION,
            chunks_per_index_row: 1,
            file_id: FILE_ID,
            chunk_pos: [0u64; CHUNK_SLOTS],
            chunk_rows,
            nr_of_chunks: 1,
            key_col_pos,
            col_types,
        }
    }

    /// Header size in bytes: 156 + 4 * keyLength + 2 * nrOfCols.
    pub fn meta_size(&self) -> u64 {
        156 + 4 * self.key_length as u64 + 2 * self.nr_of_cols as u64
    }

    pub fn nr_of_rows(&self) -> u64 {
        self.chunk_rows[0]
    }

    pub fn write_to<W: Write>(&self, w: &mut W) -> Result<()> {
        w.write_i32::<LittleEndian>(self.nr_of_cols)?;
        w.write_i32::<LittleEndian>(self.key_length)?;
        w.write_u32::<LittleEndian>(self.version)?;
        w.write_u32::<LittleEndian>(self.chunks_per_index_row)?;
        w.write_u64::<LittleEndian>(self.file_id)?;
        for pos in &self.chunk_pos {
            w.write_u64::<LittleEndian>(*pos)?;
        }
        for rows in &self.chunk_rows {
            w.write_u64::<LittleEndian>(*rows)?;
        }
        w.write_u32::<LittleEndian>(self.nr_of_chunks)?;
        for key in &self.key_col_pos {
            w.write_i32::<LittleEndian>(*key)?;
        }
        for t in &self.col_types {
            w.write_u16::<LittleEndian>(*t)?;
        }
        Ok(())
    }

    /// Read the remainder of the header after a validated prefix.
    pub fn read_remainder<R: Read>(r: &mut R, prefix: HeaderPrefix) -> Result<Self> {
        if prefix.version > FORMAT_VERSION {
            return Err(err_format(format!(
                "file was created by a newer format version ({})",
                prefix.version
            )));
        }
        if prefix.nr_of_cols < 1 {
            return Err(err_format("column count must be at least 1"));
        }
        if prefix.key_length < 0 || prefix.key_length > prefix.nr_of_cols {
            return Err(err_format("key length out of range"));
        }

        let mut chunk_pos = [0u64; CHUNK_SLOTS];
        for pos in chunk_pos.iter_mut() {
            *pos = r.read_u64::<LittleEndian>()?;
        }
        let mut chunk_rows = [0u64; CHUNK_SLOTS];
        for rows in chunk_rows.iter_mut() {
            *rows = r.read_u64::<LittleEndian>()?;
        }
        let nr_of_chunks = r.read_u32::<LittleEndian>()?;

        let mut key_col_pos = Vec::with_capacity(prefix.key_length as usize);
        for _ in 0..prefix.key_length {
            let key = r.read_i32::<LittleEndian>()?;
            if key < 0 || key >= prefix.nr_of_cols {
                return Err(err_format("key column index out of range"));
            }
            key_col_pos.push(key);
        }

        let mut col_types = Vec::with_capacity(prefix.nr_of_cols as usize);
        for _ in 0..prefix.nr_of_cols {
            let code = r.read_u16::<LittleEndian>()?;
            if ColumnType::from_code(code).is_none() {
                return Err(err_format(format!("unknown column type code {}", code)));
            }
            col_types.push(code);
        }

        if chunk_rows[0] < 1 {
            return Err(err_format("row count must be at least 1"));
        }

        Ok(TableHeader {
            nr_of_cols: prefix.nr_of_cols,
            key_length: prefix.key_length,
            version: prefix.version,
            chunks_per_index_row: prefix.chunks_per_index_row,
            file_id: prefix.file_id,
            chunk_pos,
            chunk_rows,
            nr_of_chunks,
            key_col_pos,
            col_types,
        })
    }
}

/// Schema-only view of a stored table, returned by [`read_meta`](crate::read_meta).
#[derive(Debug, Clone, PartialEq)]
pub struct TableMeta {
    pub version: u32,
    pub nr_of_rows: u64,
    pub nr_of_cols: usize,
    pub nr_of_chunks: u32,
    pub col_names: Vec<String>,
    pub col_types: Vec<ColumnType>,
    pub key_col_indexes: Vec<i32>,
    pub key_names: Vec<String>,
}

/// Column-position entries must be strictly monotonically increasing.
pub fn validate_column_positions(positions: &[u64]) -> Result<()> {
    for pair in positions.windows(2) {
        if pair[1] <= pair[0] {
            return Err(err_format("column positions are not monotonically increasing"));
        }
    }
    Ok(())
}

/// Map raw type codes to `ColumnType`, rejecting unknown codes.
pub fn decode_col_types(codes: &[u16]) -> Result<Vec<ColumnType>> {
    codes
        .iter()
        .map(|&c| {
            ColumnType::from_code(c)
                .ok_or_else(|| -> ColtabError { err_format(format!("unknown column type code {}", c)) })
        })
        .collect()
}
