//! Reader for the legacy v0 layout, which predates the file-ID marker.
//!
//! The v0 header packs everything into 16-bit fields: column count, key
//! length (low 15 bits), key indices, type codes 1-5, then a block
//! position array whose first entry is the row count. Payloads follow
//! the same block-streamer contract as the current format. Only reading
//! is supported, and every read logs a deprecation warning.

use std::io::{Read, Seek};

use byteorder::{LittleEndian, ReadBytesExt};

use crate::codec::{self, character, double, factor, integer, logical};
use crate::format::TableMeta;
use crate::reader::{resolve_row_range, resolve_selection, ReadResult};
use crate::table::{Column, ColumnType, Table};
use crate::{err_format, Result};

const DEPRECATION_WARNING: &str =
    "this file was created with a beta version of the format; please re-write it, \
     support will be removed in a future release";

// Legacy type codes
const V0_CHARACTER: u16 = 1;
const V0_INTEGER: u16 = 2;
const V0_DOUBLE: u16 = 3;
const V0_LOGICAL: u16 = 4;
const V0_FACTOR: u16 = 5;

fn legacy_col_type(code: u16) -> Result<ColumnType> {
    match code {
        V0_CHARACTER => Ok(ColumnType::Character),
        V0_INTEGER => Ok(ColumnType::Integer),
        V0_DOUBLE => Ok(ColumnType::Double),
        V0_LOGICAL => Ok(ColumnType::Logical),
        V0_FACTOR => Ok(ColumnType::Factor),
        _ => Err(err_format("unrecognised file, are you sure this is a table file?")),
    }
}

struct V0Header {
    nr_of_cols: usize,
    key_columns: Vec<i32>,
    col_types: Vec<ColumnType>,
    /// `[0]` is the row count, `[1..]` are column payload offsets.
    block_pos: Vec<u64>,
}

impl V0Header {
    fn nr_of_rows(&self) -> u64 {
        self.block_pos[0]
    }

    fn names_offset(&self) -> u64 {
        let c = self.nr_of_cols as u64;
        let k = self.key_columns.len() as u64;
        (c + 1) * 8 + (c + k + 2) * 2
    }

    fn read_from<R: Read>(r: &mut R) -> Result<Self> {
        let nr_of_cols = r.read_i16::<LittleEndian>()?;
        let key_field = r.read_i16::<LittleEndian>()?;
        if nr_of_cols < 0 || key_field < 0 {
            return Err(err_format("unrecognised file, are you sure this is a table file?"));
        }
        let nr_of_cols = nr_of_cols as usize;
        let key_length = (key_field & 0x7FFF) as usize;

        let mut key_columns = Vec::with_capacity(key_length);
        for _ in 0..key_length {
            let key = r.read_i16::<LittleEndian>()?;
            if key < 0 || key as usize >= nr_of_cols {
                return Err(err_format("key column index out of range"));
            }
            key_columns.push(key as i32);
        }

        let mut col_types = Vec::with_capacity(nr_of_cols);
        for _ in 0..nr_of_cols {
            let code = r.read_u16::<LittleEndian>()?;
            col_types.push(legacy_col_type(code)?);
        }

        let mut block_pos = Vec::with_capacity(nr_of_cols + 1);
        for _ in 0..=nr_of_cols {
            block_pos.push(r.read_u64::<LittleEndian>()?);
        }
        // entries after the row count are column starts and may not decrease
        for pair in block_pos[1..].windows(2) {
            if pair[1] < pair[0] {
                return Err(err_format("block positions are not monotonically increasing"));
            }
        }
        if block_pos[0] < 1 {
            return Err(err_format("row count must be at least 1"));
        }
        if nr_of_cols == 0 {
            return Err(err_format("column count must be at least 1"));
        }

        Ok(V0Header { nr_of_cols, key_columns, col_types, block_pos })
    }
}

pub(crate) fn read_meta_v0<R: Read + Seek>(r: &mut R) -> Result<TableMeta> {
    let header = V0Header::read_from(r)?;
    let col_names = character::read_names(r, header.names_offset(), header.nr_of_cols as u64)?;
    let key_names = header
        .key_columns
        .iter()
        .map(|&k| col_names[k as usize].clone())
        .collect();

    log::warn!("{}", DEPRECATION_WARNING);
    Ok(TableMeta {
        version: 0,
        nr_of_rows: header.nr_of_rows(),
        nr_of_cols: header.nr_of_cols,
        nr_of_chunks: 1,
        col_types: header.col_types.clone(),
        key_col_indexes: header.key_columns.clone(),
        key_names,
        col_names,
    })
}

pub(crate) fn read_v0<R: Read + Seek>(
    r: &mut R,
    column_selection: Option<&[&str]>,
    from_row: u64,
    to_row: Option<u64>,
) -> Result<ReadResult> {
    let header = V0Header::read_from(r)?;
    let col_names = character::read_names(r, header.names_offset(), header.nr_of_cols as u64)?;

    let col_indexes = resolve_selection(&col_names, column_selection)?;
    let (first_row, length) = resolve_row_range(header.nr_of_rows(), from_row, to_row)?;

    let mut columns = Vec::with_capacity(col_indexes.len());
    for &col in &col_indexes {
        let block_pos = header.block_pos[col + 1];
        let decoded = match header.col_types[col] {
            ColumnType::Character => {
                Column::Character(character::read_text(r, block_pos, first_row, length, header.nr_of_rows())?)
            }
            ColumnType::Integer => Column::Integer(codec::decode_opt_ints(integer::read_integers(
                r,
                block_pos,
                first_row,
                length,
                header.nr_of_rows(),
            )?)),
            ColumnType::Double => Column::Double(double::read_doubles(
                r,
                block_pos,
                first_row,
                length,
                header.nr_of_rows(),
            )?),
            ColumnType::Logical => Column::Logical(codec::decode_opt_bools(logical::read_logicals(
                r,
                block_pos,
                first_row,
                length,
                header.nr_of_rows(),
            )?)),
            ColumnType::Factor => {
                let (levels, codes) =
                    factor::read_factor(r, block_pos, first_row, length, header.nr_of_rows())?;
                Column::Factor { levels, codes: codec::decode_opt_ints(codes) }
            }
        };
        columns.push((col_names[col].clone(), decoded));
    }

    let surviving_keys: Vec<String> = header
        .key_columns
        .iter()
        .filter(|&&k| col_indexes.contains(&(k as usize)))
        .map(|&k| col_names[k as usize].clone())
        .collect();
    let keys_found = surviving_keys.len();

    log::warn!("{}", DEPRECATION_WARNING);
    Ok(ReadResult {
        table: Table { columns, keys: surviving_keys.clone() },
        key_names: surviving_keys,
        keys_found,
    })
}

/// Test-only v0 writer, used to produce legacy fixture files.
#[cfg(test)]
pub(crate) mod fixture {
    use std::io::{Seek, SeekFrom, Write};

    use byteorder::{LittleEndian, WriteBytesExt};

    use super::*;

    fn legacy_code(t: ColumnType) -> u16 {
        match t {
            ColumnType::Character => V0_CHARACTER,
            ColumnType::Integer => V0_INTEGER,
            ColumnType::Double => V0_DOUBLE,
            ColumnType::Logical => V0_LOGICAL,
            ColumnType::Factor => V0_FACTOR,
        }
    }

    pub(crate) fn write_v0<W: Write + Seek>(w: &mut W, table: &Table, level: u32) -> Result<()> {
        table.validate()?;
        let keys = table.key_indices()?;
        let nr_of_cols = table.nr_of_cols();

        w.write_i16::<LittleEndian>(nr_of_cols as i16)?;
        w.write_i16::<LittleEndian>(keys.len() as i16)?;
        for key in &keys {
            w.write_i16::<LittleEndian>(*key as i16)?;
        }
        for (_, col) in &table.columns {
            w.write_u16::<LittleEndian>(legacy_code(col.column_type()))?;
        }

        let block_pos_offset = w.stream_position()?;
        w.write_all(&vec![0u8; (nr_of_cols + 1) * 8])?;

        let names: Vec<String> = table.columns.iter().map(|(n, _)| n.clone()).collect();
        character::write_names(w, &names)?;

        let mut block_pos = vec![table.nr_of_rows() as u64];
        for (_, col) in &table.columns {
            block_pos.push(w.stream_position()?);
            match col {
                Column::Character(values) => {
                    let refs: Vec<Option<&str>> = values.iter().map(|s| s.as_deref()).collect();
                    character::write_text(w, &refs, level)?;
                }
                Column::Integer(values) => {
                    integer::write_integers(w, &codec::encode_opt_ints(values), level)?;
                }
                Column::Double(values) => double::write_doubles(w, values, level)?,
                Column::Logical(values) => {
                    logical::write_logicals(w, &codec::encode_opt_bools(values), level)?;
                }
                Column::Factor { levels, codes } => {
                    factor::write_factor(w, levels, &codec::encode_opt_ints(codes), level)?;
                }
            }
        }

        let end_pos = w.stream_position()?;
        w.seek(SeekFrom::Start(block_pos_offset))?;
        for pos in &block_pos {
            w.write_u64::<LittleEndian>(*pos)?;
        }
        w.seek(SeekFrom::Start(end_pos))?;
        Ok(())
    }
}
