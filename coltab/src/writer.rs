//! Table writer.
//!
//! Emits the table header with a placeholder chunk position, the column
//! names, a zeroed column-position index, then every column payload in
//! declaration order; a final seek-back pass rewrites the header and the
//! filled index. On failure the file is left in an unspecified state and
//! the caller should discard it.

use std::fs::File;
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::Path;

use byteorder::{LittleEndian, WriteBytesExt};

use crate::codec::{self, character, double, factor, integer, logical};
use crate::format::TableHeader;
use crate::table::{Column, Table};
use crate::{err_arg, Result};

/// Summary of a completed write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteInfo {
    /// Size of the fixed header region in bytes.
    pub meta_size: u64,
    pub rows: u64,
    pub file_size: u64,
}

/// Write `table` to `path` at the given compression level (0-100).
pub fn write_table<P: AsRef<Path>>(path: P, table: &Table, compression: u32) -> Result<WriteInfo> {
    let path = path.as_ref();
    if compression > 100 {
        return Err(err_arg("compression should be a value between 0 and 100"));
    }
    table.validate()?;
    for (name, col) in &table.columns {
        if let Column::Factor { levels, codes } = col {
            let max_code = levels.len() as i32;
            if codes
                .iter()
                .flatten()
                .any(|&c| c < 1 || c > max_code)
            {
                return Err(err_arg(format!("factor column '{}' has out-of-range codes", name)));
            }
        }
    }

    let nr_of_rows = table.nr_of_rows() as u64;
    let col_types: Vec<u16> = table.columns.iter().map(|(_, c)| c.column_type().code()).collect();
    let mut header = TableHeader::new(col_types, table.key_indices()?, nr_of_rows);

    let file = File::create(path)?;
    let mut w = BufWriter::new(file);

    // header with a placeholder chunk position, then column names
    header.write_to(&mut w)?;
    let names: Vec<String> = table.columns.iter().map(|(n, _)| n.clone()).collect();
    character::write_names(&mut w, &names)?;

    // zeroed column-position index, backfilled below
    let col_index_pos = w.stream_position()?;
    w.write_all(&vec![0u8; table.nr_of_cols() * 8])?;

    let mut positions = Vec::with_capacity(table.nr_of_cols());
    for (_, col) in &table.columns {
        positions.push(w.stream_position()?);
        write_column(&mut w, col, compression)?;
    }
    let file_size = w.stream_position()?;

    header.chunk_pos[0] = col_index_pos;
    w.seek(SeekFrom::Start(0))?;
    header.write_to(&mut w)?;

    w.seek(SeekFrom::Start(col_index_pos))?;
    for pos in &positions {
        w.write_u64::<LittleEndian>(*pos)?;
    }
    w.flush()?;

    log::debug!(
        "wrote {}: {} rows, {} cols, compression {}",
        path.display(),
        nr_of_rows,
        table.nr_of_cols(),
        compression
    );
    Ok(WriteInfo { meta_size: header.meta_size(), rows: nr_of_rows, file_size })
}

fn write_column<W: Write + Seek>(w: &mut W, col: &Column, compression: u32) -> Result<()> {
    match col {
        Column::Character(values) => {
            let refs: Vec<Option<&str>> = values.iter().map(|s| s.as_deref()).collect();
            character::write_text(w, &refs, compression)
        }
        Column::Integer(values) => {
            integer::write_integers(w, &codec::encode_opt_ints(values), compression)
        }
        Column::Double(values) => double::write_doubles(w, values, compression),
        Column::Logical(values) => {
            logical::write_logicals(w, &codec::encode_opt_bools(values), compression)
        }
        Column::Factor { levels, codes } => {
            factor::write_factor(w, levels, &codec::encode_opt_ints(codes), compression)
        }
    }
}
