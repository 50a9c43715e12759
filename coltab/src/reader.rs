//! Table reader: schema-only metadata and projected row-range reads.
//!
//! Reads never touch unselected columns: the header region and the
//! column-position index locate a column's payload, and the per-column
//! block index narrows I/O to the blocks the row range intersects.

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt};

use crate::codec::{self, character, double, factor, integer, logical};
use crate::format::{self, HeaderPrefix, TableHeader, TableMeta};
use crate::legacy;
use crate::table::{Column, ColumnType, Table};
use crate::{err_arg, ColtabError, Result};

/// Result of a projected read.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadResult {
    pub table: Table,
    /// Key columns surviving the projection, in key order.
    pub key_names: Vec<String>,
    pub keys_found: usize,
}

/// Read schema information only.
pub fn read_meta<P: AsRef<Path>>(path: P) -> Result<TableMeta> {
    let file = File::open(path.as_ref())?;
    let mut r = BufReader::new(file);

    let prefix = HeaderPrefix::read_from(&mut r)?;
    if !prefix.is_current_format() {
        r.seek(SeekFrom::Start(0))?;
        return legacy::read_meta_v0(&mut r);
    }

    let header = TableHeader::read_remainder(&mut r, prefix)?;
    let col_names = character::read_names(&mut r, header.meta_size(), header.nr_of_cols as u64)?;
    let key_names = header
        .key_col_pos
        .iter()
        .map(|&k| col_names[k as usize].clone())
        .collect();

    Ok(TableMeta {
        version: header.version,
        nr_of_rows: header.nr_of_rows(),
        nr_of_cols: header.nr_of_cols as usize,
        nr_of_chunks: header.nr_of_chunks,
        col_types: format::decode_col_types(&header.col_types)?,
        key_col_indexes: header.key_col_pos.clone(),
        key_names,
        col_names,
    })
}

/// Read a column subset over a row range. `from_row` is 1-based;
/// `to_row` is 1-based inclusive, or `None` for the end of the table.
pub fn read_table<P: AsRef<Path>>(
    path: P,
    column_selection: Option<&[&str]>,
    from_row: u64,
    to_row: Option<u64>,
) -> Result<ReadResult> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let mut r = BufReader::new(file);

    let prefix = HeaderPrefix::read_from(&mut r)?;
    if !prefix.is_current_format() {
        r.seek(SeekFrom::Start(0))?;
        return legacy::read_v0(&mut r, column_selection, from_row, to_row);
    }

    let header = TableHeader::read_remainder(&mut r, prefix)?;
    if header.nr_of_chunks > 1 {
        return Err(ColtabError::NotImplemented("multi-chunk read"));
    }

    let col_names = character::read_names(&mut r, header.meta_size(), header.nr_of_cols as u64)?;

    // the column-position index sits right after the names block
    let mut positions = Vec::with_capacity(header.nr_of_cols as usize);
    for _ in 0..header.nr_of_cols {
        positions.push(r.read_u64::<LittleEndian>()?);
    }
    format::validate_column_positions(&positions)?;

    let col_indexes = resolve_selection(&col_names, column_selection)?;
    let (first_row, length) = resolve_row_range(header.nr_of_rows(), from_row, to_row)?;

    let col_types = format::decode_col_types(&header.col_types)?;
    let mut columns = Vec::with_capacity(col_indexes.len());
    for &col in &col_indexes {
        let decoded = read_column(
            &mut r,
            col_types[col],
            positions[col],
            first_row,
            length,
            header.nr_of_rows(),
        )?;
        columns.push((col_names[col].clone(), decoded));
    }

    let surviving_keys: Vec<String> = header
        .key_col_pos
        .iter()
        .filter(|&&k| col_indexes.contains(&(k as usize)))
        .map(|&k| col_names[k as usize].clone())
        .collect();
    let keys_found = surviving_keys.len();

    log::debug!(
        "read {}: {} cols, rows {}..{}",
        path.display(),
        col_indexes.len(),
        first_row + 1,
        first_row + length
    );
    Ok(ReadResult {
        table: Table { columns, keys: surviving_keys.clone() },
        key_names: surviving_keys,
        keys_found,
    })
}

/// Resolve a name selection to column indices via a linear scan; an
/// unknown name is fatal. No selection means every column.
pub(crate) fn resolve_selection(
    col_names: &[String],
    selection: Option<&[&str]>,
) -> Result<Vec<usize>> {
    match selection {
        None => Ok((0..col_names.len()).collect()),
        Some(requested) => requested
            .iter()
            .map(|&name| {
                col_names
                    .iter()
                    .position(|n| n == name)
                    .ok_or_else(|| err_arg(format!("selected column '{}' not found", name)))
            })
            .collect(),
    }
}

/// Validate the 1-based row range and return `(first_row, length)` in
/// 0-based form, with the length clamped to the table end.
pub(crate) fn resolve_row_range(
    nr_of_rows: u64,
    from_row: u64,
    to_row: Option<u64>,
) -> Result<(u64, u64)> {
    if from_row < 1 {
        return Err(err_arg("fromRow should have a positive value"));
    }
    let first_row = from_row - 1;
    if first_row >= nr_of_rows {
        return Err(err_arg("row selection is out of range"));
    }
    let mut length = nr_of_rows - first_row;
    if let Some(to_row) = to_row {
        if to_row < from_row {
            return Err(err_arg("toRow should be equal to or larger than fromRow"));
        }
        length = length.min(to_row - first_row);
    }
    Ok((first_row, length))
}

fn read_column<R: Read + Seek>(
    r: &mut R,
    col_type: ColumnType,
    block_pos: u64,
    first_row: u64,
    length: u64,
    total_rows: u64,
) -> Result<Column> {
    match col_type {
        ColumnType::Character => {
            let values = character::read_text(r, block_pos, first_row, length, total_rows)?;
            Ok(Column::Character(values))
        }
        ColumnType::Integer => {
            let values = integer::read_integers(r, block_pos, first_row, length, total_rows)?;
            Ok(Column::Integer(codec::decode_opt_ints(values)))
        }
        ColumnType::Double => {
            let values = double::read_doubles(r, block_pos, first_row, length, total_rows)?;
            Ok(Column::Double(values))
        }
        ColumnType::Logical => {
            let values = logical::read_logicals(r, block_pos, first_row, length, total_rows)?;
            Ok(Column::Logical(codec::decode_opt_bools(values)))
        }
        ColumnType::Factor => {
            let (levels, codes) = factor::read_factor(r, block_pos, first_row, length, total_rows)?;
            Ok(Column::Factor { levels, codes: codec::decode_opt_ints(codes) })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selection_resolves_in_request_order() {
        let names = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        assert_eq!(resolve_selection(&names, None).unwrap(), vec![0, 1, 2]);
        assert_eq!(
            resolve_selection(&names, Some(&["c", "a"])).unwrap(),
            vec![2, 0]
        );
        assert!(resolve_selection(&names, Some(&["missing"])).is_err());
    }

    #[test]
    fn row_range_validation() {
        assert_eq!(resolve_row_range(100, 1, None).unwrap(), (0, 100));
        assert_eq!(resolve_row_range(100, 10, Some(19)).unwrap(), (9, 10));
        assert_eq!(resolve_row_range(100, 10, Some(10)).unwrap(), (9, 1));
        // toRow past the end clamps
        assert_eq!(resolve_row_range(100, 91, Some(500)).unwrap(), (90, 10));
        assert!(resolve_row_range(100, 0, None).is_err());
        assert!(resolve_row_range(100, 101, None).is_err());
        assert!(resolve_row_range(100, 10, Some(9)).is_err());
    }
}
