//! Table and column types.
//!
//! A column is a tagged variant over the five supported element types.
//! Missing values are explicit `Option`s at this boundary; the codec
//! stores them as the original sentinel bit patterns (see `codec`), so
//! files interoperate with other readers of the same format.

use crate::{err_arg, Result};

// Column type codes as stored in the v1 header
const TYPE_CHARACTER: u16 = 6;
const TYPE_FACTOR: u16 = 7;
const TYPE_INTEGER: u16 = 8;
const TYPE_DOUBLE: u16 = 9;
const TYPE_LOGICAL: u16 = 10;

/// Column data type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum ColumnType {
    Character = TYPE_CHARACTER,
    Factor = TYPE_FACTOR,
    Integer = TYPE_INTEGER,
    Double = TYPE_DOUBLE,
    Logical = TYPE_LOGICAL,
}

impl ColumnType {
    pub fn from_code(v: u16) -> Option<Self> {
        match v {
            TYPE_CHARACTER => Some(ColumnType::Character),
            TYPE_FACTOR => Some(ColumnType::Factor),
            TYPE_INTEGER => Some(ColumnType::Integer),
            TYPE_DOUBLE => Some(ColumnType::Double),
            TYPE_LOGICAL => Some(ColumnType::Logical),
            _ => None,
        }
    }

    pub fn code(self) -> u16 {
        self as u16
    }
}

/// A single typed column.
///
/// `Integer` and `Logical` reserve `i32::MIN` as the on-disk missing
/// sentinel, so `Some(i32::MIN)` cannot round-trip. `Double` carries the
/// sentinel inline: a missing value is the NaN with bit pattern
/// [`codec::DOUBLE_NA_BITS`](crate::codec::DOUBLE_NA_BITS); every other
/// value, including other NaNs, round-trips bit-exactly.
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    Character(Vec<Option<String>>),
    Integer(Vec<Option<i32>>),
    Double(Vec<f64>),
    Logical(Vec<Option<bool>>),
    Factor {
        levels: Vec<String>,
        /// 1-based level codes; `None` marks a missing value.
        codes: Vec<Option<i32>>,
    },
}

impl Column {
    pub fn column_type(&self) -> ColumnType {
        match self {
            Column::Character(_) => ColumnType::Character,
            Column::Integer(_) => ColumnType::Integer,
            Column::Double(_) => ColumnType::Double,
            Column::Logical(_) => ColumnType::Logical,
            Column::Factor { .. } => ColumnType::Factor,
        }
    }

    /// Number of logical elements (rows).
    pub fn len(&self) -> usize {
        match self {
            Column::Character(v) => v.len(),
            Column::Integer(v) => v.len(),
            Column::Double(v) => v.len(),
            Column::Logical(v) => v.len(),
            Column::Factor { codes, .. } => codes.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The missing-value sentinel for double columns.
    pub fn double_na() -> f64 {
        f64::from_bits(crate::codec::DOUBLE_NA_BITS)
    }

    /// True if the double value is the missing-value sentinel NaN.
    pub fn double_is_na(v: f64) -> bool {
        v.to_bits() == crate::codec::DOUBLE_NA_BITS
    }

    /// Count of missing values in the column.
    pub fn missing_count(&self) -> usize {
        match self {
            Column::Character(v) => v.iter().filter(|x| x.is_none()).count(),
            Column::Integer(v) => v.iter().filter(|x| x.is_none()).count(),
            Column::Double(v) => v.iter().filter(|x| Self::double_is_na(**x)).count(),
            Column::Logical(v) => v.iter().filter(|x| x.is_none()).count(),
            Column::Factor { codes, .. } => codes.iter().filter(|x| x.is_none()).count(),
        }
    }
}

/// A named, typed sequence of columns of equal length, plus an optional
/// ordered list of key column names. Keys are metadata only: no sort
/// order is enforced or verified.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    pub columns: Vec<(String, Column)>,
    pub keys: Vec<String>,
}

impl Table {
    pub fn new(columns: Vec<(String, Column)>) -> Self {
        Table { columns, keys: Vec::new() }
    }

    pub fn with_keys(columns: Vec<(String, Column)>, keys: Vec<String>) -> Self {
        Table { columns, keys }
    }

    pub fn nr_of_cols(&self) -> usize {
        self.columns.len()
    }

    pub fn nr_of_rows(&self) -> usize {
        self.columns.first().map(|(_, c)| c.len()).unwrap_or(0)
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|(n, _)| n == name).map(|(_, c)| c)
    }

    /// Resolve key names to column indices, in key order.
    pub(crate) fn key_indices(&self) -> Result<Vec<i32>> {
        let mut indices = Vec::with_capacity(self.keys.len());
        for key in &self.keys {
            let idx = self
                .columns
                .iter()
                .position(|(n, _)| n == key)
                .ok_or_else(|| err_arg(format!("key '{}' is not a column", key)))?;
            if indices.contains(&(idx as i32)) {
                return Err(err_arg(format!("duplicate key column '{}'", key)));
            }
            indices.push(idx as i32);
        }
        Ok(indices)
    }

    /// Validate shape invariants before a write.
    pub(crate) fn validate(&self) -> Result<()> {
        if self.columns.is_empty() {
            return Err(err_arg("table needs at least one column"));
        }
        let rows = self.nr_of_rows();
        if rows == 0 {
            return Err(err_arg("table contains no rows"));
        }
        if rows > i32::MAX as usize {
            return Err(err_arg("table exceeds the maximum row count"));
        }
        for (name, col) in &self.columns {
            if col.len() != rows {
                return Err(err_arg(format!(
                    "column '{}' has {} rows, expected {}",
                    name,
                    col.len(),
                    rows
                )));
            }
        }
        for (i, (name, _)) in self.columns.iter().enumerate() {
            if self.columns[..i].iter().any(|(n, _)| n == name) {
                return Err(err_arg(format!("duplicate column name '{}'", name)));
            }
        }
        self.key_indices()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_codes_roundtrip() {
        for t in [
            ColumnType::Character,
            ColumnType::Factor,
            ColumnType::Integer,
            ColumnType::Double,
            ColumnType::Logical,
        ] {
            assert_eq!(ColumnType::from_code(t.code()), Some(t));
        }
        assert_eq!(ColumnType::from_code(0), None);
        assert_eq!(ColumnType::from_code(11), None);
    }

    #[test]
    fn validate_rejects_ragged_columns() {
        let table = Table::new(vec![
            ("a".into(), Column::Integer(vec![Some(1), Some(2)])),
            ("b".into(), Column::Integer(vec![Some(1)])),
        ]);
        assert!(table.validate().is_err());
    }

    #[test]
    fn validate_rejects_duplicate_names() {
        let table = Table::new(vec![
            ("a".into(), Column::Integer(vec![Some(1)])),
            ("a".into(), Column::Integer(vec![Some(2)])),
        ]);
        assert!(table.validate().is_err());
    }

    #[test]
    fn validate_rejects_unknown_key() {
        let table = Table::with_keys(
            vec![("a".into(), Column::Integer(vec![Some(1)]))],
            vec!["b".into()],
        );
        assert!(table.validate().is_err());
    }

    #[test]
    fn key_indices_in_declaration_order() {
        let table = Table::with_keys(
            vec![
                ("x".into(), Column::Integer(vec![Some(1)])),
                ("y".into(), Column::Integer(vec![Some(2)])),
            ],
            vec!["y".into(), "x".into()],
        );
        assert_eq!(table.key_indices().unwrap(), vec![1, 0]);
    }
}
