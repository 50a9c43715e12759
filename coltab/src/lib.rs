//! Coltab Columnar Table Codec
//!
//! A single-file, seekable binary format for rectangular tables: named,
//! typed columns of equal length with an optional ordered key. Optimized
//! for bulk writes of a full table and random reads of a column subset
//! over a row range, without touching unselected columns.
//!
//! File Format (v1, little-endian):
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │ Table Header (156 + 4*K + 2*C bytes)                        │
//! │   - Column count: i32                                       │
//! │   - Key length: i32                                         │
//! │   - Version: u32                                            │
//! │   - Chunks per index row: u32 (== 1)                        │
//! │   - File ID: u64 (0xa91c12f8b245a71d)                       │
//! │   - Chunk positions: u64 x 8 (slot 0 = column index offset) │
//! │   - Chunk rows: u64 x 8 (slot 0 = row count)                │
//! │   - Chunk count: u32 (== 1)                                 │
//! │   - Key column indices: i32 x K                             │
//! │   - Column type codes: u16 x C                              │
//! ├─────────────────────────────────────────────────────────────┤
//! │ Column Names (text codec, uncompressed)                     │
//! ├─────────────────────────────────────────────────────────────┤
//! │ Column Position Index (u64 x C, backfilled after payloads)  │
//! ├─────────────────────────────────────────────────────────────┤
//! │ Column Payloads (declaration order)                         │
//! │   Per column: block-position index + compressed blocks      │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Files predating the file-ID marker (the legacy v0 layout) are still
//! readable; reading one logs a deprecation warning.

pub mod codec;
pub mod compress;
pub mod format;
pub mod legacy;
pub mod reader;
pub mod stream;
pub mod table;
pub mod writer;


pub use format::TableMeta;
pub use reader::{read_meta, read_table, ReadResult};
pub use table::{Column, ColumnType, Table};
pub use writer::{write_table, WriteInfo};

/// Codec error type
#[derive(Debug, thiserror::Error)]
pub enum ColtabError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid argument: {0}")]
    BadArgument(String),

    #[error("bad file format: {0}")]
    BadFormat(String),

    #[error("not implemented: {0}")]
    NotImplemented(&'static str),
}

pub type Result<T> = std::result::Result<T, ColtabError>;

pub(crate) fn err_arg(msg: impl Into<String>) -> ColtabError {
    ColtabError::BadArgument(msg.into())
}

pub(crate) fn err_format(msg: impl Into<String>) -> ColtabError {
    ColtabError::BadFormat(msg.into())
}
