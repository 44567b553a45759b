//! Destination store.
//!
//! The orchestrator only talks to a [`TableStore`]: it asks for a table's live schema and
//! hands over chunks of typed rows. Each [`TableStore::write_chunk`] call is one transaction.
//! [`sqlite::SqliteStore`] is the bundled implementation.

pub mod sqlite;

use crate::error::ImportResult;
use crate::inference::parse::{parse_bool, parse_datetime, parse_float, parse_integer, CANONICAL_DATETIME};
use crate::plan::Widening;
use crate::types::{ColumnType, RawValue, TableSchema};

pub use sqlite::SqliteStore;

/// A column as written to the destination table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetColumn {
    /// Column name.
    pub name: String,
    /// Column type; governs value coercion.
    pub column_type: ColumnType,
}

impl TargetColumn {
    /// Create a target column.
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
        }
    }
}

/// DDL applied in the same transaction as a chunk, before its rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableSetup {
    /// The table exists with the right shape.
    UseExisting,
    /// Create the table from the chunk's columns.
    Create,
    /// Drop the table if present, then create it from the chunk's columns.
    Replace,
    /// Alter the existing table: add columns, then widen column types.
    Evolve {
        add: Vec<TargetColumn>,
        widen: Vec<Widening>,
    },
}

/// One transactional unit of work.
#[derive(Debug, Clone, Copy)]
pub struct ChunkWrite<'a> {
    /// Target table.
    pub table: &'a str,
    /// DDL to run first.
    pub setup: &'a TableSetup,
    /// Insert columns, in the order of each row's values.
    pub columns: &'a [TargetColumn],
    /// Typed rows.
    pub rows: &'a [Vec<CellValue>],
}

/// Database seam used by the orchestrator.
pub trait TableStore {
    /// Live schema of `table` in column order, or `None` if the table does not exist.
    fn describe_table(&self, table: &str) -> ImportResult<Option<TableSchema>>;

    /// Apply `chunk.setup` and insert `chunk.rows` in a single transaction.
    ///
    /// Returns the number of rows inserted. On error nothing from this chunk is committed.
    fn write_chunk(&mut self, chunk: ChunkWrite<'_>) -> ImportResult<usize>;
}

/// A value ready to bind into an insert.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    /// SQL NULL.
    Null,
    /// Integer.
    Integer(i64),
    /// Floating point.
    Real(f64),
    /// Boolean.
    Boolean(bool),
    /// Text (also used for normalized date-times).
    Text(String),
}

impl CellValue {
    /// Coerce a raw value to a target column type.
    ///
    /// Values that cannot be represented in the target type are kept as text.
    pub fn coerce(raw: &RawValue, target: ColumnType) -> Self {
        if raw.is_null() {
            return CellValue::Null;
        }
        let coerced = match target {
            ColumnType::Integer => parse_integer(raw).map(CellValue::Integer),
            ColumnType::Float => parse_float(raw).map(CellValue::Real),
            ColumnType::Boolean => parse_bool(raw).map(|(b, _)| CellValue::Boolean(b)),
            ColumnType::DateTime => {
                parse_datetime(raw).map(|dt| CellValue::Text(dt.format(CANONICAL_DATETIME).to_string()))
            }
            ColumnType::Text => None,
        };
        coerced.unwrap_or_else(|| CellValue::Text(raw.render()))
    }
}
