//! Core data model types for inference and import.
//!
//! Readers produce a [`RawTable`] of tagged [`RawValue`]s. Inference turns it into a
//! [`TableSchema`] (an ordered list of [`ColumnProfile`]s) that drives table creation and
//! compatibility checks.

use std::fmt;

use serde::Serialize;

/// Target column type chosen by inference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ColumnType {
    /// 64-bit signed integer.
    Integer,
    /// 64-bit floating point number.
    Float,
    /// Boolean.
    Boolean,
    /// Date or date-time without time zone.
    DateTime,
    /// UTF-8 text (fallback).
    Text,
}

impl ColumnType {
    /// Declared SQL type used when creating tables.
    pub fn sql_type(self) -> &'static str {
        match self {
            ColumnType::Integer => "BIGINT",
            ColumnType::Float => "DOUBLE PRECISION",
            ColumnType::Boolean => "BOOLEAN",
            ColumnType::DateTime => "TIMESTAMP",
            ColumnType::Text => "TEXT",
        }
    }

    /// Recover a column type from a live declared type name.
    ///
    /// Matching is substring-based like SQLite's affinity rules, so `INT`, `INTEGER` and
    /// `BIGINT` all map to [`ColumnType::Integer`]. Unknown names fall back to text.
    pub fn from_declared(declared: &str) -> Self {
        let d = declared.to_ascii_uppercase();
        if d.contains("BOOL") {
            ColumnType::Boolean
        } else if d.contains("INT") {
            ColumnType::Integer
        } else if ["REAL", "FLOA", "DOUB", "NUMERIC", "DECIMAL"]
            .iter()
            .any(|k| d.contains(k))
        {
            ColumnType::Float
        } else if d.contains("DATE") || d.contains("TIME") {
            ColumnType::DateTime
        } else {
            ColumnType::Text
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ColumnType::Integer => "INTEGER",
            ColumnType::Float => "FLOAT",
            ColumnType::Boolean => "BOOLEAN",
            ColumnType::DateTime => "DATETIME",
            ColumnType::Text => "TEXT",
        };
        f.write_str(s)
    }
}

/// A single untyped cell as read from a source.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RawValue {
    /// Missing/empty value.
    Null,
    /// Native boolean (spreadsheet cells).
    Bool(bool),
    /// Native integer (spreadsheet cells).
    Int(i64),
    /// Native float (spreadsheet cells).
    Float(f64),
    /// Text as written in the source.
    Text(String),
}

impl RawValue {
    /// Build a value from source text. Blank or whitespace-only text is [`RawValue::Null`].
    pub fn from_text(s: &str) -> Self {
        if s.trim().is_empty() {
            RawValue::Null
        } else {
            RawValue::Text(s.to_owned())
        }
    }

    /// Whether the value counts as null for inference.
    pub fn is_null(&self) -> bool {
        match self {
            RawValue::Null => true,
            RawValue::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// Render the value as text.
    pub fn render(&self) -> String {
        match self {
            RawValue::Null => String::new(),
            RawValue::Bool(b) => b.to_string(),
            RawValue::Int(i) => i.to_string(),
            RawValue::Float(f) => f.to_string(),
            RawValue::Text(s) => s.clone(),
        }
    }
}

/// In-memory tabular source contents.
///
/// Rows are stored as `Vec<Vec<RawValue>>` in header order. Rows shorter than the header are
/// read as if padded with [`RawValue::Null`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawTable {
    /// Header names in source order.
    pub headers: Vec<String>,
    /// Row-major value storage.
    pub rows: Vec<Vec<RawValue>>,
}

impl RawTable {
    /// Create a table from headers and rows.
    pub fn new(headers: Vec<String>, rows: Vec<Vec<RawValue>>) -> Self {
        Self { headers, rows }
    }

    /// Number of data rows.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Number of columns (from the header).
    pub fn column_count(&self) -> usize {
        self.headers.len()
    }

    /// Iterate the values of column `idx`, top to bottom.
    pub fn column(&self, idx: usize) -> impl Iterator<Item = &RawValue> + '_ {
        self.rows
            .iter()
            .map(move |row| row.get(idx).unwrap_or(&RawValue::Null))
    }

    /// Returns the index of a header by name, if present.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }
}

/// Inference result for one column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnProfile {
    /// Column name as it appears in the source header.
    pub name: String,
    /// First few non-null raw values, in order.
    pub raw_sample: Vec<RawValue>,
    /// Chosen target type.
    pub inferred_type: ColumnType,
    /// Whether the column looked typed but had to fall back to text.
    pub ambiguous: bool,
    /// Why the column is ambiguous, for the log.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ambiguity_reason: Option<String>,
}

impl ColumnProfile {
    /// A profile for a column whose type is already declared (e.g. a live table column).
    pub fn declared(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            raw_sample: Vec::new(),
            inferred_type: column_type,
            ambiguous: false,
            ambiguity_reason: None,
        }
    }
}

/// Ordered, uniquely-named list of column profiles for one target table.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct TableSchema {
    /// Columns in table order.
    pub columns: Vec<ColumnProfile>,
}

impl TableSchema {
    /// Create a schema from column profiles.
    pub fn new(columns: Vec<ColumnProfile>) -> Self {
        Self { columns }
    }

    /// Build a schema of declared columns from `(name, type)` pairs.
    pub fn from_declared<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = (S, ColumnType)>,
        S: Into<String>,
    {
        Self::new(
            columns
                .into_iter()
                .map(|(name, ty)| ColumnProfile::declared(name, ty))
                .collect(),
        )
    }

    /// Iterate column names in order.
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    /// Look up a column by name, ignoring ASCII case like SQL identifiers.
    pub fn get(&self, name: &str) -> Option<&ColumnProfile> {
        self.columns.iter().find(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// Returns the index of a column by name (ASCII case-insensitive), if present.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Whether the schema has no columns.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Columns flagged as ambiguous.
    pub fn ambiguous_columns(&self) -> impl Iterator<Item = &ColumnProfile> {
        self.columns.iter().filter(|c| c.ambiguous)
    }
}
