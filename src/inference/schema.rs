//! Table schema inference.

use std::collections::HashSet;

use crate::error::{ImportError, ImportResult};
use crate::types::{ColumnProfile, RawTable, TableSchema};

use super::classify::classify;

/// Number of non-null values kept in [`ColumnProfile::raw_sample`].
pub const PROFILE_SAMPLE_LEN: usize = 5;

const BAD_HEADER_CHARS: [char; 4] = ['\0', '\n', '\r', '\t'];

/// Options for [`infer_schema`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InferenceOptions {
    /// Classify at most this many leading rows per column; `None` classifies all rows.
    pub sample_rows: Option<usize>,
}

/// Infer a target-table schema from a raw table, one column at a time in header order.
///
/// `origin` only labels errors.
///
/// # Errors
///
/// Returns [`ImportError::Inference`] if the table has no columns or no rows, or if a header is
/// blank, contains control characters, or is duplicated.
pub fn infer_schema(
    origin: &str,
    table: &RawTable,
    options: &InferenceOptions,
) -> ImportResult<TableSchema> {
    let fail = |message: String| ImportError::Inference {
        origin: origin.to_owned(),
        message,
    };

    if table.column_count() == 0 {
        return Err(fail("source has no columns".to_string()));
    }
    if table.row_count() == 0 {
        return Err(fail("source has no data rows".to_string()));
    }
    validate_headers(&table.headers).map_err(fail)?;

    let limit = options.sample_rows.unwrap_or(usize::MAX);
    let columns = table
        .headers
        .iter()
        .enumerate()
        .map(|(idx, name)| {
            let c = classify(table.column(idx).take(limit));
            ColumnProfile {
                name: name.trim().to_owned(),
                raw_sample: table
                    .column(idx)
                    .filter(|v| !v.is_null())
                    .take(PROFILE_SAMPLE_LEN)
                    .cloned()
                    .collect(),
                inferred_type: c.column_type,
                ambiguous: c.ambiguous,
                ambiguity_reason: c.reason,
            }
        })
        .collect();

    Ok(TableSchema::new(columns))
}

fn validate_headers(headers: &[String]) -> Result<(), String> {
    let mut seen = HashSet::with_capacity(headers.len());
    for (idx, raw) in headers.iter().enumerate() {
        let name = raw.trim();
        if name.is_empty() {
            return Err(format!("column {} has a blank name", idx + 1));
        }
        if name.contains(BAD_HEADER_CHARS) {
            return Err(format!("column {name:?} contains invalid control characters"));
        }
        // Database identifiers are case-insensitive.
        if !seen.insert(name.to_ascii_lowercase()) {
            return Err(format!("duplicate column name {name:?}"));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ColumnType, RawValue};

    fn table(headers: &[&str], rows: &[&[&str]]) -> RawTable {
        RawTable::new(
            headers.iter().map(|h| h.to_string()).collect(),
            rows.iter()
                .map(|r| r.iter().map(|s| RawValue::from_text(s)).collect())
                .collect(),
        )
    }

    #[test]
    fn columns_keep_source_order() {
        let t = table(
            &["title", "year", "rating", "active"],
            &[&["A", "2001", "7.5", "yes"], &["B", "1999", "8", "no"]],
        );
        let schema = infer_schema("t.csv", &t, &InferenceOptions::default()).unwrap();
        let names: Vec<_> = schema.column_names().collect();
        assert_eq!(names, vec!["title", "year", "rating", "active"]);
        let types: Vec<_> = schema.columns.iter().map(|c| c.inferred_type).collect();
        assert_eq!(
            types,
            vec![
                ColumnType::Text,
                ColumnType::Integer,
                ColumnType::Float,
                ColumnType::Boolean
            ]
        );
        assert_eq!(schema.columns[1].raw_sample.len(), 2);
    }

    #[test]
    fn zero_rows_is_an_inference_error() {
        let t = table(&["a", "b"], &[]);
        let err = infer_schema("t.csv", &t, &InferenceOptions::default()).unwrap_err();
        assert_eq!(err.kind(), "inference");
        assert!(err.to_string().contains("no data rows"));
    }

    #[test]
    fn zero_columns_is_an_inference_error() {
        let t = RawTable::default();
        let err = infer_schema("t.csv", &t, &InferenceOptions::default()).unwrap_err();
        assert!(err.to_string().contains("no columns"));
    }

    #[test]
    fn bad_headers_are_rejected() {
        for headers in [&["a", " "][..], &["a", "b\tc"][..], &["a", "a"][..]] {
            let t = table(headers, &[&["1", "2"]]);
            assert!(infer_schema("t.csv", &t, &InferenceOptions::default()).is_err());
        }
    }

    #[test]
    fn headers_differing_only_by_case_are_duplicates() {
        let t = table(&["Name", "name"], &[&["a", "b"]]);
        let err = infer_schema("t.csv", &t, &InferenceOptions::default()).unwrap_err();
        assert_eq!(err.kind(), "inference");
        assert!(err.to_string().contains("duplicate column name \"name\""), "{err}");
    }

    #[test]
    fn sample_rows_limits_classification() {
        let t = table(&["n"], &[&["1"], &["2"], &["oops"]]);
        let full = infer_schema("t.csv", &t, &InferenceOptions::default()).unwrap();
        assert_eq!(full.columns[0].inferred_type, ColumnType::Text);
        assert!(full.columns[0].ambiguous);

        let sampled = infer_schema(
            "t.csv",
            &t,
            &InferenceOptions {
                sample_rows: Some(2),
            },
        )
        .unwrap();
        assert_eq!(sampled.columns[0].inferred_type, ColumnType::Integer);
    }
}
