//! CSV reading.

use std::path::Path;

use crate::error::ImportResult;
use crate::types::{RawTable, RawValue};

/// Read a CSV file with a header row into a [`RawTable`].
///
/// Every field becomes [`RawValue::Text`], or [`RawValue::Null`] when blank. Rows with a
/// different field count than the header are a CSV error.
pub fn read_csv_from_path(path: impl AsRef<Path>) -> ImportResult<RawTable> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)?;
    read_csv_from_reader(&mut rdr)
}

/// Read CSV data from an existing CSV reader.
pub fn read_csv_from_reader<R: std::io::Read>(rdr: &mut csv::Reader<R>) -> ImportResult<RawTable> {
    let headers: Vec<String> = rdr.headers()?.iter().map(|h| h.to_owned()).collect();

    let mut rows: Vec<Vec<RawValue>> = Vec::new();
    for result in rdr.records() {
        let record = result?;
        rows.push(record.iter().map(RawValue::from_text).collect());
    }

    Ok(RawTable::new(headers, rows))
}
