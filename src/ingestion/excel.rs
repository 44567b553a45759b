#![cfg(feature = "excel")]

use std::path::Path;

use calamine::{open_workbook_auto, Data, Range, Reader};
use chrono::{NaiveDate, NaiveDateTime, TimeDelta};

use crate::error::ImportResult;
use crate::inference::parse::CANONICAL_DATETIME;
use crate::types::{RawTable, RawValue};

/// List the sheet names of a workbook (`.xlsx`, `.xls`, `.ods`, etc.) in workbook order.
pub fn sheet_names(path: impl AsRef<Path>) -> ImportResult<Vec<String>> {
    let workbook = open_workbook_auto(path)?;
    Ok(workbook.sheet_names().to_vec())
}

/// Read one sheet of a workbook into a [`RawTable`].
///
/// Behavior:
/// - Detects the first non-empty row as the header row
/// - Drops trailing header cells that are blank
/// - Skips rows after the header whose cells are all empty
/// - Converts cells into tagged [`RawValue`]s; date cells become ISO text
///
/// A sheet with no non-empty row yields an empty table (no headers, no rows).
pub fn read_sheet_from_path(path: impl AsRef<Path>, sheet: &str) -> ImportResult<RawTable> {
    let mut workbook = open_workbook_auto(path)?;
    let range = workbook.worksheet_range(sheet)?;
    Ok(read_sheet_range(&range))
}

fn read_sheet_range(range: &Range<Data>) -> RawTable {
    let mut rows = range.rows();

    let header_row = rows.by_ref().find(|row| row.iter().any(|c| !is_blank(c)));
    let Some(header_row) = header_row else {
        return RawTable::default();
    };

    let width = header_row
        .iter()
        .rposition(|c| !is_blank(c))
        .map_or(0, |i| i + 1);
    let headers: Vec<String> = header_row[..width].iter().map(cell_to_header_string).collect();

    let mut out: Vec<Vec<RawValue>> = Vec::new();
    for row in rows {
        let values: Vec<RawValue> = (0..width)
            .map(|idx| row.get(idx).map_or(RawValue::Null, convert_cell))
            .collect();
        if values.iter().all(RawValue::is_null) {
            continue;
        }
        out.push(values);
    }

    RawTable::new(headers, out)
}

fn is_blank(c: &Data) -> bool {
    match c {
        Data::Empty => true,
        Data::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

fn cell_to_header_string(c: &Data) -> String {
    match c {
        Data::String(s) => s.trim().to_owned(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) => {
            if f.fract() == 0.0 {
                (*f as i64).to_string()
            } else {
                f.to_string()
            }
        }
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) => excel_serial_to_text(dt.as_f64()).unwrap_or_else(|| dt.to_string()),
        Data::DateTimeIso(s) => s.clone(),
        Data::DurationIso(s) => s.clone(),
        Data::Error(e) => format!("{e:?}"),
        Data::Empty => String::new(),
    }
}

fn convert_cell(c: &Data) -> RawValue {
    match c {
        Data::Empty | Data::Error(_) => RawValue::Null,
        Data::String(s) => RawValue::from_text(s),
        Data::Int(i) => RawValue::Int(*i),
        Data::Float(f) => RawValue::Float(*f),
        Data::Bool(b) => RawValue::Bool(*b),
        Data::DateTime(dt) => {
            excel_serial_to_text(dt.as_f64()).map_or(RawValue::Float(dt.as_f64()), RawValue::Text)
        }
        Data::DateTimeIso(s) | Data::DurationIso(s) => RawValue::from_text(s),
    }
}

/// Render an Excel serial date (days since 1899-12-30) as ISO text.
///
/// Whole days render as `YYYY-MM-DD`; anything with a time part as `YYYY-MM-DD HH:MM:SS`.
fn excel_serial_to_text(serial: f64) -> Option<String> {
    if !serial.is_finite() || serial < 0.0 {
        return None;
    }
    let epoch: NaiveDateTime = NaiveDate::from_ymd_opt(1899, 12, 30)?.and_hms_opt(0, 0, 0)?;
    let millis = (serial * 86_400_000.0).round() as i64;
    let dt = epoch.checked_add_signed(TimeDelta::try_milliseconds(millis)?)?;
    if serial.fract() == 0.0 {
        Some(dt.date().format("%Y-%m-%d").to_string())
    } else {
        Some(dt.format(CANONICAL_DATETIME).to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serial_dates_render_as_iso_text() {
        assert_eq!(excel_serial_to_text(44_464.0).as_deref(), Some("2021-09-25"));
        assert_eq!(
            excel_serial_to_text(44_464.5).as_deref(),
            Some("2021-09-25 12:00:00")
        );
        assert_eq!(excel_serial_to_text(-1.0), None);
    }

    #[test]
    fn header_is_first_non_empty_row_and_blank_rows_are_dropped() {
        let mut range: Range<Data> = Range::new((0, 0), (4, 2));
        range.set_value((1, 0), Data::String("id".into()));
        range.set_value((1, 1), Data::String("name".into()));
        range.set_value((2, 0), Data::Float(1.0));
        range.set_value((2, 1), Data::String("Ada".into()));
        range.set_value((4, 0), Data::Int(2));

        let t = read_sheet_range(&range);
        assert_eq!(t.headers, vec!["id".to_string(), "name".to_string()]);
        assert_eq!(t.row_count(), 2);
        assert_eq!(t.rows[0], vec![RawValue::Float(1.0), RawValue::Text("Ada".into())]);
        assert_eq!(t.rows[1], vec![RawValue::Int(2), RawValue::Null]);
    }

    #[test]
    fn empty_range_yields_empty_table() {
        let range: Range<Data> = Range::new((0, 0), (2, 2));
        let t = read_sheet_range(&range);
        assert_eq!(t, RawTable::default());
    }
}
