//! Source discovery and the closed set of readable sources.
//!
//! A path expands to one [`Source::Csv`], or to one [`Source::ExcelSheet`] per workbook sheet.
//! Both variants expose the same contract to the orchestrator: [`Source::origin`],
//! [`Source::raw_table_name`] and [`Source::scan`].

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::{ImportError, ImportResult};
use crate::types::{RawTable, RawValue};

use super::csv;

/// Supported source formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceFormat {
    /// Comma-separated values.
    Csv,
    /// Spreadsheet/workbook formats (readable with the `excel` feature).
    Excel,
}

impl SourceFormat {
    /// Parse a source format from a file extension (case-insensitive).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "csv" => Some(Self::Csv),
            "xlsx" | "xls" | "xlsm" | "xlsb" | "ods" => Some(Self::Excel),
            _ => None,
        }
    }

    /// Detect the format of `path` from its extension.
    pub fn from_path(path: &Path) -> ImportResult<Self> {
        let ext = path.extension().and_then(|s| s.to_str()).unwrap_or("");
        Self::from_extension(ext).ok_or_else(|| ImportError::UnsupportedFormat {
            path: path.to_path_buf(),
            extension: ext.to_string(),
        })
    }
}

/// Where a source's rows come from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Origin {
    /// Input file.
    pub path: PathBuf,
    /// Sheet name for workbook sources.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sheet: Option<String>,
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.sheet {
            Some(sheet) => write!(f, "{}[{sheet}]", self.path.display()),
            None => write!(f, "{}", self.path.display()),
        }
    }
}

/// Size facts about a scanned source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceDescriptor {
    /// Where the rows come from.
    pub origin: Origin,
    /// Data rows (header excluded).
    pub row_count: u64,
    /// File size for CSV; summed rendered cell length for a sheet.
    pub byte_size: u64,
    /// Source format.
    pub format: SourceFormat,
}

/// A scanned source: its descriptor plus the rows read from it.
#[derive(Debug, Clone, PartialEq)]
pub struct ScannedSource {
    /// Size facts.
    pub descriptor: SourceDescriptor,
    /// Raw contents.
    pub table: RawTable,
}

/// A CSV file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvSource {
    /// Input file.
    pub path: PathBuf,
    /// Unsanitized target table name.
    pub table_name: String,
}

/// One sheet of a workbook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExcelSheetSource {
    /// Workbook file.
    pub path: PathBuf,
    /// Sheet name.
    pub sheet: String,
    /// Unsanitized target table name.
    pub table_name: String,
}

/// A readable tabular source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    /// A CSV file.
    Csv(CsvSource),
    /// One sheet of a workbook.
    ExcelSheet(ExcelSheetSource),
}

impl Source {
    /// Where this source's rows come from.
    pub fn origin(&self) -> Origin {
        match self {
            Source::Csv(s) => Origin {
                path: s.path.clone(),
                sheet: None,
            },
            Source::ExcelSheet(s) => Origin {
                path: s.path.clone(),
                sheet: Some(s.sheet.clone()),
            },
        }
    }

    /// Format of this source.
    pub fn format(&self) -> SourceFormat {
        match self {
            Source::Csv(_) => SourceFormat::Csv,
            Source::ExcelSheet(_) => SourceFormat::Excel,
        }
    }

    /// Target table name before sanitization.
    pub fn raw_table_name(&self) -> &str {
        match self {
            Source::Csv(s) => &s.table_name,
            Source::ExcelSheet(s) => &s.table_name,
        }
    }

    /// Whether an unreadable or empty source is skipped rather than aborted.
    ///
    /// Junk sheets are common in workbooks; a bad CSV is always an error.
    pub fn is_skippable(&self) -> bool {
        matches!(self, Source::ExcelSheet(_))
    }

    /// Read the source and describe its size.
    pub fn scan(&self) -> ImportResult<ScannedSource> {
        match self {
            Source::Csv(s) => {
                let byte_size = std::fs::metadata(&s.path)?.len();
                let table = csv::read_csv_from_path(&s.path)?;
                Ok(ScannedSource {
                    descriptor: SourceDescriptor {
                        origin: self.origin(),
                        row_count: table.row_count() as u64,
                        byte_size,
                        format: SourceFormat::Csv,
                    },
                    table,
                })
            }
            Source::ExcelSheet(s) => {
                let table = read_sheet(&s.path, &s.sheet)?;
                Ok(ScannedSource {
                    descriptor: SourceDescriptor {
                        origin: self.origin(),
                        row_count: table.row_count() as u64,
                        byte_size: rendered_size(&table),
                        format: SourceFormat::Excel,
                    },
                    table,
                })
            }
        }
    }
}

/// Expand `path` into sources.
///
/// Table names are derived as follows (sanitized later by the orchestrator):
/// - CSV: `table`, or the file stem
/// - workbook with one sheet: `table`, or the sheet name
/// - workbook with several sheets: `<table>_<sheet>`, or the sheet name
///
/// # Errors
///
/// Returns [`ImportError::UnsupportedFormat`] for unknown extensions, [`ImportError::Io`] when
/// the file is missing, and a workbook error when the workbook cannot be opened.
pub fn discover_sources(path: impl AsRef<Path>, table: Option<&str>) -> ImportResult<Vec<Source>> {
    let path = path.as_ref();
    let format = SourceFormat::from_path(path)?;
    if !path.is_file() {
        return Err(ImportError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("file not found: {}", path.display()),
        )));
    }

    match format {
        SourceFormat::Csv => {
            let table_name = table.map(str::to_owned).unwrap_or_else(|| {
                path.file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_default()
            });
            Ok(vec![Source::Csv(CsvSource {
                path: path.to_path_buf(),
                table_name,
            })])
        }
        SourceFormat::Excel => {
            let sheets = list_sheets(path)?;
            let multi = sheets.len() > 1;
            Ok(sheets
                .into_iter()
                .map(|sheet| {
                    let table_name = match table {
                        Some(t) if multi => format!("{t}_{sheet}"),
                        Some(t) => t.to_owned(),
                        None => sheet.clone(),
                    };
                    Source::ExcelSheet(ExcelSheetSource {
                        path: path.to_path_buf(),
                        sheet,
                        table_name,
                    })
                })
                .collect())
        }
    }
}

fn rendered_size(table: &RawTable) -> u64 {
    let header: usize = table.headers.iter().map(String::len).sum();
    let cells: usize = table
        .rows
        .iter()
        .flatten()
        .map(|v| match v {
            RawValue::Null => 0,
            RawValue::Text(s) => s.len(),
            other => other.render().len(),
        })
        .sum();
    (header + cells) as u64
}

#[cfg(feature = "excel")]
fn list_sheets(path: &Path) -> ImportResult<Vec<String>> {
    super::excel::sheet_names(path)
}

#[cfg(feature = "excel")]
fn read_sheet(path: &Path, sheet: &str) -> ImportResult<RawTable> {
    super::excel::read_sheet_from_path(path, sheet)
}

#[cfg(not(feature = "excel"))]
fn list_sheets(_path: &Path) -> ImportResult<Vec<String>> {
    Err(excel_disabled())
}

#[cfg(not(feature = "excel"))]
fn read_sheet(_path: &Path, _sheet: &str) -> ImportResult<RawTable> {
    Err(excel_disabled())
}

#[cfg(not(feature = "excel"))]
fn excel_disabled() -> ImportError {
    ImportError::config("excel ingestion not enabled (enable cargo feature 'excel')")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_from_extension_is_case_insensitive() {
        assert_eq!(SourceFormat::from_extension("CSV"), Some(SourceFormat::Csv));
        assert_eq!(SourceFormat::from_extension("xlsx"), Some(SourceFormat::Excel));
        assert_eq!(SourceFormat::from_extension("XLS"), Some(SourceFormat::Excel));
        assert_eq!(SourceFormat::from_extension("json"), None);
    }

    #[test]
    fn unsupported_extension_is_rejected_before_io() {
        let err = discover_sources("missing/data.parquet", None).unwrap_err();
        assert_eq!(err.kind(), "unsupported_format");
        assert!(err.to_string().contains("parquet"));
    }

    #[test]
    fn missing_csv_is_an_io_error() {
        let err = discover_sources("missing/data.csv", None).unwrap_err();
        assert_eq!(err.kind(), "io");
    }

    #[test]
    fn origin_display_includes_sheet() {
        let o = Origin {
            path: PathBuf::from("book.xlsx"),
            sheet: Some("Q1".to_string()),
        };
        assert_eq!(o.to_string(), "book.xlsx[Q1]");
    }
}
