//! Source reading.
//!
//! Most callers should use [`discover_sources`] (from [`source`]) which:
//!
//! - detects the format by file extension
//! - expands a workbook into one source per sheet
//! - derives an unsanitized table name per source
//!
//! Format-specific readers are also available under:
//! - [`csv`]
//! - `excel` (feature `excel`)

pub mod csv;
#[cfg(feature = "excel")]
pub mod excel;
pub mod source;

pub use source::{
    discover_sources, CsvSource, ExcelSheetSource, Origin, ScannedSource, Source, SourceDescriptor,
    SourceFormat,
};
