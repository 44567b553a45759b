//! `tabular-import` loads CSV files and Excel workbooks into relational tables.
//!
//! Column types are inferred from the data rather than declared up front, and the inference is
//! conservative: a column is only typed when every non-null value fits the type, otherwise it
//! falls back to text and is flagged as ambiguous in the log.
//!
//! ## Pipeline
//!
//! Each [`ingestion::Source`] (a CSV file, or one sheet of a workbook) goes through:
//!
//! 1. scan: read rows into a [`types::RawTable`] ([`ingestion`])
//! 2. infer: one [`types::ColumnType`] per column ([`inference`])
//! 3. name: a safe, unique table identifier ([`plan::sanitize_table_name`])
//! 4. check: compare with the live table in strict mode ([`plan::check_compatibility`])
//! 5. plan: single pass or chunked ([`plan::plan_chunks`])
//! 6. write or report: one transaction per chunk ([`store::TableStore`])
//!
//! [`orchestrator::Importer`] runs the pipeline and returns an [`orchestrator::ImportReport`].
//! Every decision is also emitted as an [`observability::ImportEvent`].
//!
//! ## Type inference
//!
//! Types are tried in a fixed order; blank cells are null and never vote:
//!
//! - **BOOLEAN**: every value is one spelling family (`true/false`, `yes/no`, `1/0`)
//! - **INTEGER**: 64-bit signed integers
//! - **FLOAT**: finite decimals or scientific notation
//! - **DATETIME**: ISO dates and date-times, plus a few common written forms
//! - **TEXT**: anything else
//!
//! ## Quick example
//!
//! ```no_run
//! use tabular_import::config::{ExistingTablePolicy, ImportConfig};
//! use tabular_import::ingestion::discover_sources;
//! use tabular_import::orchestrator::Importer;
//! use tabular_import::store::SqliteStore;
//!
//! # fn main() -> Result<(), tabular_import::ImportError> {
//! let config = ImportConfig {
//!     database_url: "sqlite://warehouse.db".to_string(),
//!     if_exists: ExistingTablePolicy::Append,
//!     strict_schema: true,
//!     ..ImportConfig::default()
//! };
//! config.validate()?;
//!
//! let store = SqliteStore::connect(&config.database_url)?;
//! let sources = discover_sources("sales.csv", Some("sales"))?;
//! let report = Importer::new(store, &config).run(&sources);
//! for s in report.written() {
//!     println!("{} -> {:?}: {} rows", s.origin, s.table, s.rows_committed());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature flags
//!
//! - `excel` (default): workbook ingestion through `calamine`

pub mod config;
pub mod error;
pub mod inference;
pub mod ingestion;
pub mod observability;
pub mod orchestrator;
pub mod plan;
pub mod store;
pub mod types;

pub use error::{ImportError, ImportResult};
