//! Type inference.
//!
//! - [`classify()`]: picks the strongest [`crate::types::ColumnType`] for one column
//! - [`infer_schema()`]: applies the classifier to every column of a [`crate::types::RawTable`]
//!
//! ```rust
//! use tabular_import::inference::classify;
//! use tabular_import::types::{ColumnType, RawValue};
//!
//! let values: Vec<RawValue> = ["10", "20", "n/a"].iter().map(|s| RawValue::from_text(s)).collect();
//! let c = classify(&values);
//! assert_eq!(c.column_type, ColumnType::Text);
//! assert!(c.ambiguous);
//! ```

pub mod classify;
pub(crate) mod parse;
pub mod schema;

pub use classify::{classify, Classification};
pub use schema::{infer_schema, InferenceOptions, PROFILE_SAMPLE_LEN};
