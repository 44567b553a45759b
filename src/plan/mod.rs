//! Planning decisions made before any write.
//!
//! - [`plan_chunks()`]: single pass vs. bounded batches
//! - [`sanitize_table_name()`]: safe, unique table identifiers
//! - [`check_compatibility()`]: strict schema checks against an existing table
//!
//! Their results are collected into an [`ImportPlan`], which fully determines what the
//! orchestrator does with a source.

pub mod chunk;
pub mod compat;
pub mod naming;

use serde::Serialize;

use crate::config::ExistingTablePolicy;
use crate::types::TableSchema;

pub use chunk::plan_chunks;
pub use compat::{check_compatibility, CompatibilityVerdict, Widening};
pub use naming::sanitize_table_name;

/// Everything decided about one source before writing.
///
/// `verdict` is always resolved: [`CompatibilityVerdict::NotApplicable`] when the target table
/// does not exist.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportPlan {
    /// Sanitized, run-unique table name.
    pub target_table: String,
    /// Inferred schema of the source.
    pub schema: TableSchema,
    /// Rows per chunk; `None` writes everything in one transaction.
    pub chunk_size: Option<usize>,
    /// Existing-table policy.
    pub existing_table_policy: ExistingTablePolicy,
    /// Strict schema mode.
    pub strict_schema: bool,
    /// Plan-only run.
    pub dry_run: bool,
    /// Compatibility with the live table.
    pub verdict: CompatibilityVerdict,
    /// Live schema of the target table, if it exists.
    #[serde(skip)]
    pub existing_schema: Option<TableSchema>,
}

impl ImportPlan {
    /// Whether the target table already exists.
    pub fn table_exists(&self) -> bool {
        self.existing_schema.is_some()
    }
}
