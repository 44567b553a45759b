//! Per-source and per-run import reports.

use std::fmt;

use serde::Serialize;

use crate::config::ExistingTablePolicy;
use crate::error::ImportError;
use crate::ingestion::{Origin, SourceDescriptor, SourceFormat};
use crate::plan::{CompatibilityVerdict, ImportPlan};
use crate::types::TableSchema;

/// Progress of one source through the import pipeline.
///
/// `Discovered → Scanned → SchemaInferred → [CompatibilityChecked] → Planned →
/// (DryRunReported | Written) → Done`. A skipped or aborted source keeps the last stage it
/// reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Discovered,
    Scanned,
    SchemaInferred,
    CompatibilityChecked,
    Planned,
    DryRunReported,
    Written,
    Done,
}

/// What a dry run would do with a source.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DryRunPreview {
    /// Source label (`path` or `path[sheet]`).
    pub origin: String,
    /// Sanitized target table.
    pub table: String,
    /// Source format.
    pub format: SourceFormat,
    /// Data rows in the source.
    pub row_count: u64,
    /// Inferred columns.
    pub column_count: usize,
    /// Size used for the chunk decision.
    pub byte_size: u64,
    /// Rows per chunk; `None` is a single-pass load.
    pub chunk_size: Option<usize>,
    /// Whether the target table already exists.
    pub table_exists: bool,
    /// Existing-table policy in effect.
    pub if_exists: ExistingTablePolicy,
    /// Strict schema mode.
    pub strict_schema: bool,
    /// Compatibility with the live table.
    pub verdict: CompatibilityVerdict,
    /// Inferred schema.
    pub schema: TableSchema,
}

impl DryRunPreview {
    pub(crate) fn new(plan: &ImportPlan, descriptor: &SourceDescriptor) -> Self {
        Self {
            origin: descriptor.origin.to_string(),
            table: plan.target_table.clone(),
            format: descriptor.format,
            row_count: descriptor.row_count,
            column_count: plan.schema.len(),
            byte_size: descriptor.byte_size,
            chunk_size: plan.chunk_size,
            table_exists: plan.table_exists(),
            if_exists: plan.existing_table_policy,
            strict_schema: plan.strict_schema,
            verdict: plan.verdict.clone(),
            schema: plan.schema.clone(),
        }
    }
}

/// How a source ended.
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SourceOutcome {
    /// Rows were committed.
    Written { rows: u64, chunks: usize },
    /// Planned only; nothing was written.
    DryRun { preview: DryRunPreview },
    /// A junk sheet; does not count as a failure.
    Skipped { reason: String },
    /// The source failed; `committed_rows` were left in place by earlier chunks.
    Aborted {
        kind: &'static str,
        reason: String,
        committed_rows: u64,
        #[serde(skip)]
        error: ImportError,
    },
}

/// Result for one source.
#[derive(Debug, Serialize)]
pub struct SourceReport {
    /// Where the rows come from.
    pub origin: Origin,
    /// Sanitized target table, once decided.
    pub table: Option<String>,
    /// Last stage reached.
    pub stage: Stage,
    /// How the source ended.
    pub outcome: SourceOutcome,
}

impl SourceReport {
    /// Whether rows were written.
    pub fn is_written(&self) -> bool {
        matches!(self.outcome, SourceOutcome::Written { .. })
    }

    /// Whether the source was skipped as junk.
    pub fn is_skipped(&self) -> bool {
        matches!(self.outcome, SourceOutcome::Skipped { .. })
    }

    /// Whether the source aborted.
    pub fn is_aborted(&self) -> bool {
        matches!(self.outcome, SourceOutcome::Aborted { .. })
    }

    /// The abort error, if the source aborted.
    pub fn error(&self) -> Option<&ImportError> {
        match &self.outcome {
            SourceOutcome::Aborted { error, .. } => Some(error),
            _ => None,
        }
    }

    /// Rows committed for this source (including before a failure).
    pub fn rows_committed(&self) -> u64 {
        match &self.outcome {
            SourceOutcome::Written { rows, .. } => *rows,
            SourceOutcome::Aborted { committed_rows, .. } => *committed_rows,
            _ => 0,
        }
    }
}

/// Result of a whole run, one entry per source in input order.
#[derive(Debug, Default, Serialize)]
pub struct ImportReport {
    /// Per-source results.
    pub sources: Vec<SourceReport>,
}

impl ImportReport {
    /// Sources whose rows were written.
    pub fn written(&self) -> impl Iterator<Item = &SourceReport> {
        self.sources.iter().filter(|s| s.is_written())
    }

    /// Sources skipped as junk.
    pub fn skipped(&self) -> impl Iterator<Item = &SourceReport> {
        self.sources.iter().filter(|s| s.is_skipped())
    }

    /// Sources that aborted.
    pub fn aborted(&self) -> impl Iterator<Item = &SourceReport> {
        self.sources.iter().filter(|s| s.is_aborted())
    }

    /// Whether any source aborted.
    pub fn has_aborts(&self) -> bool {
        self.aborted().next().is_some()
    }

    /// Process exit code: 0 unless a source aborted.
    pub fn exit_code(&self) -> i32 {
        if self.has_aborts() { 1 } else { 0 }
    }

    /// Report entry for a target table.
    pub fn for_table(&self, table: &str) -> Option<&SourceReport> {
        self.sources.iter().find(|s| s.table.as_deref() == Some(table))
    }
}

impl fmt::Display for ImportReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for s in &self.sources {
            let table = s.table.as_deref().unwrap_or("-");
            match &s.outcome {
                SourceOutcome::Written { rows, chunks } => {
                    writeln!(f, "written  {} -> {table}: {rows} rows in {chunks} chunk(s)", s.origin)?
                }
                SourceOutcome::DryRun { preview } => {
                    writeln!(
                        f,
                        "dry-run  {} -> {table}: {} rows, {} columns, chunking {}, {}",
                        s.origin,
                        preview.row_count,
                        preview.column_count,
                        preview
                            .chunk_size
                            .map_or_else(|| "no".to_string(), |n| format!("{n} rows")),
                        preview.verdict
                    )?;
                    for c in &preview.schema.columns {
                        let flag = if c.ambiguous { " (ambiguous)" } else { "" };
                        writeln!(f, "           {}: {}{flag}", c.name, c.inferred_type)?;
                    }
                }
                SourceOutcome::Skipped { reason } => {
                    writeln!(f, "skipped  {}: {reason}", s.origin)?
                }
                SourceOutcome::Aborted {
                    reason,
                    committed_rows,
                    ..
                } => writeln!(
                    f,
                    "aborted  {} -> {table}: {reason} ({committed_rows} rows committed)",
                    s.origin
                )?,
            }
        }
        Ok(())
    }
}
