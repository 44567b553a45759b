//! Import orchestration.
//!
//! [`Importer::run`] drives every source through
//! scan → infer → sanitize name → check compatibility → plan → (dry-run report | write).
//! Sources are independent: a skipped or aborted source does not stop the ones after it, and a
//! write failure leaves earlier committed chunks in place and reports how many rows they held.

mod report;

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, info_span};

use crate::config::{ExistingTablePolicy, ImportConfig};
use crate::error::{ImportError, ImportResult};
use crate::inference::{infer_schema, InferenceOptions};
use crate::ingestion::{ScannedSource, Source};
use crate::observability::{ColumnSummary, ImportEvent, ImportObserver, TracingObserver};
use crate::plan::{
    check_compatibility, plan_chunks, sanitize_table_name, CompatibilityVerdict, ImportPlan,
};
use crate::store::{CellValue, ChunkWrite, TableSetup, TableStore, TargetColumn};
use crate::types::{RawTable, RawValue};

pub use report::{DryRunPreview, ImportReport, SourceOutcome, SourceReport, Stage};

/// Sheets narrower than this are notes or titles, not tables.
pub const MIN_SHEET_COLUMNS: usize = 2;

/// Why a source stopped early.
enum Halt {
    Skip(String),
    Abort(ImportError),
}

impl From<ImportError> for Halt {
    fn from(err: ImportError) -> Self {
        Halt::Abort(err)
    }
}

/// Runs imports against a [`TableStore`].
pub struct Importer<'c, S: TableStore> {
    store: S,
    config: &'c ImportConfig,
    observer: Arc<dyn ImportObserver>,
}

impl<'c, S: TableStore> Importer<'c, S> {
    /// Create an importer that logs through `tracing`.
    pub fn new(store: S, config: &'c ImportConfig) -> Self {
        Self {
            store,
            config,
            observer: Arc::new(TracingObserver),
        }
    }

    /// Replace the observer that receives [`ImportEvent`]s.
    pub fn with_observer(mut self, observer: Arc<dyn ImportObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Borrow the store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Consume the importer and return its store.
    pub fn into_store(self) -> S {
        self.store
    }

    /// Import `sources` in order and report on each.
    ///
    /// Table names are made unique across this run only.
    pub fn run(&mut self, sources: &[Source]) -> ImportReport {
        let mut used = HashSet::new();
        let sources = sources
            .iter()
            .map(|source| self.run_source(source, &mut used))
            .collect();
        ImportReport { sources }
    }

    fn run_source(&mut self, source: &Source, used: &mut HashSet<String>) -> SourceReport {
        let origin = source.origin();
        let _span = info_span!("source", origin = %origin).entered();

        let mut report = SourceReport {
            origin,
            table: None,
            stage: Stage::Discovered,
            outcome: SourceOutcome::Skipped {
                reason: String::new(),
            },
        };

        match self.process(source, used, &mut report) {
            Ok(outcome) => {
                report.stage = Stage::Done;
                report.outcome = outcome;
            }
            Err(Halt::Skip(reason)) => {
                self.emit(ImportEvent::Skipped {
                    origin: report.origin.to_string(),
                    reason: reason.clone(),
                });
                report.outcome = SourceOutcome::Skipped { reason };
            }
            Err(Halt::Abort(error)) => {
                self.emit(ImportEvent::Aborted {
                    origin: report.origin.to_string(),
                    table: report.table.clone(),
                    stage: report.stage,
                    kind: error.kind().to_string(),
                    reason: error.to_string(),
                    committed_rows: error.committed_rows(),
                });
                report.outcome = SourceOutcome::Aborted {
                    kind: error.kind(),
                    reason: error.to_string(),
                    committed_rows: error.committed_rows(),
                    error,
                };
            }
        }
        report
    }

    fn process(
        &mut self,
        source: &Source,
        used: &mut HashSet<String>,
        report: &mut SourceReport,
    ) -> Result<SourceOutcome, Halt> {
        let config = self.config;
        let origin = report.origin.to_string();
        // Unreadable or empty sheets are junk; everything else is fatal for the source.
        let soft = |err: ImportError| {
            if source.is_skippable() {
                Halt::Skip(err.to_string())
            } else {
                Halt::Abort(err)
            }
        };

        let ScannedSource { descriptor, table } = source.scan().map_err(soft)?;
        report.stage = Stage::Scanned;
        if source.is_skippable() {
            if table.row_count() == 0 {
                return Err(Halt::Skip("no data rows after header detection".to_string()));
            }
            if table.column_count() < MIN_SHEET_COLUMNS {
                return Err(Halt::Skip(format!(
                    "only {} column(s); a sheet needs at least {MIN_SHEET_COLUMNS} to be a table",
                    table.column_count()
                )));
            }
        }

        let options = InferenceOptions {
            sample_rows: config.sample_rows,
        };
        let schema = infer_schema(&origin, &table, &options).map_err(soft)?;
        report.stage = Stage::SchemaInferred;

        let target = sanitize_table_name(source.raw_table_name(), used, config.max_identifier_len)?;
        report.table = Some(target.clone());

        self.emit(ImportEvent::SchemaInferred {
            origin: origin.clone(),
            table: target.clone(),
            rows: descriptor.row_count,
            columns: schema
                .columns
                .iter()
                .map(|c| ColumnSummary {
                    name: c.name.clone(),
                    column_type: c.inferred_type,
                })
                .collect(),
        });
        for col in schema.ambiguous_columns() {
            self.emit(ImportEvent::AmbiguousColumn {
                origin: origin.clone(),
                column: col.name.clone(),
                reason: col.ambiguity_reason.clone().unwrap_or_default(),
            });
        }

        let existing = self.store.describe_table(&target)?;
        if existing.is_some() && config.if_exists == ExistingTablePolicy::Fail {
            return Err(ImportError::TableExists { table: target }.into());
        }

        let verdict = check_compatibility(existing.as_ref(), &schema, config.strict_schema);
        if existing.is_some() {
            report.stage = Stage::CompatibilityChecked;
            self.emit(ImportEvent::CompatibilityChecked {
                table: target.clone(),
                strict: config.strict_schema,
                verdict: verdict.clone(),
            });
        }
        if let CompatibilityVerdict::Incompatible { reason } = &verdict {
            return Err(ImportError::SchemaIncompatible {
                table: target,
                reason: reason.clone(),
            }
            .into());
        }

        let chunk_size = plan_chunks(descriptor.row_count, descriptor.byte_size, &config.chunking);
        self.emit(ImportEvent::ChunkPlanned {
            table: target.clone(),
            row_count: descriptor.row_count,
            byte_size: descriptor.byte_size,
            chunk_size,
        });

        let plan = ImportPlan {
            target_table: target,
            schema,
            chunk_size,
            existing_table_policy: config.if_exists,
            strict_schema: config.strict_schema,
            dry_run: config.dry_run,
            verdict,
            existing_schema: existing,
        };
        report.stage = Stage::Planned;

        if plan.dry_run {
            let preview = DryRunPreview::new(&plan, &descriptor);
            self.emit(ImportEvent::DryRunReported {
                preview: preview.clone(),
            });
            report.stage = Stage::DryRunReported;
            return Ok(SourceOutcome::DryRun { preview });
        }

        let (rows, chunks) = self.write(&plan, &table)?;
        report.stage = Stage::Written;
        self.emit(ImportEvent::Written {
            table: plan.target_table.clone(),
            rows,
            chunks,
        });
        Ok(SourceOutcome::Written { rows, chunks })
    }

    /// Write `table` per `plan`, one transaction per chunk.
    ///
    /// The first chunk carries the table setup DDL.
    fn write(&mut self, plan: &ImportPlan, table: &RawTable) -> ImportResult<(u64, usize)> {
        let (columns, setup) = target_layout(plan);
        let sources: Vec<Option<usize>> = columns
            .iter()
            .map(|c| plan.schema.index_of(&c.name))
            .collect();
        let per_chunk = plan.chunk_size.unwrap_or(table.row_count()).max(1);
        let use_existing = TableSetup::UseExisting;

        let mut committed: u64 = 0;
        let mut chunks = 0;
        for (i, raw_rows) in table.rows.chunks(per_chunk).enumerate() {
            let rows: Vec<Vec<CellValue>> = raw_rows
                .iter()
                .map(|row| {
                    columns
                        .iter()
                        .zip(&sources)
                        .map(|(col, idx)| match idx {
                            Some(idx) => CellValue::coerce(
                                row.get(*idx).unwrap_or(&RawValue::Null),
                                col.column_type,
                            ),
                            None => CellValue::Null,
                        })
                        .collect()
                })
                .collect();

            let chunk = ChunkWrite {
                table: &plan.target_table,
                setup: if i == 0 { &setup } else { &use_existing },
                columns: &columns,
                rows: &rows,
            };
            let written = self.store.write_chunk(chunk).map_err(|e| ImportError::Write {
                table: plan.target_table.clone(),
                committed_rows: committed,
                message: e.to_string(),
            })?;
            committed += written as u64;
            chunks += 1;
            self.emit(ImportEvent::ChunkCommitted {
                table: plan.target_table.clone(),
                chunk: i + 1,
                rows: written,
                committed_rows: committed,
            });
        }
        debug!(table = %plan.target_table, committed, chunks, "all chunks committed");
        Ok((committed, chunks))
    }

    fn emit(&self, event: ImportEvent) {
        self.observer.on_event(&event);
    }
}

/// Insert columns and setup DDL for a plan.
///
/// New and replaced tables take the inferred schema. Appends keep the live column order and
/// spelling, widen what the verdict asks for and add inferred columns the table lacks. Source
/// columns map onto live columns by case-insensitive name.
fn target_layout(plan: &ImportPlan) -> (Vec<TargetColumn>, TableSetup) {
    let inferred = || {
        plan.schema
            .columns
            .iter()
            .map(|c| TargetColumn::new(c.name.clone(), c.inferred_type))
            .collect::<Vec<_>>()
    };

    let existing = match (&plan.existing_schema, plan.existing_table_policy) {
        (None, _) => return (inferred(), TableSetup::Create),
        (Some(_), ExistingTablePolicy::Replace) => return (inferred(), TableSetup::Replace),
        (Some(existing), _) => existing,
    };

    let widen = plan.verdict.widenings().to_vec();
    let mut columns: Vec<TargetColumn> = existing
        .columns
        .iter()
        .map(|c| {
            let ty = widen
                .iter()
                .find(|w| w.column.eq_ignore_ascii_case(&c.name))
                .map_or(c.inferred_type, |w| w.to);
            TargetColumn::new(c.name.clone(), ty)
        })
        .collect();
    let add: Vec<TargetColumn> = plan
        .schema
        .columns
        .iter()
        .filter(|c| existing.get(&c.name).is_none())
        .map(|c| TargetColumn::new(c.name.clone(), c.inferred_type))
        .collect();
    columns.extend(add.iter().cloned());

    let setup = if add.is_empty() && widen.is_empty() {
        TableSetup::UseExisting
    } else {
        TableSetup::Evolve { add, widen }
    };
    (columns, setup)
}
