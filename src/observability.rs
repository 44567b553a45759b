//! Import events and observers.
//!
//! The orchestrator reports every decision it makes as an [`ImportEvent`]. Observers turn those
//! into logs: [`TracingObserver`] forwards to `tracing`, [`JsonLinesObserver`] appends one JSON
//! object per event to a file, and [`CompositeObserver`] fans out to several observers.

use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde::Serialize;
use tracing::{error, info, warn};

use crate::orchestrator::{DryRunPreview, Stage};
use crate::plan::CompatibilityVerdict;
use crate::types::ColumnType;

/// Name and type of one inferred column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnSummary {
    /// Column name.
    pub name: String,
    /// Inferred type.
    #[serde(rename = "type")]
    pub column_type: ColumnType,
}

/// Something the orchestrator decided or did.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ImportEvent {
    SchemaInferred {
        origin: String,
        table: String,
        rows: u64,
        columns: Vec<ColumnSummary>,
    },
    AmbiguousColumn {
        origin: String,
        column: String,
        reason: String,
    },
    ChunkPlanned {
        table: String,
        row_count: u64,
        byte_size: u64,
        chunk_size: Option<usize>,
    },
    CompatibilityChecked {
        table: String,
        strict: bool,
        verdict: CompatibilityVerdict,
    },
    ChunkCommitted {
        table: String,
        chunk: usize,
        rows: usize,
        committed_rows: u64,
    },
    Written {
        table: String,
        rows: u64,
        chunks: usize,
    },
    DryRunReported {
        preview: DryRunPreview,
    },
    Skipped {
        origin: String,
        reason: String,
    },
    Aborted {
        origin: String,
        table: Option<String>,
        stage: Stage,
        kind: String,
        reason: String,
        committed_rows: u64,
    },
}

/// Observer hook for import events.
pub trait ImportObserver: Send + Sync {
    /// Called once per event, in the order the orchestrator emits them.
    fn on_event(&self, event: &ImportEvent);
}

/// An observer that fans out events to a list of observers.
#[derive(Default)]
pub struct CompositeObserver {
    observers: Vec<Arc<dyn ImportObserver>>,
}

impl CompositeObserver {
    /// Create a new composite observer from a list of observers.
    pub fn new(observers: Vec<Arc<dyn ImportObserver>>) -> Self {
        Self { observers }
    }
}

impl fmt::Debug for CompositeObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeObserver")
            .field("observers_len", &self.observers.len())
            .finish()
    }
}

impl ImportObserver for CompositeObserver {
    fn on_event(&self, event: &ImportEvent) {
        for o in &self.observers {
            o.on_event(event);
        }
    }
}

/// Forwards events to `tracing`: warnings for ambiguity and skips, errors for aborts.
#[derive(Debug, Default)]
pub struct TracingObserver;

impl ImportObserver for TracingObserver {
    fn on_event(&self, event: &ImportEvent) {
        match event {
            ImportEvent::SchemaInferred {
                origin,
                table,
                rows,
                columns,
            } => {
                let schema: Vec<String> = columns
                    .iter()
                    .map(|c| format!("{}:{}", c.name, c.column_type))
                    .collect();
                info!(%origin, %table, rows, schema = %schema.join(", "), "schema inferred");
            }
            ImportEvent::AmbiguousColumn {
                origin,
                column,
                reason,
            } => warn!(%origin, %column, %reason, "column is mixed/ambiguous, using TEXT"),
            ImportEvent::ChunkPlanned {
                table,
                row_count,
                byte_size,
                chunk_size,
            } => match chunk_size {
                Some(size) => info!(%table, row_count, byte_size, chunk_size = size, "chunked load"),
                None => info!(%table, row_count, byte_size, "single-pass load"),
            },
            ImportEvent::CompatibilityChecked {
                table,
                strict,
                verdict,
            } => info!(%table, strict, %verdict, "compatibility checked"),
            ImportEvent::ChunkCommitted {
                table,
                chunk,
                rows,
                committed_rows,
            } => info!(%table, chunk, rows, committed_rows, "chunk committed"),
            ImportEvent::Written {
                table,
                rows,
                chunks,
            } => info!(%table, rows, chunks, "import completed"),
            ImportEvent::DryRunReported { preview } => info!(
                table = %preview.table,
                rows = preview.row_count,
                columns = preview.column_count,
                "dry run, no data written"
            ),
            ImportEvent::Skipped { origin, reason } => warn!(%origin, %reason, "source skipped"),
            ImportEvent::Aborted {
                origin,
                table,
                stage,
                kind,
                reason,
                committed_rows,
            } => error!(
                %origin,
                table = table.as_deref().unwrap_or("-"),
                ?stage,
                %kind,
                committed_rows,
                "import aborted: {reason}"
            ),
        }
    }
}

/// Appends events to a local file as JSON lines.
///
/// Each line is the serialized event plus a `ts` RFC 3339 timestamp. The file is only ever
/// appended to. Writes are best-effort; failures to open/write the log file are ignored.
#[derive(Debug)]
pub struct JsonLinesObserver {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonLinesObserver {
    /// Create an observer that appends to `path`, creating parent directories if needed.
    pub fn new(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            let _ = fs::create_dir_all(parent);
        }
        Self {
            path,
            lock: Mutex::new(()),
        }
    }

    fn append_line(&self, line: &str) {
        let _guard = self.lock.lock().ok();
        if let Ok(mut f) = OpenOptions::new().create(true).append(true).open(&self.path) {
            let _ = writeln!(f, "{line}");
        }
    }
}

impl ImportObserver for JsonLinesObserver {
    fn on_event(&self, event: &ImportEvent) {
        let Ok(serde_json::Value::Object(fields)) = serde_json::to_value(event) else {
            return;
        };
        let mut line = serde_json::Map::with_capacity(fields.len() + 1);
        line.insert(
            "ts".to_string(),
            serde_json::Value::String(chrono::Utc::now().to_rfc3339()),
        );
        line.extend(fields);
        if let Ok(s) = serde_json::to_string(&line) {
            self.append_line(&s);
        }
    }
}
