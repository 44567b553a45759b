//! Schema compatibility checks for imports into existing tables.

use std::fmt;

use serde::Serialize;

use crate::types::{ColumnType, TableSchema};

/// An existing column that must change type before the import can be written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Widening {
    /// Existing column name.
    pub column: String,
    /// Current type.
    pub from: ColumnType,
    /// Type after widening.
    pub to: ColumnType,
}

/// Result of comparing an inferred schema with a live table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum CompatibilityVerdict {
    /// The import may proceed, after applying `widenings` (if any).
    Compatible { widenings: Vec<Widening> },
    /// Strict mode rejects the import.
    Incompatible { reason: String },
    /// No existing table to compare with.
    NotApplicable,
}

impl CompatibilityVerdict {
    /// Whether the import must be rejected.
    pub fn is_incompatible(&self) -> bool {
        matches!(self, CompatibilityVerdict::Incompatible { .. })
    }

    /// Widenings to apply before writing; empty unless compatible-with-widening.
    pub fn widenings(&self) -> &[Widening] {
        match self {
            CompatibilityVerdict::Compatible { widenings } => widenings,
            _ => &[],
        }
    }
}

impl fmt::Display for CompatibilityVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompatibilityVerdict::Compatible { widenings } if widenings.is_empty() => {
                f.write_str("compatible")
            }
            CompatibilityVerdict::Compatible { widenings } => {
                let cols: Vec<String> = widenings
                    .iter()
                    .map(|w| format!("{} {}->{}", w.column, w.from, w.to))
                    .collect();
                write!(f, "compatible (widen {})", cols.join(", "))
            }
            CompatibilityVerdict::Incompatible { reason } => write!(f, "incompatible: {reason}"),
            CompatibilityVerdict::NotApplicable => f.write_str("not applicable (table absent)"),
        }
    }
}

enum Fit {
    Exact,
    Widen,
    Reject,
}

fn fit(existing: ColumnType, inferred: ColumnType) -> Fit {
    use ColumnType::*;
    match (existing, inferred) {
        (e, i) if e == i => Fit::Exact,
        (Text, _) => Fit::Exact,
        (Float, Integer) => Fit::Exact,
        (Integer, Float) => Fit::Widen,
        _ => Fit::Reject,
    }
}

/// Compare an inferred schema against an existing table's schema.
///
/// - `existing == None`: [`CompatibilityVerdict::NotApplicable`]
/// - `strict == false`: always compatible; drift is left to the writer
/// - `strict == true`: every inferred column must exist (names compare case-insensitively) with
///   an equal or acceptable type.
///   TEXT accepts anything, FLOAT accepts INTEGER, INTEGER widens to FLOAT, DATETIME and
///   BOOLEAN need an exact match. Existing columns missing from the source are fine.
///
/// Neither schema is modified.
pub fn check_compatibility(
    existing: Option<&TableSchema>,
    inferred: &TableSchema,
    strict: bool,
) -> CompatibilityVerdict {
    let Some(existing) = existing else {
        return CompatibilityVerdict::NotApplicable;
    };
    if !strict {
        return CompatibilityVerdict::Compatible {
            widenings: Vec::new(),
        };
    }

    let mut problems: Vec<String> = Vec::new();
    let mut widenings: Vec<Widening> = Vec::new();
    for col in &inferred.columns {
        let Some(live) = existing.get(&col.name) else {
            problems.push(format!("column '{}' does not exist in table", col.name));
            continue;
        };
        match fit(live.inferred_type, col.inferred_type) {
            Fit::Exact => {}
            Fit::Widen => widenings.push(Widening {
                column: live.name.clone(),
                from: live.inferred_type,
                to: col.inferred_type,
            }),
            Fit::Reject => problems.push(format!(
                "column '{}' is {} in table but inferred as {}",
                col.name, live.inferred_type, col.inferred_type
            )),
        }
    }

    if problems.is_empty() {
        CompatibilityVerdict::Compatible { widenings }
    } else {
        CompatibilityVerdict::Incompatible {
            reason: problems.join("; "),
        }
    }
}
