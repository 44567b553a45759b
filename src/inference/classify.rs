//! Column value classification.

use crate::types::{ColumnType, RawValue};

use super::parse::{parse_bool, parse_datetime, parse_float, parse_integer, BoolFamily};

/// Outcome of classifying one column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    /// Best-fit target type.
    pub column_type: ColumnType,
    /// Set when some values looked typed but the column fell back to text.
    pub ambiguous: bool,
    /// Human-readable explanation when `ambiguous` is set.
    pub reason: Option<String>,
}

impl Classification {
    fn clean(column_type: ColumnType) -> Self {
        Self {
            column_type,
            ambiguous: false,
            reason: None,
        }
    }
}

/// Classify a column of raw values into the strongest type every non-null value satisfies.
///
/// Attempts run in priority order BOOLEAN, INTEGER, FLOAT, DATETIME; a single
/// non-conforming value demotes the column to the next attempt and finally to TEXT.
/// Blank text counts as null; an empty or all-null column is TEXT and not ambiguous.
pub fn classify<'a, I>(values: I) -> Classification
where
    I: IntoIterator<Item = &'a RawValue>,
{
    // (1-based position in the column, value)
    let non_null: Vec<(usize, &RawValue)> = values
        .into_iter()
        .enumerate()
        .filter(|(_, v)| !v.is_null())
        .map(|(i, v)| (i + 1, v))
        .collect();

    if non_null.is_empty() {
        return Classification::clean(ColumnType::Text);
    }

    if is_boolean_column(&non_null) {
        return Classification::clean(ColumnType::Boolean);
    }
    if non_null.iter().all(|(_, v)| parse_integer(v).is_some()) {
        return Classification::clean(ColumnType::Integer);
    }
    if non_null.iter().all(|(_, v)| parse_float(v).is_some()) {
        return Classification::clean(ColumnType::Float);
    }
    if non_null.iter().all(|(_, v)| parse_datetime(v).is_some()) {
        return Classification::clean(ColumnType::DateTime);
    }

    explain_text_fallback(&non_null)
}

fn is_boolean_column(values: &[(usize, &RawValue)]) -> bool {
    let mut family: Option<BoolFamily> = None;
    for (_, v) in values {
        match parse_bool(v) {
            Some((_, f)) => match family {
                None => family = Some(f),
                Some(existing) if existing != f => return false,
                Some(_) => {}
            },
            None => return false,
        }
    }
    true
}

fn explain_text_fallback(values: &[(usize, &RawValue)]) -> Classification {
    let attempts: [(ColumnType, fn(&RawValue) -> bool); 4] = [
        (ColumnType::Boolean, |v| parse_bool(v).is_some()),
        (ColumnType::Integer, |v| parse_integer(v).is_some()),
        (ColumnType::Float, |v| parse_float(v).is_some()),
        (ColumnType::DateTime, |v| parse_datetime(v).is_some()),
    ];

    let mut best: Option<(ColumnType, usize, fn(&RawValue) -> bool)> = None;
    for (ty, check) in attempts {
        let n = values.iter().filter(|(_, v)| check(v)).count();
        if n > 0 && best.is_none_or(|(_, best_n, _)| n > best_n) {
            best = Some((ty, n, check));
        }
    }

    let Some((ty, conforming, check)) = best else {
        return Classification::clean(ColumnType::Text);
    };

    let total = values.len();
    let reason = match values.iter().find(|(_, v)| !check(v)) {
        Some((row, v)) => format!(
            "{conforming} of {total} non-null values parse as {ty}; first non-conforming value {:?} at data row {row}",
            v.render()
        ),
        None => format!("all {total} non-null values are boolean tokens but mix true/false, yes/no and 1/0 spellings"),
    };

    Classification {
        column_type: ColumnType::Text,
        ambiguous: true,
        reason: Some(reason),
    }
}
