//! Table name sanitization.

use std::collections::HashSet;

use crate::error::{ImportError, ImportResult};

/// Turn an arbitrary file or sheet name into a safe, unique table identifier.
///
/// Rules, in order:
///
/// - lower-case; every char outside `[a-z0-9_]` becomes `_`
/// - runs of `_` collapse to one; leading/trailing `_` are trimmed
/// - a leading digit gets a `t_` prefix
/// - truncated to `max_len`
/// - on collision with `used`, `_2`, `_3`, ... is appended (the base shrinks to fit)
///
/// The returned name is inserted into `used`.
///
/// # Errors
///
/// Returns [`ImportError::Sanitization`] when nothing valid is left of `raw`, or no unique
/// name fits within `max_len`.
pub fn sanitize_table_name(
    raw: &str,
    used: &mut HashSet<String>,
    max_len: usize,
) -> ImportResult<String> {
    let fail = |message: String| ImportError::Sanitization {
        raw: raw.to_owned(),
        message,
    };

    let mut base = normalize(raw);
    if base.is_empty() {
        return Err(fail("no letters or digits left after sanitizing".to_string()));
    }
    if base.starts_with(|c: char| c.is_ascii_digit()) {
        base.insert_str(0, "t_");
    }
    let base = truncate(&base, max_len);
    if base.is_empty() {
        return Err(fail(format!("name does not fit in {max_len} characters")));
    }

    if !used.contains(base) {
        used.insert(base.to_owned());
        return Ok(base.to_owned());
    }

    for n in 2usize.. {
        let suffix = format!("_{n}");
        if suffix.len() >= max_len {
            break;
        }
        let candidate = format!("{}{suffix}", truncate(base, max_len - suffix.len()));
        if !used.contains(&candidate) {
            used.insert(candidate.clone());
            return Ok(candidate);
        }
    }

    Err(fail(format!(
        "no unique name fits in {max_len} characters"
    )))
}

fn normalize(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars().flat_map(char::to_lowercase) {
        let c = if c.is_ascii_lowercase() || c.is_ascii_digit() {
            c
        } else {
            '_'
        };
        if c == '_' && out.ends_with('_') {
            continue;
        }
        out.push(c);
    }
    out.trim_matches('_').to_owned()
}

/// Truncate ASCII `s` to `max_len` bytes and drop any `_` left dangling at the end.
fn truncate(s: &str, max_len: usize) -> &str {
    s[..s.len().min(max_len)].trim_end_matches('_')
}
