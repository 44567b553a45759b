//! Chunk planning.

use crate::config::ChunkPolicy;

/// Decide whether a source is written in one pass or in chunks.
///
/// Returns `Some(policy.chunk_size)` when either size exceeds its threshold, otherwise `None`
/// (single transaction). Deterministic and monotonic in both inputs.
pub fn plan_chunks(row_count: u64, byte_size: u64, policy: &ChunkPolicy) -> Option<usize> {
    if row_count > policy.row_threshold || byte_size > policy.byte_threshold {
        Some(policy.chunk_size)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> ChunkPolicy {
        ChunkPolicy {
            row_threshold: 1_000,
            byte_threshold: 10_000,
            chunk_size: 250,
        }
    }

    #[test]
    fn small_sources_are_single_pass() {
        assert_eq!(plan_chunks(0, 0, &policy()), None);
        assert_eq!(plan_chunks(1_000, 10_000, &policy()), None);
    }

    #[test]
    fn either_threshold_triggers_chunking() {
        assert_eq!(plan_chunks(1_001, 10, &policy()), Some(250));
        assert_eq!(plan_chunks(10, 10_001, &policy()), Some(250));
    }

    #[test]
    fn growing_row_count_never_reverts_to_single_pass() {
        let p = policy();
        let mut chunked = false;
        for rows in (0..5_000).step_by(37) {
            let decision = plan_chunks(rows, 0, &p);
            if chunked {
                assert_eq!(decision, Some(250), "rows={rows}");
            }
            chunked |= decision.is_some();
        }
        assert!(chunked);
    }

    #[test]
    fn defaults_match_documented_values() {
        let p = ChunkPolicy::default();
        assert_eq!(p.chunk_size, 50_000);
        assert_eq!(plan_chunks(50, 200 * 1024 * 1024 + 1, &p), Some(50_000));
    }
}
