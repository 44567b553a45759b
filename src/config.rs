//! Run configuration.
//!
//! [`ImportConfig`] is built once at startup (the binary fills it from flags, environment and
//! `.env`) and passed by reference to the [`crate::orchestrator::Importer`].

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::{ImportError, ImportResult};

/// What to do when the target table already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExistingTablePolicy {
    /// Drop and recreate the table.
    Replace,
    /// Insert into the existing table.
    Append,
    /// Abort the source.
    #[default]
    Fail,
}

impl FromStr for ExistingTablePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "replace" => Ok(Self::Replace),
            "append" => Ok(Self::Append),
            "fail" => Ok(Self::Fail),
            other => Err(format!(
                "invalid if-exists policy '{other}' (expected replace, append or fail)"
            )),
        }
    }
}

impl fmt::Display for ExistingTablePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Replace => "replace",
            Self::Append => "append",
            Self::Fail => "fail",
        })
    }
}

/// Thresholds controlling when a source is written in chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChunkPolicy {
    /// Sources with more rows than this are chunked.
    pub row_threshold: u64,
    /// Sources larger than this many bytes are chunked.
    pub byte_threshold: u64,
    /// Rows per chunk when chunking.
    pub chunk_size: usize,
}

impl ChunkPolicy {
    /// Default rows per chunk.
    pub const DEFAULT_CHUNK_SIZE: usize = 50_000;
    /// Default row threshold.
    pub const DEFAULT_ROW_THRESHOLD: u64 = 100_000;
    /// Default byte threshold (200 MiB).
    pub const DEFAULT_BYTE_THRESHOLD: u64 = 200 * 1024 * 1024;
}

impl Default for ChunkPolicy {
    fn default() -> Self {
        Self {
            row_threshold: Self::DEFAULT_ROW_THRESHOLD,
            byte_threshold: Self::DEFAULT_BYTE_THRESHOLD,
            chunk_size: Self::DEFAULT_CHUNK_SIZE,
        }
    }
}

/// Options for a whole import run.
///
/// Use [`Default`] for common cases and override fields as needed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportConfig {
    /// Connection string for the destination store.
    pub database_url: String,
    /// Existing-table policy applied to every source.
    pub if_exists: ExistingTablePolicy,
    /// Reject imports whose inferred schema does not fit the existing table.
    pub strict_schema: bool,
    /// Plan and report only; never mutate the database.
    pub dry_run: bool,
    /// Chunking thresholds.
    pub chunking: ChunkPolicy,
    /// Maximum table identifier length (63 matches PostgreSQL).
    pub max_identifier_len: usize,
    /// Classify at most this many rows per column. `None` classifies every row.
    pub sample_rows: Option<usize>,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite::memory:".to_string(),
            if_exists: ExistingTablePolicy::default(),
            strict_schema: false,
            dry_run: false,
            chunking: ChunkPolicy::default(),
            max_identifier_len: 63,
            sample_rows: None,
        }
    }
}

impl ImportConfig {
    /// Smallest identifier length that still leaves room for collision suffixes.
    pub const MIN_IDENTIFIER_LEN: usize = 8;

    /// Check values that would otherwise fail deep inside a run.
    pub fn validate(&self) -> ImportResult<()> {
        if self.database_url.trim().is_empty() {
            return Err(ImportError::config(
                "database url is empty (set DB_URL or pass --database-url)",
            ));
        }
        if self.chunking.chunk_size == 0 {
            return Err(ImportError::config("chunk size must be > 0"));
        }
        if self.max_identifier_len < Self::MIN_IDENTIFIER_LEN {
            return Err(ImportError::config(format!(
                "max identifier length must be >= {}",
                Self::MIN_IDENTIFIER_LEN
            )));
        }
        if self.sample_rows == Some(0) {
            return Err(ImportError::config("sample rows must be > 0 when set"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy_parses_case_insensitively() {
        assert_eq!("Replace".parse::<ExistingTablePolicy>(), Ok(ExistingTablePolicy::Replace));
        assert_eq!("append".parse::<ExistingTablePolicy>(), Ok(ExistingTablePolicy::Append));
        assert_eq!("FAIL".parse::<ExistingTablePolicy>(), Ok(ExistingTablePolicy::Fail));
        assert!("upsert".parse::<ExistingTablePolicy>().is_err());
    }

    #[test]
    fn default_config_is_valid() {
        ImportConfig::default().validate().unwrap();
    }

    #[test]
    fn zero_chunk_size_is_rejected() {
        let cfg = ImportConfig {
            chunking: ChunkPolicy {
                chunk_size: 0,
                ..Default::default()
            },
            ..Default::default()
        };
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("chunk size"));
    }

    #[test]
    fn empty_database_url_is_rejected() {
        let cfg = ImportConfig {
            database_url: "  ".to_string(),
            ..Default::default()
        };
        assert_eq!(cfg.validate().unwrap_err().kind(), "config");
    }
}
