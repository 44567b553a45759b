use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tabular_import::config::{ChunkPolicy, ExistingTablePolicy, ImportConfig};
use tabular_import::error::{ImportError, ImportResult};
use tabular_import::ingestion::discover_sources;
use tabular_import::observability::{ImportEvent, ImportObserver};
use tabular_import::orchestrator::{ImportReport, Importer, SourceOutcome, Stage};
use tabular_import::store::{ChunkWrite, SqliteStore, TableStore};
use tabular_import::types::{ColumnType, TableSchema};

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn write_csv(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, contents).unwrap();
    path
}

fn import<S: TableStore>(
    store: S,
    config: &ImportConfig,
    path: &Path,
    table: Option<&str>,
) -> (ImportReport, S) {
    let sources = discover_sources(path, table).unwrap();
    let mut importer = Importer::new(store, config);
    let report = importer.run(&sources);
    (report, importer.into_store())
}

fn column_types(schema: &TableSchema) -> Vec<(&str, ColumnType)> {
    schema
        .columns
        .iter()
        .map(|c| (c.name.as_str(), c.inferred_type))
        .collect()
}

#[derive(Default)]
struct Recording(Mutex<Vec<ImportEvent>>);

impl ImportObserver for Recording {
    fn on_event(&self, event: &ImportEvent) {
        self.0.lock().unwrap().push(event.clone());
    }
}

/// Delegates to SQLite but fails the n-th chunk write (1-based).
struct FlakyStore {
    inner: SqliteStore,
    fail_on: usize,
    calls: usize,
}

impl TableStore for FlakyStore {
    fn describe_table(&self, table: &str) -> ImportResult<Option<TableSchema>> {
        self.inner.describe_table(table)
    }

    fn write_chunk(&mut self, chunk: ChunkWrite<'_>) -> ImportResult<usize> {
        self.calls += 1;
        if self.calls == self.fail_on {
            return Err(ImportError::Database(rusqlite::Error::InvalidQuery));
        }
        self.inner.write_chunk(chunk)
    }
}

#[test]
fn infers_column_types_and_writes_rows() {
    let config = ImportConfig::default();
    let (report, store) = import(
        SqliteStore::open_in_memory().unwrap(),
        &config,
        &fixture("customers.csv"),
        None,
    );

    assert_eq!(report.exit_code(), 0);
    let s = report.for_table("customers").unwrap();
    assert_eq!(s.stage, Stage::Done);
    assert!(matches!(s.outcome, SourceOutcome::Written { rows: 4, chunks: 1 }));

    let schema = store.describe_table("customers").unwrap().unwrap();
    assert_eq!(
        column_types(&schema),
        vec![
            ("id", ColumnType::Integer),
            ("price", ColumnType::Float),
            ("active", ColumnType::Boolean),
            ("signup", ColumnType::DateTime),
            ("name", ColumnType::Text),
        ]
    );

    let (price, active, signup): (Option<f64>, bool, String) = store
        .connection()
        .query_row(
            "SELECT price, active, signup FROM customers WHERE id = 3",
            [],
            |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
        )
        .unwrap();
    assert_eq!(price, None);
    assert!(active);
    assert_eq!(signup, "2024-03-15 08:30:00");
}

#[test]
fn mixed_column_falls_back_to_text_and_is_logged() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_csv(dir.path(), "orders.csv", "id,amount\n1,10\n2,20\n3,abc\n");
    let recording = Arc::new(Recording::default());
    let config = ImportConfig::default();

    let sources = discover_sources(&path, None).unwrap();
    let mut importer = Importer::new(SqliteStore::open_in_memory().unwrap(), &config)
        .with_observer(recording.clone());
    let report = importer.run(&sources);
    assert_eq!(report.exit_code(), 0);

    let schema = importer.store().describe_table("orders").unwrap().unwrap();
    assert_eq!(schema.get("amount").unwrap().inferred_type, ColumnType::Text);

    let events = recording.0.lock().unwrap();
    let reasons: Vec<&str> = events
        .iter()
        .filter_map(|e| match e {
            ImportEvent::AmbiguousColumn { column, reason, .. } if column == "amount" => {
                Some(reason.as_str())
            }
            _ => None,
        })
        .collect();
    assert_eq!(reasons.len(), 1);
    assert!(reasons[0].contains("2 of 3"), "{}", reasons[0]);
    assert!(reasons[0].contains("\"abc\" at data row 3"), "{}", reasons[0]);
}

#[test]
fn fail_policy_leaves_existing_table_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_csv(dir.path(), "t.csv", "a,b\n1,x\n2,y\n");
    let config = ImportConfig::default();

    let (first, store) = import(SqliteStore::open_in_memory().unwrap(), &config, &path, None);
    assert_eq!(first.exit_code(), 0);

    let (second, store) = import(store, &config, &path, None);
    assert_eq!(second.exit_code(), 1);
    let s = &second.sources[0];
    assert!(matches!(s.error(), Some(ImportError::TableExists { table }) if table == "t"));
    assert_eq!(s.rows_committed(), 0);
    assert_eq!(store.row_count("t").unwrap(), 2);
}

#[test]
fn dry_run_reports_without_creating_the_table() {
    let config = ImportConfig {
        dry_run: true,
        ..ImportConfig::default()
    };
    let (report, store) = import(
        SqliteStore::open_in_memory().unwrap(),
        &config,
        &fixture("customers.csv"),
        Some("Customer Master"),
    );

    assert_eq!(report.exit_code(), 0);
    let s = &report.sources[0];
    assert_eq!(s.table.as_deref(), Some("customer_master"));
    let SourceOutcome::DryRun { preview } = &s.outcome else {
        panic!("expected a dry run, got {:?}", s.outcome);
    };
    assert_eq!(preview.row_count, 4);
    assert_eq!(preview.column_count, 5);
    assert_eq!(preview.chunk_size, None);
    assert!(!preview.table_exists);
    assert!(store.describe_table("customer_master").unwrap().is_none());
}

#[test]
fn strict_append_widens_integer_column_to_float() {
    let dir = tempfile::tempdir().unwrap();
    let ints = write_csv(dir.path(), "m.csv", "id,score\n1,5\n2,7\n");
    let floats = write_csv(dir.path(), "m2.csv", "id,score\n3,2.5\n");

    let (_, store) = import(
        SqliteStore::open_in_memory().unwrap(),
        &ImportConfig::default(),
        &ints,
        Some("m"),
    );
    let config = ImportConfig {
        if_exists: ExistingTablePolicy::Append,
        strict_schema: true,
        ..ImportConfig::default()
    };
    let (report, store) = import(store, &config, &floats, Some("m"));

    assert_eq!(report.exit_code(), 0);
    let schema = store.describe_table("m").unwrap().unwrap();
    assert_eq!(
        column_types(&schema),
        vec![("id", ColumnType::Integer), ("score", ColumnType::Float)]
    );
    assert_eq!(store.row_count("m").unwrap(), 3);
    let total: f64 = store
        .connection()
        .query_row("SELECT SUM(score) FROM m", [], |r| r.get(0))
        .unwrap();
    assert_eq!(total, 14.5);
}

#[test]
fn strict_append_rejects_text_into_integer_column() {
    let dir = tempfile::tempdir().unwrap();
    let ints = write_csv(dir.path(), "m.csv", "id,code\n7,10\n");
    let text = write_csv(dir.path(), "m2.csv", "id,code\n8,A-7\n");

    let (_, store) = import(
        SqliteStore::open_in_memory().unwrap(),
        &ImportConfig::default(),
        &ints,
        Some("m"),
    );
    let config = ImportConfig {
        if_exists: ExistingTablePolicy::Append,
        strict_schema: true,
        ..ImportConfig::default()
    };
    let (report, store) = import(store, &config, &text, Some("m"));

    let s = &report.sources[0];
    assert_eq!(s.stage, Stage::CompatibilityChecked);
    let Some(ImportError::SchemaIncompatible { reason, .. }) = s.error() else {
        panic!("expected schema incompatibility, got {:?}", s.outcome);
    };
    assert!(reason.contains("'code' is INTEGER in table but inferred as TEXT"), "{reason}");
    assert_eq!(store.row_count("m").unwrap(), 1);
}

#[test]
fn relaxed_append_adds_new_columns() {
    let dir = tempfile::tempdir().unwrap();
    let first = write_csv(dir.path(), "e.csv", "id\n5\n");
    let second = write_csv(dir.path(), "e2.csv", "id,note\n6,late\n");

    let (_, store) = import(
        SqliteStore::open_in_memory().unwrap(),
        &ImportConfig::default(),
        &first,
        Some("e"),
    );
    let config = ImportConfig {
        if_exists: ExistingTablePolicy::Append,
        ..ImportConfig::default()
    };
    let (report, store) = import(store, &config, &second, Some("e"));

    assert_eq!(report.exit_code(), 0);
    let schema = store.describe_table("e").unwrap().unwrap();
    assert_eq!(
        column_types(&schema),
        vec![("id", ColumnType::Integer), ("note", ColumnType::Text)]
    );
    assert_eq!(store.row_count("e").unwrap(), 2);
}

#[test]
fn replace_recreates_table_from_new_schema() {
    let dir = tempfile::tempdir().unwrap();
    let old = write_csv(dir.path(), "r.csv", "a,b\n1,2\n3,4\n5,6\n");
    let new = write_csv(dir.path(), "r2.csv", "a\nhello\n");

    let (_, store) = import(
        SqliteStore::open_in_memory().unwrap(),
        &ImportConfig::default(),
        &old,
        Some("r"),
    );
    let config = ImportConfig {
        if_exists: ExistingTablePolicy::Replace,
        ..ImportConfig::default()
    };
    let (report, store) = import(store, &config, &new, Some("r"));

    assert_eq!(report.exit_code(), 0);
    let schema = store.describe_table("r").unwrap().unwrap();
    assert_eq!(column_types(&schema), vec![("a", ColumnType::Text)]);
    assert_eq!(store.row_count("r").unwrap(), 1);
}

#[test]
fn replace_that_fails_in_the_database_keeps_the_old_table() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_csv(dir.path(), "r.csv", "id,label\n9,new\n");
    let store = SqliteStore::open_in_memory().unwrap();
    store
        .connection()
        .execute_batch(
            "PRAGMA foreign_keys = ON;
             CREATE TABLE r (id INTEGER PRIMARY KEY, label TEXT);
             INSERT INTO r VALUES (5, 'old'), (6, 'older');
             CREATE TABLE child (r_id INTEGER REFERENCES r(id));
             INSERT INTO child VALUES (5);",
        )
        .unwrap();
    let config = ImportConfig {
        if_exists: ExistingTablePolicy::Replace,
        ..ImportConfig::default()
    };

    let (report, store) = import(store, &config, &path, Some("r"));

    assert_eq!(report.exit_code(), 1);
    let s = &report.sources[0];
    assert_eq!(s.error().map(ImportError::kind), Some("write"));
    assert_eq!(s.rows_committed(), 0);
    let schema = store.describe_table("r").unwrap().unwrap();
    assert_eq!(
        column_types(&schema),
        vec![("id", ColumnType::Integer), ("label", ColumnType::Text)]
    );
    let labels: Vec<String> = store
        .connection()
        .prepare("SELECT label FROM r ORDER BY id")
        .unwrap()
        .query_map([], |r| r.get(0))
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(labels, vec!["old", "older"]);
}

#[test]
fn dry_run_leaves_existing_table_unchanged() {
    let dir = tempfile::tempdir().unwrap();
    let old = write_csv(dir.path(), "t.csv", "a,b\n5,x\n6,y\n");
    let wider = write_csv(dir.path(), "t2.csv", "a,b,c\n7,z,extra\n");
    let (_, mut store) = import(
        SqliteStore::open_in_memory().unwrap(),
        &ImportConfig::default(),
        &old,
        Some("t"),
    );

    for policy in [ExistingTablePolicy::Replace, ExistingTablePolicy::Append] {
        let config = ImportConfig {
            if_exists: policy,
            dry_run: true,
            ..ImportConfig::default()
        };
        let (report, after) = import(store, &config, &wider, Some("t"));
        store = after;

        assert_eq!(report.exit_code(), 0, "{policy}");
        let SourceOutcome::DryRun { preview } = &report.sources[0].outcome else {
            panic!("expected a dry run, got {:?}", report.sources[0].outcome);
        };
        assert!(preview.table_exists);
        assert_eq!(preview.column_count, 3);
        let schema = store.describe_table("t").unwrap().unwrap();
        assert_eq!(
            column_types(&schema),
            vec![("a", ColumnType::Integer), ("b", ColumnType::Text)],
            "{policy}"
        );
        assert_eq!(store.row_count("t").unwrap(), 2, "{policy}");
    }
}

#[test]
fn dry_run_predicts_strict_rejection() {
    let dir = tempfile::tempdir().unwrap();
    let ints = write_csv(dir.path(), "m.csv", "id,code\n7,10\n");
    let text = write_csv(dir.path(), "m2.csv", "id,code\n8,A-7\n");
    let (_, store) = import(
        SqliteStore::open_in_memory().unwrap(),
        &ImportConfig::default(),
        &ints,
        Some("m"),
    );
    let real = ImportConfig {
        if_exists: ExistingTablePolicy::Append,
        strict_schema: true,
        ..ImportConfig::default()
    };
    let dry = ImportConfig {
        dry_run: true,
        ..real.clone()
    };

    let (predicted, store) = import(store, &dry, &text, Some("m"));
    let (actual, store) = import(store, &real, &text, Some("m"));

    for report in [&predicted, &actual] {
        assert_eq!(report.exit_code(), 1);
        assert_eq!(report.sources[0].stage, Stage::CompatibilityChecked);
        assert!(matches!(
            report.sources[0].error(),
            Some(ImportError::SchemaIncompatible { .. })
        ));
    }
    assert_eq!(
        predicted.sources[0].error().map(ToString::to_string),
        actual.sources[0].error().map(ToString::to_string)
    );
    assert_eq!(store.row_count("m").unwrap(), 1);
}

#[test]
fn append_matches_existing_columns_ignoring_case() {
    let dir = tempfile::tempdir().unwrap();
    let first = write_csv(dir.path(), "p.csv", "ID,Name\n5,ann\n6,bob\n");
    let lower = write_csv(dir.path(), "p2.csv", "id,name\n7,cy\n");
    let (_, mut store) = import(
        SqliteStore::open_in_memory().unwrap(),
        &ImportConfig::default(),
        &first,
        Some("people"),
    );

    for strict_schema in [false, true] {
        let config = ImportConfig {
            if_exists: ExistingTablePolicy::Append,
            strict_schema,
            ..ImportConfig::default()
        };
        let (report, after) = import(store, &config, &lower, Some("people"));
        store = after;
        assert_eq!(report.exit_code(), 0, "strict={strict_schema}: {report}");
    }

    let schema = store.describe_table("people").unwrap().unwrap();
    assert_eq!(
        column_types(&schema),
        vec![("ID", ColumnType::Integer), ("Name", ColumnType::Text)]
    );
    assert_eq!(store.row_count("people").unwrap(), 4);
    let names: Vec<String> = store
        .connection()
        .prepare("SELECT Name FROM people ORDER BY ID")
        .unwrap()
        .query_map([], |r| r.get(0))
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(names, vec!["ann", "bob", "cy", "cy"]);
}

#[test]
fn headers_differing_only_in_case_abort() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_csv(dir.path(), "dup.csv", "Name,name\nann,bob\n");

    let (report, store) = import(
        SqliteStore::open_in_memory().unwrap(),
        &ImportConfig::default(),
        &path,
        None,
    );
    let s = &report.sources[0];
    assert_eq!(s.error().map(ImportError::kind), Some("inference"));
    assert!(store.describe_table("dup").unwrap().is_none());
}

#[test]
fn large_sources_are_written_in_chunks() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_csv(dir.path(), "big.csv", "n\n1\n2\n3\n4\n5\n");
    let config = ImportConfig {
        chunking: ChunkPolicy {
            row_threshold: 3,
            byte_threshold: u64::MAX,
            chunk_size: 2,
        },
        ..ImportConfig::default()
    };

    let (report, store) = import(SqliteStore::open_in_memory().unwrap(), &config, &path, None);
    assert!(matches!(
        report.sources[0].outcome,
        SourceOutcome::Written { rows: 5, chunks: 3 }
    ));
    assert_eq!(store.row_count("big").unwrap(), 5);
}

#[test]
fn failed_chunk_reports_rows_already_committed() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_csv(dir.path(), "big.csv", "n\n1\n2\n3\n4\n5\n");
    let config = ImportConfig {
        chunking: ChunkPolicy {
            row_threshold: 3,
            byte_threshold: u64::MAX,
            chunk_size: 2,
        },
        ..ImportConfig::default()
    };
    let flaky = FlakyStore {
        inner: SqliteStore::open_in_memory().unwrap(),
        fail_on: 2,
        calls: 0,
    };

    let (report, store) = import(flaky, &config, &path, None);
    assert_eq!(report.exit_code(), 1);
    let s = &report.sources[0];
    assert_eq!(s.stage, Stage::Planned);
    assert!(matches!(
        s.error(),
        Some(ImportError::Write { committed_rows: 2, .. })
    ));
    assert_eq!(s.rows_committed(), 2);
    assert_eq!(store.inner.row_count("big").unwrap(), 2);
}

#[test]
fn colliding_names_in_one_run_get_suffixes() {
    let dir = tempfile::tempdir().unwrap();
    let a = write_csv(dir.path(), "Sales.csv", "x\n1\n");
    let b = write_csv(dir.path(), "sales!.csv", "x\n2\n");
    let config = ImportConfig::default();

    let mut sources = discover_sources(&a, None).unwrap();
    sources.extend(discover_sources(&b, None).unwrap());
    let mut importer = Importer::new(SqliteStore::open_in_memory().unwrap(), &config);
    let report = importer.run(&sources);

    let tables: Vec<_> = report.sources.iter().map(|s| s.table.as_deref()).collect();
    assert_eq!(tables, vec![Some("sales"), Some("sales_2")]);
    assert_eq!(importer.store().row_count("sales_2").unwrap(), 1);
}

#[test]
fn header_only_csv_aborts() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_csv(dir.path(), "empty.csv", "a,b\n");

    let (report, store) = import(
        SqliteStore::open_in_memory().unwrap(),
        &ImportConfig::default(),
        &path,
        None,
    );
    let s = &report.sources[0];
    assert_eq!(s.stage, Stage::Scanned);
    assert_eq!(s.error().map(ImportError::kind), Some("inference"));
    assert!(store.describe_table("empty").unwrap().is_none());
}

#[test]
fn report_serializes_for_json_output() {
    let (report, _) = import(
        SqliteStore::open_in_memory().unwrap(),
        &ImportConfig::default(),
        &fixture("customers.csv"),
        None,
    );
    let json = serde_json::to_value(&report).unwrap();
    let s = &json["sources"][0];
    assert_eq!(s["table"], "customers");
    assert_eq!(s["stage"], "done");
    assert_eq!(s["outcome"]["status"], "written");
    assert_eq!(s["outcome"]["rows"], 4);
}
