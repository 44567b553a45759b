//! SQLite-backed [`TableStore`].

use std::path::PathBuf;

use rusqlite::types::{ToSqlOutput, Value, ValueRef};
use rusqlite::{params_from_iter, Connection, OpenFlags, ToSql};
use tracing::debug;

use crate::error::{ImportError, ImportResult};
use crate::plan::Widening;
use crate::types::{ColumnType, TableSchema};

use super::{CellValue, ChunkWrite, TableSetup, TableStore, TargetColumn};

/// Where a connection string points.
#[derive(Debug, Clone, PartialEq, Eq)]
enum SqliteTarget {
    Memory,
    File(PathBuf),
}

/// A [`TableStore`] over a single SQLite connection.
#[derive(Debug)]
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open a store from a connection string.
    ///
    /// Accepted forms: `sqlite::memory:`, `:memory:`, `sqlite://<path>`, `sqlite:<path>`,
    /// `file:<path>`, or a bare file path. A `?query` suffix is ignored.
    ///
    /// # Errors
    ///
    /// Returns [`ImportError::Config`] for other URL schemes (e.g. `postgres://`) and
    /// [`ImportError::Database`] when the database cannot be opened.
    pub fn connect(url: &str) -> ImportResult<Self> {
        let conn = match parse_url(url)? {
            SqliteTarget::Memory => Connection::open_in_memory()?,
            SqliteTarget::File(path) => Connection::open(path)?,
        };
        Ok(Self { conn })
    }

    /// Open a store that never modifies the database, for dry runs.
    ///
    /// A file database is opened read-only. A missing file is not created; it is treated as a
    /// database with no tables.
    ///
    /// # Errors
    ///
    /// Same as [`SqliteStore::connect`].
    pub fn connect_read_only(url: &str) -> ImportResult<Self> {
        let conn = match parse_url(url)? {
            SqliteTarget::File(path) if path.exists() => {
                Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)?
            }
            _ => Connection::open_in_memory()?,
        };
        Ok(Self { conn })
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> ImportResult<Self> {
        Ok(Self {
            conn: Connection::open_in_memory()?,
        })
    }

    /// Wrap an existing connection.
    pub fn from_connection(conn: Connection) -> Self {
        Self { conn }
    }

    /// Borrow the underlying connection.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Number of rows in `table`.
    pub fn row_count(&self, table: &str) -> ImportResult<u64> {
        let sql = format!("SELECT COUNT(*) FROM {}", quote_ident(table));
        let n: i64 = self.conn.query_row(&sql, [], |row| row.get(0))?;
        Ok(n as u64)
    }
}

impl TableStore for SqliteStore {
    fn describe_table(&self, table: &str) -> ImportResult<Option<TableSchema>> {
        let cols = table_columns(&self.conn, table)?;
        if cols.is_empty() {
            return Ok(None);
        }
        Ok(Some(TableSchema::from_declared(
            cols.into_iter()
                .map(|(name, declared)| (name, ColumnType::from_declared(&declared))),
        )))
    }

    fn write_chunk(&mut self, chunk: ChunkWrite<'_>) -> ImportResult<usize> {
        let tx = self.conn.transaction()?;
        apply_setup(&tx, &chunk)?;
        let inserted = insert_rows(&tx, &chunk)?;
        tx.commit()?;
        debug!(table = chunk.table, rows = inserted, "sqlite chunk committed");
        Ok(inserted)
    }
}

impl ToSql for CellValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            CellValue::Null => ToSqlOutput::Owned(Value::Null),
            CellValue::Integer(i) => ToSqlOutput::Owned(Value::Integer(*i)),
            CellValue::Real(f) => ToSqlOutput::Owned(Value::Real(*f)),
            CellValue::Boolean(b) => ToSqlOutput::Owned(Value::Integer(i64::from(*b))),
            CellValue::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
        })
    }
}

fn parse_url(url: &str) -> ImportResult<SqliteTarget> {
    let url = url.trim();
    let url = url.split_once('?').map_or(url, |(head, _)| head);

    if matches!(url, "sqlite::memory:" | ":memory:" | "sqlite://:memory:") {
        return Ok(SqliteTarget::Memory);
    }
    for prefix in ["sqlite://", "sqlite:", "file:"] {
        if let Some(rest) = url.strip_prefix(prefix) {
            if rest.is_empty() {
                break;
            }
            return Ok(SqliteTarget::File(PathBuf::from(rest)));
        }
    }
    if url.is_empty() || url.contains("://") {
        return Err(ImportError::config(format!(
            "unsupported database url '{url}' (expected sqlite://<path> or sqlite::memory:)"
        )));
    }
    Ok(SqliteTarget::File(PathBuf::from(url)))
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// `(name, declared type)` pairs in column order; empty if the table does not exist.
fn table_columns(conn: &Connection, table: &str) -> rusqlite::Result<Vec<(String, String)>> {
    let mut stmt = conn.prepare("SELECT name, type FROM pragma_table_info(?1) ORDER BY cid")?;
    let rows = stmt.query_map([table], |row| {
        let name: String = row.get(0)?;
        let declared: Option<String> = row.get(1)?;
        Ok((name, declared.unwrap_or_default()))
    })?;
    rows.collect()
}

fn create_table_sql(table: &str, columns: &[TargetColumn]) -> String {
    let cols: Vec<String> = columns
        .iter()
        .map(|c| format!("{} {}", quote_ident(&c.name), c.column_type.sql_type()))
        .collect();
    format!("CREATE TABLE {} ({})", quote_ident(table), cols.join(", "))
}

fn apply_setup(conn: &Connection, chunk: &ChunkWrite<'_>) -> rusqlite::Result<()> {
    match chunk.setup {
        TableSetup::UseExisting => Ok(()),
        TableSetup::Create => conn.execute_batch(&create_table_sql(chunk.table, chunk.columns)),
        TableSetup::Replace => {
            conn.execute_batch(&format!("DROP TABLE IF EXISTS {}", quote_ident(chunk.table)))?;
            conn.execute_batch(&create_table_sql(chunk.table, chunk.columns))
        }
        TableSetup::Evolve { add, widen } => {
            for col in add {
                conn.execute_batch(&format!(
                    "ALTER TABLE {} ADD COLUMN {} {}",
                    quote_ident(chunk.table),
                    quote_ident(&col.name),
                    col.column_type.sql_type()
                ))?;
            }
            if widen.is_empty() {
                Ok(())
            } else {
                rebuild_with_widenings(conn, chunk.table, widen)
            }
        }
    }
}

/// SQLite cannot alter a column's type, so copy into a new table with the wider types.
fn rebuild_with_widenings(conn: &Connection, table: &str, widen: &[Widening]) -> rusqlite::Result<()> {
    let current = table_columns(conn, table)?;
    let tmp = format!("{table}__widen_tmp");

    let mut defs = Vec::with_capacity(current.len());
    let mut names = Vec::with_capacity(current.len());
    let mut selects = Vec::with_capacity(current.len());
    for (name, declared) in &current {
        let quoted = quote_ident(name);
        match widen.iter().find(|w| w.column.eq_ignore_ascii_case(name)) {
            Some(w) => {
                defs.push(format!("{quoted} {}", w.to.sql_type()));
                selects.push(format!("CAST({quoted} AS REAL)"));
            }
            None => {
                defs.push(format!("{quoted} {declared}"));
                selects.push(quoted.clone());
            }
        }
        names.push(quoted);
    }

    debug!(table, columns = widen.len(), "rebuilding table to widen columns");
    conn.execute_batch(&format!(
        "CREATE TABLE {tmp_q} ({defs});
         INSERT INTO {tmp_q} ({names}) SELECT {selects} FROM {table_q};
         DROP TABLE {table_q};
         ALTER TABLE {tmp_q} RENAME TO {table_q};",
        tmp_q = quote_ident(&tmp),
        table_q = quote_ident(table),
        defs = defs.join(", "),
        names = names.join(", "),
        selects = selects.join(", "),
    ))
}

fn insert_rows(conn: &Connection, chunk: &ChunkWrite<'_>) -> rusqlite::Result<usize> {
    if chunk.rows.is_empty() {
        return Ok(0);
    }
    let names: Vec<String> = chunk.columns.iter().map(|c| quote_ident(&c.name)).collect();
    let placeholders: Vec<String> = (1..=chunk.columns.len()).map(|i| format!("?{i}")).collect();
    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quote_ident(chunk.table),
        names.join(", "),
        placeholders.join(", ")
    );

    let mut stmt = conn.prepare(&sql)?;
    for row in chunk.rows {
        stmt.execute(params_from_iter(row.iter()))?;
    }
    Ok(chunk.rows.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_forms_are_understood() {
        assert_eq!(parse_url("sqlite::memory:").unwrap(), SqliteTarget::Memory);
        assert_eq!(parse_url(":memory:").unwrap(), SqliteTarget::Memory);
        assert_eq!(
            parse_url("sqlite:///tmp/x.db").unwrap(),
            SqliteTarget::File(PathBuf::from("/tmp/x.db"))
        );
        assert_eq!(
            parse_url("sqlite://data/x.db?mode=rwc").unwrap(),
            SqliteTarget::File(PathBuf::from("data/x.db"))
        );
        assert_eq!(
            parse_url("imports.db").unwrap(),
            SqliteTarget::File(PathBuf::from("imports.db"))
        );
    }

    #[test]
    fn other_schemes_are_config_errors() {
        let err = parse_url("postgresql://user:pw@localhost/db").unwrap_err();
        assert_eq!(err.kind(), "config");
    }

    #[test]
    fn identifiers_are_quoted() {
        assert_eq!(quote_ident("a\"b"), "\"a\"\"b\"");
    }

    #[test]
    fn create_describe_and_widen() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let cols = vec![
            TargetColumn::new("id", ColumnType::Integer),
            TargetColumn::new("score", ColumnType::Integer),
        ];
        let rows = vec![vec![CellValue::Integer(1), CellValue::Integer(5)]];
        store
            .write_chunk(ChunkWrite {
                table: "t",
                setup: &TableSetup::Create,
                columns: &cols,
                rows: &rows,
            })
            .unwrap();

        let widen = TableSetup::Evolve {
            add: vec![TargetColumn::new("note", ColumnType::Text)],
            widen: vec![Widening {
                column: "score".to_string(),
                from: ColumnType::Integer,
                to: ColumnType::Float,
            }],
        };
        let cols2 = vec![
            TargetColumn::new("id", ColumnType::Integer),
            TargetColumn::new("score", ColumnType::Float),
            TargetColumn::new("note", ColumnType::Text),
        ];
        let rows2 = vec![vec![
            CellValue::Integer(2),
            CellValue::Real(2.5),
            CellValue::Text("x".to_string()),
        ]];
        store
            .write_chunk(ChunkWrite {
                table: "t",
                setup: &widen,
                columns: &cols2,
                rows: &rows2,
            })
            .unwrap();

        let schema = store.describe_table("t").unwrap().unwrap();
        let types: Vec<_> = schema.columns.iter().map(|c| c.inferred_type).collect();
        assert_eq!(types, vec![ColumnType::Integer, ColumnType::Float, ColumnType::Text]);
        assert_eq!(store.row_count("t").unwrap(), 2);

        let first: f64 = store
            .connection()
            .query_row("SELECT score FROM t WHERE id = 1", [], |r| r.get(0))
            .unwrap();
        assert_eq!(first, 5.0);
    }

    #[test]
    fn failed_chunk_rolls_back_its_setup() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let cols = vec![TargetColumn::new("id", ColumnType::Integer)];
        // Two values for one column: the insert fails after CREATE ran.
        let rows = vec![vec![CellValue::Integer(1), CellValue::Integer(2)]];
        let result = store.write_chunk(ChunkWrite {
            table: "t",
            setup: &TableSetup::Create,
            columns: &cols,
            rows: &rows,
        });
        assert!(result.is_err());
        assert!(store.describe_table("t").unwrap().is_none());
    }

    #[test]
    fn read_only_connect_does_not_create_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("never.db");
        let store = SqliteStore::connect_read_only(path.to_str().unwrap()).unwrap();
        assert!(store.describe_table("t").unwrap().is_none());
        assert!(!path.exists());
    }

    #[test]
    fn read_only_connect_sees_existing_tables_but_rejects_writes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.db");
        let url = format!("sqlite://{}", path.display());
        let mut rw = SqliteStore::connect(&url).unwrap();
        let cols = vec![TargetColumn::new("id", ColumnType::Integer)];
        rw.write_chunk(ChunkWrite {
            table: "t",
            setup: &TableSetup::Create,
            columns: &cols,
            rows: &[vec![CellValue::Integer(1)]],
        })
        .unwrap();
        drop(rw);

        let mut ro = SqliteStore::connect_read_only(&url).unwrap();
        assert!(ro.describe_table("t").unwrap().is_some());
        let result = ro.write_chunk(ChunkWrite {
            table: "t",
            setup: &TableSetup::UseExisting,
            columns: &cols,
            rows: &[vec![CellValue::Integer(2)]],
        });
        assert!(result.is_err());
        assert_eq!(ro.row_count("t").unwrap(), 1);
    }

    #[test]
    fn absent_table_describes_as_none() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert!(store.describe_table("nope").unwrap().is_none());
    }
}
