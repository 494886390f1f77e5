// file: src/database/sqlite.rs
// description: read-only SQLite access for structured record search
// reference: https://docs.rs/rusqlite

use crate::error::{Result, SearchError};
use crate::utils::validation::Validator;
use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{Connection, InterruptHandle, OpenFlags, params_from_iter};
use serde::Serialize;
use serde_json::{Map, Number, Value};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnInfo {
    pub name: String,
    pub decl_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<ColumnInfo>,
}

impl TableSchema {
    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// Columns worth matching keywords against.
    pub fn text_columns(&self) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|c| {
                let ty = c.decl_type.to_ascii_uppercase();
                ty.is_empty() || ty.contains("CHAR") || ty.contains("TEXT") || ty.contains("CLOB")
            })
            .map(|c| c.name.as_str())
            .collect()
    }

    /// `CREATE TABLE`-like summary used in planning prompts.
    pub fn describe(&self) -> String {
        let columns = self
            .columns
            .iter()
            .map(|c| {
                if c.decl_type.is_empty() {
                    c.name.clone()
                } else {
                    format!("{} {}", c.name, c.decl_type)
                }
            })
            .collect::<Vec<_>>()
            .join(", ");
        format!("{}({})", self.name, columns)
    }
}

/// Handle to the structured store. Connections are opened per request so a
/// slow query never blocks another.
#[derive(Debug, Clone)]
pub struct SqliteClient {
    path: PathBuf,
}

impl SqliteClient {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn open_readonly(&self) -> Result<Connection> {
        if !self.path.exists() {
            return Err(SearchError::SearchBackendUnavailable(format!(
                "structured store not found at {}",
                self.path.display()
            )));
        }

        Connection::open_with_flags(
            &self.path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| {
            SearchError::SearchBackendUnavailable(format!(
                "opening sqlite db readonly at {}: {}",
                self.path.display(),
                e
            ))
        })
    }

    pub fn ping(&self) -> Result<()> {
        let conn = self.open_readonly()?;
        conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
            .map(|_| ())
            .map_err(|e| SearchError::SearchBackendUnavailable(format!("sqlite ping failed: {}", e)))
    }

    /// All user tables with their columns.
    pub fn schema(conn: &Connection) -> Result<Vec<TableSchema>> {
        let mut stmt = conn.prepare(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut tables = Vec::with_capacity(names.len());
        for name in names {
            match Self::table_schema(conn, &name) {
                Ok(schema) => tables.push(schema),
                Err(e) => warn!("Skipping table {} during introspection: {}", name, e),
            }
        }
        Ok(tables)
    }

    pub fn table_schema(conn: &Connection, table: &str) -> Result<TableSchema> {
        Validator::validate_identifier(table)?;

        let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", table))?;
        let columns = stmt
            .query_map([], |row| {
                Ok(ColumnInfo {
                    name: row.get(1)?,
                    decl_type: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        if columns.is_empty() {
            return Err(SearchError::Database(format!("Unknown table: {}", table)));
        }

        Ok(TableSchema {
            name: table.to_string(),
            columns,
        })
    }

    /// Runs a statement and returns each row as a column → JSON value map.
    pub fn query_rows(
        conn: &Connection,
        sql: &str,
        params: &[SqlValue],
    ) -> Result<Vec<Map<String, Value>>> {
        debug!("Executing structured query: {}", sql);

        let mut stmt = conn.prepare(sql)?;
        if !stmt.readonly() {
            return Err(SearchError::Validation(
                "Only read-only statements may be executed".to_string(),
            ));
        }

        let column_names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let mut rows = stmt.query(params_from_iter(params.iter()))?;

        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            let mut record = Map::with_capacity(column_names.len());
            for (idx, name) in column_names.iter().enumerate() {
                record.insert(name.clone(), value_to_json(row.get_ref(idx)?));
            }
            records.push(record);
        }

        Ok(records)
    }
}

fn value_to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Number(i.into()),
        ValueRef::Real(f) => Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null),
        ValueRef::Text(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Value::String(format!("<{} bytes>", bytes.len())),
    }
}

/// Interrupts the connection's running statement when dropped, unless
/// disarmed. Held by the awaiting future so that cancelling the request
/// stops the blocking query too.
pub struct InterruptGuard {
    handle: Option<InterruptHandle>,
}

impl InterruptGuard {
    pub fn new(conn: &Connection) -> Self {
        Self {
            handle: Some(conn.get_interrupt_handle()),
        }
    }

    pub fn disarm(mut self) {
        self.handle = None;
    }
}

impl Drop for InterruptGuard {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            debug!("Interrupting in-flight structured query");
            handle.interrupt();
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    /// Builds a small records database used across structured search tests.
    pub(crate) fn fixture_db() -> (TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.sqlite");
        let conn = Connection::open(&path).unwrap();
        conn.execute_batch(
            "CREATE TABLE sales_records (
                id INTEGER PRIMARY KEY,
                doc_id TEXT,
                month TEXT NOT NULL,
                region TEXT,
                product TEXT,
                sales_amount REAL,
                created_at TEXT
            );
            INSERT INTO sales_records VALUES (1, 'report-2024', '2024-01', '서울', '노트북', 1500000.0, '2024-02-01T09:00:00Z');
            INSERT INTO sales_records VALUES (2, 'report-2024', '2024-02', '부산', '모니터', 820000.5, '2024-03-01T09:00:00Z');
            INSERT INTO sales_records VALUES (3, NULL, '2024-03', '서울', '키보드', NULL, '2024-04-01 09:00:00');
            CREATE TABLE employee_info (
                employee_info_id INTEGER PRIMARY KEY,
                name TEXT,
                department TEXT,
                hired_on TEXT
            );
            INSERT INTO employee_info VALUES (10, '김민수', '영업부', '2021-03-02');",
        )
        .unwrap();
        (dir, path)
    }

    #[test]
    fn test_missing_file_is_backend_unavailable() {
        let client = SqliteClient::new("/nonexistent/records.sqlite");
        assert!(matches!(
            client.ping(),
            Err(SearchError::SearchBackendUnavailable(_))
        ));
    }

    #[test]
    fn test_schema_introspection() {
        let (_dir, path) = fixture_db();
        let client = SqliteClient::new(&path);
        client.ping().unwrap();

        let conn = client.open_readonly().unwrap();
        let tables = SqliteClient::schema(&conn).unwrap();
        let names: Vec<&str> = tables.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["employee_info", "sales_records"]);

        let sales = &tables[1];
        assert!(sales.has_column("MONTH"));
        assert_eq!(
            sales.text_columns(),
            vec!["doc_id", "month", "region", "product", "created_at"]
        );
        assert!(sales.describe().starts_with("sales_records(id INTEGER, doc_id TEXT"));
    }

    #[test]
    fn test_query_rows_maps_values() {
        let (_dir, path) = fixture_db();
        let conn = SqliteClient::new(&path).open_readonly().unwrap();
        let rows = SqliteClient::query_rows(
            &conn,
            "SELECT id, region, sales_amount FROM sales_records WHERE region = ?1 ORDER BY id",
            &[SqlValue::Text("서울".to_string())],
        )
        .unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["id"], 1);
        assert_eq!(rows[0]["region"], "서울");
        assert_eq!(rows[0]["sales_amount"], 1500000.0);
        assert_eq!(rows[1]["sales_amount"], Value::Null);
    }

    #[test]
    fn test_readonly_connection_rejects_writes() {
        let (_dir, path) = fixture_db();
        let conn = SqliteClient::new(&path).open_readonly().unwrap();
        assert!(SqliteClient::query_rows(&conn, "DELETE FROM sales_records", &[]).is_err());
        assert!(conn.execute("DELETE FROM sales_records", []).is_err());
    }

    #[test]
    fn test_table_schema_rejects_bad_identifier() {
        let (_dir, path) = fixture_db();
        let conn = SqliteClient::new(&path).open_readonly().unwrap();
        assert!(SqliteClient::table_schema(&conn, "sales_records; DROP").is_err());
        assert!(SqliteClient::table_schema(&conn, "missing_table").is_err());
    }

    /// Counts towards a bound that no test run reaches.
    pub(crate) const ENDLESS_QUERY: &str = concat!(
        "WITH RECURSIVE c(x) AS ",
        "(SELECT 1 UNION ALL SELECT x + 1 FROM c WHERE x < 100000000000) ",
        "SELECT count(*) AS n FROM c"
    );

    #[tokio::test]
    async fn test_dropped_guard_interrupts_running_query() {
        let (_dir, path) = fixture_db();
        let conn = SqliteClient::new(&path).open_readonly().unwrap();
        let guard = InterruptGuard::new(&conn);

        let started = std::time::Instant::now();
        let task = tokio::task::spawn_blocking(move || {
            SqliteClient::query_rows(&conn, ENDLESS_QUERY, &[])
        });
        tokio::time::sleep(std::time::Duration::from_millis(200)).await;
        drop(guard);

        let result = tokio::time::timeout(std::time::Duration::from_secs(5), task)
            .await
            .expect("interrupted query should return promptly")
            .unwrap();
        match result {
            Err(SearchError::Database(message)) => assert!(message.contains("interrupt")),
            other => panic!("expected an interrupt error, got {:?}", other),
        }
        assert!(started.elapsed() < std::time::Duration::from_secs(5));
    }

    #[test]
    fn test_disarmed_guard_does_not_interrupt() {
        let (_dir, path) = fixture_db();
        let conn = SqliteClient::new(&path).open_readonly().unwrap();
        InterruptGuard::new(&conn).disarm();
        let rows = SqliteClient::query_rows(&conn, "SELECT * FROM sales_records", &[]).unwrap();
        assert_eq!(rows.len(), 3);
    }
}
