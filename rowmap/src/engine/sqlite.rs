use super::{sqlite_type, Engine, Statement};
use crate::error::{Result, RowmapError};
use crate::value::{Kind, Row, Value};
use log::info;
use rusqlite::types::{ToSqlOutput, Value as SqlValue};
use rusqlite::{Connection, ToSql};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

/// Path value that opens a private in-memory database.
pub const MEMORY_PATH: &str = ":memory:";

/// Connection settings for [`SqliteEngine`].
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SqliteConfig {
    pub path: PathBuf,
    pub busy_timeout_ms: u64,
    pub foreign_keys: bool,
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(MEMORY_PATH),
            busy_timeout_ms: 5000,
            foreign_keys: true,
        }
    }
}

impl SqliteConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    /// Parse settings from YAML; missing keys keep their defaults.
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let config: SqliteConfig = serde_yaml::from_str(content)?;
        Ok(config)
    }

    pub fn is_in_memory(&self) -> bool {
        self.path == Path::new(MEMORY_PATH)
    }
}

/// [`Engine`] over a single rusqlite connection. Every statement runs in
/// SQLite's autocommit mode.
pub struct SqliteEngine {
    inner: Mutex<Inner>,
}

struct Inner {
    conn: Connection,
    last_insert_id: Option<i64>,
    rows_affected: usize,
}

impl SqliteEngine {
    pub fn open(config: &SqliteConfig) -> Result<Self> {
        let conn = if config.is_in_memory() {
            Connection::open_in_memory()?
        } else {
            Connection::open(&config.path)?
        };

        conn.busy_timeout(Duration::from_millis(config.busy_timeout_ms))?;
        if config.foreign_keys {
            conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        }

        info!(
            "sqlite engine opened path={} foreign_keys={}",
            config.path.display(),
            config.foreign_keys
        );

        Ok(Self {
            inner: Mutex::new(Inner {
                conn,
                last_insert_id: None,
                rows_affected: 0,
            }),
        })
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self> {
        Self::open(&SqliteConfig::default())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|_| RowmapError::Engine("sqlite connection lock poisoned".into()))
    }
}

impl Engine for SqliteEngine {
    fn execute(&self, statement: &Statement) -> Result<Vec<Row>> {
        let mut inner = self.lock()?;

        let bound: Vec<(String, &Value)> = statement
            .params
            .iter()
            .flatten()
            .map(|(key, value)| (format!(":{key}"), value))
            .collect();
        let named: Vec<(&str, &dyn ToSql)> = bound
            .iter()
            .map(|(key, value)| (key.as_str(), *value as &dyn ToSql))
            .collect();

        let mut stmt = inner.conn.prepare(&statement.sql)?;

        if stmt.column_count() == 0 {
            let changed = stmt.execute(named.as_slice())?;
            drop(stmt);
            inner.rows_affected = changed;
            inner.last_insert_id = Some(inner.conn.last_insert_rowid());
            return Ok(Vec::new());
        }

        let names: Vec<String> = stmt
            .column_names()
            .into_iter()
            .map(String::from)
            .collect();

        let mut rows = stmt.query(named.as_slice())?;
        let mut result = Vec::new();
        while let Some(row) = rows.next()? {
            let mut record = Row::new();
            for (i, name) in names.iter().enumerate() {
                let value: SqlValue = row.get(i)?;
                record.push(name, from_sql_value(value));
            }
            result.push(record);
        }
        Ok(result)
    }

    fn last_insert_id(&self) -> Option<i64> {
        self.inner.lock().ok().and_then(|inner| inner.last_insert_id)
    }

    fn rows_affected(&self) -> usize {
        self.inner.lock().map_or(0, |inner| inner.rows_affected)
    }

    fn map_kind(&self, kind: Kind) -> &'static str {
        sqlite_type(kind)
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        let value = match self {
            Value::Null => SqlValue::Null,
            Value::Text(s) => SqlValue::Text(s.clone()),
            Value::Integer(n) => SqlValue::Integer(*n),
            Value::Real(f) => SqlValue::Real(*f),
            Value::Boolean(b) => SqlValue::Integer(i64::from(*b)),
        };
        Ok(ToSqlOutput::Owned(value))
    }
}

fn from_sql_value(value: SqlValue) -> Value {
    match value {
        SqlValue::Null => Value::Null,
        SqlValue::Integer(n) => Value::Integer(n),
        SqlValue::Real(f) => Value::Real(f),
        SqlValue::Text(s) => Value::Text(s),
        SqlValue::Blob(b) => Value::Text(String::from_utf8_lossy(&b).into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Params;
    use tempfile::TempDir;

    fn params(pairs: &[(&str, Value)]) -> Params {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_execute_insert_and_select() {
        let engine = SqliteEngine::open_in_memory().unwrap();
        engine
            .execute(&Statement::new("CREATE TABLE t (name TEXT, n INTEGER)"))
            .unwrap();

        let insert = Statement::new("INSERT INTO t (name, n) VALUES (:name, :n)")
            .with_params(params(&[("name", "a".into()), ("n", 1.into())]));
        engine.execute(&insert).unwrap();
        assert_eq!(engine.last_insert_id(), Some(1));
        assert_eq!(engine.rows_affected(), 1);

        engine.execute(&insert).unwrap();
        assert_eq!(engine.last_insert_id(), Some(2));

        let rows = engine
            .execute(
                &Statement::new("SELECT *,rowid FROM t WHERE n = :k")
                    .with_params(params(&[("k", 1.into())])),
            )
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("name"), Some(&Value::Text("a".into())));
        assert_eq!(rows[1].get("rowid"), Some(&Value::Integer(2)));
    }

    #[test]
    fn test_booleans_bind_as_integers() {
        let engine = SqliteEngine::open_in_memory().unwrap();
        engine
            .execute(&Statement::new("CREATE TABLE t (flag INTEGER)"))
            .unwrap();
        engine
            .execute(
                &Statement::new("INSERT INTO t (flag) VALUES (:flag)")
                    .with_params(params(&[("flag", true.into())])),
            )
            .unwrap();

        let rows = engine.execute(&Statement::new("SELECT flag FROM t")).unwrap();
        assert_eq!(rows[0].get("flag"), Some(&Value::Integer(1)));
    }

    #[test]
    fn test_engine_errors_propagate() {
        let engine = SqliteEngine::open_in_memory().unwrap();
        let err = engine
            .execute(&Statement::new("SELECT * FROM missing"))
            .unwrap_err();
        assert!(matches!(err, RowmapError::Sqlite(_)));
    }

    #[test]
    fn test_map_kind() {
        let engine = SqliteEngine::open_in_memory().unwrap();
        assert_eq!(engine.map_kind(Kind::Text), "TEXT");
        assert_eq!(engine.map_kind(Kind::Boolean), "INTEGER");
        assert_eq!(engine.map_kind(Kind::Real), "REAL");
    }

    #[test]
    fn test_config_from_yaml() {
        let config = SqliteConfig::from_yaml_str("path: data.db\nforeign_keys: false\n").unwrap();
        assert_eq!(config.path, PathBuf::from("data.db"));
        assert!(!config.foreign_keys);
        assert_eq!(config.busy_timeout_ms, 5000);
        assert!(SqliteConfig::default().is_in_memory());
    }

    #[test]
    fn test_open_file_database() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("rows.db");
        {
            let engine = SqliteEngine::open(&SqliteConfig::new(&path)).unwrap();
            engine
                .execute(&Statement::new("CREATE TABLE t (n INTEGER)"))
                .unwrap();
            engine
                .execute(&Statement::new("INSERT INTO t (n) VALUES (7)"))
                .unwrap();
        }

        let engine = SqliteEngine::open(&SqliteConfig::new(&path)).unwrap();
        let rows = engine.execute(&Statement::new("SELECT n FROM t")).unwrap();
        assert_eq!(rows[0].get("n"), Some(&Value::Integer(7)));
    }
}
