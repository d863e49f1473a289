//! SQLite-backed data store
//!
//! A single connection behind a mutex; every call locks it for the duration
//! of one statement (or one transaction for the bootstrap).

use super::{DataStore, Row};
use crate::config::BootstrapSeed;
use crate::error::{NlSqlError, Result};
use crate::model::ColumnMetadata;
use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{params, params_from_iter, Connection};
use serde_json::Value;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

pub struct SqliteStore {
    db: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) a database file. `:memory:` opens a private
    /// in-memory database.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let db = Connection::open(path)
            .map_err(|e| NlSqlError::Database(format!("Failed to open database {}: {}", path.display(), e)))?;
        debug!("Opened SQLite store at {}", path.display());
        Ok(Self { db: Mutex::new(db) })
    }

    pub fn in_memory() -> Result<Self> {
        let db = Connection::open_in_memory()
            .map_err(|e| NlSqlError::Database(format!("Failed to open in-memory database: {}", e)))?;
        Ok(Self { db: Mutex::new(db) })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.db
            .lock()
            .map_err(|_| NlSqlError::Database("store connection lock poisoned".to_string()))
    }
}

impl DataStore for SqliteStore {
    fn describe_columns(&self, table: &str) -> Result<Vec<ColumnMetadata>> {
        let db = self.conn()?;
        let mut stmt = db.prepare(
            r#"SELECT name, type, "notnull" FROM pragma_table_info(?1) ORDER BY cid"#,
        )?;
        let columns = stmt
            .query_map(params![table], |row| {
                let not_null: i64 = row.get(2)?;
                Ok(ColumnMetadata {
                    name: row.get(0)?,
                    data_type: row.get(1)?,
                    nullable: not_null == 0,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(columns)
    }

    fn table_exists(&self, table: &str) -> Result<bool> {
        let db = self.conn()?;
        let count: i64 = db.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            params![table],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    fn query(&self, sql: &str) -> Result<Vec<Row>> {
        let db = self.conn()?;
        let mut stmt = db.prepare(sql)?;
        let names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();

        let mut rows = stmt.query([])?;
        let mut results = Vec::new();
        while let Some(row) = rows.next()? {
            let mut record = Row::new();
            for (idx, name) in names.iter().enumerate() {
                record.insert(name.clone(), to_json(row.get_ref(idx)?));
            }
            results.push(record);
        }
        Ok(results)
    }

    fn bootstrap(&self, seed: &BootstrapSeed) -> Result<()> {
        let mut db = self.conn()?;
        let tx = db.transaction()?;

        let definitions = seed
            .columns
            .iter()
            .map(|c| format!("{} {}", quote_ident(&c.name), c.definition))
            .collect::<Vec<_>>()
            .join(", ");
        tx.execute(
            &format!("CREATE TABLE IF NOT EXISTS {} ({})", quote_ident(&seed.table), definitions),
            [],
        )?;

        let existing: i64 = tx.query_row(
            &format!("SELECT COUNT(*) FROM {}", quote_ident(&seed.table)),
            [],
            |row| row.get(0),
        )?;

        if existing == 0 && !seed.rows.is_empty() {
            let columns = seed
                .insert_columns
                .iter()
                .map(|c| quote_ident(c))
                .collect::<Vec<_>>()
                .join(", ");
            let placeholders = (1..=seed.insert_columns.len())
                .map(|i| format!("?{}", i))
                .collect::<Vec<_>>()
                .join(", ");
            let insert = format!(
                "INSERT INTO {} ({}) VALUES ({})",
                quote_ident(&seed.table),
                columns,
                placeholders
            );

            for row in &seed.rows {
                tx.execute(&insert, params_from_iter(row.iter().map(to_sql)))?;
            }
            info!("Sample data inserted into {} table ({} rows)", seed.table, seed.rows.len());
        }

        tx.commit()?;
        Ok(())
    }

    fn list_tables(&self) -> Result<Vec<String>> {
        let db = self.conn()?;
        let mut stmt = db.prepare(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )?;
        let names = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(names)
    }

    fn ping(&self) -> Result<()> {
        let db = self.conn()?;
        db.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
        Ok(())
    }
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn to_sql(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => SqlValue::Integer(i),
            None => SqlValue::Real(n.as_f64().unwrap_or_default()),
        },
        Value::String(s) => SqlValue::Text(s.clone()),
        other => SqlValue::Text(other.to_string()),
    }
}

fn to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        ValueRef::Text(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Value::Array(bytes.iter().map(|b| Value::from(*b)).collect()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn seeded_store() -> SqliteStore {
        let store = SqliteStore::in_memory().unwrap();
        store.bootstrap(&BootstrapSeed::default()).unwrap();
        store
    }

    #[test]
    fn test_bootstrap_is_idempotent() {
        let store = seeded_store();
        store.bootstrap(&BootstrapSeed::default()).unwrap();

        let rows = store.query("SELECT COUNT(*) as count FROM employees").unwrap();
        assert_eq!(rows[0]["count"], json!(5));
    }

    #[test]
    fn test_describe_columns() {
        let store = seeded_store();
        let columns = store.describe_columns("employees").unwrap();

        let names: Vec<&str> = columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["id", "name", "email", "city", "department", "salary", "age"]);
        assert!(!columns[1].nullable);
        assert!(columns[2].nullable);
        assert_eq!(columns[6].data_type, "INTEGER");
    }

    #[test]
    fn test_describe_missing_table_is_empty() {
        let store = SqliteStore::in_memory().unwrap();
        assert!(store.describe_columns("nowhere").unwrap().is_empty());
    }

    #[test]
    fn test_table_exists_is_case_sensitive() {
        let store = seeded_store();
        assert!(store.table_exists("employees").unwrap());
        assert!(!store.table_exists("EMPLOYEES").unwrap());
        assert!(!store.table_exists("employee").unwrap());
    }

    #[test]
    fn test_text_filters_ignore_case() {
        let store = seeded_store();
        let rows = store
            .query("SELECT COUNT(*) as count FROM employees WHERE city = 'mumbai'")
            .unwrap();
        assert_eq!(rows, vec![json!({"count": 2}).as_object().unwrap().clone()]);
    }

    #[test]
    fn test_rows_keep_select_order() {
        let store = seeded_store();
        let rows = store
            .query("SELECT salary, name FROM employees ORDER BY salary LIMIT 1")
            .unwrap();
        let keys: Vec<&String> = rows[0].keys().collect();
        assert_eq!(keys, vec!["salary", "name"]);
        assert_eq!(rows[0]["name"], json!("Alice Brown"));
    }

    #[test]
    fn test_bad_statement_is_database_error() {
        let store = seeded_store();
        let err = store.query("SELECT nope FROM employees").unwrap_err();
        assert!(matches!(err, NlSqlError::Database(_)));
    }

    #[test]
    fn test_list_tables_and_ping() {
        let store = seeded_store();
        store.ping().unwrap();
        assert_eq!(store.list_tables().unwrap(), vec!["employees".to_string()]);
    }

    #[test]
    fn test_file_store_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nlsql.db");

        SqliteStore::open(&path)
            .unwrap()
            .bootstrap(&BootstrapSeed::default())
            .unwrap();

        let reopened = SqliteStore::open(&path).unwrap();
        assert!(reopened.table_exists("employees").unwrap());
    }
}
