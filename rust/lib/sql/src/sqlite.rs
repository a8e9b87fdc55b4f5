use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::Connection;
use rusqlite::types::ValueRef;
use tracing::debug;

use crate::error::SQLError;
use crate::traits::{Row, SQLStore, Value};

/// SqliteStore is a SQLStore implementation backed by rusqlite (bundled SQLite).
///
/// One connection guarded by a mutex; `close` drops it.
pub struct SqliteStore {
    conn: Mutex<Option<Connection>>,
}

impl SqliteStore {
    /// Open or create a SQLite database at the given path.
    pub fn open(path: &Path) -> Result<Self, SQLError> {
        let conn = Connection::open(path).map_err(|e| SQLError::Connection(e.to_string()))?;

        // WAL keeps readers from blocking the loader's write transactions.
        conn.execute_batch("PRAGMA journal_mode=WAL;")
            .map_err(|e| SQLError::Connection(e.to_string()))?;

        debug!("SqliteStore: opened {:?}", path);
        Ok(Self {
            conn: Mutex::new(Some(conn)),
        })
    }

    /// Create an in-memory SQLite database (useful for tests).
    pub fn open_in_memory() -> Result<Self, SQLError> {
        let conn =
            Connection::open_in_memory().map_err(|e| SQLError::Connection(e.to_string()))?;
        Ok(Self {
            conn: Mutex::new(Some(conn)),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Option<Connection>>, SQLError> {
        let guard = self
            .conn
            .lock()
            .map_err(|e| SQLError::Execution(e.to_string()))?;
        if guard.is_none() {
            return Err(SQLError::Unavailable("sqlite connection is closed".to_string()));
        }
        Ok(guard)
    }
}

/// Convert our Value enum to rusqlite's ToSql.
fn to_sql(v: &Value) -> &dyn rusqlite::types::ToSql {
    match v {
        Value::Null => &rusqlite::types::Null,
        Value::Integer(i) => i,
        Value::Real(f) => f,
        Value::Text(s) => s,
        Value::Blob(b) => b,
    }
}

fn bind_params(params: &[Value]) -> Vec<&dyn rusqlite::types::ToSql> {
    params.iter().map(to_sql).collect()
}

impl SQLStore for SqliteStore {
    fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>, SQLError> {
        let guard = self.lock()?;
        let Some(conn) = guard.as_ref() else {
            return Err(SQLError::Unavailable("sqlite connection is closed".to_string()));
        };

        let mut stmt = conn
            .prepare_cached(sql)
            .map_err(|e| SQLError::Query(e.to_string()))?;

        let column_names: Vec<String> = stmt
            .column_names()
            .iter()
            .map(|s| s.to_string())
            .collect();

        let rows = stmt
            .query_map(bind_params(params).as_slice(), |row| {
                let mut columns = Vec::with_capacity(column_names.len());
                for (i, name) in column_names.iter().enumerate() {
                    columns.push((name.clone(), row_value_at(row, i)?));
                }
                Ok(Row { columns })
            })
            .map_err(|e| SQLError::Query(e.to_string()))?;

        let mut result = Vec::new();
        for row in rows {
            result.push(row.map_err(|e| SQLError::Query(e.to_string()))?);
        }
        Ok(result)
    }

    fn exec(&self, sql: &str, params: &[Value]) -> Result<u64, SQLError> {
        let guard = self.lock()?;
        let Some(conn) = guard.as_ref() else {
            return Err(SQLError::Unavailable("sqlite connection is closed".to_string()));
        };

        let affected = conn
            .prepare_cached(sql)
            .and_then(|mut stmt| stmt.execute(bind_params(params).as_slice()))
            .map_err(|e| SQLError::Execution(e.to_string()))?;

        Ok(affected as u64)
    }

    fn exec_batch(&self, sql: &str) -> Result<(), SQLError> {
        let guard = self.lock()?;
        let Some(conn) = guard.as_ref() else {
            return Err(SQLError::Unavailable("sqlite connection is closed".to_string()));
        };
        conn.execute_batch(sql)
            .map_err(|e| SQLError::Execution(e.to_string()))
    }

    fn exec_many(&self, sql: &str, rows: &[Vec<Value>]) -> Result<u64, SQLError> {
        let mut guard = self.lock()?;
        let Some(conn) = guard.as_mut() else {
            return Err(SQLError::Unavailable("sqlite connection is closed".to_string()));
        };

        let tx = conn
            .transaction()
            .map_err(|e| SQLError::Execution(e.to_string()))?;
        let mut affected = 0u64;
        {
            let mut stmt = tx
                .prepare_cached(sql)
                .map_err(|e| SQLError::Execution(e.to_string()))?;
            for params in rows {
                affected += stmt
                    .execute(bind_params(params).as_slice())
                    .map_err(|e| SQLError::Execution(e.to_string()))?
                    as u64;
            }
        }
        tx.commit()
            .map_err(|e| SQLError::Execution(e.to_string()))?;

        Ok(affected)
    }

    fn close(&self) -> Result<(), SQLError> {
        let mut guard = self
            .conn
            .lock()
            .map_err(|e| SQLError::Execution(e.to_string()))?;
        if let Some(conn) = guard.take() {
            conn.close()
                .map_err(|(_, e)| SQLError::Execution(e.to_string()))?;
            debug!("SqliteStore: closed");
        }
        Ok(())
    }
}

/// Extract a Value from a rusqlite row at a given column index, following
/// the column's storage class.
fn row_value_at(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<Value> {
    Ok(match row.get_ref(idx)? {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Integer(i),
        ValueRef::Real(f) => Value::Real(f),
        ValueRef::Text(t) => Value::Text(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Value::Blob(b.to_vec()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> SqliteStore {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .exec_batch(
                "CREATE TABLE follows (follower_id INTEGER, followee_id INTEGER,
                     PRIMARY KEY (follower_id, followee_id));
                 CREATE INDEX idx_followee ON follows(followee_id);",
            )
            .unwrap();
        store
    }

    #[test]
    fn exec_and_query() {
        let store = store();
        let n = store
            .exec(
                "INSERT INTO follows (follower_id, followee_id) VALUES (?1, ?2)",
                &[Value::Integer(1), Value::Integer(2)],
            )
            .unwrap();
        assert_eq!(n, 1);

        let rows = store
            .query(
                "SELECT followee_id FROM follows WHERE follower_id = ?1",
                &[Value::Integer(1)],
            )
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get_i64("followee_id"), Some(2));
    }

    #[test]
    fn exec_many_is_one_transaction() {
        let store = store();
        let rows: Vec<Vec<Value>> = (0..100)
            .map(|i| vec![Value::Integer(i), Value::Integer(1000)])
            .collect();
        let n = store
            .exec_many(
                "INSERT OR IGNORE INTO follows (follower_id, followee_id) VALUES (?1, ?2)",
                &rows,
            )
            .unwrap();
        assert_eq!(n, 100);

        // A failing row rolls back the whole group.
        let bad = vec![
            vec![Value::Integer(500), Value::Integer(1000)],
            vec![Value::Integer(1)],
        ];
        assert!(store
            .exec_many(
                "INSERT INTO follows (follower_id, followee_id) VALUES (?1, ?2)",
                &bad,
            )
            .is_err());
        let rows = store
            .query("SELECT COUNT(*) AS cnt FROM follows", &[])
            .unwrap();
        assert_eq!(rows[0].get_i64("cnt"), Some(100));
    }

    #[test]
    fn null_and_text_columns() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .exec_batch("CREATE TABLE t (a TEXT, b INTEGER);")
            .unwrap();
        store
            .exec("INSERT INTO t (a, b) VALUES (?1, ?2)", &[Value::Text("x".into()), Value::Null])
            .unwrap();
        let rows = store.query("SELECT a, b FROM t", &[]).unwrap();
        assert_eq!(rows[0].get_str("a"), Some("x"));
        assert!(matches!(rows[0].get("b"), Some(Value::Null)));
    }

    #[test]
    fn closed_store_is_unavailable() {
        let store = store();
        store.close().unwrap();
        let err = store.query("SELECT 1", &[]).unwrap_err();
        assert!(err.is_unavailable());
        let err = store.exec_batch("SELECT 1;").unwrap_err();
        assert!(matches!(err, SQLError::Unavailable(_)));
        store.close().unwrap();
    }
}
