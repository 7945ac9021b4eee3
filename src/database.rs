//! The database handle.
//!
//! A [`Database`] owns one driver connection and remembers the statement it
//! executed last. Mutating operations take `&mut self`, so only one query is
//! ever in flight per handle; share it across threads behind a mutex.

use std::sync::atomic::{AtomicU64, Ordering};

use rusqlite::Connection;
use tracing::{debug, error, info, warn};

use crate::config::DatabaseConfig;
use crate::error::{DbError, Result};
use crate::sqlite;
use crate::statement::{Row, Statement};
use crate::value::Params;

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Handle to one open database connection
pub struct Database {
    id: u64,
    dsn: String,
    conn: Connection,
    last_statement: Option<Statement>,
}

impl Database {
    /// Validate `config` and open the connection it describes.
    ///
    /// Empty `host` or `name` fail with [`DbError::Configuration`] before
    /// any I/O; driver failures become [`DbError::Connection`] carrying the
    /// driver's result code.
    pub fn connect(config: &DatabaseConfig) -> Result<Self> {
        let dsn = config.dsn()?;
        let conn = sqlite::open(config).map_err(|e| {
            warn!(dsn = %dsn, error = %e, "failed to open database connection");
            e
        })?;
        let id = NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed);
        info!(connection_id = id, dsn = %dsn, user = %config.user, "opened database connection");
        Ok(Self {
            id,
            dsn,
            conn,
            last_statement: None,
        })
    }

    /// Connection string this handle was opened with
    pub fn dsn(&self) -> &str {
        &self.dsn
    }

    /// Run a parameterized query.
    ///
    /// The returned handle is also kept as the last statement. On failure the
    /// driver message is logged and returned as [`DbError::Query`]; the last
    /// statement is left as it was.
    pub fn query(&mut self, sql: &str, params: Option<&Params>) -> Result<Statement> {
        let empty = Params::new();
        let params = params.unwrap_or(&empty);
        debug!(connection_id = self.id, sql, param_count = params.len(), "executing query");

        match sqlite::execute(&self.conn, self.id, sql, params) {
            Ok(statement) => {
                debug!(
                    connection_id = self.id,
                    rows = statement.row_count(),
                    "query executed"
                );
                self.last_statement = Some(statement.clone());
                Ok(statement)
            }
            Err(e) => {
                let message = e.to_string();
                error!(connection_id = self.id, error = %message, "query failed");
                Err(DbError::Query(message))
            }
        }
    }

    /// Statement the last successful [`query`](Self::query) produced.
    pub fn last_statement(&self) -> Option<Statement> {
        self.last_statement.clone()
    }

    /// Row count of `statement`, or of the last statement.
    pub fn num_rows(&self, statement: Option<&Statement>) -> Result<usize> {
        Ok(self.resolve(statement)?.row_count())
    }

    /// Next row of `statement` (or the last statement), `None` when exhausted.
    pub fn fetch_one(&self, statement: Option<&Statement>) -> Result<Option<Row>> {
        Ok(self.resolve(statement)?.fetch_one())
    }

    /// Remaining rows of `statement` (or the last statement).
    pub fn fetch_all(&self, statement: Option<&Statement>) -> Result<Vec<Row>> {
        Ok(self.resolve(statement)?.fetch_all())
    }

    fn resolve<'a>(&'a self, statement: Option<&'a Statement>) -> Result<&'a Statement> {
        match statement {
            Some(stmt) if stmt.owner() != self.id => Err(DbError::InvalidState(format!(
                "statement {:?} was executed on a different connection",
                stmt.sql()
            ))),
            Some(stmt) => Ok(stmt),
            None => self.last_statement.as_ref().ok_or_else(|| {
                DbError::InvalidState("no statement has been executed yet".to_string())
            }),
        }
    }

    /// Start a transaction.
    pub fn begin(&mut self) -> Result<()> {
        self.transaction_command("BEGIN")
    }

    /// Commit the open transaction.
    pub fn commit(&mut self) -> Result<()> {
        self.transaction_command("COMMIT")
    }

    /// Discard the open transaction.
    pub fn rollback(&mut self) -> Result<()> {
        self.transaction_command("ROLLBACK")
    }

    /// Whether a transaction is currently open on the connection.
    pub fn in_transaction(&self) -> bool {
        !self.conn.is_autocommit()
    }

    fn transaction_command(&mut self, command: &str) -> Result<()> {
        self.conn.execute_batch(command).map_err(|e| {
            warn!(connection_id = self.id, command, error = %e, "transaction command failed");
            DbError::Transaction(e.to_string())
        })?;
        debug!(connection_id = self.id, command, "transaction command executed");
        Ok(())
    }

    /// Run `f` inside a transaction.
    ///
    /// Commits when `f` returns `Ok`. If `f` fails, or the commit itself
    /// fails, the transaction is rolled back and the error returned.
    pub fn transaction<T, E, F>(&mut self, f: F) -> std::result::Result<T, E>
    where
        F: FnOnce(&mut Self) -> std::result::Result<T, E>,
        E: From<DbError>,
    {
        self.begin()?;
        let outcome = match f(self) {
            Ok(value) => match self.commit() {
                Ok(()) => return Ok(value),
                Err(e) => E::from(e),
            },
            Err(e) => e,
        };
        // A failed COMMIT leaves the transaction open.
        if self.in_transaction() {
            if let Err(rollback_err) = self.rollback() {
                warn!(connection_id = self.id, error = %rollback_err, "rollback after failed transaction failed");
            }
        }
        Err(outcome)
    }

    /// Close the connection, reporting any failure to release it.
    ///
    /// Dropping a `Database` closes it too, silently. An open transaction is
    /// rolled back by the driver either way.
    pub fn close(self) -> Result<()> {
        if self.in_transaction() {
            warn!(
                connection_id = self.id,
                "closing database with an open transaction; it will be rolled back"
            );
        }
        let Database { id, conn, .. } = self;
        conn.close().map_err(|(_, e)| DbError::Connection {
            code: sqlite::error_code(&e),
            message: e.to_string(),
        })?;
        info!(connection_id = id, "closed database connection");
        Ok(())
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("id", &self.id)
            .field("dsn", &self.dsn)
            .field("in_transaction", &self.in_transaction())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    fn memory_db() -> Database {
        let mut db = Database::connect(&DatabaseConfig::in_memory()).unwrap();
        db.query(
            "CREATE TABLE people (id INTEGER PRIMARY KEY, name TEXT NOT NULL)",
            None,
        )
        .unwrap();
        for name in ["Ann", "Bob", "Cy"] {
            db.query(
                "INSERT INTO people (name) VALUES (:name)",
                Some(&Params::new().with_value(":name", name)),
            )
            .unwrap();
        }
        db
    }

    #[test]
    fn empty_settings_fail_before_connecting() {
        for cfg in [
            DatabaseConfig::new("", "app.db", "u", "p"),
            DatabaseConfig::new("/tmp", "", "u", "p"),
        ] {
            assert!(matches!(
                Database::connect(&cfg),
                Err(DbError::Configuration(_))
            ));
        }
    }

    #[test]
    fn no_statement_yet_is_invalid_state() {
        let db = Database::connect(&DatabaseConfig::in_memory()).unwrap();
        assert!(db.last_statement().is_none());
        assert!(matches!(db.num_rows(None), Err(DbError::InvalidState(_))));
        assert!(matches!(db.fetch_one(None), Err(DbError::InvalidState(_))));
        assert!(matches!(db.fetch_all(None), Err(DbError::InvalidState(_))));
    }

    #[test]
    fn implicit_and_explicit_statement_agree() {
        let mut db = memory_db();
        let stmt = db.query("SELECT 1", None).unwrap();
        assert_eq!(db.num_rows(None).unwrap(), db.num_rows(Some(&stmt)).unwrap());
        assert!(db.last_statement().unwrap().same_as(&stmt));
    }

    #[test]
    fn fetch_one_then_sentinel() {
        let mut db = memory_db();
        db.query("SELECT id, name FROM people ORDER BY id", None).unwrap();
        let names: Vec<Value> = (0..3)
            .map(|_| db.fetch_one(None).unwrap().unwrap()["name"].clone())
            .collect();
        assert_eq!(
            names,
            vec![
                Value::Text("Ann".into()),
                Value::Text("Bob".into()),
                Value::Text("Cy".into())
            ]
        );
        assert!(db.fetch_one(None).unwrap().is_none());
    }

    #[test]
    fn dml_reports_affected_rows() {
        let mut db = memory_db();
        let stmt = db.query("UPDATE people SET name = upper(name)", None).unwrap();
        assert_eq!(db.num_rows(Some(&stmt)).unwrap(), 3);
        assert!(db.fetch_all(None).unwrap().is_empty());
    }

    #[test]
    fn failed_query_keeps_last_statement() {
        let mut db = memory_db();
        let good = db.query("SELECT name FROM people", None).unwrap();
        let err = db.query("SELECT nope FROM people", None).unwrap_err();
        assert!(matches!(err, DbError::Query(ref msg) if msg.contains("nope")));
        assert!(db.last_statement().unwrap().same_as(&good));
    }

    #[test]
    fn foreign_statement_is_rejected() {
        let mut a = memory_db();
        let b = memory_db();
        let stmt = a.query("SELECT * FROM people", None).unwrap();
        assert!(matches!(b.fetch_one(Some(&stmt)), Err(DbError::InvalidState(_))));
        assert!(matches!(b.num_rows(Some(&stmt)), Err(DbError::InvalidState(_))));
        assert_eq!(a.num_rows(Some(&stmt)).unwrap(), 3);
    }

    #[test]
    fn transaction_state_machine() {
        let mut db = memory_db();
        assert!(!db.in_transaction());
        db.begin().unwrap();
        assert!(db.in_transaction());
        db.commit().unwrap();
        assert!(!db.in_transaction());

        db.begin().unwrap();
        db.query("DELETE FROM people", None).unwrap();
        db.rollback().unwrap();
        assert!(!db.in_transaction());
        db.query("SELECT COUNT(*) AS n FROM people", None).unwrap();
        assert_eq!(db.fetch_one(None).unwrap().unwrap()["n"], Value::Integer(3));
    }

    #[test]
    fn commit_without_begin_is_a_transaction_error() {
        let mut db = memory_db();
        assert!(matches!(db.commit(), Err(DbError::Transaction(_))));
        assert!(matches!(db.rollback(), Err(DbError::Transaction(_))));
        db.begin().unwrap();
        assert!(matches!(db.begin(), Err(DbError::Transaction(_))));
        assert!(db.in_transaction());
    }

    #[test]
    fn failed_commit_rolls_back() {
        let mut db = memory_db();
        db.query("PRAGMA foreign_keys = ON", None).unwrap();
        db.query(
            "CREATE TABLE pets (id INTEGER PRIMARY KEY, owner_id INTEGER \
             REFERENCES people(id) DEFERRABLE INITIALLY DEFERRED)",
            None,
        )
        .unwrap();

        let result: Result<()> = db.transaction(|db| {
            db.query("INSERT INTO pets (owner_id) VALUES (42)", None)?;
            Ok(())
        });
        assert!(matches!(result, Err(DbError::Transaction(ref m)) if m.contains("FOREIGN KEY")));
        assert!(!db.in_transaction());

        db.query("SELECT COUNT(*) AS n FROM pets", None).unwrap();
        assert_eq!(db.fetch_one(None).unwrap().unwrap()["n"], Value::Integer(0));
    }

    #[test]
    fn ddl_after_insert_reports_no_rows() {
        let mut db = memory_db();
        db.query("INSERT INTO people (name) VALUES ('Di'), ('Ed'), ('Flo')", None)
            .unwrap();
        assert_eq!(db.num_rows(None).unwrap(), 3);
        db.query("CREATE TABLE tags (id INTEGER PRIMARY KEY)", None).unwrap();
        assert_eq!(db.num_rows(None).unwrap(), 0);
        db.begin().unwrap();
        db.query("SAVEPOINT sp", None).unwrap();
        assert_eq!(db.num_rows(None).unwrap(), 0);
        db.commit().unwrap();
    }

    #[test]
    fn close_releases_connection() {
        let db = memory_db();
        db.close().unwrap();

        let mut db = memory_db();
        db.begin().unwrap();
        db.close().unwrap();
    }
}
