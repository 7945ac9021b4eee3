//! Executed statement handles.
//!
//! A [`Statement`] holds the fully materialized result of one query plus a
//! read cursor. Clones share the cursor, so the handle returned from
//! [`Database::query`](crate::Database::query) and the one the database keeps
//! as its last statement advance together.

use std::sync::{Arc, Mutex, MutexGuard};

use indexmap::IndexMap;

use crate::value::Value;

/// One fetched row: column name to value, in select-list order.
pub type Row = IndexMap<String, Value>;

#[derive(Debug)]
struct ResultSet {
    columns: Arc<[String]>,
    rows: Vec<Vec<Value>>,
    cursor: usize,
    row_count: usize,
}

/// Handle to an executed statement
#[derive(Debug, Clone)]
pub struct Statement {
    owner: u64,
    sql: Arc<str>,
    inner: Arc<Mutex<ResultSet>>,
}

impl Statement {
    /// Result of a statement that produced rows.
    pub(crate) fn with_rows(
        owner: u64,
        sql: &str,
        columns: Vec<String>,
        rows: Vec<Vec<Value>>,
    ) -> Self {
        let row_count = rows.len();
        Self::build(owner, sql, columns, rows, row_count)
    }

    /// Result of a statement that only changed rows.
    pub(crate) fn with_changes(owner: u64, sql: &str, affected: usize) -> Self {
        Self::build(owner, sql, Vec::new(), Vec::new(), affected)
    }

    fn build(
        owner: u64,
        sql: &str,
        columns: Vec<String>,
        rows: Vec<Vec<Value>>,
        row_count: usize,
    ) -> Self {
        Self {
            owner,
            sql: Arc::from(sql),
            inner: Arc::new(Mutex::new(ResultSet {
                columns: columns.into(),
                rows,
                cursor: 0,
                row_count,
            })),
        }
    }

    pub(crate) fn owner(&self) -> u64 {
        self.owner
    }

    /// SQL text this statement was prepared from
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Column names of the result, empty for statements that return no rows.
    pub fn columns(&self) -> Vec<String> {
        self.lock().columns.to_vec()
    }

    /// Rows produced by a query, or rows affected by a data change.
    pub fn row_count(&self) -> usize {
        self.lock().row_count
    }

    /// Next row, or `None` once the result is exhausted.
    pub fn fetch_one(&self) -> Option<Row> {
        let mut set = self.lock();
        let index = set.cursor;
        let values = set.rows.get_mut(index).map(std::mem::take)?;
        set.cursor += 1;
        Some(zip_row(&set.columns, values))
    }

    /// All remaining rows in order. Leaves the cursor exhausted.
    pub fn fetch_all(&self) -> Vec<Row> {
        let mut set = self.lock();
        let start = set.cursor.min(set.rows.len());
        set.cursor = set.rows.len();
        let columns = Arc::clone(&set.columns);
        set.rows
            .drain(start..)
            .map(|values| zip_row(&columns, values))
            .collect()
    }

    /// Whether both handles refer to the same executed statement.
    pub fn same_as(&self, other: &Statement) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    // The cursor and rows stay consistent even if a holder panicked.
    fn lock(&self) -> MutexGuard<'_, ResultSet> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn zip_row(columns: &[String], values: Vec<Value>) -> Row {
    columns.iter().cloned().zip(values).collect()
}
