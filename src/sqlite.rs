//! SQLite driver glue: opening connections, binding parameters and
//! materializing executed statements.

use std::path::PathBuf;

use rusqlite::{Connection, OpenFlags};

use crate::config::DatabaseConfig;
use crate::error::{DbError, Result};
use crate::statement::Statement;
use crate::value::{Params, Placeholder, Value};

/// Code reported when the driver gives no result code of its own.
const UNKNOWN_CODE: i32 = -1;

/// Extended SQLite result code of a driver error, if any.
pub(crate) fn error_code(e: &rusqlite::Error) -> i32 {
    match e {
        rusqlite::Error::SqliteFailure(err, _) => err.extended_code,
        _ => UNKNOWN_CODE,
    }
}

/// Filesystem location of the database named by a config.
pub(crate) fn database_path(config: &DatabaseConfig) -> PathBuf {
    PathBuf::from(&config.host).join(&config.name)
}

/// Open a connection for an already validated config.
pub(crate) fn open(config: &DatabaseConfig) -> Result<Connection> {
    let opened = if config.is_in_memory() {
        Connection::open_in_memory()
    } else {
        let mut flags = OpenFlags::default();
        if !config.create_if_missing {
            flags.remove(OpenFlags::SQLITE_OPEN_CREATE);
        }
        Connection::open_with_flags(database_path(config), flags)
    };
    opened.map_err(|e| DbError::Connection {
        code: error_code(&e),
        message: e.to_string(),
    })
}

/// Rows changed by INSERT, UPDATE and DELETE since the connection opened.
fn total_changes(conn: &Connection) -> rusqlite::Result<i64> {
    conn.query_row("SELECT total_changes()", [], |row| row.get(0))
}

/// Prepare, bind and run `sql`, materializing any rows it produces.
pub(crate) fn execute(
    conn: &Connection,
    owner: u64,
    sql: &str,
    params: &Params,
) -> rusqlite::Result<Statement> {
    let mut stmt = conn.prepare(sql)?;
    let expected = stmt.parameter_count();
    let mut bound = vec![false; expected];
    for (token, value) in params.iter() {
        let index = match Placeholder::parse(token) {
            Placeholder::Position(index) => index,
            Placeholder::Name(name) => stmt
                .parameter_index(&name)?
                .ok_or(rusqlite::Error::InvalidParameterName(name))?,
        };
        stmt.raw_bind_parameter(index, value)?;
        if let Some(slot) = index.checked_sub(1).and_then(|i| bound.get_mut(i)) {
            *slot = true;
        }
    }
    // Every placeholder in the SQL needs a value; unbound ones would run as NULL.
    let bound_count = bound.iter().filter(|b| **b).count();
    if bound_count != expected {
        return Err(rusqlite::Error::InvalidParameterCount(bound_count, expected));
    }

    let column_count = stmt.column_count();
    if column_count == 0 {
        // `changes()` keeps the last DML count across DDL and transaction
        // statements, so only trust it when this statement moved the total.
        let before = total_changes(conn)?;
        let affected = stmt.raw_execute()?;
        let after = total_changes(conn)?;
        let affected = if after == before { 0 } else { affected };
        return Ok(Statement::with_changes(owner, sql, affected));
    }

    let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
    let mut rows = Vec::new();
    let mut cursor = stmt.raw_query();
    while let Some(row) = cursor.next()? {
        let values = (0..column_count)
            .map(|i| row.get_ref(i).map(Value::from))
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.push(values);
    }
    Ok(Statement::with_rows(owner, sql, columns, rows))
}
