//! Minimal relational database handle over SQLite.
//!
//! # Intention
//!
//! - Open one connection from `{host, name, user, pass}` settings.
//! - Run parameterized queries and fetch rows as column-name maps.
//! - Expose basic transaction control and storage timestamp helpers.
//!
//! # Architectural Boundaries
//!
//! - Connection management, SQL parsing and execution belong to the driver.
//! - No pooling, retries, migrations, query building or schema management.
//!
//! ```no_run
//! use rust_db::{Database, DatabaseConfig, Params};
//!
//! # fn main() -> rust_db::Result<()> {
//! let mut db = Database::connect(&DatabaseConfig::new("/var/lib/app", "app.db", "app", ""))?;
//! let stmt = db.query(
//!     "SELECT name FROM users WHERE id = :id",
//!     Some(&Params::new().with_value(":id", 7)),
//! )?;
//! while let Some(row) = db.fetch_one(Some(&stmt))? {
//!     println!("{:?}", row["name"]);
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod database;
pub mod error;
mod sqlite;
pub mod statement;
pub mod timestamp;
pub mod value;

pub use config::{DatabaseConfig, DRIVER_NAME};
pub use database::Database;
pub use error::{DbError, Result};
pub use statement::{Row, Statement};
pub use timestamp::{to_instant, to_storage_timestamp, STORAGE_FORMAT};
pub use value::{Params, Value};
