use std::fmt;
use std::path::Path;

use serde::Deserialize;

use crate::error::{DbError, Result};

/// Driver prefix used in connection strings.
pub const DRIVER_NAME: &str = "sqlite";

/// Connection settings for a [`Database`](crate::Database).
///
/// `host` is the directory holding the database files and `name` the file
/// within it. A `name` of `:memory:` opens a private in-memory database.
#[derive(Clone, PartialEq, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub pass: String,
    /// Create the database file when it does not exist yet.
    #[serde(default = "default_create_if_missing")]
    pub create_if_missing: bool,
}

fn default_create_if_missing() -> bool {
    true
}

impl DatabaseConfig {
    /// Create a config from the four connection settings
    pub fn new(
        host: impl Into<String>,
        name: impl Into<String>,
        user: impl Into<String>,
        pass: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            name: name.into(),
            user: user.into(),
            pass: pass.into(),
            create_if_missing: true,
        }
    }

    /// Config for a private in-memory database.
    pub fn in_memory() -> Self {
        Self::new("localhost", ":memory:", "", "")
    }

    /// Set whether a missing database file is created on connect.
    pub fn with_create_if_missing(mut self, create: bool) -> Self {
        self.create_if_missing = create;
        self
    }

    /// Parse a config from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| DbError::Configuration(e.to_string()))
    }

    /// Load a config from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            DbError::Configuration(format!(
                "failed to read configuration from {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml_str(&text)
    }

    /// Build the `<driver>:host=<host>;dbname=<name>` connection string.
    ///
    /// Only host and name are embedded; credentials travel separately.
    pub fn dsn(&self) -> Result<String> {
        if self.name.is_empty() {
            return Err(DbError::Configuration(
                "a database name was not properly defined - could not build dsn".to_string(),
            ));
        }
        if self.host.is_empty() {
            return Err(DbError::Configuration(
                "a database host was not properly defined - could not build dsn".to_string(),
            ));
        }
        Ok(format!("{}:host={};dbname={}", DRIVER_NAME, self.host, self.name))
    }

    pub(crate) fn is_in_memory(&self) -> bool {
        self.name == ":memory:"
    }
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("host", &self.host)
            .field("name", &self.name)
            .field("user", &self.user)
            .field("pass", &"<redacted>")
            .field("create_if_missing", &self.create_if_missing)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dsn_embeds_host_and_name() {
        let cfg = DatabaseConfig::new("/var/lib/app", "shop.db", "admin", "secret");
        assert_eq!(cfg.dsn().unwrap(), "sqlite:host=/var/lib/app;dbname=shop.db");

        for (host, name) in [("localhost", ":memory:"), ("db.internal", "users")] {
            let cfg = DatabaseConfig::new(host, name, "u", "p");
            assert_eq!(
                cfg.dsn().unwrap(),
                format!("{DRIVER_NAME}:host={host};dbname={name}")
            );
        }
    }

    #[test]
    fn dsn_rejects_missing_settings() {
        let no_host = DatabaseConfig::new("", "shop.db", "u", "p");
        assert!(matches!(no_host.dsn(), Err(DbError::Configuration(_))));

        let no_name = DatabaseConfig::new("localhost", "", "u", "p");
        match no_name.dsn() {
            Err(DbError::Configuration(msg)) => assert!(msg.contains("name")),
            other => panic!("expected configuration error, got {other:?}"),
        }
    }

    #[test]
    fn loads_from_toml() {
        let cfg = DatabaseConfig::from_toml_str(
            r#"
            host = "/srv/data"
            name = "app.db"
            user = "svc"
            pass = "hunter2"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.host, "/srv/data");
        assert_eq!(cfg.name, "app.db");
        assert!(cfg.create_if_missing);

        let cfg = DatabaseConfig::from_toml_str("host = \"a\"\nname = \"b\"\ncreate_if_missing = false")
            .unwrap();
        assert!(!cfg.create_if_missing);
        assert_eq!(cfg.user, "");

        assert!(matches!(
            DatabaseConfig::from_toml_str("host = 3"),
            Err(DbError::Configuration(_))
        ));
    }

    #[test]
    fn debug_redacts_password() {
        let cfg = DatabaseConfig::new("h", "n", "u", "hunter2");
        let printed = format!("{cfg:?}");
        assert!(!printed.contains("hunter2"));
        assert!(printed.contains("<redacted>"));
    }
}
