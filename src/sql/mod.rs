//! SQL dialect layer
//!
//! Date truncation, labelling and interval arithmetic differ between
//! SQLite, PostgreSQL and MySQL. Everything dialect-specific lives behind
//! [`DialectFormatter`]; the trend builder only talks to the trait.

mod dialect;
mod mysql_dialect;
mod postgres_dialect;
mod sqlite_dialect;

pub use dialect::{weekday_name, DialectFormatter, WEEKDAY_NAMES};
pub use mysql_dialect::MysqlDialect;
pub use postgres_dialect::PostgresDialect;
pub use sqlite_dialect::SqliteDialect;

use serde::{Deserialize, Serialize};

/// Database backend identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    #[default]
    Sqlite,
    Postgres,
    Mysql,
}

impl Dialect {
    /// Resolve a backend name. Unknown names fall back to SQLite.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "sqlite" | "sqlite3" => Dialect::Sqlite,
            "postgres" | "postgresql" | "pgsql" => Dialect::Postgres,
            "mysql" | "mariadb" => Dialect::Mysql,
            other => {
                log::warn!("Unknown SQL dialect '{other}', using sqlite date functions");
                Dialect::Sqlite
            }
        }
    }

    /// Get the formatter for this backend
    pub fn formatter(&self) -> &'static dyn DialectFormatter {
        match self {
            Dialect::Sqlite => &SqliteDialect,
            Dialect::Postgres => &PostgresDialect,
            Dialect::Mysql => &MysqlDialect,
        }
    }

    pub fn name(&self) -> &'static str {
        self.formatter().name()
    }
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}
