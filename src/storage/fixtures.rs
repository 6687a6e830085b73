//! Shared `test_data` table for engine tests. `now` is pinned to
//! 2025-04-10 02:38:15.

use chrono::NaiveDateTime;
use rusqlite::{params, Connection};

use crate::date_util::parse_timestamp;
use crate::query::builder::MetricQuery;

pub const NOW: &str = "2025-04-10 02:38:15";

/// Row timestamps, oldest first. Row `i` gets value `(i + 1) * 10` and
/// category `category{i % 3 + 1}`.
pub const DATES: [&str; 26] = [
    "2024-02-10 02:38:15",
    "2024-03-10 02:38:15",
    "2024-04-10 02:38:15",
    "2025-01-10 02:38:15",
    "2025-02-10 02:38:15",
    "2025-03-10 02:38:15",
    "2025-03-20 02:38:15",
    "2025-03-27 02:38:15",
    "2025-04-03 02:38:15",
    "2025-04-06 02:38:15",
    "2025-04-07 02:38:15",
    "2025-04-08 02:38:15",
    "2025-04-09 02:38:15",
    "2025-04-09 22:38:15",
    "2025-04-09 23:38:15",
    "2025-04-10 00:38:15",
    "2025-04-10 01:38:15",
    "2025-04-10 02:34:15",
    "2025-04-10 02:35:15",
    "2025-04-10 02:36:15",
    "2025-04-10 02:37:15",
    "2025-04-10 02:38:11",
    "2025-04-10 02:38:12",
    "2025-04-10 02:38:13",
    "2025-04-10 02:38:14",
    "2025-04-10 02:38:15",
];

pub fn now() -> NaiveDateTime {
    ts(NOW)
}

pub fn ts(s: &str) -> NaiveDateTime {
    parse_timestamp(s).unwrap()
}

/// A query on `test_data` evaluated at the pinned `now`.
pub fn query() -> MetricQuery {
    MetricQuery::new("test_data").at(now())
}

pub fn create_test_table(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "CREATE TABLE test_data (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            value NUMERIC,
            category TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );",
    )
}

pub fn insert(conn: &Connection, value: f64, category: &str, at: &str) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO test_data (name, value, category, created_at, updated_at)
         VALUES ('Item', ?1, ?2, ?3, ?3)",
        params![value, category, at],
    )?;
    Ok(())
}

/// Create `test_data` and fill it with the 26 standard rows.
pub fn seed_test_data(conn: &Connection) -> rusqlite::Result<()> {
    create_test_table(conn)?;
    for (i, at) in DATES.iter().enumerate() {
        let category = format!("category{}", i % 3 + 1);
        insert(conn, ((i + 1) * 10) as f64, &category, at)?;
    }
    Ok(())
}

/// In-memory connection with the standard rows.
pub fn seeded() -> Connection {
    let conn = Connection::open_in_memory().unwrap();
    seed_test_data(&conn).unwrap();
    conn
}

/// In-memory connection with an empty `test_data` table.
pub fn empty() -> Connection {
    let conn = Connection::open_in_memory().unwrap();
    create_test_table(&conn).unwrap();
    conn
}
