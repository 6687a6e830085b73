#[cfg(test)]
pub(crate) mod fixtures;

use std::collections::BTreeMap;

use rusqlite::types::ValueRef;

use crate::error::{Error, Result};
use crate::metrics::types::{TrendSeries, ValueMetric};
use crate::query::builder::MetricQuery;
use crate::sql::Dialect;

/// A scalar cell returned by the execution layer.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
}

impl SqlValue {
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    pub fn as_text(&self) -> Option<String> {
        match self {
            SqlValue::Null => None,
            SqlValue::Integer(v) => Some(v.to_string()),
            SqlValue::Real(v) => Some(v.to_string()),
            SqlValue::Text(s) => Some(s.clone()),
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            SqlValue::Integer(v) => Some(*v),
            SqlValue::Real(v) => Some(*v as i64),
            SqlValue::Text(s) => s.trim().parse().ok(),
            SqlValue::Null => None,
        }
    }
}

/// Column name to value.
pub type Row = BTreeMap<String, SqlValue>;

/// Runs generated SQL. Implemented for `rusqlite::Connection`; other
/// backends plug in by reporting their [`Dialect`].
pub trait QueryExecutor {
    fn dialect(&self) -> Dialect;

    fn fetch(&self, sql: &str) -> Result<Vec<Row>>;
}

impl QueryExecutor for rusqlite::Connection {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    fn fetch(&self, sql: &str) -> Result<Vec<Row>> {
        let mut stmt = self.prepare(sql)?;
        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let mut rows = stmt.query([])?;

        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let mut record = Row::new();
            for (i, name) in columns.iter().enumerate() {
                let value = match row.get_ref(i)? {
                    ValueRef::Null => SqlValue::Null,
                    ValueRef::Integer(v) => SqlValue::Integer(v),
                    ValueRef::Real(v) => SqlValue::Real(v),
                    ValueRef::Text(t) | ValueRef::Blob(t) => {
                        SqlValue::Text(String::from_utf8_lossy(t).into_owned())
                    }
                };
                record.insert(name.clone(), value);
            }
            out.push(record);
        }
        Ok(out)
    }
}

/// Database wraps two `tokio_rusqlite::Connection` instances (writer + reader)
/// using WAL mode so metric reads never queue behind writes.
#[derive(Clone)]
pub struct Database {
    writer: tokio_rusqlite::Connection,
    reader: tokio_rusqlite::Connection,
}

impl Database {
    /// Open the database at the default path (`~/.trendline/trendline.db`).
    pub async fn open() -> Result<Self> {
        let dir = dirs::home_dir()
            .ok_or_else(|| Error::Config("cannot determine home directory".into()))?
            .join(".trendline");
        std::fs::create_dir_all(&dir).map_err(|e| Error::Config(e.to_string()))?;
        Self::open_at(dir.join("trendline.db")).await
    }

    /// Open the database at the given path.
    pub async fn open_at(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let writer = tokio_rusqlite::Connection::open(&path).await?;
        Self::init(&writer).await?;

        let reader = tokio_rusqlite::Connection::open(&path).await?;
        Self::init(&reader).await?;

        Ok(Self { writer, reader })
    }

    /// Open an in-memory database (for testing).
    pub async fn open_memory() -> Result<Self> {
        let writer = tokio_rusqlite::Connection::open_in_memory().await?;
        Self::init(&writer).await?;

        // In-memory databases are per-connection, so both handles share one.
        Ok(Self {
            reader: writer.clone(),
            writer,
        })
    }

    async fn init(conn: &tokio_rusqlite::Connection) -> Result<()> {
        conn.call(|conn| {
            conn.execute_batch(
                "PRAGMA journal_mode=WAL;\
                 PRAGMA busy_timeout=5000;",
            )?;
            Ok::<(), rusqlite::Error>(())
        })
        .await?;
        Ok(())
    }

    /// Get a reference to the writer connection.
    pub fn writer(&self) -> &tokio_rusqlite::Connection {
        &self.writer
    }

    /// Get a reference to the reader connection.
    pub fn reader(&self) -> &tokio_rusqlite::Connection {
        &self.reader
    }

    /// Run a value query on the reader connection.
    pub async fn value(&self, query: MetricQuery) -> Result<ValueMetric> {
        self.reader
            .call(move |conn| Ok::<_, rusqlite::Error>(query.value(&*conn)))
            .await?
    }

    /// Run a trend query on the reader connection.
    pub async fn trends(&self, query: MetricQuery, in_percent: bool) -> Result<TrendSeries> {
        self.reader
            .call(move |conn| Ok::<_, rusqlite::Error>(query.trends(&*conn, in_percent)))
            .await?
    }
}
