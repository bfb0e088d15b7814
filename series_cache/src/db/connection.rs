//! SQLite connection helpers.
//!
//! [`connect_sqlite`] opens a connection and applies the connection-wide
//! PRAGMAs the store relies on: WAL journaling, foreign_keys=ON, and a 5000ms
//! busy_timeout.

use diesel::{Connection, SqliteConnection, connection::SimpleConnection};
use snafu::ResultExt;

use crate::store::{ConnectSnafu, QuerySnafu, StoreError};

/// Strip an optional `sqlite:` / `sqlite://` scheme; diesel wants a path.
pub fn sqlite_path(database_url: &str) -> &str {
    database_url
        .strip_prefix("sqlite://")
        .or_else(|| database_url.strip_prefix("sqlite:"))
        .unwrap_or(database_url)
}

/// Open a SQLite connection and apply connection-wide PRAGMAs.
pub fn connect_sqlite(database_url: &str) -> Result<SqliteConnection, StoreError> {
    let path = sqlite_path(database_url);
    let mut conn = SqliteConnection::establish(path).context(ConnectSnafu { url: path })?;

    // Better read concurrency, and wait instead of failing on a busy writer.
    conn.batch_execute("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON; PRAGMA busy_timeout=5000;")
        .context(QuerySnafu)?;
    Ok(conn)
}
