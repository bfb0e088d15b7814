//! set up migrations

use diesel::SqliteConnection;
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};

use crate::{
    db::connection::connect_sqlite,
    store::{MigrationSnafu, StoreError},
};

/// Embedded Diesel migrations bundled with this crate.
///
/// These are applied by [`run_sqlite`] to bring the database schema up to date.
pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Apply pending migrations on an open connection. Returns the number applied.
pub fn run_pending(conn: &mut SqliteConnection) -> Result<usize, StoreError> {
    let applied = conn.run_pending_migrations(MIGRATIONS).map_err(|e| {
        MigrationSnafu {
            message: e.to_string(),
        }
        .build()
    })?;
    Ok(applied.len())
}

/// Runs pending Diesel migrations on a SQLite database at the given URL.
pub fn run_sqlite(url: &str) -> Result<usize, StoreError> {
    let mut conn = connect_sqlite(url)?;
    run_pending(&mut conn)
}
