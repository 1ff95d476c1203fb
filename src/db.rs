use std::fs;
use std::path::Path;

use diesel::connection::SimpleConnection;
use diesel::sqlite::SqliteConnection;
use diesel::QueryResult;

use crate::error::ShortUrlError;

/// The store is self-provisioning: the table and indexes are created on
/// first open, so deployment needs no separate migration step.
const SCHEMA_SQL: &str = "\
CREATE TABLE IF NOT EXISTS short_urls (
    code TEXT PRIMARY KEY NOT NULL,
    target_url TEXT NOT NULL,
    target_hash TEXT NOT NULL UNIQUE,
    created_at BIGINT NOT NULL,
    expires_at BIGINT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_short_urls_expires_at ON short_urls (expires_at);
";

/// Applied on every pooled connection before use; `busy_timeout` is a
/// per-connection setting, so it cannot be folded into the one-shot schema
/// bootstrap.
pub(crate) const CONNECTION_PRAGMAS: &str = "PRAGMA busy_timeout = 5000;";

/// Creates the table and expiry index if they do not exist yet.
pub fn init_schema(conn: &mut SqliteConnection) -> QueryResult<()> {
    conn.batch_execute(SCHEMA_SQL)
}

/// Opens (and provisions) the sqlite store at `db_path`, returning a
/// connection pool.
///
/// The parent directory is created if missing. The first connection
/// bootstraps the schema and switches the database file to WAL journal mode;
/// WAL is persistent, so this only has an effect on a fresh store.
pub async fn open_pool(db_path: &Path) -> Result<deadpool_diesel::sqlite::Pool, ShortUrlError> {
    if let Some(dir) = db_path.parent() {
        fs::create_dir_all(dir).map_err(|err| {
            ShortUrlError::Unavailable(format!("cannot create {}: {}", dir.display(), err))
        })?;
    }

    let manager = deadpool_diesel::sqlite::Manager::new(
        db_path.display().to_string(),
        deadpool_diesel::Runtime::Tokio1,
    );
    let pool = deadpool_diesel::sqlite::Pool::builder(manager)
        .build()
        .map_err(|err| ShortUrlError::Unavailable(err.to_string()))?;

    let conn = pool
        .get()
        .await
        .map_err(|err| ShortUrlError::Unavailable(err.to_string()))?;
    conn.interact(|conn| {
        conn.batch_execute("PRAGMA journal_mode = WAL;")?;
        init_schema(conn)
    })
    .await
    .map_err(|err| ShortUrlError::Unavailable(err.to_string()))??;

    Ok(pool)
}
