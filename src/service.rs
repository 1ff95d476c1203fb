//! Short-URL issuance, resolution and expiry.
//!
//! All mutation goes through the insert/delete operations in this module;
//! rows are never updated in place. Uniqueness is enforced by the storage
//! layer (primary key on `code`, unique index on `target_hash`), which is
//! also the serialization point for concurrent creators; no in-process
//! locks are taken.

use std::path::Path;

use chrono::Utc;
use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel::sqlite::SqliteConnection;
use nanoid::nanoid;
use sha2::{Digest, Sha256};

use crate::db;
use crate::error::ShortUrlError;
use crate::models::{NewShortUrl, ShortUrl};
use crate::schema::short_urls;

/// Length of every generated code.
pub const CODE_LENGTH: usize = 7;

/// Alphabet for generated codes; visually confusable characters
/// (`0`, `O`, `I`, `1`, `l`) are excluded.
pub const CODE_ALPHABET: [char; 57] = [
    'A', 'B', 'C', 'D', 'E', 'F', 'G', 'H', 'J', 'K', 'L', 'M', 'N', 'P', 'Q', 'R', 'S', 'T', 'U',
    'V', 'W', 'X', 'Y', 'Z', 'a', 'b', 'c', 'd', 'e', 'f', 'g', 'h', 'i', 'j', 'k', 'm', 'n', 'o',
    'p', 'q', 'r', 's', 't', 'u', 'v', 'w', 'x', 'y', 'z', '2', '3', '4', '5', '6', '7', '8', '9',
];

/// Records live at most one year.
pub const MAX_TTL_SECONDS: i64 = 31_536_000;

/// A non-positive TTL is clamped up to this, so a record is never born
/// expired.
const MIN_TTL_SECONDS: i64 = 1;

const INSERT_ATTEMPTS: u32 = 10;

pub fn generate_code() -> String {
    nanoid!(CODE_LENGTH, &CODE_ALPHABET)
}

/// Deterministic fingerprint of a target URL: SHA-256, lowercase hex.
pub fn target_hash(target_url: &str) -> String {
    hex::encode(Sha256::digest(target_url.as_bytes()))
}

/// Outcome of a single insert attempt, classified by which uniqueness
/// constraint (if any) rejected it.
enum InsertOutcome {
    Inserted(ShortUrl),
    CodeTaken,
    TargetTaken,
}

fn try_insert(
    conn: &mut SqliteConnection,
    candidate: &str,
    target: &str,
    fingerprint: &str,
    now: i64,
    expires: i64,
) -> Result<InsertOutcome, ShortUrlError> {
    let row = NewShortUrl {
        code: candidate,
        target_url: target,
        target_hash: fingerprint,
        created_at: now,
        expires_at: expires,
    };

    match diesel::insert_into(short_urls::table)
        .values(&row)
        .execute(conn)
    {
        Ok(_) => Ok(InsertOutcome::Inserted(ShortUrl {
            code: candidate.to_owned(),
            target_url: target.to_owned(),
            target_hash: fingerprint.to_owned(),
            created_at: now,
            expires_at: expires,
        })),
        Err(DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info)) => {
            // sqlite names the violated column:
            // "UNIQUE constraint failed: short_urls.target_hash"
            if info.message().contains("target_hash") {
                Ok(InsertOutcome::TargetTaken)
            } else {
                Ok(InsertOutcome::CodeTaken)
            }
        }
        Err(err) => Err(err.into()),
    }
}

/// Mints (or reuses) a short code for `target`.
///
/// At most one active code exists per distinct target URL: a repeated call
/// before expiry returns the existing record unchanged, and concurrent
/// callers racing on the same target converge on the winner's row via the
/// hash-uniqueness constraint.
pub fn create_short_url(
    conn: &mut SqliteConnection,
    target: &str,
    ttl_seconds: i64,
    now: i64,
) -> Result<ShortUrl, ShortUrlError> {
    let ttl = ttl_seconds.clamp(MIN_TTL_SECONDS, MAX_TTL_SECONDS);
    let expires = now + ttl;
    let fingerprint = target_hash(target);

    if let Some(existing) = find_active_by_hash(conn, &fingerprint, now)? {
        return Ok(existing);
    }

    // A stale row for this target would trip the hash constraint below.
    delete_expired_by_hash(conn, &fingerprint, now)?;

    // Housekeeping piggybacked on the write path; bounds table growth but is
    // not required for correctness of this call.
    cleanup_expired(conn, now)?;

    for _ in 0..INSERT_ATTEMPTS {
        let candidate = generate_code();
        match try_insert(conn, &candidate, target, &fingerprint, now, expires)? {
            InsertOutcome::Inserted(record) => return Ok(record),
            InsertOutcome::CodeTaken => continue,
            InsertOutcome::TargetTaken => {
                // A concurrent create for the same target won the insert;
                // converge on its row.
                if let Some(existing) = find_active_by_hash(conn, &fingerprint, now)? {
                    return Ok(existing);
                }
                // The winner's row has already lapsed; clear it and retry.
                delete_expired_by_hash(conn, &fingerprint, now)?;
            }
        }
    }

    Err(ShortUrlError::CodesExhausted)
}

/// Primary-key lookup. An expired-but-not-yet-purged row behaves exactly
/// like an absent one.
pub fn find_active_by_code(
    conn: &mut SqliteConnection,
    lookup: &str,
    now: i64,
) -> Result<Option<ShortUrl>, ShortUrlError> {
    use crate::schema::short_urls::dsl::*;

    let found = short_urls
        .filter(code.eq(lookup))
        .filter(expires_at.gt(now))
        .first::<ShortUrl>(conn)
        .optional()?;
    Ok(found)
}

/// Deletes every row with `expires_at <= now`; returns the number removed.
pub fn cleanup_expired(conn: &mut SqliteConnection, now: i64) -> Result<usize, ShortUrlError> {
    use crate::schema::short_urls::dsl::*;

    let deleted = diesel::delete(short_urls.filter(expires_at.le(now))).execute(conn)?;
    Ok(deleted)
}

fn find_active_by_hash(
    conn: &mut SqliteConnection,
    fingerprint: &str,
    now: i64,
) -> Result<Option<ShortUrl>, ShortUrlError> {
    use crate::schema::short_urls::dsl::*;

    let found = short_urls
        .filter(target_hash.eq(fingerprint))
        .filter(expires_at.gt(now))
        .first::<ShortUrl>(conn)
        .optional()?;
    Ok(found)
}

fn delete_expired_by_hash(
    conn: &mut SqliteConnection,
    fingerprint: &str,
    now: i64,
) -> Result<usize, ShortUrlError> {
    use crate::schema::short_urls::dsl::*;

    let deleted = diesel::delete(
        short_urls
            .filter(target_hash.eq(fingerprint))
            .filter(expires_at.le(now)),
    )
    .execute(conn)?;
    Ok(deleted)
}

/// Pool-backed front of the conn-level operations above.
///
/// All configuration (the storage path) is passed in at construction; the
/// only state is the lazily-checked-out pooled connection.
#[derive(Clone)]
pub struct ShortUrlService {
    pool: deadpool_diesel::sqlite::Pool,
}

impl ShortUrlService {
    /// Opens the store at `db_path`, provisioning directory and schema if
    /// this is the first use.
    pub async fn open(db_path: impl AsRef<Path>) -> Result<Self, ShortUrlError> {
        let pool = db::open_pool(db_path.as_ref()).await?;
        Ok(Self { pool })
    }

    pub async fn create(
        &self,
        target_url: String,
        ttl_seconds: i64,
    ) -> Result<ShortUrl, ShortUrlError> {
        let now = Utc::now().timestamp();
        self.with_conn(move |conn| create_short_url(conn, &target_url, ttl_seconds, now))
            .await
    }

    /// The resolve path: purge whatever has expired, then look the code up.
    pub async fn resolve(&self, code: String) -> Result<Option<ShortUrl>, ShortUrlError> {
        let now = Utc::now().timestamp();
        self.with_conn(move |conn| {
            cleanup_expired(conn, now)?;
            find_active_by_code(conn, &code, now)
        })
        .await
    }

    pub async fn cleanup(&self) -> Result<usize, ShortUrlError> {
        let now = Utc::now().timestamp();
        self.with_conn(move |conn| cleanup_expired(conn, now)).await
    }

    async fn with_conn<T, F>(&self, run: F) -> Result<T, ShortUrlError>
    where
        F: FnOnce(&mut SqliteConnection) -> Result<T, ShortUrlError> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self
            .pool
            .get()
            .await
            .map_err(|err| ShortUrlError::Unavailable(err.to_string()))?;
        conn.interact(move |conn| {
            conn.batch_execute(db::CONNECTION_PRAGMAS)?;
            run(conn)
        })
        .await
        .map_err(|err| ShortUrlError::Unavailable(err.to_string()))?
    }
}
