use crate::schema::short_urls;
use diesel::prelude::*;
use serde::Serialize;

/// A short-code → target-URL mapping, decoded once at the storage boundary.
///
/// Rows are immutable: they are inserted by the create path and removed by
/// the cleanup paths, never updated in place.
#[derive(Selectable, Queryable, Serialize, Debug, Clone, PartialEq, Eq)]
#[diesel(table_name = short_urls)]
pub struct ShortUrl {
    pub code: String,
    pub target_url: String,
    pub target_hash: String,
    pub created_at: i64,
    pub expires_at: i64,
}

#[derive(Insertable, Clone)]
#[diesel(table_name = short_urls)]
pub struct NewShortUrl<'a> {
    pub code: &'a str,
    pub target_url: &'a str,
    pub target_hash: &'a str,
    pub created_at: i64,
    pub expires_at: i64,
}
