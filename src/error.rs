use thiserror::Error;

/// Failures that can cross the service boundary.
///
/// Code and hash collisions during insertion are recovered inside the create
/// loop and never show up here.
#[derive(Debug, Error)]
pub enum ShortUrlError {
    /// Every insert attempt collided with an existing code.
    #[error("failed to generate a unique short code")]
    CodesExhausted,

    /// The store could not be opened or a connection could not be checked out.
    #[error("short url store unavailable: {0}")]
    Unavailable(String),

    /// Any other storage-layer failure.
    #[error("storage query failed: {0}")]
    Storage(#[from] diesel::result::Error),
}
