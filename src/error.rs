use rusqlite::ffi;
use thiserror::Error;

/// Errors surfaced by adapter tasks.
///
/// Native failures are forwarded as-is in [`Error::Sqlite`]; the remaining
/// variants only arise from the adapter's own task plumbing.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    /// The per-row callback of an `each` operation returned an error.
    #[error("row delivery failed: {0}")]
    Delivery(Box<dyn std::error::Error + Send + Sync>),

    /// Cancellation was requested before the native call started.
    #[error("task cancelled before it started")]
    Cancelled,

    /// The worker running the native call failed or panicked.
    #[error("worker failed: {0}")]
    Worker(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    /// Native result code, when the error came from SQLite.
    pub fn sqlite_code(&self) -> Option<rusqlite::ErrorCode> {
        match self {
            Error::Sqlite(err) => err.sqlite_error_code(),
            _ => None,
        }
    }
}

/// Build the `SQLITE_MISUSE` failure SQLite itself reports for use of a dead handle.
pub(crate) fn misuse(message: &str) -> Error {
    Error::Sqlite(rusqlite::Error::SqliteFailure(
        ffi::Error::new(ffi::SQLITE_MISUSE),
        Some(message.to_owned()),
    ))
}
