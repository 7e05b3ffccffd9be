use rusqlite::Connection;
use serde::{Deserialize, Serialize};

/// A result row: column name to value, in the shape SQLite produced it.
pub type Row = serde_json::Map<String, serde_json::Value>;

/// Outcome of a write-style `run`.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunResult {
    #[serde(rename = "lastID")]
    pub last_id: i64,
    pub changes: u64,
}

impl RunResult {
    pub(crate) fn from_conn(conn: &Connection) -> Self {
        RunResult {
            last_id: conn.last_insert_rowid(),
            changes: conn.changes(),
        }
    }
}
