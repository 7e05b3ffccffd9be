//! Asynchronous task adapter over embedded SQLite.
//!
//! Every operation on a [`Database`] or [`Statement`] returns a [`Task`]: one
//! native call that has not started yet. Await it, or [`Task::fork`] it with an
//! error and a success continuation; either way exactly one outcome is
//! reported. Build with the `node` feature to expose the same operations to
//! Node.js as Promise-returning methods.

pub mod db;
mod error;
mod mode;
mod models;
#[cfg(feature = "node")]
pub mod node;
mod task;
mod verbose;

pub use db::{Database, Params, Statement};
pub use error::{Error, Result};
pub use mode::{OpenMode, OpenOptions, OPEN_CREATE, OPEN_READONLY, OPEN_READWRITE};
pub use models::{Row, RunResult};
pub use task::{Canceler, Task};
pub use verbose::{is_verbose, verbose};

/// Version of the linked SQLite library.
pub fn sqlite_version() -> &'static str {
    rusqlite::version()
}
