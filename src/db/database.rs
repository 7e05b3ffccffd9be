//! Database module - the connection handle and its task-returning operations

use crate::db::params::{bind, Params};
use crate::db::row::{all_rows, first_row, for_each_row, step_to_end};
use crate::db::Statement;
use crate::error::{misuse, Error, Result};
use crate::mode::{OpenMode, OpenOptions};
use crate::models::{Row, RunResult};
use crate::task::{Gate, Task};
use crate::verbose::is_verbose;
use rusqlite::{Connection, InterruptHandle};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::debug;

pub(crate) struct Shared {
    conn: Mutex<Option<Connection>>,
    interrupt: Arc<InterruptHandle>,
    path: String,
}

impl Shared {
    /// Lock the connection and open the gate for one native call.
    pub(crate) fn with_conn<T>(
        &self,
        gate: &Gate,
        f: impl FnOnce(&Connection) -> Result<T>,
    ) -> Result<T> {
        let guard = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        gate.run(|| {
            let conn = guard.as_ref().ok_or_else(|| misuse("Database is closed"))?;
            f(conn)
        })
    }
}

/// Handle to an open SQLite connection.
///
/// Clones share the same native connection; it is closed by [`Database::close`]
/// or when the last clone is dropped.
#[derive(Clone)]
pub struct Database {
    pub(crate) shared: Arc<Shared>,
}

impl fmt::Debug for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Database")
            .field("path", &self.shared.path)
            .finish()
    }
}

fn open_native(path: &str, options: &OpenOptions) -> Result<Connection> {
    let flags = options.mode.to_flags();
    let conn = if path == ":memory:" {
        Connection::open_in_memory_with_flags(flags)?
    } else {
        Connection::open_with_flags(path, flags)?
    };

    if options.extended_result_codes {
        conn.execute_batch("PRAGMA extended_result_codes = ON")?;
    }
    if options.foreign_keys {
        conn.execute_batch("PRAGMA foreign_keys = ON")?;
    }
    if let Some(timeout) = options.busy_timeout {
        conn.busy_timeout(timeout)?;
    }
    Ok(conn)
}

impl Database {
    /// Open `path` (or `":memory:"`) with the given mode flags.
    pub fn open(path: impl Into<String>, mode: OpenMode) -> Task<Database> {
        Self::open_with(path, OpenOptions::new(mode))
    }

    pub fn open_with(path: impl Into<String>, options: OpenOptions) -> Task<Database> {
        let path = path.into();
        debug!(op = "open", path = %path, mode = options.mode.bits(), "dispatching");
        Task::new("open", None, move |gate| {
            let conn = gate.run(|| open_native(&path, &options))?;
            let interrupt = Arc::new(conn.get_interrupt_handle());
            Ok(Database {
                shared: Arc::new(Shared {
                    conn: Mutex::new(Some(conn)),
                    interrupt,
                    path,
                }),
            })
        })
    }

    /// Path this handle was opened with.
    pub fn path(&self) -> &str {
        &self.shared.path
    }

    /// Build a task that runs `f` against the locked connection.
    pub(crate) fn task<T, F>(&self, op: &'static str, f: F) -> Task<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    {
        debug!(op, "dispatching");
        let shared = Arc::clone(&self.shared);
        Task::new(op, Some(Arc::clone(&self.shared.interrupt)), move |gate| {
            shared.with_conn(gate, f)
        })
    }

    /// Like [`Database::task`], for operations carrying SQL text.
    pub(crate) fn sql_task<T, F>(&self, op: &'static str, sql: String, f: F) -> Task<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection, &str) -> Result<T> + Send + 'static,
    {
        if is_verbose() {
            debug!(target: "sqlite_task::sql", op, sql = %sql, "statement");
        }
        self.task(op, move |conn| f(conn, &sql))
    }

    /// Close the native connection. Later operations on any clone fail with
    /// a misuse error.
    pub fn close(&self) -> Task<()> {
        debug!(op = "close", "dispatching");
        let shared = Arc::clone(&self.shared);
        Task::new("close", Some(Arc::clone(&self.shared.interrupt)), move |gate| {
            let mut guard = shared.conn.lock().unwrap_or_else(PoisonError::into_inner);
            gate.run(|| {
                let conn = guard.take().ok_or_else(|| misuse("Database is closed"))?;
                conn.close().map_err(|(conn, err)| {
                    *guard = Some(conn);
                    Error::Sqlite(err)
                })
            })
        })
    }

    /// Execute one statement and report the last row id and change count.
    pub fn run(&self, sql: impl Into<String>, params: impl Into<Params>) -> Task<RunResult> {
        let sql = sql.into();
        let params = params.into();
        self.sql_task("run", sql, move |conn, sql| {
            let mut stmt = conn.prepare(sql)?;
            bind(&mut stmt, &params)?;
            step_to_end(&mut stmt)?;
            Ok(RunResult::from_conn(conn))
        })
    }

    /// First row of the result, or `None` when the query matches nothing.
    pub fn get(&self, sql: impl Into<String>, params: impl Into<Params>) -> Task<Option<Row>> {
        let sql = sql.into();
        let params = params.into();
        self.sql_task("get", sql, move |conn, sql| {
            let mut stmt = conn.prepare(sql)?;
            bind(&mut stmt, &params)?;
            first_row(&mut stmt)
        })
    }

    pub fn all(&self, sql: impl Into<String>, params: impl Into<Params>) -> Task<Vec<Row>> {
        let sql = sql.into();
        let params = params.into();
        self.sql_task("all", sql, move |conn, sql| {
            let mut stmt = conn.prepare(sql)?;
            bind(&mut stmt, &params)?;
            all_rows(&mut stmt)
        })
    }

    /// Deliver rows one at a time to `on_row`, resolving with the row count.
    ///
    /// `on_row` runs on the worker thread while the connection is held, so it
    /// must not block on another task against this database. An error from it
    /// aborts the iteration and becomes the task's error.
    pub fn each<F, E>(
        &self,
        sql: impl Into<String>,
        params: impl Into<Params>,
        mut on_row: F,
    ) -> Task<usize>
    where
        F: FnMut(Row) -> std::result::Result<(), E> + Send + 'static,
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let sql = sql.into();
        let params = params.into();
        self.sql_task("each", sql, move |conn, sql| {
            let mut stmt = conn.prepare(sql)?;
            bind(&mut stmt, &params)?;
            for_each_row(&mut stmt, |row| {
                on_row(row).map_err(|e| Error::Delivery(e.into()))
            })
        })
    }

    /// Execute zero or more `;`-separated statements without parameters.
    pub fn exec(&self, sql: impl Into<String>) -> Task<()> {
        let sql = sql.into();
        self.sql_task("exec", sql, move |conn, sql| {
            conn.execute_batch(sql)?;
            Ok(())
        })
    }

    /// Compile `sql`, bind `params` to it and hand back a statement handle.
    pub fn prepare(&self, sql: impl Into<String>, params: impl Into<Params>) -> Task<Statement> {
        let sql = sql.into();
        let params = params.into();
        let db = self.clone();
        self.sql_task("prepare", sql, move |conn, sql| {
            {
                let mut stmt = conn.prepare_cached(sql)?;
                bind(&mut stmt, &params)?;
            }
            Ok(Statement::new(db, sql.to_owned(), params))
        })
    }

    /// Set how long a call waits on a locked database before failing with `SQLITE_BUSY`.
    pub fn configure_busy_timeout(&self, timeout: Duration) -> Task<()> {
        self.task("configure", move |conn| {
            conn.busy_timeout(timeout)?;
            Ok(())
        })
    }

    /// Abort whatever native call is currently running on this connection.
    pub fn interrupt(&self) {
        debug!(op = "interrupt", path = %self.shared.path, "interrupting");
        self.shared.interrupt.interrupt();
    }

    /// Load a run-time loadable extension into this connection.
    ///
    /// # Safety
    ///
    /// The extension runs arbitrary native code inside the process; the caller
    /// vouches for the library at `path`.
    #[cfg(feature = "load_extension")]
    pub unsafe fn load_extension(&self, path: impl Into<String>) -> Task<()> {
        let path = path.into();
        self.task("load_extension", move |conn| {
            // SAFETY: the caller of `load_extension` vouches for the library.
            unsafe {
                let _guard = rusqlite::LoadExtensionGuard::new(conn)?;
                conn.load_extension(&path, None::<&str>)?;
            }
            Ok(())
        })
    }
}
