//! Statement module - prepared statement handles and their operations

use crate::db::params::{bind, Params};
use crate::db::row::{all_rows, for_each_row, step_to_end};
use crate::db::Database;
use crate::error::{misuse, Error, Result};
use crate::models::{Row, RunResult};
use crate::task::Task;
use rusqlite::Connection;
use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

struct State {
    params: Params,
    /// Rows of the execution `get` is stepping through; `None` until the
    /// first `get` after a bind, reset or exhaustion.
    pending: Option<VecDeque<Row>>,
    finalized: bool,
}

/// Handle to a statement prepared on a [`Database`].
///
/// Parameters given to `prepare` or `bind` stay attached and are reused by
/// operations called with empty parameters; non-empty parameters replace them.
#[derive(Clone)]
pub struct Statement {
    db: Database,
    sql: Arc<str>,
    state: Arc<Mutex<State>>,
}

impl fmt::Debug for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Statement").field("sql", &self.sql).finish()
    }
}

impl Statement {
    pub(crate) fn new(db: Database, sql: String, params: Params) -> Self {
        Statement {
            db,
            sql: sql.into(),
            state: Arc::new(Mutex::new(State {
                params,
                pending: None,
                finalized: false,
            })),
        }
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    fn lock(state: &Mutex<State>) -> Result<MutexGuard<'_, State>> {
        let guard = state.lock().unwrap_or_else(PoisonError::into_inner);
        if guard.finalized {
            return Err(misuse("Statement is already finalized"));
        }
        Ok(guard)
    }

    /// Run `f` with the statement recompiled and its current parameters bound.
    fn task<T, F>(&self, op: &'static str, params: Params, f: F) -> Task<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection, &mut rusqlite::Statement<'_>, &mut State) -> Result<T>
            + Send
            + 'static,
    {
        let sql = Arc::clone(&self.sql);
        let state = Arc::clone(&self.state);
        self.db.task(op, move |conn| {
            let mut state = Self::lock(&state)?;
            let mut stmt = conn.prepare_cached(&sql)?;
            if !params.is_empty() {
                bind(&mut stmt, &params)?;
                state.params = params;
                state.pending = None;
            } else {
                bind(&mut stmt, &state.params)?;
            }
            f(conn, &mut *stmt, &mut *state)
        })
    }

    /// Release the statement. Any later operation on it fails with a misuse error.
    pub fn finalize(&self) -> Task<()> {
        debug!(op = "stmt-finalize", "dispatching");
        let state = Arc::clone(&self.state);
        Task::new("stmt-finalize", None, move |gate| {
            let mut state = Self::lock(&state)?;
            gate.run(|| {
                state.finalized = true;
                state.params = Params::None;
                Ok(())
            })
        })
    }

    /// Rewind [`Statement::get`] to the first row; bound parameters stay.
    pub fn reset(&self) -> Task<()> {
        self.task("stmt-reset", Params::None, |_, _, state| {
            state.pending = None;
            Ok(())
        })
    }

    /// Replace the attached parameters.
    pub fn bind(&self, params: impl Into<Params>) -> Task<()> {
        let params = params.into();
        let sql = Arc::clone(&self.sql);
        let state = Arc::clone(&self.state);
        self.db.task("stmt-bind", move |conn| {
            let mut state = Self::lock(&state)?;
            {
                let mut stmt = conn.prepare_cached(&sql)?;
                bind(&mut stmt, &params)?;
            }
            state.params = params;
            state.pending = None;
            Ok(())
        })
    }

    /// Next row of the result set, or `None` once it is exhausted.
    ///
    /// The statement executes once per bind/reset cycle and later calls step
    /// through that result. After `None` the next call executes it again from
    /// the first row.
    pub fn get(&self, params: impl Into<Params>) -> Task<Option<Row>> {
        self.task("stmt-get", params.into(), |_, stmt, state| {
            let mut rows = match state.pending.take() {
                Some(rows) => rows,
                None => VecDeque::from(all_rows(stmt)?),
            };
            let row = rows.pop_front();
            if row.is_some() {
                state.pending = Some(rows);
            }
            Ok(row)
        })
    }

    pub fn run(&self, params: impl Into<Params>) -> Task<RunResult> {
        self.task("stmt-run", params.into(), |conn, stmt, state| {
            step_to_end(stmt)?;
            state.pending = None;
            Ok(RunResult::from_conn(conn))
        })
    }

    pub fn all(&self, params: impl Into<Params>) -> Task<Vec<Row>> {
        self.task("stmt-all", params.into(), |_, stmt, state| {
            state.pending = None;
            all_rows(stmt)
        })
    }

    /// Deliver rows one at a time to `on_row`, resolving with the row count.
    ///
    /// See [`Database::each`] for the callback's constraints.
    pub fn each<F, E>(&self, params: impl Into<Params>, mut on_row: F) -> Task<usize>
    where
        F: FnMut(Row) -> std::result::Result<(), E> + Send + 'static,
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        self.task("stmt-each", params.into(), move |_, stmt, state| {
            state.pending = None;
            for_each_row(stmt, |row| {
                on_row(row).map_err(|e| Error::Delivery(e.into()))
            })
        })
    }
}
