//! Process-wide diagnostic mode

use once_cell::sync::OnceCell;
use std::os::raw::c_int;
use tracing::{debug, warn};

static VERBOSE: OnceCell<()> = OnceCell::new();

/// Switch the process into verbose mode. One-shot and irreversible.
///
/// Routes SQLite's global error log into `tracing` (target `sqlite`) and logs
/// the SQL text of every dispatched operation. The log hook can only be
/// installed before SQLite initialises, i.e. before the first connection is
/// opened; later calls still enable SQL logging and warn about the hook.
pub fn verbose() {
    VERBOSE.get_or_init(|| {
        // SAFETY: runs once per process; SQLite rejects the call with
        // SQLITE_MISUSE if it is already initialised.
        match unsafe { rusqlite::trace::config_log(Some(sqlite_log)) } {
            Ok(()) => debug!("sqlite error log routed to tracing"),
            Err(err) => warn!(error = %err, "sqlite already initialised, error log not installed"),
        }
    });
}

pub fn is_verbose() -> bool {
    VERBOSE.get().is_some()
}

fn sqlite_log(code: c_int, msg: &str) {
    match code & 0xff {
        rusqlite::ffi::SQLITE_NOTICE | rusqlite::ffi::SQLITE_WARNING => {
            debug!(target: "sqlite", code, "{msg}")
        }
        _ => warn!(target: "sqlite", code, "{msg}"),
    }
}
