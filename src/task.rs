//! Task module - the uniform asynchronous shape every adapter operation returns
//!
//! A [`Task`] describes exactly one native call that has not started yet. It
//! can be awaited, or forked with an error and a success continuation; either
//! way it resolves exactly one outcome. Forking hands back a [`Canceler`].

use crate::error::{Error, Result};
use rusqlite::InterruptHandle;
use std::any::Any;
use std::fmt;
use std::future::{Future, IntoFuture};
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Pending,
    Cancelled,
    Running,
    Done,
}

/// Shared between a task and its cancelers; decides whether the native call
/// may start and whom to interrupt while it runs.
pub(crate) struct Gate {
    phase: Mutex<Phase>,
    interrupt: Option<Arc<InterruptHandle>>,
}

impl Gate {
    fn new(interrupt: Option<Arc<InterruptHandle>>) -> Self {
        Gate {
            phase: Mutex::new(Phase::Pending),
            interrupt,
        }
    }

    fn phase(&self) -> std::sync::MutexGuard<'_, Phase> {
        self.phase.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run the native call `f` unless cancellation came first. Callers hold
    /// the connection lock across this so an interrupt only reaches `f`.
    pub(crate) fn run<T>(&self, f: impl FnOnce() -> Result<T>) -> Result<T> {
        self.begin()?;
        let outcome = f();
        self.finish();
        outcome
    }

    fn begin(&self) -> Result<()> {
        let mut phase = self.phase();
        if *phase == Phase::Cancelled {
            return Err(Error::Cancelled);
        }
        *phase = Phase::Running;
        Ok(())
    }

    fn finish(&self) {
        let mut phase = self.phase();
        if *phase == Phase::Running {
            *phase = Phase::Done;
        }
    }

    fn cancel(&self) {
        let mut phase = self.phase();
        match *phase {
            Phase::Pending => *phase = Phase::Cancelled,
            Phase::Running => {
                if let Some(handle) = &self.interrupt {
                    handle.interrupt();
                }
            }
            Phase::Cancelled | Phase::Done => {}
        }
    }
}

type Job<T> = Box<dyn FnOnce(&Gate) -> Result<T> + Send>;

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        format!("panicked: {msg}")
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        format!("panicked: {msg}")
    } else {
        "panicked".to_owned()
    }
}

/// One not-yet-started native call resolving to `Result<T>`.
#[must_use = "a task does nothing until it is awaited, forked or run"]
pub struct Task<T> {
    op: &'static str,
    gate: Arc<Gate>,
    job: Job<T>,
}

impl<T> fmt::Debug for Task<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task").field("op", &self.op).finish()
    }
}

impl<T: Send + 'static> Task<T> {
    pub(crate) fn new<F>(op: &'static str, interrupt: Option<Arc<InterruptHandle>>, job: F) -> Self
    where
        F: FnOnce(&Gate) -> Result<T> + Send + 'static,
    {
        Task {
            op,
            gate: Arc::new(Gate::new(interrupt)),
            job: Box::new(job),
        }
    }

    /// Name of the wrapped operation, e.g. `"stmt-run"`.
    pub fn op(&self) -> &'static str {
        self.op
    }

    /// A handle that can cancel this task once it is awaited or forked.
    pub fn canceler(&self) -> Canceler {
        Canceler {
            gate: Arc::clone(&self.gate),
        }
    }

    /// Run the native call on the current thread.
    ///
    /// Meant for callers already on a worker thread; on an async executor
    /// await the task instead. A panic inside the call (an `each` callback,
    /// say) is caught and reported as [`Error::Worker`].
    pub fn run_blocking(self) -> Result<T> {
        let Task { op, gate, job } = self;
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| job(&gate)))
            .unwrap_or_else(|payload| Err(Error::Worker(panic_message(&*payload))));
        gate.finish();
        trace!(op, ok = outcome.is_ok(), "task completed");
        outcome
    }

    /// Start the task and report its outcome through exactly one of
    /// `on_error` or `on_success`.
    ///
    /// The call is issued on tokio's blocking pool when a runtime is current,
    /// otherwise on a fresh thread. Control returns immediately.
    pub fn fork<E, S>(self, on_error: E, on_success: S) -> Canceler
    where
        E: FnOnce(Error) + Send + 'static,
        S: FnOnce(T) + Send + 'static,
    {
        let canceler = self.canceler();
        let work = move || match self.run_blocking() {
            Ok(value) => on_success(value),
            Err(err) => on_error(err),
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn_blocking(work);
            }
            Err(_) => {
                std::thread::spawn(work);
            }
        }
        canceler
    }
}

impl<T: Send + 'static> IntoFuture for Task<T> {
    type Output = Result<T>;
    type IntoFuture = Pin<Box<dyn Future<Output = Result<T>> + Send>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(async move {
            tokio::task::spawn_blocking(move || self.run_blocking())
                .await
                .map_err(|e| Error::Worker(e.to_string()))?
        })
    }
}

/// Cancellation request for one task. Requesting it always succeeds.
///
/// Before the native call starts, the call is skipped and the task fails with
/// [`Error::Cancelled`]. While it runs, the connection is interrupted and the
/// task fails with SQLite's interrupt error. After completion it does nothing.
#[derive(Clone)]
pub struct Canceler {
    gate: Arc<Gate>,
}

impl Canceler {
    pub fn cancel(&self) {
        self.gate.cancel();
    }
}

impl fmt::Debug for Canceler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Canceler")
            .field("phase", &*self.gate.phase())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc;

    fn ok_task(value: u32) -> Task<u32> {
        Task::new("test", None, move |gate| gate.run(|| Ok(value)))
    }

    #[test]
    fn run_blocking_returns_value() {
        assert_eq!(ok_task(7).run_blocking().unwrap(), 7);
    }

    #[test]
    fn cancel_before_start_skips_job() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        let task = Task::new("test", None, move |gate| {
            gate.run(|| {
                seen.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
        });
        task.canceler().cancel();
        assert!(matches!(task.run_blocking(), Err(Error::Cancelled)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn cancel_after_completion_is_noop() {
        let task = ok_task(1);
        let canceler = task.canceler();
        assert_eq!(task.run_blocking().unwrap(), 1);
        canceler.cancel();
        canceler.cancel();
    }

    #[test]
    fn fork_without_runtime_fires_once() {
        let (tx, rx) = mpsc::channel();
        let err_tx = tx.clone();
        let _canceler = ok_task(3).fork(
            move |e| err_tx.send(Err(e.to_string())).unwrap(),
            move |v| tx.send(Ok(v)).unwrap(),
        );
        assert_eq!(rx.recv().unwrap(), Ok(3));
        assert!(rx.recv().is_err());
    }

    #[tokio::test]
    async fn awaiting_runs_on_blocking_pool() {
        assert_eq!(ok_task(11).await.unwrap(), 11);
    }

    #[test]
    fn panicking_job_becomes_worker_error() {
        let task: Task<()> = Task::new("test", None, |gate| gate.run(|| panic!("boom")));
        let canceler = task.canceler();
        let err = task.run_blocking().unwrap_err();
        assert_eq!(err.to_string(), "worker failed: panicked: boom");
        canceler.cancel();
    }

    #[tokio::test]
    async fn job_error_reaches_caller() {
        let task: Task<()> = Task::new("test", None, |_| Err(Error::Worker("boom".into())));
        let err = task.await.unwrap_err();
        assert_eq!(err.to_string(), "worker failed: boom");
    }
}
