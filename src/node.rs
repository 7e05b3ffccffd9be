//! Node.js bindings: every adapter task surfaces as a Promise

use crate::{Database, Params, RunResult, Statement};
use napi::bindgen_prelude::*;
use napi::threadsafe_function::{ThreadsafeFunction, ThreadsafeFunctionCallMode};
use napi_derive::napi;
use serde_json::Value;

pub fn to_napi_error(err: crate::Error) -> napi::Error {
    napi::Error::from_reason(format!("SQLite Error: {}", err))
}

#[napi]
pub const OPEN_READONLY: i32 = crate::OPEN_READONLY.bits();
#[napi]
pub const OPEN_READWRITE: i32 = crate::OPEN_READWRITE.bits();
#[napi]
pub const OPEN_CREATE: i32 = crate::OPEN_CREATE.bits();

#[napi]
pub fn get_sqlite_version() -> String {
    crate::sqlite_version().to_string()
}

#[napi(js_name = "verbose")]
pub fn js_verbose() {
    crate::verbose();
}

#[napi(object)]
pub struct JsRunResult {
    #[napi(js_name = "lastID")]
    pub last_id: i64,
    pub changes: i64,
}

impl From<RunResult> for JsRunResult {
    fn from(result: RunResult) -> Self {
        JsRunResult {
            last_id: result.last_id,
            changes: i64::try_from(result.changes).unwrap_or(i64::MAX),
        }
    }
}

/// Drives one adapter task on the libuv pool and converts its output for JS.
pub struct NodeTask<U, T> {
    task: Option<crate::Task<U>>,
    wrap: fn(U) -> T,
}

impl<U: Send + 'static, T> NodeTask<U, T> {
    fn spawn(task: crate::Task<U>, wrap: fn(U) -> T, signal: Option<AbortSignal>) -> AsyncTask<Self>
    where
        Self: Task,
    {
        AsyncTask::with_optional_signal(
            NodeTask {
                task: Some(task),
                wrap,
            },
            signal,
        )
    }
}

impl<U, T> Task for NodeTask<U, T>
where
    U: Send + 'static,
    T: ToNapiValue + TypeName,
{
    type Output = U;
    type JsValue = T;

    fn compute(&mut self) -> Result<U> {
        self.task
            .take()
            .ok_or_else(|| Error::from_reason("task already consumed"))?
            .run_blocking()
            .map_err(to_napi_error)
    }

    fn resolve(&mut self, _env: Env, output: U) -> Result<T> {
        Ok((self.wrap)(output))
    }
}

fn row_to_js(row: Option<crate::Row>) -> Option<Value> {
    row.map(Value::Object)
}

fn rows_to_js(rows: Vec<crate::Row>) -> Vec<Value> {
    rows.into_iter().map(Value::Object).collect()
}

/// Counts reach JS as numbers; saturate rather than wrap.
fn count_to_js(count: usize) -> i64 {
    i64::try_from(count).unwrap_or(i64::MAX)
}

/// Hands each row to a node-style `(err, row)` callback.
fn deliver(callback: ThreadsafeFunction<Value>) -> impl FnMut(crate::Row) -> std::result::Result<(), String> {
    move |row| match callback.call(Ok(Value::Object(row)), ThreadsafeFunctionCallMode::Blocking) {
        Status::Ok => Ok(()),
        status => Err(format!("row callback failed: {status:?}")),
    }
}

#[napi(js_name = "Database")]
pub struct JsDatabase {
    inner: Database,
}

#[napi]
impl JsDatabase {
    #[napi]
    pub fn open(
        path: String,
        mode: Option<i32>,
        signal: Option<AbortSignal>,
    ) -> AsyncTask<NodeTask<Database, JsDatabase>> {
        let mode = mode
            .map(crate::OpenMode::from_bits_truncate)
            .unwrap_or_default();
        NodeTask::spawn(
            Database::open(path, mode),
            |inner| JsDatabase { inner },
            signal,
        )
    }

    #[napi]
    pub fn close(&self, signal: Option<AbortSignal>) -> AsyncTask<NodeTask<(), ()>> {
        NodeTask::spawn(self.inner.close(), |()| (), signal)
    }

    #[napi]
    pub fn run(
        &self,
        sql: String,
        params: Option<Value>,
        signal: Option<AbortSignal>,
    ) -> AsyncTask<NodeTask<RunResult, JsRunResult>> {
        NodeTask::spawn(self.inner.run(sql, Params::from(params)), JsRunResult::from, signal)
    }

    #[napi]
    pub fn get(
        &self,
        sql: String,
        params: Option<Value>,
        signal: Option<AbortSignal>,
    ) -> AsyncTask<NodeTask<Option<crate::Row>, Option<Value>>> {
        NodeTask::spawn(self.inner.get(sql, Params::from(params)), row_to_js, signal)
    }

    #[napi]
    pub fn all(
        &self,
        sql: String,
        params: Option<Value>,
        signal: Option<AbortSignal>,
    ) -> AsyncTask<NodeTask<Vec<crate::Row>, Vec<Value>>> {
        NodeTask::spawn(self.inner.all(sql, Params::from(params)), rows_to_js, signal)
    }

    #[napi]
    pub fn each(
        &self,
        sql: String,
        params: Option<Value>,
        callback: ThreadsafeFunction<Value>,
        signal: Option<AbortSignal>,
    ) -> AsyncTask<NodeTask<usize, i64>> {
        let task = self.inner.each(sql, Params::from(params), deliver(callback));
        NodeTask::spawn(task, count_to_js, signal)
    }

    #[napi]
    pub fn exec(&self, sql: String, signal: Option<AbortSignal>) -> AsyncTask<NodeTask<(), ()>> {
        NodeTask::spawn(self.inner.exec(sql), |()| (), signal)
    }

    #[napi]
    pub fn prepare(
        &self,
        sql: String,
        params: Option<Value>,
        signal: Option<AbortSignal>,
    ) -> AsyncTask<NodeTask<Statement, JsStatement>> {
        NodeTask::spawn(
            self.inner.prepare(sql, Params::from(params)),
            |inner| JsStatement { inner },
            signal,
        )
    }

    #[napi]
    pub fn interrupt(&self) {
        self.inner.interrupt();
    }

    #[napi]
    pub fn configure_busy_timeout(
        &self,
        millis: u32,
        signal: Option<AbortSignal>,
    ) -> AsyncTask<NodeTask<(), ()>> {
        let timeout = std::time::Duration::from_millis(u64::from(millis));
        NodeTask::spawn(self.inner.configure_busy_timeout(timeout), |()| (), signal)
    }
}

#[napi(js_name = "Statement")]
pub struct JsStatement {
    inner: Statement,
}

#[napi]
impl JsStatement {
    #[napi]
    pub fn finalize(&self, signal: Option<AbortSignal>) -> AsyncTask<NodeTask<(), ()>> {
        NodeTask::spawn(self.inner.finalize(), |()| (), signal)
    }

    #[napi]
    pub fn reset(&self, signal: Option<AbortSignal>) -> AsyncTask<NodeTask<(), ()>> {
        NodeTask::spawn(self.inner.reset(), |()| (), signal)
    }

    #[napi]
    pub fn bind(
        &self,
        params: Option<Value>,
        signal: Option<AbortSignal>,
    ) -> AsyncTask<NodeTask<(), ()>> {
        NodeTask::spawn(self.inner.bind(Params::from(params)), |()| (), signal)
    }

    #[napi]
    pub fn get(
        &self,
        params: Option<Value>,
        signal: Option<AbortSignal>,
    ) -> AsyncTask<NodeTask<Option<crate::Row>, Option<Value>>> {
        NodeTask::spawn(self.inner.get(Params::from(params)), row_to_js, signal)
    }

    #[napi]
    pub fn run(
        &self,
        params: Option<Value>,
        signal: Option<AbortSignal>,
    ) -> AsyncTask<NodeTask<RunResult, JsRunResult>> {
        NodeTask::spawn(self.inner.run(Params::from(params)), JsRunResult::from, signal)
    }

    #[napi]
    pub fn all(
        &self,
        params: Option<Value>,
        signal: Option<AbortSignal>,
    ) -> AsyncTask<NodeTask<Vec<crate::Row>, Vec<Value>>> {
        NodeTask::spawn(self.inner.all(Params::from(params)), rows_to_js, signal)
    }

    #[napi]
    pub fn each(
        &self,
        params: Option<Value>,
        callback: ThreadsafeFunction<Value>,
        signal: Option<AbortSignal>,
    ) -> AsyncTask<NodeTask<usize, i64>> {
        let task = self.inner.each(Params::from(params), deliver(callback));
        NodeTask::spawn(task, count_to_js, signal)
    }
}
