//! Worker-side job interface.
//!
//! The worker's execution loop lives outside this crate; what it consumes
//! from here is the [`Job`] capability (execute, and report status,
//! completion, or failure over the same wire primitives the client uses),
//! the [`WorkContext`] that carries the connection and server handle a job
//! reports through, and the name -> factory [`JobRegistry`].

mod registry;

pub use registry::JobRegistry;

use std::future::Future;
use std::pin::Pin;

use serde_json::Value;

use crate::connection::Connection;
use crate::error::Result;

/// Boxed future for job results.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Reporting surface handed to a running job: the connection the work was
/// assigned on, and the server handle identifying it.
pub struct WorkContext<'c> {
    conn: &'c mut Connection,
    handle: String,
}

impl<'c> WorkContext<'c> {
    /// Bind a context to a connection and a server handle.
    pub fn new(conn: &'c mut Connection, handle: impl Into<String>) -> Self {
        Self {
            conn,
            handle: handle.into(),
        }
    }

    /// The server handle of the running job.
    pub fn handle(&self) -> &str {
        &self.handle
    }

    /// Report progress as a numerator/denominator pair (`work_status`).
    pub async fn status(&mut self, numerator: u64, denominator: u64) -> Result<()> {
        self.conn
            .send(
                "work_status",
                &[
                    self.handle.as_bytes(),
                    numerator.to_string().as_bytes(),
                    denominator.to_string().as_bytes(),
                ],
            )
            .await
    }

    /// Report the job's result (`work_complete`). Structured results are
    /// JSON-encoded, matching what the client decodes.
    pub async fn complete(&mut self, result: &Value) -> Result<()> {
        let payload = match result {
            Value::String(s) => s.clone().into_bytes(),
            v => serde_json::to_vec(v)?,
        };
        self.conn
            .send("work_complete", &[self.handle.as_bytes(), &payload[..]])
            .await
    }

    /// Report failure (`work_fail`).
    pub async fn fail(&mut self) -> Result<()> {
        self.conn.send("work_fail", &[self.handle.as_bytes()]).await
    }
}

/// The job-handling capability: execute one assigned unit of work.
///
/// Implementations receive the decoded argument and a [`WorkContext`] for
/// incremental status; the returned value is what the worker reports as
/// `work_complete`. Returning an error makes the worker report `work_fail`.
pub trait Job: Send {
    /// Execute the job.
    fn execute<'c>(&'c mut self, ctx: WorkContext<'c>, arg: Value) -> BoxFuture<'c, Result<Value>>;
}
