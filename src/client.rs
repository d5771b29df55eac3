//! Client: pool orchestration, the run loop, and response routing.
//!
//! The client owns the [`ConnectionPool`] and drives one [`TaskSet`] at a
//! time through a single readiness-multiplexed loop:
//! 1. submit one unsent task per iteration (random live connection),
//! 2. wait for any connection to have data, bounded by the poll timeout,
//! 3. read at most one packet per connection and route it into the set.
//!
//! There are no worker threads and no spawned tasks; everything a `Client`
//! does happens on the caller's task, so connection state (including each
//! pending-handle queue) needs no locking.
//!
//! # Example
//!
//! ```ignore
//! use gearman_client::{Client, Task, TaskSet};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> gearman_client::Result<()> {
//!     let mut client = Client::connect_local().await?;
//!
//!     let mut set = TaskSet::new();
//!     set.add_task(Task::new("reverse", json!("hello")));
//!     client.run_set(&mut set, None).await?;
//!
//!     println!("{:?}", set.task(0).result);
//!     Ok(())
//! }
//! ```

use std::time::{Duration, Instant};

use serde_json::Value;

use crate::connection::Connection;
use crate::error::{GearmanError, Result};
use crate::pool::ConnectionPool;
use crate::protocol::Packet;
use crate::set::TaskSet;
use crate::task::{decode_result, Task, TaskKind};

/// Upper bound on one readiness poll; also the cap a run deadline is
/// clamped to per iteration.
pub const MAX_POLL_TIMEOUT: Duration = Duration::from_secs(10);

/// Default per-server connect timeout, in microseconds.
pub const DEFAULT_CONNECT_TIMEOUT_MICROS: u64 = 1000;

/// A client for submitting jobs to one or more job servers.
pub struct Client {
    pool: ConnectionPool,
}

impl Client {
    /// Connect to the given servers, each bounded by the microsecond
    /// timeout. Unreachable servers are dropped from the pool.
    pub async fn connect(servers: &[String], connect_timeout_micros: u64) -> Result<Self> {
        let timeout = Duration::from_micros(connect_timeout_micros);
        let pool = ConnectionPool::connect(servers, timeout).await?;
        Ok(Self { pool })
    }

    /// Connect to a single local server with the default timeout.
    pub async fn connect_local() -> Result<Self> {
        Self::connect(&["localhost".to_string()], DEFAULT_CONNECT_TIMEOUT_MICROS).await
    }

    /// The underlying connection pool.
    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    /// The underlying connection pool, mutably (worker-side collaborators
    /// reuse the same send/try_read primitives).
    pub fn pool_mut(&mut self) -> &mut ConnectionPool {
        &mut self.pool
    }

    /// Close every pooled connection. The client cannot submit afterwards.
    pub fn disconnect(&mut self) {
        self.pool.close_all();
    }

    /// Run a set of tasks until every task is terminal or the deadline
    /// elapses.
    ///
    /// With a deadline, the loop stops once it has elapsed and leaves any
    /// unfinished tasks in their last observed state; that is not an error.
    /// Without one, a server that never answers blocks the run indefinitely
    /// (each poll still wakes at least every [`MAX_POLL_TIMEOUT`]).
    ///
    /// # Errors
    ///
    /// An explicit `error` packet, an unrecognized packet type, or an I/O
    /// failure on a pooled connection aborts the run. Individual `work_fail`
    /// responses are task state, not errors.
    pub async fn run_set(&mut self, set: &mut TaskSet, deadline: Option<Duration>) -> Result<()> {
        let poll_timeout = poll_timeout(deadline);
        let started = Instant::now();
        let mut next_unsubmitted = 0;

        while !set.is_complete() {
            if let Some(limit) = deadline {
                if started.elapsed() >= limit {
                    tracing::debug!("run deadline elapsed with unfinished tasks");
                    break;
                }
            }

            // One submission per iteration, in add order, so no connection's
            // inbound buffer grows unread for long.
            if next_unsubmitted < set.len() {
                self.submit_task(set, next_unsubmitted).await?;
                if set.task(next_unsubmitted).kind.is_background() {
                    // Fire-and-forget: terminal at submission, handle or not.
                    set.task_mut(next_unsubmitted).finished = true;
                    set.decrement_remaining();
                }
                next_unsubmitted += 1;
                if set.is_complete() {
                    break;
                }
            }

            if !self.pool.any_buffered() {
                self.pool.wait_readable(poll_timeout).await;
            }

            for conn in self.pool.connections_mut() {
                if let Some(packet) = conn.try_read()? {
                    Self::route_packet(set, conn, packet)?;
                }
            }
        }

        Ok(())
    }

    /// Submit one task: pick a connection at random, send the submission
    /// packet for the task's kind, and enqueue the task on that
    /// connection's pending-handle queue. Never waits for a response.
    ///
    /// Returns the pool index of the chosen connection.
    async fn submit_task(&mut self, set: &TaskSet, index: usize) -> Result<usize> {
        if self.pool.is_empty() {
            return Err(GearmanError::NoServers);
        }

        let task = set.task(index);
        let command = task.kind.submit_command();
        let arg = task.encode_arg()?;
        let func = task.func.clone();
        let uniq = task.uniq.clone().unwrap_or_default();

        let conn_index = self.pool.pick_random();
        let conn = self.pool.get_mut(conn_index);
        conn.send(command, &[func.as_bytes(), uniq.as_bytes(), &arg[..]])
            .await?;
        conn.push_pending(index);

        tracing::debug!("submitted {} as {} on {}", func, command, conn.peer());
        Ok(conn_index)
    }

    /// Route one response packet into the set.
    ///
    /// `job_created` correlates by the connection's pending-handle queue
    /// (strict FIFO); every other type correlates by handle and is ignored
    /// when the handle is not in this set's index.
    fn route_packet(set: &mut TaskSet, conn: &mut Connection, packet: Packet) -> Result<()> {
        match packet.name() {
            "job_created" => {
                let handle = packet.field_str("handle")?.to_string();
                let index = conn.pop_pending().ok_or_else(|| {
                    GearmanError::Protocol(format!(
                        "job_created on {} with no submission pending",
                        conn.peer()
                    ))
                })?;
                let task = set.task_mut(index);
                task.handle = Some(handle.clone());
                if task.kind.is_background() {
                    // Idempotent with the submission path.
                    task.finished = true;
                }
                set.register_handle(&handle, index);
            }
            "work_complete" => {
                let handle = packet.field_str("handle")?;
                match set.index_of_handle(handle) {
                    Some(index) => {
                        let raw = packet.field("result").cloned().unwrap_or_default();
                        set.task_mut(index).complete(decode_result(&raw));
                        set.decrement_remaining();
                    }
                    None => {
                        tracing::debug!("ignoring work_complete for unknown handle {}", handle)
                    }
                }
            }
            "work_status" => {
                let handle = packet.field_str("handle")?;
                match set.index_of_handle(handle) {
                    Some(index) => {
                        let numerator = packet.field_u64("numerator")?;
                        let denominator = packet.field_u64("denominator")?;
                        set.task_mut(index).update_progress(numerator, denominator);
                    }
                    None => tracing::debug!("ignoring work_status for unknown handle {}", handle),
                }
            }
            "work_fail" => {
                let handle = packet.field_str("handle")?;
                match set.index_of_handle(handle) {
                    Some(index) => {
                        set.task_mut(index).fail();
                        set.decrement_remaining();
                    }
                    None => tracing::debug!("ignoring work_fail for unknown handle {}", handle),
                }
            }
            "error" => {
                let code = lossy_field(&packet, "err_code");
                let text = lossy_field(&packet, "err_text");
                tracing::error!("server error {}: {}", code, text);
                return Err(GearmanError::Server { code, text });
            }
            other => {
                return Err(GearmanError::Protocol(format!(
                    "unexpected {} packet from {}",
                    other,
                    conn.peer()
                )))
            }
        }
        Ok(())
    }

    /// Submit a single result-awaited task and run it to completion.
    ///
    /// Sugar for one task in one set: returns the decoded result, or
    /// [`GearmanError::TaskFailed`] / [`GearmanError::Deadline`] when the
    /// task failed or the deadline elapsed first.
    pub async fn do_task(
        &mut self,
        func: &str,
        arg: Value,
        kind: TaskKind,
        deadline: Option<Duration>,
    ) -> Result<Value> {
        let mut set = TaskSet::new();
        let index = set.add_task(Task::with_kind(func, arg, kind));
        self.run_set(&mut set, deadline).await?;

        let task = set.task(index);
        if task.failed {
            return Err(GearmanError::TaskFailed(func.to_string()));
        }
        match &task.result {
            Some(result) => Ok(result.clone()),
            None => Err(GearmanError::Deadline(func.to_string())),
        }
    }

    /// Submit a single fire-and-forget task and return its server handle.
    ///
    /// Unlike [`run_set`](Self::run_set), which treats a background task as
    /// finished the moment it is sent (its handle may still be unassigned),
    /// this call keeps reading the chosen connection until the `job_created`
    /// acknowledgement arrives, so the returned handle is always assigned.
    pub async fn do_background(
        &mut self,
        func: &str,
        arg: Value,
        kind: TaskKind,
        deadline: Option<Duration>,
    ) -> Result<String> {
        let mut set = TaskSet::new();
        let index = set.add_task(Task::with_kind(func, arg, kind));
        let conn_index = self.submit_task(&set, index).await?;
        set.task_mut(index).finished = true;
        set.decrement_remaining();

        let limit = deadline.unwrap_or(MAX_POLL_TIMEOUT);
        let started = Instant::now();
        loop {
            if let Some(handle) = set.task(index).handle.clone() {
                return Ok(handle);
            }
            let left = match limit.checked_sub(started.elapsed()) {
                Some(left) if !left.is_zero() => left,
                _ => return Err(GearmanError::Deadline(func.to_string())),
            };

            let conn = self.pool.get_mut(conn_index);
            if let Some(packet) = conn.read_packet(left.min(MAX_POLL_TIMEOUT)).await? {
                Self::route_packet(&mut set, conn, packet)?;
            }
        }
    }
}

/// Per-iteration poll timeout: the run deadline, capped at
/// [`MAX_POLL_TIMEOUT`]; the cap alone when no deadline is set.
fn poll_timeout(deadline: Option<Duration>) -> Duration {
    match deadline {
        Some(d) => d.min(MAX_POLL_TIMEOUT),
        None => MAX_POLL_TIMEOUT,
    }
}

fn lossy_field(packet: &Packet, name: &str) -> String {
    packet
        .field(name)
        .map(|b| String::from_utf8_lossy(b).into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_poll_timeout_without_deadline() {
        assert_eq!(poll_timeout(None), MAX_POLL_TIMEOUT);
    }

    #[test]
    fn test_poll_timeout_caps_long_deadline() {
        assert_eq!(
            poll_timeout(Some(Duration::from_secs(60))),
            MAX_POLL_TIMEOUT
        );
    }

    #[test]
    fn test_poll_timeout_short_deadline_passes_through() {
        assert_eq!(
            poll_timeout(Some(Duration::from_secs(2))),
            Duration::from_secs(2)
        );
    }
}
