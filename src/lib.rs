//! # gearman-client
//!
//! Client for the [Gearman](http://gearman.org/) job server.
//!
//! Submits named, parameterized jobs to one or more servers and receives
//! creation acknowledgements, progress updates, results, and failures over
//! the binary wire protocol.
//!
//! ## Architecture
//!
//! - **Protocol**: length-prefixed binary frames (`\0REQ`/`\0RES` magic,
//!   command code, NUL-separated fields), decoded resumably
//! - **Pool**: one connection per configured server, random selection for
//!   submissions, readiness polling across all of them
//! - **Run loop**: single task, no locks; submissions interleave with a
//!   bounded multiplexed wait, and responses are routed by handle, with
//!   `job_created` correlated through each connection's FIFO
//!   pending-handle queue
//!
//! ## Example
//!
//! ```ignore
//! use gearman_client::{Client, Task, TaskSet};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> gearman_client::Result<()> {
//!     let mut client = Client::connect(&["job1:4730".into(), "job2:4730".into()], 1000).await?;
//!
//!     let mut set = TaskSet::new();
//!     set.add_task(Task::new("resize", json!({"path": "a.png", "width": 120})));
//!     set.add_task(Task::background("cleanup", json!("/tmp/scratch")));
//!     client.run_set(&mut set, Some(std::time::Duration::from_secs(30))).await?;
//!     Ok(())
//! }
//! ```

pub mod connection;
pub mod error;
pub mod job;
pub mod pool;
pub mod protocol;

mod client;
mod set;
mod task;

pub use client::{Client, DEFAULT_CONNECT_TIMEOUT_MICROS, MAX_POLL_TIMEOUT};
pub use connection::{Connection, ServerSpec, DEFAULT_PORT};
pub use error::{GearmanError, Result};
pub use job::{Job, JobRegistry, WorkContext};
pub use pool::ConnectionPool;
pub use set::TaskSet;
pub use task::{decode_result, Task, TaskKind};
