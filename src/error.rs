//! Error types for gearman-client.

use thiserror::Error;

/// Main error type for all client and worker-side operations.
#[derive(Debug, Error)]
pub enum GearmanError {
    /// Invalid server configuration (empty list, empty or malformed address).
    #[error("invalid server list: {0}")]
    Config(String),

    /// Every configured server was unreachable at pool construction.
    #[error("no job servers reachable")]
    NoServers,

    /// I/O error on a live connection.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Bounded connect attempt elapsed before the server answered.
    #[error("timed out connecting to {0}")]
    ConnectTimeout(String),

    /// The server closed the connection mid-conversation.
    #[error("connection closed by server")]
    ConnectionClosed,

    /// Malformed or unexpected frame (bad magic, unknown command, bad fields).
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Explicit `error` packet from the server. Aborts the run in progress.
    #[error("server error {code}: {text}")]
    Server { code: String, text: String },

    /// No factory registered under the requested job name.
    #[error("no job registered under {0:?}")]
    UnknownJob(String),

    /// Single-call submission only: the submitted task reported failure.
    #[error("job {0:?} reported failure")]
    TaskFailed(String),

    /// The deadline elapsed before the awaited response arrived.
    #[error("deadline elapsed before {0:?} completed")]
    Deadline(String),

    /// JSON serialization/deserialization of task arguments or results.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias using GearmanError.
pub type Result<T> = std::result::Result<T, GearmanError>;
