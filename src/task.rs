//! Task: one unit of work submitted to a job server.
//!
//! A task carries its inputs (function name, argument, priority/background
//! class, correlation id) and the state the server's responses mutate: the
//! server-assigned handle, progress, result, and the terminal flags.

use bytes::Bytes;
use serde_json::Value;

use crate::error::Result;

/// Priority crossed with synchronous/background: the six submission
/// variants of the wire protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    /// Normal priority, result awaited.
    Normal,
    /// High priority, result awaited.
    High,
    /// Low priority, result awaited.
    Low,
    /// Normal priority, fire-and-forget.
    Background,
    /// High priority, fire-and-forget.
    HighBackground,
    /// Low priority, fire-and-forget.
    LowBackground,
}

impl TaskKind {
    /// Whether completion is not awaited by the client.
    #[inline]
    pub fn is_background(self) -> bool {
        matches!(
            self,
            TaskKind::Background | TaskKind::HighBackground | TaskKind::LowBackground
        )
    }

    /// The wire command used to submit a task of this kind.
    pub fn submit_command(self) -> &'static str {
        match self {
            TaskKind::Normal => "submit_job",
            TaskKind::High => "submit_job_high",
            TaskKind::Low => "submit_job_low",
            TaskKind::Background => "submit_job_bg",
            TaskKind::HighBackground => "submit_job_high_bg",
            TaskKind::LowBackground => "submit_job_low_bg",
        }
    }
}

/// One unit of work and its client-observed state.
#[derive(Debug, Clone)]
pub struct Task {
    /// Function (job) name registered on the workers.
    pub func: String,
    /// Argument payload. Strings, numbers, and booleans pass through as
    /// their text form; anything structured is JSON-encoded on the wire.
    pub arg: Value,
    /// Priority/background class.
    pub kind: TaskKind,
    /// Correlation id; the set assigns a uuid when absent.
    pub uniq: Option<String>,
    /// Server-assigned handle, known only after `job_created`.
    pub handle: Option<String>,
    /// Progress as a numerator/denominator pair.
    pub progress: (u64, u64),
    /// Decoded result, set by `work_complete`.
    pub result: Option<Value>,
    /// Terminal flag: completed, failed, or background-submitted.
    pub finished: bool,
    /// Set by `work_fail`.
    pub failed: bool,
}

impl Task {
    /// Create a normal-priority, result-awaited task.
    pub fn new(func: impl Into<String>, arg: Value) -> Self {
        Self::with_kind(func, arg, TaskKind::Normal)
    }

    /// Create a fire-and-forget task.
    pub fn background(func: impl Into<String>, arg: Value) -> Self {
        Self::with_kind(func, arg, TaskKind::Background)
    }

    /// Create a task of the given kind.
    pub fn with_kind(func: impl Into<String>, arg: Value, kind: TaskKind) -> Self {
        Self {
            func: func.into(),
            arg,
            kind,
            uniq: None,
            handle: None,
            progress: (0, 0),
            result: None,
            finished: false,
            failed: false,
        }
    }

    /// Record the result and mark the task finished.
    pub fn complete(&mut self, result: Value) {
        self.result = Some(result);
        self.finished = true;
    }

    /// Mark the task failed (and therefore finished).
    pub fn fail(&mut self) {
        self.failed = true;
        self.finished = true;
    }

    /// Update progress only; finished state and live-counts are untouched.
    pub fn update_progress(&mut self, numerator: u64, denominator: u64) {
        self.progress = (numerator, denominator);
    }

    /// Encode the argument for the wire: scalars pass through as text,
    /// structured values are JSON-encoded.
    pub fn encode_arg(&self) -> Result<Bytes> {
        Ok(match &self.arg {
            Value::Null => Bytes::new(),
            Value::String(s) => Bytes::copy_from_slice(s.as_bytes()),
            v if v.is_number() || v.is_boolean() => Bytes::from(v.to_string()),
            v => Bytes::from(serde_json::to_vec(v)?),
        })
    }
}

/// Decode a `work_complete` result payload.
///
/// Valid JSON decodes to its value; anything else is kept as a raw string,
/// so workers that reply with plain text round-trip unchanged.
pub fn decode_result(raw: &[u8]) -> Value {
    match serde_json::from_slice(raw) {
        Ok(value) => value,
        Err(_) => Value::String(String::from_utf8_lossy(raw).into_owned()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_kind_to_command() {
        assert_eq!(TaskKind::Normal.submit_command(), "submit_job");
        assert_eq!(TaskKind::High.submit_command(), "submit_job_high");
        assert_eq!(TaskKind::Low.submit_command(), "submit_job_low");
        assert_eq!(TaskKind::Background.submit_command(), "submit_job_bg");
        assert_eq!(TaskKind::HighBackground.submit_command(), "submit_job_high_bg");
        assert_eq!(TaskKind::LowBackground.submit_command(), "submit_job_low_bg");
    }

    #[test]
    fn test_background_detection() {
        assert!(!TaskKind::Normal.is_background());
        assert!(!TaskKind::High.is_background());
        assert!(!TaskKind::Low.is_background());
        assert!(TaskKind::Background.is_background());
        assert!(TaskKind::HighBackground.is_background());
        assert!(TaskKind::LowBackground.is_background());
    }

    #[test]
    fn test_complete_sets_result_and_finished() {
        let mut task = Task::new("reverse", json!("abc"));
        assert!(!task.finished);

        task.complete(json!("cba"));

        assert!(task.finished);
        assert!(!task.failed);
        assert_eq!(task.result, Some(json!("cba")));
    }

    #[test]
    fn test_fail_sets_both_flags() {
        let mut task = Task::new("reverse", json!("abc"));
        task.fail();

        assert!(task.finished);
        assert!(task.failed);
        assert!(task.result.is_none());
    }

    #[test]
    fn test_update_progress_leaves_finished_alone() {
        let mut task = Task::new("resize", json!("img.png"));
        task.update_progress(3, 10);

        assert_eq!(task.progress, (3, 10));
        assert!(!task.finished);
    }

    #[test]
    fn test_encode_arg_string_passthrough() {
        let task = Task::new("reverse", json!("abc"));
        assert_eq!(&task.encode_arg().unwrap()[..], b"abc");
    }

    #[test]
    fn test_encode_arg_scalars() {
        assert_eq!(&Task::new("f", json!(42)).encode_arg().unwrap()[..], b"42");
        assert_eq!(&Task::new("f", json!(true)).encode_arg().unwrap()[..], b"true");
        assert!(Task::new("f", Value::Null).encode_arg().unwrap().is_empty());
    }

    #[test]
    fn test_encode_arg_structured_is_json() {
        let task = Task::new("resize", json!({"width": 100}));
        let encoded = task.encode_arg().unwrap();
        assert_eq!(
            serde_json::from_slice::<Value>(&encoded).unwrap(),
            json!({"width": 100})
        );
    }

    #[test]
    fn test_decode_result_json() {
        assert_eq!(decode_result(b"{\"n\":1}"), json!({"n": 1}));
        assert_eq!(decode_result(b"[1,2]"), json!([1, 2]));
    }

    #[test]
    fn test_decode_result_raw_fallback() {
        assert_eq!(decode_result(b"cba"), json!("cba"));
    }
}
