//! Task set: a batch of tasks submitted and awaited together.
//!
//! The set owns the handle -> task index used to route unsolicited response
//! packets in O(1), and the live-count that serves as the run loop's
//! completion predicate. A set belongs to one run; it is not shared across
//! runs.

use std::collections::HashMap;

use uuid::Uuid;

use crate::task::Task;

/// Ordered collection of tasks with completion tracking.
#[derive(Debug, Default)]
pub struct TaskSet {
    tasks: Vec<Task>,
    /// Tasks not yet terminal. Background tasks leave this count at
    /// submission time, not at acknowledgement.
    remaining: usize,
    /// Handle -> position in `tasks`, populated at `job_created`.
    handles: HashMap<String, usize>,
}

impl TaskSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a task, assigning a correlation id if it has none.
    ///
    /// Returns the task's position, stable for the lifetime of the set.
    pub fn add_task(&mut self, mut task: Task) -> usize {
        if task.uniq.is_none() {
            task.uniq = Some(Uuid::new_v4().simple().to_string());
        }
        self.tasks.push(task);
        self.remaining += 1;
        self.tasks.len() - 1
    }

    /// Completion predicate: no live tasks remain.
    #[inline]
    pub fn is_complete(&self) -> bool {
        self.remaining == 0
    }

    /// Number of tasks in the set.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Check whether the set has no tasks.
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Tasks in submission order.
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    /// Get a task by position.
    pub fn task(&self, index: usize) -> &Task {
        &self.tasks[index]
    }

    /// Get a task by position, mutably.
    pub fn task_mut(&mut self, index: usize) -> &mut Task {
        &mut self.tasks[index]
    }

    /// Resolve a server handle to its task, if this set knows it.
    ///
    /// Unknown handles resolve to `None` rather than raising; stray frames
    /// for other activity on a shared connection must not abort a run.
    pub fn task_by_handle(&self, handle: &str) -> Option<&Task> {
        self.handles.get(handle).map(|&i| &self.tasks[i])
    }

    /// Resolve a server handle to a task position.
    pub(crate) fn index_of_handle(&self, handle: &str) -> Option<usize> {
        self.handles.get(handle).copied()
    }

    /// Record the handle assigned to the task at `index`.
    pub(crate) fn register_handle(&mut self, handle: &str, index: usize) {
        self.handles.insert(handle.to_string(), index);
    }

    /// Take one task off the live-count (terminal event or background
    /// submission).
    pub(crate) fn decrement_remaining(&mut self) {
        self.remaining = self.remaining.saturating_sub(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::TaskKind;
    use serde_json::json;

    #[test]
    fn test_add_task_assigns_uniq() {
        let mut set = TaskSet::new();
        let idx = set.add_task(Task::new("reverse", json!("abc")));

        let uniq = set.task(idx).uniq.clone().unwrap();
        assert!(!uniq.is_empty());
    }

    #[test]
    fn test_add_task_keeps_caller_uniq() {
        let mut set = TaskSet::new();
        let mut task = Task::new("reverse", json!("abc"));
        task.uniq = Some("my-correlation-id".to_string());
        let idx = set.add_task(task);

        assert_eq!(set.task(idx).uniq.as_deref(), Some("my-correlation-id"));
    }

    #[test]
    fn test_live_count_tracks_adds_and_terminals() {
        let mut set = TaskSet::new();
        assert!(set.is_complete());

        set.add_task(Task::new("a", json!(1)));
        set.add_task(Task::new("b", json!(2)));
        assert!(!set.is_complete());

        set.decrement_remaining();
        assert!(!set.is_complete());
        set.decrement_remaining();
        assert!(set.is_complete());

        // Stray extra decrements must not wrap.
        set.decrement_remaining();
        assert!(set.is_complete());
    }

    #[test]
    fn test_handle_index_roundtrip() {
        let mut set = TaskSet::new();
        let idx = set.add_task(Task::with_kind("c", json!(3), TaskKind::High));
        set.register_handle("H:lap:7", idx);

        assert_eq!(set.index_of_handle("H:lap:7"), Some(idx));
        assert_eq!(set.task_by_handle("H:lap:7").unwrap().func, "c");
    }

    #[test]
    fn test_unknown_handle_is_none() {
        let set = TaskSet::new();
        assert!(set.task_by_handle("H:nowhere:1").is_none());
        assert!(set.index_of_handle("H:nowhere:1").is_none());
    }
}
