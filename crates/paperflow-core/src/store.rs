//! Collaborator seams consumed by the live channel.
//!
//! The channel owns no task state of its own: decoded updates are handed to
//! a [`TaskStore`] and user-visible events to a [`Notifier`], both provided
//! by the embedding application.

use async_trait::async_trait;

use crate::notification::NoticeKind;
use crate::task::model::{TaskLogEntry, TaskPatch};

/// Application-owned store of tracked tasks.
///
/// Implementations must tolerate updates for task ids they do not know
/// about (e.g. an update racing a local delete) without failing.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Merge a partial update into the task with the given id.
    async fn apply_task_update(&self, task_id: &str, patch: TaskPatch);

    /// Append one log line to the task with the given id.
    async fn append_task_log(&self, task_id: &str, entry: TaskLogEntry);
}

/// Application-owned notification surface.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Show a notification to the user.
    async fn notify(&self, kind: NoticeKind, title: &str, message: &str, duration_ms: Option<u64>);
}
