//! Task domain models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a background task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl TaskStatus {
    /// Parse from string.
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "running" => Self::Running,
            "completed" => Self::Completed,
            "failed" => Self::Failed,
            "cancelled" => Self::Cancelled,
            _ => Self::Pending,
        }
    }

    /// Convert to string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Whether the task has reached a final state and will receive no
    /// further updates from the server.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

/// Partial-field update applied to a tracked task.
///
/// Every field is optional; the server sends only what changed. Unknown
/// fields in the payload are ignored so older clients keep working.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskPatch {
    pub status: Option<TaskStatus>,
    /// Completion percentage in `0.0..=100.0`.
    pub progress: Option<f32>,
    /// Human-readable pipeline stage, e.g. "extracting" or "translating".
    pub stage: Option<String>,
    pub error: Option<String>,
}

impl TaskPatch {
    /// True when the patch carries no fields at all.
    pub fn is_empty(&self) -> bool {
        self.status.is_none()
            && self.progress.is_none()
            && self.stage.is_none()
            && self.error.is_none()
    }
}

/// Severity of a task log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

/// A single log line emitted by a running task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskLogEntry {
    #[serde(default = "LogLevel::default_info")]
    pub level: LogLevel,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl LogLevel {
    fn default_info() -> Self {
        Self::Info
    }
}
