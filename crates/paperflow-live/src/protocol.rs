//! Wire messages exchanged over the live channel.
//!
//! Everything on the wire is JSON, discriminated by a `type` tag. Payloads
//! are decoded once, here at the boundary; the rest of the crate only sees
//! typed variants.

use chrono::{DateTime, Utc};
use paperflow_core::{SystemNotice, TaskLogEntry, TaskPatch};
use serde::{Deserialize, Serialize};

/// A message pushed by the server.
///
/// Unrecognized `type` tags decode to [`ServerMessage::Unknown`] so that new
/// server-side message types never break older clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Task fields changed (status, error, ...).
    TaskUpdate {
        #[serde(rename = "taskId")]
        task_id: String,
        data: TaskPatch,
        timestamp: DateTime<Utc>,
    },
    /// Progress tick for a running task.
    TaskProgress {
        #[serde(rename = "taskId")]
        task_id: String,
        data: TaskPatch,
        timestamp: DateTime<Utc>,
    },
    /// One log line from a running task.
    TaskLog {
        #[serde(rename = "taskId")]
        task_id: String,
        data: TaskLogEntry,
        timestamp: DateTime<Utc>,
    },
    /// Server-wide announcement, unrelated to a particular task.
    SystemNotification {
        data: SystemNotice,
        timestamp: DateTime<Utc>,
    },
    /// Reply to a client heartbeat ping. Confirms liveness only.
    Pong { timestamp: DateTime<Utc> },
    #[serde(other)]
    Unknown,
}

/// A control message sent by the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Heartbeat probe.
    Ping { timestamp: DateTime<Utc> },
    /// Ask the server to start pushing updates for a task.
    Subscribe {
        #[serde(rename = "taskId")]
        task_id: String,
        timestamp: DateTime<Utc>,
    },
    /// Ask the server to stop pushing updates for a task.
    Unsubscribe {
        #[serde(rename = "taskId")]
        task_id: String,
        timestamp: DateTime<Utc>,
    },
}

impl ClientMessage {
    /// Heartbeat ping stamped with the current time.
    pub fn ping() -> Self {
        Self::Ping {
            timestamp: Utc::now(),
        }
    }

    /// Subscribe request stamped with the current time.
    pub fn subscribe(task_id: impl Into<String>) -> Self {
        Self::Subscribe {
            task_id: task_id.into(),
            timestamp: Utc::now(),
        }
    }

    /// Unsubscribe request stamped with the current time.
    pub fn unsubscribe(task_id: impl Into<String>) -> Self {
        Self::Unsubscribe {
            task_id: task_id.into(),
            timestamp: Utc::now(),
        }
    }

    /// The task id this message refers to, if any.
    pub fn task_id(&self) -> Option<&str> {
        match self {
            Self::Ping { .. } => None,
            Self::Subscribe { task_id, .. } | Self::Unsubscribe { task_id, .. } => Some(task_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use paperflow_core::TaskStatus;

    #[test]
    fn test_decode_task_update() {
        let json = r#"{
            "type": "task_update",
            "taskId": "t-1",
            "data": {"status": "running", "progress": 12.5},
            "timestamp": "2025-06-01T12:00:00Z"
        }"#;
        let msg: ServerMessage = serde_json::from_str(json).unwrap();
        match msg {
            ServerMessage::TaskUpdate { task_id, data, .. } => {
                assert_eq!(task_id, "t-1");
                assert_eq!(data.status, Some(TaskStatus::Running));
                assert_eq!(data.progress, Some(12.5));
            }
            other => panic!("expected TaskUpdate, got {other:?}"),
        }
    }

    #[test]
    fn test_decode_task_log() {
        let json = r#"{
            "type": "task_log",
            "taskId": "t-2",
            "data": {"level": "warning", "message": "ocr fallback", "timestamp": "2025-06-01T12:00:01Z"},
            "timestamp": "2025-06-01T12:00:01Z"
        }"#;
        let msg: ServerMessage = serde_json::from_str(json).unwrap();
        match msg {
            ServerMessage::TaskLog { task_id, data, .. } => {
                assert_eq!(task_id, "t-2");
                assert_eq!(data.message, "ocr fallback");
            }
            other => panic!("expected TaskLog, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_type_is_tolerated() {
        let json = r#"{"type": "server_stats", "data": {"load": 0.4}, "timestamp": "2025-06-01T12:00:00Z"}"#;
        let msg: ServerMessage = serde_json::from_str(json).unwrap();
        assert!(matches!(msg, ServerMessage::Unknown));
    }

    #[test]
    fn test_malformed_json_is_an_error() {
        assert!(serde_json::from_str::<ServerMessage>("not json at all").is_err());
    }

    #[test]
    fn test_outbound_carries_tag_and_timestamp() {
        let json = serde_json::to_value(ClientMessage::subscribe("t-9")).unwrap();
        assert_eq!(json["type"], "subscribe");
        assert_eq!(json["taskId"], "t-9");
        assert!(json["timestamp"].is_string());

        let ping = serde_json::to_value(ClientMessage::ping()).unwrap();
        assert_eq!(ping["type"], "ping");
        assert!(ping.get("taskId").is_none());
    }
}
