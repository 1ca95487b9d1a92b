//! Inbound message routing.
//!
//! Decodes each raw frame once and dispatches it to the application's
//! collaborators. A malformed or unrecognized message is logged and
//! dropped; nothing that happens here can take the channel down.

use std::sync::Arc;

use tracing::{debug, warn};

use paperflow_core::{Notifier, TaskStore};

use crate::protocol::ServerMessage;

/// Dispatches decoded server messages to the task store and notifier.
pub struct MessageRouter {
    store: Arc<dyn TaskStore>,
    notifier: Arc<dyn Notifier>,
}

impl MessageRouter {
    pub fn new(store: Arc<dyn TaskStore>, notifier: Arc<dyn Notifier>) -> Self {
        Self { store, notifier }
    }

    /// Decode and dispatch one raw frame.
    ///
    /// Messages are handled strictly in the order this is called; the
    /// caller awaits each dispatch before reading the next frame.
    pub async fn route_text(&self, raw: &str) {
        match serde_json::from_str::<ServerMessage>(raw) {
            Ok(message) => self.route(message).await,
            Err(e) => {
                warn!(error = %e, "Discarding malformed message");
            }
        }
    }

    /// Dispatch one decoded message.
    pub async fn route(&self, message: ServerMessage) {
        match message {
            ServerMessage::TaskUpdate { task_id, data, .. }
            | ServerMessage::TaskProgress { task_id, data, .. } => {
                debug!(task_id = %task_id, "Applying task update");
                self.store.apply_task_update(&task_id, data).await;
            }
            ServerMessage::TaskLog { task_id, data, .. } => {
                self.store.append_task_log(&task_id, data).await;
            }
            ServerMessage::SystemNotification { data, .. } => {
                self.notifier
                    .notify(data.kind, &data.title, &data.message, data.duration_ms)
                    .await;
            }
            ServerMessage::Pong { .. } => {
                debug!("Heartbeat pong received");
            }
            ServerMessage::Unknown => {
                debug!("Ignoring message with unrecognized type");
            }
        }
    }
}
