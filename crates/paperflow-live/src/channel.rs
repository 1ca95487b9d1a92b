//! Public channel handle.
//!
//! A [`LiveChannel`] is an explicit, constructible object: whichever
//! component owns it controls its lifecycle, and dropping it tears the
//! connection down. There is deliberately no shared module-level channel.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use paperflow_core::{Notifier, TaskStore};

use crate::config::ChannelConfig;
use crate::connection::{connection_task, ChannelState, ChannelStatus, Command};
use crate::protocol::ClientMessage;
use crate::router::MessageRouter;
use crate::transport::{Connector, WsConnector};

/// Handle to one live update channel.
///
/// All methods are non-blocking: they enqueue a command for the background
/// connection task and return. The `Open` transition is observable through
/// [`LiveChannel::status_watch`].
pub struct LiveChannel {
    cmd_tx: mpsc::UnboundedSender<Command>,
    status_rx: watch::Receiver<ChannelStatus>,
    task: Option<JoinHandle<()>>,
}

impl LiveChannel {
    /// Create a channel using the WebSocket transport.
    ///
    /// Connects immediately unless `config.auto_connect` is false.
    pub fn new(
        config: ChannelConfig,
        store: Arc<dyn TaskStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self::with_connector(config, store, notifier, Arc::new(WsConnector))
    }

    /// Create a channel with a custom [`Connector`].
    pub fn with_connector(
        config: ChannelConfig,
        store: Arc<dyn TaskStore>,
        notifier: Arc<dyn Notifier>,
        connector: Arc<dyn Connector>,
    ) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(ChannelStatus::idle());
        let router = MessageRouter::new(store, notifier.clone());
        let auto_connect = config.auto_connect;

        let task = tokio::spawn(connection_task(
            config, connector, router, notifier, cmd_rx, status_tx,
        ));

        if auto_connect {
            let _ = cmd_tx.send(Command::Connect);
        }

        Self {
            cmd_tx,
            status_rx,
            task: Some(task),
        }
    }

    /// Request a connection. No-op if already open.
    pub fn connect(&self) {
        let _ = self.cmd_tx.send(Command::Connect);
    }

    /// Close the connection without triggering reconnection.
    pub fn disconnect(&self) {
        let _ = self.cmd_tx.send(Command::Disconnect);
    }

    /// Force a fresh connection attempt, resetting the retry counter.
    /// Also the recovery path after reconnection has given up.
    pub fn reconnect(&self) {
        let _ = self.cmd_tx.send(Command::Reconnect);
    }

    /// Send one message. Resolves to `false` without side effect when the
    /// connection is not open.
    pub async fn send(&self, message: ClientMessage) -> bool {
        let (done, result) = oneshot::channel();
        if self.cmd_tx.send(Command::Send { message, done }).is_err() {
            return false;
        }
        result.await.unwrap_or(false)
    }

    /// Declare the set of task ids the application wants live updates for.
    ///
    /// The channel converges the server towards this set, now if open or
    /// as soon as the connection (re)opens otherwise.
    pub fn reconcile(&self, desired: HashSet<String>) {
        let _ = self.cmd_tx.send(Command::Reconcile { desired });
    }

    /// Snapshot of the task ids currently subscribed on the server.
    pub async fn subscriptions(&self) -> HashSet<String> {
        let (reply, result) = oneshot::channel();
        if self.cmd_tx.send(Command::Subscriptions { reply }).is_err() {
            return HashSet::new();
        }
        result.await.unwrap_or_default()
    }

    /// Whether the connection is currently open.
    pub fn is_connected(&self) -> bool {
        self.status_rx.borrow().connected
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ChannelState {
        self.status_rx.borrow().state
    }

    /// Most recent connection error, if any.
    pub fn last_error(&self) -> Option<String> {
        self.status_rx.borrow().last_error.clone()
    }

    /// Watch connection status changes without polling.
    pub fn status_watch(&self) -> watch::Receiver<ChannelStatus> {
        self.status_rx.clone()
    }

    /// Tear the channel down: unsubscribe everything still subscribed,
    /// close the transport, and wait for the background task to finish.
    pub async fn shutdown(mut self) {
        let _ = self.cmd_tx.send(Command::Shutdown);
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for LiveChannel {
    fn drop(&mut self) {
        // Best-effort teardown when the owner forgets to call shutdown().
        let _ = self.cmd_tx.send(Command::Shutdown);
    }
}
