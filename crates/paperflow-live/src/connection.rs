//! Connection lifecycle management.
//!
//! A background task owns the transport and multiplexes four event sources:
//! commands from the public handle, inbound frames, the heartbeat timer,
//! and the reconnect timer. At most one transport is alive at a time, and
//! every timer is armed only in the state that uses it, so nothing fires
//! after teardown.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, warn};

use paperflow_core::{NoticeKind, Notifier};

use crate::config::ChannelConfig;
use crate::protocol::ClientMessage;
use crate::router::MessageRouter;
use crate::subscription::SubscriptionRegistry;
use crate::transport::{Connector, Frame, Transport};

/// Lifecycle state of the channel connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Idle,
    Connecting,
    Open,
    Reconnecting,
    Closing,
}

/// Connection snapshot readable by external code.
#[derive(Debug, Clone)]
pub struct ChannelStatus {
    pub state: ChannelState,
    pub connected: bool,
    /// Most recent connection error, kept until the next successful open.
    pub last_error: Option<String>,
}

impl ChannelStatus {
    pub(crate) fn idle() -> Self {
        Self {
            state: ChannelState::Idle,
            connected: false,
            last_error: None,
        }
    }
}

/// Commands from the public handle to the connection task.
pub(crate) enum Command {
    Connect,
    Disconnect,
    Reconnect,
    Send {
        message: ClientMessage,
        done: oneshot::Sender<bool>,
    },
    Reconcile {
        desired: HashSet<String>,
    },
    Subscriptions {
        reply: oneshot::Sender<HashSet<String>>,
    },
    Shutdown,
}

/// Publish the current snapshot if it differs from what watchers last saw.
fn publish(
    status_tx: &watch::Sender<ChannelStatus>,
    state: ChannelState,
    last_error: &Option<String>,
) {
    status_tx.send_if_modified(|current| {
        if current.state == state && current.last_error == *last_error {
            return false;
        }
        *current = ChannelStatus {
            state,
            connected: state == ChannelState::Open,
            last_error: last_error.clone(),
        };
        true
    });
}

/// Serialize and write one message. Returns false on any failure.
async fn send_on(transport: &mut Box<dyn Transport>, message: &ClientMessage) -> bool {
    let text = match serde_json::to_string(message) {
        Ok(text) => text,
        Err(e) => {
            warn!(error = %e, "Failed to serialize outbound message");
            return false;
        }
    };
    match transport.send_text(text).await {
        Ok(()) => true,
        Err(e) => {
            warn!(error = %e, "Outbound send failed");
            false
        }
    }
}

/// Converge the server's subscription set with the desired set, updating
/// the registry as each control message goes out. Returns false if the
/// transport failed mid-way.
async fn reconcile_open(
    transport: &mut Box<dyn Transport>,
    registry: &mut SubscriptionRegistry,
) -> bool {
    for id in registry.to_unsubscribe() {
        if !send_on(transport, &ClientMessage::unsubscribe(id.clone())).await {
            return false;
        }
        registry.mark_unsubscribed(&id);
    }
    for id in registry.to_subscribe() {
        if !send_on(transport, &ClientMessage::subscribe(id.clone())).await {
            return false;
        }
        registry.mark_subscribed(&id);
    }
    true
}

/// Decide the next state after a failed attempt or an abnormal loss.
///
/// Bounded fixed-interval retry: schedule another attempt until the
/// consecutive-failure counter reaches the configured maximum, then go
/// terminal with exactly one user-visible notification.
async fn after_loss(
    failures: &mut u32,
    retry_deadline: &mut Instant,
    last_error: &mut Option<String>,
    config: &ChannelConfig,
    notifier: &Arc<dyn Notifier>,
) -> ChannelState {
    if *failures < config.max_reconnect_attempts {
        *failures += 1;
        *retry_deadline = Instant::now() + config.reconnect_interval;
        debug!(
            attempt = *failures,
            max = config.max_reconnect_attempts,
            delay_ms = config.reconnect_interval.as_millis() as u64,
            "Scheduling reconnect attempt"
        );
        ChannelState::Reconnecting
    } else {
        let message = format!(
            "Unable to reach the live update service after {} attempts",
            config.max_reconnect_attempts
        );
        warn!(%message, "Giving up on reconnection");
        *last_error = Some(message.clone());
        notifier
            .notify(NoticeKind::Error, "Connection lost", &message, Some(8_000))
            .await;
        ChannelState::Idle
    }
}

/// The background task driving one live channel.
pub(crate) async fn connection_task(
    config: ChannelConfig,
    connector: Arc<dyn Connector>,
    router: MessageRouter,
    notifier: Arc<dyn Notifier>,
    mut cmd_rx: mpsc::UnboundedReceiver<Command>,
    status_tx: watch::Sender<ChannelStatus>,
) {
    let mut registry = SubscriptionRegistry::new();
    let mut transport: Option<Box<dyn Transport>> = None;
    let mut state = ChannelState::Idle;
    let mut failures: u32 = 0;
    let mut last_error: Option<String> = None;
    let mut heartbeat_deadline = Instant::now();
    let mut retry_deadline = Instant::now();

    loop {
        publish(&status_tx, state, &last_error);

        match state {
            // ── Nothing to drive; wait for a command ───────────────────
            ChannelState::Idle | ChannelState::Closing => {
                state = ChannelState::Idle;
                match cmd_rx.recv().await {
                    None | Some(Command::Shutdown) => {
                        publish(&status_tx, state, &last_error);
                        return;
                    }
                    Some(Command::Connect) => state = ChannelState::Connecting,
                    Some(Command::Reconnect) => {
                        failures = 0;
                        last_error = None;
                        state = ChannelState::Connecting;
                    }
                    Some(Command::Disconnect) => {}
                    Some(Command::Send { done, .. }) => {
                        let _ = done.send(false);
                    }
                    Some(Command::Reconcile { desired }) => {
                        // Deferred: re-run automatically once we reach Open.
                        registry.set_desired(desired);
                    }
                    Some(Command::Subscriptions { reply }) => {
                        let _ = reply.send(registry.subscribed().clone());
                    }
                }
            }

            // ── One connect attempt, cancellable by commands ───────────
            ChannelState::Connecting => {
                if let Some(mut old) = transport.take() {
                    old.close().await;
                }

                let attempt = {
                    let connector = connector.clone();
                    let endpoint = config.endpoint.clone();
                    async move { connector.connect(&endpoint).await }
                };
                tokio::pin!(attempt);

                let outcome = loop {
                    tokio::select! {
                        result = &mut attempt => break Some(result),
                        cmd = cmd_rx.recv() => match cmd {
                            None | Some(Command::Shutdown) => {
                                state = ChannelState::Idle;
                                publish(&status_tx, state, &last_error);
                                return;
                            }
                            Some(Command::Disconnect) => break None,
                            Some(Command::Connect) => {}
                            Some(Command::Reconnect) => failures = 0,
                            Some(Command::Send { done, .. }) => {
                                let _ = done.send(false);
                            }
                            Some(Command::Reconcile { desired }) => {
                                registry.set_desired(desired);
                            }
                            Some(Command::Subscriptions { reply }) => {
                                let _ = reply.send(registry.subscribed().clone());
                            }
                        },
                    }
                };

                match outcome {
                    None => state = ChannelState::Idle,
                    Some(Ok(stream)) => {
                        info!(endpoint = %config.endpoint, "Live channel open");
                        let mut stream = stream;
                        failures = 0;
                        last_error = None;
                        // A fresh connection means the server has no memory
                        // of prior subscriptions.
                        registry.mark_connection_reset();
                        heartbeat_deadline = Instant::now() + config.heartbeat_interval;
                        publish(&status_tx, ChannelState::Open, &last_error);

                        if reconcile_open(&mut stream, &mut registry).await {
                            transport = Some(stream);
                            state = ChannelState::Open;
                        } else {
                            last_error = Some("Connection lost".to_string());
                            registry.mark_connection_reset();
                            state = after_loss(
                                &mut failures,
                                &mut retry_deadline,
                                &mut last_error,
                                &config,
                                &notifier,
                            )
                            .await;
                        }
                    }
                    Some(Err(e)) => {
                        warn!(endpoint = %config.endpoint, error = %e, "Connect attempt failed");
                        last_error = Some(e.to_string());
                        state = after_loss(
                            &mut failures,
                            &mut retry_deadline,
                            &mut last_error,
                            &config,
                            &notifier,
                        )
                        .await;
                    }
                }
            }

            // ── Connected: frames, commands, heartbeat ─────────────────
            ChannelState::Open => {
                let Some(ref mut stream) = transport else {
                    state = ChannelState::Idle;
                    continue;
                };

                let heartbeat = sleep_until(heartbeat_deadline);
                tokio::pin!(heartbeat);

                tokio::select! {
                    _ = &mut heartbeat => {
                        // Re-arm from the previous deadline so the cadence
                        // does not drift with processing delays.
                        heartbeat_deadline += config.heartbeat_interval;
                        debug!("Sending heartbeat ping");
                        if !send_on(stream, &ClientMessage::ping()).await {
                            last_error = Some("Connection lost".to_string());
                            transport = None;
                            registry.mark_connection_reset();
                            state = after_loss(
                                &mut failures,
                                &mut retry_deadline,
                                &mut last_error,
                                &config,
                                &notifier,
                            )
                            .await;
                        }
                    }

                    frame = stream.recv() => match frame {
                        Some(Frame::Text(text)) => {
                            router.route_text(&text).await;
                        }
                        Some(Frame::Close { normal: true }) => {
                            info!("Server closed the connection");
                            transport = None;
                            registry.mark_connection_reset();
                            state = ChannelState::Idle;
                        }
                        Some(Frame::Close { normal: false }) | None => {
                            warn!("Connection lost");
                            last_error = Some("Connection lost".to_string());
                            transport = None;
                            registry.mark_connection_reset();
                            state = after_loss(
                                &mut failures,
                                &mut retry_deadline,
                                &mut last_error,
                                &config,
                                &notifier,
                            )
                            .await;
                        }
                    },

                    cmd = cmd_rx.recv() => match cmd {
                        None | Some(Command::Shutdown) => {
                            for id in registry.drain_for_teardown() {
                                if !send_on(stream, &ClientMessage::unsubscribe(id)).await {
                                    break;
                                }
                            }
                            stream.close().await;
                            state = ChannelState::Idle;
                            publish(&status_tx, state, &last_error);
                            return;
                        }
                        Some(Command::Disconnect) => {
                            publish(&status_tx, ChannelState::Closing, &last_error);
                            stream.close().await;
                            transport = None;
                            registry.mark_connection_reset();
                            state = ChannelState::Idle;
                        }
                        // Already open; connect() is idempotent.
                        Some(Command::Connect) => {}
                        Some(Command::Reconnect) => {
                            stream.close().await;
                            transport = None;
                            registry.mark_connection_reset();
                            failures = 0;
                            state = ChannelState::Connecting;
                        }
                        Some(Command::Send { message, done }) => {
                            let ok = send_on(stream, &message).await;
                            let _ = done.send(ok);
                            if !ok {
                                last_error = Some("Connection lost".to_string());
                                transport = None;
                                registry.mark_connection_reset();
                                state = after_loss(
                                    &mut failures,
                                    &mut retry_deadline,
                                    &mut last_error,
                                    &config,
                                    &notifier,
                                )
                                .await;
                            }
                        }
                        Some(Command::Reconcile { desired }) => {
                            registry.set_desired(desired);
                            if !reconcile_open(stream, &mut registry).await {
                                last_error = Some("Connection lost".to_string());
                                transport = None;
                                registry.mark_connection_reset();
                                state = after_loss(
                                    &mut failures,
                                    &mut retry_deadline,
                                    &mut last_error,
                                    &config,
                                    &notifier,
                                )
                                .await;
                            }
                        }
                        Some(Command::Subscriptions { reply }) => {
                            let _ = reply.send(registry.subscribed().clone());
                        }
                    },
                }
            }

            // ── Waiting out the retry interval ─────────────────────────
            ChannelState::Reconnecting => {
                let retry = sleep_until(retry_deadline);
                tokio::pin!(retry);

                tokio::select! {
                    _ = &mut retry => {
                        info!(attempt = failures, "Attempting reconnect");
                        state = ChannelState::Connecting;
                    }
                    cmd = cmd_rx.recv() => match cmd {
                        None | Some(Command::Shutdown) => {
                            state = ChannelState::Idle;
                            publish(&status_tx, state, &last_error);
                            return;
                        }
                        Some(Command::Disconnect) => state = ChannelState::Idle,
                        Some(Command::Connect) => state = ChannelState::Connecting,
                        Some(Command::Reconnect) => {
                            failures = 0;
                            last_error = None;
                            state = ChannelState::Connecting;
                        }
                        Some(Command::Send { done, .. }) => {
                            let _ = done.send(false);
                        }
                        Some(Command::Reconcile { desired }) => {
                            registry.set_desired(desired);
                        }
                        Some(Command::Subscriptions { reply }) => {
                            let _ = reply.send(registry.subscribed().clone());
                        }
                    },
                }
            }
        }
    }
}
