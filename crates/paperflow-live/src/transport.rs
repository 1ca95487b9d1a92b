//! Transport seam between the channel and the network.
//!
//! The connection manager only ever talks to a [`Transport`]; the production
//! implementation wraps a WebSocket stream, tests inject their own through
//! [`Connector`]. A transport carries text frames plus an explicit close
//! signal that distinguishes a normal closure from an abnormal one, since
//! only the latter triggers reconnection.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, warn};

use paperflow_core::{PaperflowError, PaperflowResult};

/// One inbound event from the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// A complete text message.
    Text(String),
    /// The peer closed the connection. `normal` is true for a clean,
    /// intentional closure; anything else counts as a connection loss.
    Close { normal: bool },
}

/// A live, framed connection to the server.
#[async_trait]
pub trait Transport: Send {
    /// Write one text message.
    async fn send_text(&mut self, text: String) -> PaperflowResult<()>;

    /// Next inbound frame. `None` means the stream ended without a close
    /// frame, which is treated as an abnormal loss.
    async fn recv(&mut self) -> Option<Frame>;

    /// Close the connection with a normal closure code. Best effort.
    async fn close(&mut self);
}

/// Opens a fresh [`Transport`] for each connection attempt.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, endpoint: &str) -> PaperflowResult<Box<dyn Transport>>;
}

/// Production connector: WebSocket over TCP.
#[derive(Debug, Default)]
pub struct WsConnector;

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, endpoint: &str) -> PaperflowResult<Box<dyn Transport>> {
        let (stream, _response) = connect_async(endpoint)
            .await
            .map_err(|e| PaperflowError::ConnectFailed(e.to_string()))?;
        debug!(endpoint, "WebSocket connected");
        Ok(Box::new(WsTransport { inner: stream }))
    }
}

/// WebSocket-backed transport.
pub struct WsTransport {
    inner: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl Transport for WsTransport {
    async fn send_text(&mut self, text: String) -> PaperflowResult<()> {
        self.inner
            .send(Message::Text(text.into()))
            .await
            .map_err(PaperflowError::transport)
    }

    async fn recv(&mut self) -> Option<Frame> {
        loop {
            match self.inner.next().await {
                Some(Ok(Message::Text(text))) => return Some(Frame::Text(text.to_string())),
                Some(Ok(Message::Ping(payload))) => {
                    // Protocol-level liveness probe from the server; answered
                    // here so the channel never sees it.
                    if let Err(e) = self.inner.send(Message::Pong(payload)).await {
                        warn!(error = %e, "Failed to answer WebSocket ping");
                        return None;
                    }
                }
                Some(Ok(Message::Close(frame))) => {
                    let normal = frame
                        .as_ref()
                        .is_some_and(|f| f.code == CloseCode::Normal);
                    return Some(Frame::Close { normal });
                }
                Some(Ok(Message::Binary(data))) => {
                    debug!(len = data.len(), "Ignoring unexpected binary frame");
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!(error = %e, "WebSocket read failed");
                    return None;
                }
                None => return None,
            }
        }
    }

    async fn close(&mut self) {
        let frame = CloseFrame {
            code: CloseCode::Normal,
            reason: "client disconnect".into(),
        };
        if let Err(e) = self.inner.close(Some(frame)).await {
            debug!(error = %e, "WebSocket close failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::ws::{close_code, CloseFrame as AxumCloseFrame, Message as AxumMessage};
    use axum::extract::ws::{WebSocket, WebSocketUpgrade};
    use axum::response::IntoResponse;
    use axum::routing::get;
    use axum::Router;

    use crate::protocol::{ClientMessage, ServerMessage};

    /// Minimal server half of the live channel: answers pings, confirms
    /// subscribes with a first task update.
    async fn handle_socket(mut socket: WebSocket) {
        while let Some(Ok(msg)) = socket.recv().await {
            let AxumMessage::Text(text) = msg else { continue };
            let Ok(value) = serde_json::from_str::<serde_json::Value>(&text) else {
                continue;
            };
            let reply = match value["type"].as_str() {
                Some("ping") => serde_json::json!({
                    "type": "pong",
                    "timestamp": value["timestamp"],
                }),
                Some("subscribe") => serde_json::json!({
                    "type": "task_update",
                    "taskId": value["taskId"],
                    "data": {"status": "running", "progress": 5.0},
                    "timestamp": value["timestamp"],
                }),
                _ => continue,
            };
            if socket
                .send(AxumMessage::Text(reply.to_string().into()))
                .await
                .is_err()
            {
                break;
            }
        }
    }

    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "paperflow_live=debug".into()),
            )
            .try_init();
    }

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("ws://{addr}/ws")
    }

    #[tokio::test]
    async fn test_ws_transport_round_trip() {
        init_tracing();
        let endpoint = serve(Router::new().route(
            "/ws",
            get(|ws: WebSocketUpgrade| async { ws.on_upgrade(handle_socket) }),
        ))
        .await;

        let mut transport = WsConnector.connect(&endpoint).await.unwrap();

        let ping = serde_json::to_string(&ClientMessage::ping()).unwrap();
        transport.send_text(ping).await.unwrap();
        match transport.recv().await {
            Some(Frame::Text(text)) => {
                let msg: ServerMessage = serde_json::from_str(&text).unwrap();
                assert!(matches!(msg, ServerMessage::Pong { .. }));
            }
            other => panic!("expected pong, got {other:?}"),
        }

        let subscribe = serde_json::to_string(&ClientMessage::subscribe("t-1")).unwrap();
        transport.send_text(subscribe).await.unwrap();
        match transport.recv().await {
            Some(Frame::Text(text)) => {
                let msg: ServerMessage = serde_json::from_str(&text).unwrap();
                match msg {
                    ServerMessage::TaskUpdate { task_id, data, .. } => {
                        assert_eq!(task_id, "t-1");
                        assert_eq!(data.progress, Some(5.0));
                    }
                    other => panic!("expected task update, got {other:?}"),
                }
            }
            other => panic!("expected task update frame, got {other:?}"),
        }

        transport.close().await;
    }

    #[tokio::test]
    async fn test_server_normal_close_maps_to_clean_frame() {
        async fn close_immediately(mut socket: WebSocket) {
            let _ = socket
                .send(AxumMessage::Close(Some(AxumCloseFrame {
                    code: close_code::NORMAL,
                    reason: "done".into(),
                })))
                .await;
        }

        let endpoint = serve(Router::new().route(
            "/ws",
            get(|ws: WebSocketUpgrade| async { ws.on_upgrade(close_immediately) }),
        ))
        .await;

        let mut transport = WsConnector.connect(&endpoint).await.unwrap();
        match transport.recv().await {
            Some(Frame::Close { normal }) => assert!(normal),
            other => panic!("expected close frame, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_connect_refused_is_an_error() {
        // Nothing listens on this port.
        let result = WsConnector.connect("ws://127.0.0.1:1/ws").await;
        assert!(result.is_err());
    }
}

