//! Paperflow Live Update Channel
//!
//! Client-side WebSocket channel that streams task updates from the
//! paper-management backend into an application-owned task store without
//! polling. One [`LiveChannel`] owns one logical connection: it reconnects
//! with a bounded fixed-interval retry policy, sends periodic heartbeats
//! while open, and keeps the server's set of pushed task subscriptions in
//! sync with what the application currently cares about.

pub mod channel;
pub mod config;
pub mod connection;
pub mod protocol;
pub mod router;
pub mod subscription;
pub mod transport;

pub use channel::LiveChannel;
pub use config::ChannelConfig;
pub use connection::{ChannelState, ChannelStatus};
pub use protocol::{ClientMessage, ServerMessage};
pub use transport::{Connector, Frame, Transport, WsConnector};
