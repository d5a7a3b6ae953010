//! # wshub - WebSocket engine with a connection registry and broadcast hub
//!
//! `wshub` turns a raw bidirectional byte stream into RFC 6455 framed text and
//! binary messages, performs the HTTP upgrade handshake on either side, and
//! keeps a registry of live server-side connections that can be broadcast to
//! as a group.
//!
//! ## Layers
//!
//! - [`protocol`]: frame encoding/decoding, masking, handshake helpers
//! - [`codec`]: frame reader/writer over async streams
//! - [`http`]: the minimal HTTP/1.1 head the handshake needs
//! - [`connection`]: one session's lifecycle, read loop and write path
//! - [`hub`]: registry of live connections and broadcast fan-out
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tokio::net::TcpListener;
//! use tokio_util::sync::CancellationToken;
//! use wshub::{Config, Connection, Hub, HubHandler, Message};
//!
//! struct Echo;
//!
//! impl HubHandler for Echo {
//!     fn on_message(&self, hub: &Hub, _conn: &Connection, message: Message) {
//!         let hub = hub.clone();
//!         tokio::spawn(async move { hub.broadcast_message(&message).await });
//!     }
//! }
//!
//! # async fn run() -> wshub::Result<()> {
//! let listener = TcpListener::bind("127.0.0.1:8080").await?;
//! let hub = Hub::new(Config::server(), Echo);
//! hub.serve(listener, CancellationToken::new()).await?;
//! # Ok(())
//! # }
//! ```

pub mod codec;
pub mod config;
pub mod connection;
pub mod error;
pub mod http;
pub mod hub;
pub mod message;
pub mod protocol;

pub use config::{Config, Limits, Timeouts};
pub use connection::{
    Accepted, Connection, ConnectionId, ConnectionState, Event, Handler, PlainRequest, Role, WsUri,
};
pub use error::{Error, Result};
pub use http::{HeaderMap, HttpRequest, HttpResponse, StatusCode};
pub use hub::{BroadcastReport, Hub, HubHandler};
pub use message::{Message, MessageKind};
pub use protocol::{Frame, OpCode, WS_GUID, accept_value};
