//! WebSocket sessions.
//!
//! A [`Connection`] is created by a completed handshake, either accepted
//! ([`Connection::accept`]) or initiated ([`Connection::client`],
//! [`Connection::connect`]). It owns the transport from then on: the read
//! half moves into a dedicated read-loop task, the write half sits behind a
//! write lock shared by every clone of the handle.
//!
//! ## Connection Lifecycle
//!
//! 1. **Connecting** - handshake in progress
//! 2. **Open** - messages flow; the read loop delivers them to the [`Handler`]
//! 3. **Closing** - a Close frame was sent or received
//! 4. **Closed** - transport released, `Handler::on_closed` called once
//!
//! ## Example
//!
//! ```rust,no_run
//! use tokio::sync::mpsc;
//! use wshub::{Config, Connection, Event};
//!
//! # async fn run() -> wshub::Result<()> {
//! let (tx, mut rx) = mpsc::unbounded_channel();
//! let conn = Connection::connect("ws://localhost:8080/chat", 80, &Config::client(), tx).await?;
//!
//! conn.send_text("hello").await?;
//! if let Some(Event::Message(_, msg)) = rx.recv().await {
//!     println!("received {} bytes", msg.len());
//! }
//! conn.close().await;
//! # Ok(())
//! # }
//! ```

mod role;
mod state;
mod uri;

#[allow(clippy::module_inception)]
mod connection;

pub use connection::{Accepted, Connection, ConnectionId, Event, Handler, PlainRequest};
pub use role::Role;
pub use state::ConnectionState;
pub use uri::WsUri;
