//! Registry of live server-side connections with broadcast fan-out.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError, Weak};

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::connection::{Accepted, Connection, ConnectionId, Handler};
use crate::error::Result;
use crate::http::{HttpRequest, HttpResponse, StatusCode};
use crate::message::Message;

/// Application callbacks for a [`Hub`].
///
/// Like [`Handler`], every callback runs on the read task of the connection
/// it concerns and must not block. For one connection the callbacks never
/// overlap and arrive as `on_connected`, any number of `on_message`, then
/// `on_closed`.
pub trait HubHandler: Send + Sync + 'static {
    /// A connection finished its handshake and is registered.
    fn on_connected(&self, hub: &Hub, conn: &Connection) {
        let _ = (hub, conn);
    }

    fn on_message(&self, hub: &Hub, conn: &Connection, message: Message) {
        let _ = (hub, conn, message);
    }

    /// A connection closed and has already been removed from the registry.
    fn on_closed(&self, hub: &Hub, conn: &Connection) {
        let _ = (hub, conn);
    }

    /// A plain HTTP request reached the hub. `None` answers 404.
    fn on_request(&self, hub: &Hub, request: &HttpRequest) -> Option<HttpResponse> {
        let _ = (hub, request);
        None
    }
}

/// Outcome of a broadcast.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: usize,
    pub failed: usize,
}

struct HubInner {
    config: Config,
    handler: Box<dyn HubHandler>,
    connections: Mutex<HashMap<ConnectionId, Connection>>,
}

/// Accepts connections, tracks the live set and broadcasts to it.
///
/// Cheap to clone; clones share the registry.
#[derive(Clone)]
pub struct Hub {
    inner: Arc<HubInner>,
}

impl std::fmt::Debug for Hub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hub").field("connections", &self.count()).finish()
    }
}

/// Per-connection handler forwarding into the hub. Holds the hub weakly so
/// live connections never keep a dropped hub alive.
struct Forwarder {
    hub: Weak<HubInner>,
}

impl Forwarder {
    fn hub(&self) -> Option<Hub> {
        self.hub.upgrade().map(|inner| Hub { inner })
    }
}

impl Handler for Forwarder {
    fn on_open(&self, conn: &Connection) {
        if let Some(hub) = self.hub() {
            hub.register(conn);
            hub.inner.handler.on_connected(&hub, conn);
        }
    }

    fn on_message(&self, conn: &Connection, message: Message) {
        if let Some(hub) = self.hub() {
            hub.inner.handler.on_message(&hub, conn, message);
        }
    }

    fn on_closed(&self, conn: &Connection) {
        if let Some(hub) = self.hub() {
            hub.remove(conn);
            hub.inner.handler.on_closed(&hub, conn);
        }
    }
}

impl Hub {
    #[must_use]
    pub fn new(config: Config, handler: impl HubHandler) -> Self {
        Self {
            inner: Arc::new(HubInner {
                config,
                handler: Box::new(handler),
                connections: Mutex::new(HashMap::new()),
            }),
        }
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    fn registry(&self) -> std::sync::MutexGuard<'_, HashMap<ConnectionId, Connection>> {
        self.inner
            .connections
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Run the server handshake on `transport` and register the connection.
    ///
    /// Plain HTTP requests are answered through [`HubHandler::on_request`] and
    /// yield `Ok(None)`. On handshake failure nothing is registered.
    ///
    /// # Errors
    ///
    /// Handshake and transport errors from [`Connection::accept`], or from
    /// writing the plain HTTP response.
    pub async fn accept<T>(&self, transport: T) -> Result<Option<Connection>>
    where
        T: AsyncRead + AsyncWrite + Send + 'static,
    {
        let forwarder = Forwarder {
            hub: Arc::downgrade(&self.inner),
        };
        match Connection::accept(transport, &self.inner.config, forwarder).await? {
            Accepted::Connection(conn) => {
                // The read loop registers too before `on_connected`; doing it
                // here as well means `count()` includes `conn` on return.
                self.register(&conn);
                Ok(Some(conn))
            }
            Accepted::Plain(plain) => {
                let response = self
                    .inner
                    .handler
                    .on_request(self, plain.request())
                    .unwrap_or_else(|| HttpResponse::new(StatusCode::NOT_FOUND));
                debug!(
                    path = %plain.request().target,
                    status = response.status.as_u16(),
                    "answered plain request"
                );
                plain.respond(&response).await?;
                Ok(None)
            }
        }
    }

    /// Add `conn` unless it is already present or already closed. A closed
    /// connection is never added, so its removal cannot be missed.
    fn register(&self, conn: &Connection) {
        let mut connections = self.registry();
        if conn.state().is_closed() || connections.contains_key(&conn.id()) {
            return;
        }
        let _ = connections.insert(conn.id(), conn.clone());
        debug!(conn_id = %conn.id(), count = connections.len(), "registered connection");
    }

    /// Remove `conn`. Removing an absent connection is a no-op.
    fn remove(&self, conn: &Connection) {
        let mut connections = self.registry();
        if connections.remove(&conn.id()).is_some() {
            debug!(conn_id = %conn.id(), count = connections.len(), "removed connection");
        }
    }

    /// Number of registered connections.
    #[must_use]
    pub fn count(&self) -> usize {
        self.registry().len()
    }

    /// Snapshot of the registered connections.
    #[must_use]
    pub fn connections(&self) -> Vec<Connection> {
        self.registry().values().cloned().collect()
    }

    /// Call `visit` for every connection registered when the broadcast
    /// starts.
    ///
    /// The registry lock is released before the first visit. A failing visit
    /// is logged and counted; the fan-out continues with the next connection.
    /// Connections that close mid-broadcast fail with `Error::NotOpen`.
    pub async fn broadcast<F, Fut>(&self, mut visit: F) -> BroadcastReport
    where
        F: FnMut(Connection) -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        let snapshot = self.connections();
        let mut report = BroadcastReport::default();
        for conn in snapshot {
            let id = conn.id();
            match visit(conn).await {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    report.failed += 1;
                    warn!(conn_id = %id, error = %e, "broadcast delivery failed");
                }
            }
        }
        debug!(delivered = report.delivered, failed = report.failed, "broadcast done");
        report
    }

    /// Send `message` to every registered connection.
    pub async fn broadcast_message(&self, message: &Message) -> BroadcastReport {
        self.broadcast(|conn| {
            let message = message.clone();
            async move { conn.send(message).await }
        })
        .await
    }

    /// Close every registered connection and wait for each to finish.
    pub async fn close_all(&self) {
        for conn in self.connections() {
            conn.close().await;
        }
    }

    /// Accept TCP connections until `shutdown` is cancelled, then close all
    /// live connections.
    ///
    /// Each accepted socket gets its own task; handshake failures are logged.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if the listener fails.
    pub async fn serve(&self, listener: TcpListener, shutdown: CancellationToken) -> Result<()> {
        if let Ok(addr) = listener.local_addr() {
            info!(%addr, "hub listening");
        }
        loop {
            let (stream, peer) = tokio::select! {
                () = shutdown.cancelled() => break,
                accepted = listener.accept() => accepted?,
            };
            let _ = stream.set_nodelay(true);
            let hub = self.clone();
            tokio::spawn(async move {
                if let Err(e) = hub.accept(stream).await {
                    debug!(%peer, error = %e, "handshake failed");
                }
            });
        }
        info!("hub shutting down");
        self.close_all().await;
        Ok(())
    }
}
