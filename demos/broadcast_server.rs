//! Chat-style broadcast server: every message a client sends is relayed to
//! all connected clients.
//!
//! Run with: cargo run --example broadcast_server [addr]
//!
//! Then connect a few clients:
//! ```bash
//! cargo run --example client ws://127.0.0.1:9002/ "hello"
//! ```
//!
//! `GET /health` answers with the number of live connections.

use std::error::Error;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;
use wshub::{Config, Connection, HttpRequest, HttpResponse, Hub, HubHandler, Message, StatusCode};

const DEFAULT_ADDR: &str = "127.0.0.1:9002";

struct Relay;

impl HubHandler for Relay {
    fn on_connected(&self, hub: &Hub, conn: &Connection) {
        info!(conn_id = %conn.id(), path = conn.request().path(), count = hub.count(), "joined");
    }

    fn on_message(&self, hub: &Hub, conn: &Connection, message: Message) {
        info!(conn_id = %conn.id(), len = message.len(), "relaying");
        let hub = hub.clone();
        tokio::spawn(async move {
            let report = hub.broadcast_message(&message).await;
            info!(delivered = report.delivered, failed = report.failed, "relayed");
        });
    }

    fn on_closed(&self, hub: &Hub, conn: &Connection) {
        info!(conn_id = %conn.id(), count = hub.count(), "left");
    }

    fn on_request(&self, hub: &Hub, request: &HttpRequest) -> Option<HttpResponse> {
        if request.path() != "/health" {
            return None;
        }
        let mut response = HttpResponse::new(StatusCode::OK)
            .with_header("Content-Type", "text/plain")
            .with_header("Connection", "close");
        response.headers.set_int("X-Connections", hub.count() as i64);
        Some(response)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,wshub=debug"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let addr = std::env::args().nth(1).unwrap_or_else(|| DEFAULT_ADDR.to_string());
    let listener = TcpListener::bind(&addr).await?;
    println!("Broadcast server listening on ws://{addr}/");

    let hub = Hub::new(Config::server(), Relay);
    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("ctrl-c received");
                shutdown.cancel();
            }
        });
    }

    hub.serve(listener, shutdown).await?;
    println!("Server stopped");
    Ok(())
}
