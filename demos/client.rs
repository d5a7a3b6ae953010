//! Simple WebSocket client.
//!
//! Run with: cargo run --example client [uri] [message]
//!
//! Sends one text message, prints whatever arrives for a few seconds, then
//! closes.

use std::error::Error;
use std::time::Duration;

use tokio::sync::mpsc;
use wshub::{Config, Connection, Event};

const DEFAULT_URI: &str = "ws://127.0.0.1:9002/";

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut args = std::env::args().skip(1);
    let uri = args.next().unwrap_or_else(|| DEFAULT_URI.to_string());
    let text = args.next().unwrap_or_else(|| "Hello, WebSocket!".to_string());

    let (tx, mut events) = mpsc::unbounded_channel();
    let conn = Connection::connect(&uri, 80, &Config::client(), tx).await?;
    println!("Connected to {uri} as {}", conn.id());

    conn.send_text(text.clone()).await?;
    println!("Sent: {text}");
    conn.ping("are you there").await?;

    let deadline = tokio::time::sleep(Duration::from_secs(3));
    tokio::pin!(deadline);
    loop {
        tokio::select! {
            () = &mut deadline => break,
            event = events.recv() => match event {
                Some(Event::Message(_, msg)) => match msg.as_text() {
                    Some(text) => println!("Received: {text}"),
                    None => println!("Received {} binary bytes", msg.len()),
                },
                Some(Event::Closed(_)) | None => {
                    println!("Server closed the connection");
                    return Ok(());
                }
            },
        }
    }

    conn.close().await;
    println!("Connection closed");
    Ok(())
}
