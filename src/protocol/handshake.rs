//! WebSocket opening handshake (RFC 6455 section 4).
//!
//! Both sides run over an already-split transport: a buffered reader and a
//! writer. Any bytes the peer sends right after its handshake head stay in the
//! reader's buffer, so the same reader must be used for frames afterwards.

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use sha1::{Digest, Sha1};
use tokio::io::{AsyncBufRead, AsyncWrite};
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::http::{HttpRequest, HttpResponse, StatusCode};

/// The WebSocket GUID used in the Sec-WebSocket-Accept calculation (RFC 6455).
pub const WS_GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// Protocol version sent by clients.
pub const WS_VERSION: &str = "13";

/// Size of the random nonce behind `Sec-WebSocket-Key`.
const KEY_NONCE_LEN: usize = 16;

/// Generate a fresh `Sec-WebSocket-Key`: base64 of 16 random bytes.
///
/// # Errors
///
/// Returns `Error::Io` if the operating system RNG is unavailable.
pub fn generate_key() -> Result<String> {
    let mut nonce = [0u8; KEY_NONCE_LEN];
    getrandom::getrandom(&mut nonce).map_err(|e| Error::Io(format!("random source: {e}")))?;
    Ok(BASE64.encode(nonce))
}

/// Computes the Sec-WebSocket-Accept value from the client's Sec-WebSocket-Key.
///
/// The accept value is calculated as: Base64(SHA-1(key + GUID))
///
/// # Example
///
/// ```
/// use wshub::protocol::handshake::accept_value;
///
/// let key = "dGhlIHNhbXBsZSBub25jZQ==";
/// assert_eq!(accept_value(key), "s3pPLMBiTxaQ9kYGzzhZRbK+xOo=");
/// ```
#[must_use]
pub fn accept_value(key: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(key.as_bytes());
    hasher.update(WS_GUID.as_bytes());
    BASE64.encode(hasher.finalize())
}

/// Outcome of reading a request on a listening endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerHandshake {
    /// The 101 response was sent; the transport now speaks WebSocket.
    Upgraded(HttpRequest),
    /// An ordinary HTTP request. Nothing has been written; the caller owns
    /// the reply.
    Plain(HttpRequest),
}

/// Extract the key and origin from an upgrade request.
fn validate_upgrade<'a>(request: &'a HttpRequest, config: &Config) -> Result<(&'a str, &'a str)> {
    let Some(origin) = request.headers.get_non_empty("Origin") else {
        return Err(Error::HandshakeRejected("missing Origin header".into()));
    };
    let Some(key) = request.headers.get_non_empty("Sec-WebSocket-Key") else {
        return Err(Error::HandshakeRejected("missing Sec-WebSocket-Key header".into()));
    };
    if !config.origin_allowed(origin) {
        return Err(Error::HandshakeRejected(format!("origin not allowed: {origin}")));
    }
    Ok((key, origin))
}

/// Build the 101 response for a validated upgrade.
///
/// # Errors
///
/// Returns `Error::InvalidHeaderValue` if the origin would break the head.
pub fn upgrade_response(key: &str, origin: &str) -> Result<HttpResponse> {
    let mut response = HttpResponse::new(StatusCode::SWITCHING_PROTOCOLS)
        .with_header("Upgrade", "websocket")
        .with_header("Connection", "upgrade")
        .with_header("Sec-WebSocket-Accept", accept_value(key));
    response.headers.try_set("Sec-WebSocket-Origin", origin)?;
    Ok(response)
}

/// Server side of the handshake.
///
/// Reads one request. Requests without `Upgrade: websocket` come back as
/// [`ServerHandshake::Plain`] untouched. Upgrade requests lacking `Origin` or
/// `Sec-WebSocket-Key`, or from an origin outside `config.allowed_origins`,
/// are answered with 400 and fail.
///
/// # Errors
///
/// - `Error::HandshakeRejected` for an invalid upgrade request
/// - `Error::HandshakeTimeout` if the exchange exceeds `config.timeouts.handshake`
/// - `Error::HandshakeTooLarge`, `Error::Io`, `Error::ConnectionClosed` from
///   the transport
pub async fn server_handshake<R, W>(
    reader: &mut R,
    writer: &mut W,
    config: &Config,
) -> Result<ServerHandshake>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    tokio::time::timeout(config.timeouts.handshake, server_exchange(reader, writer, config)).await?
}

async fn server_exchange<R, W>(reader: &mut R, writer: &mut W, config: &Config) -> Result<ServerHandshake>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let request = HttpRequest::read_from(reader, &config.limits).await?;
    if !request.is_websocket_upgrade() {
        debug!(method = %request.method, path = %request.target, "plain HTTP request");
        return Ok(ServerHandshake::Plain(request));
    }

    let response = validate_upgrade(&request, config).and_then(|(key, origin)| upgrade_response(key, origin));
    match response {
        Ok(response) => {
            response.write_to(writer).await?;
            debug!(path = %request.target, "upgrade accepted");
            Ok(ServerHandshake::Upgraded(request))
        }
        Err(e) => {
            warn!(path = %request.target, error = %e, "upgrade rejected");
            // Best-effort: the peer may already be gone.
            let _ = HttpResponse::new(StatusCode::BAD_REQUEST)
                .with_header("Connection", "close")
                .write_to(writer)
                .await;
            Err(e)
        }
    }
}

/// Build the upgrade request a client sends.
///
/// # Errors
///
/// Returns `Error::InvalidHeaderValue` if `host` contains CR/LF, or
/// `Error::InvalidUri` if `path` is not an absolute path.
pub fn upgrade_request(host: &str, path: &str, key: &str) -> Result<HttpRequest> {
    if !path.starts_with('/') || path.contains(char::is_whitespace) {
        return Err(Error::InvalidUri(format!("invalid request path: {path:?}")));
    }
    let mut request = HttpRequest::get(path);
    request.headers.try_set("Host", host)?;
    request.headers.set("Upgrade", "websocket");
    request.headers.set("Connection", "Upgrade");
    request.headers.try_set("Origin", host)?;
    request.headers.set("Sec-WebSocket-Key", key);
    request.headers.set("Sec-WebSocket-Version", WS_VERSION);
    Ok(request)
}

/// Client side of the handshake. Returns the request that was sent.
///
/// # Errors
///
/// - `Error::HandshakeRejected` unless the server answers 101 with the
///   expected `Sec-WebSocket-Accept`
/// - `Error::HandshakeTimeout` if the exchange exceeds `config.timeouts.handshake`
/// - `Error::InvalidUri` / `Error::InvalidHeaderValue` for a bad host or path
/// - transport errors as `Error::Io` / `Error::ConnectionClosed`
pub async fn client_handshake<R, W>(
    reader: &mut R,
    writer: &mut W,
    host: &str,
    path: &str,
    config: &Config,
) -> Result<HttpRequest>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let key = generate_key()?;
    let request = upgrade_request(host, path, &key)?;
    tokio::time::timeout(config.timeouts.handshake, async {
        request.write_to(writer).await?;
        let response = HttpResponse::read_from(reader, &config.limits).await?;
        verify_response(&response, &key)
    })
    .await??;
    debug!(host, path, "upgrade completed");
    Ok(request)
}

fn verify_response(response: &HttpResponse, key: &str) -> Result<()> {
    if response.status != StatusCode::SWITCHING_PROTOCOLS {
        return Err(Error::HandshakeRejected(format!(
            "expected status 101, got {} {}",
            response.status.as_u16(),
            response.reason
        )));
    }
    match response.header("Sec-WebSocket-Accept") {
        Some(accept) if accept.trim() == accept_value(key) => Ok(()),
        Some(_) => Err(Error::HandshakeRejected("Sec-WebSocket-Accept mismatch".into())),
        None => Err(Error::HandshakeRejected("missing Sec-WebSocket-Accept header".into())),
    }
}
