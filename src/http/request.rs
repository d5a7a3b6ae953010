use tokio::io::{AsyncBufRead, AsyncWrite, AsyncWriteExt};

use super::{HeaderMap, read_head};
use crate::config::Limits;
use crate::error::{Error, Result};

/// An HTTP request head.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: String,
    /// Request target as sent, including any query string.
    pub target: String,
    pub version: String,
    pub headers: HeaderMap,
}

impl HttpRequest {
    /// A request with no headers and version `HTTP/1.1`.
    #[must_use]
    pub fn new(method: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            target: target.into(),
            version: "HTTP/1.1".to_string(),
            headers: HeaderMap::new(),
        }
    }

    #[must_use]
    pub fn get(target: impl Into<String>) -> Self {
        Self::new("GET", target)
    }

    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    /// Target with the query string removed.
    #[must_use]
    pub fn path(&self) -> &str {
        self.target
            .split_once('?')
            .map_or(self.target.as_str(), |(path, _)| path)
    }

    /// Whether the request asks to switch to the WebSocket protocol.
    #[must_use]
    pub fn is_websocket_upgrade(&self) -> bool {
        self.headers
            .get("Upgrade")
            .is_some_and(|v| v.trim().eq_ignore_ascii_case("websocket"))
    }

    /// Parse a request line such as `GET /chat HTTP/1.1`.
    fn from_parts(start_line: &str, headers: HeaderMap) -> Result<Self> {
        let mut parts = start_line.split_whitespace();
        let (Some(method), Some(target), Some(version), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(Error::HandshakeRejected(format!(
                "malformed request line: {start_line:?}"
            )));
        };
        if !version.starts_with("HTTP/") {
            return Err(Error::HandshakeRejected(format!(
                "unsupported protocol version: {version}"
            )));
        }
        Ok(Self {
            method: method.to_string(),
            target: target.to_string(),
            version: version.to_string(),
            headers,
        })
    }

    /// Read a request head from `reader`.
    ///
    /// # Errors
    ///
    /// - `Error::HandshakeTooLarge` if the head exceeds `limits.max_handshake_size`
    /// - `Error::HandshakeRejected` if the request line is malformed
    /// - `Error::ConnectionClosed` / `Error::TruncatedStream` on end of stream
    pub async fn read_from<R>(reader: &mut R, limits: &Limits) -> Result<Self>
    where
        R: AsyncBufRead + Unpin,
    {
        let (start_line, headers) = read_head(reader, limits).await?;
        Self::from_parts(&start_line, headers)
    }

    /// Serialize the head, ending with the empty line.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(256);
        buf.extend_from_slice(
            format!("{} {} {}\r\n", self.method, self.target, self.version).as_bytes(),
        );
        self.headers.write_lines(&mut buf);
        buf.extend_from_slice(b"\r\n");
        buf
    }

    /// Write the head to `writer` and flush.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if the transport fails.
    pub async fn write_to<W>(&self, writer: &mut W) -> Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        writer.write_all(&self.to_bytes()).await?;
        writer.flush().await?;
        Ok(())
    }
}
