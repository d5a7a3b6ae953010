use tokio::io::{AsyncBufRead, AsyncWrite, AsyncWriteExt};

use super::{HeaderMap, StatusCode, read_head};
use crate::config::Limits;
use crate::error::{Error, Result};

/// An HTTP response head.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub version: String,
    pub status: StatusCode,
    pub reason: String,
    pub headers: HeaderMap,
}

impl HttpResponse {
    /// A response with the canonical reason phrase for `status`.
    #[must_use]
    pub fn new(status: StatusCode) -> Self {
        Self {
            version: "HTTP/1.1".to_string(),
            status,
            reason: status.reason().to_string(),
            headers: HeaderMap::new(),
        }
    }

    /// Builder-style header setter for trusted values.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.set(name, value);
        self
    }

    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    /// Parse a status line such as `HTTP/1.1 101 Switching Protocols`.
    fn from_parts(start_line: &str, headers: HeaderMap) -> Result<Self> {
        let malformed = || Error::HandshakeRejected(format!("malformed status line: {start_line:?}"));

        let mut parts = start_line.splitn(3, ' ');
        let version = parts.next().filter(|v| v.starts_with("HTTP/")).ok_or_else(malformed)?;
        let status = parts
            .next()
            .and_then(|s| s.parse::<u16>().ok())
            .ok_or_else(malformed)?;
        let reason = parts.next().unwrap_or("").trim();

        Ok(Self {
            version: version.to_string(),
            status: StatusCode(status),
            reason: reason.to_string(),
            headers,
        })
    }

    /// Read a response head from `reader`.
    ///
    /// # Errors
    ///
    /// - `Error::HandshakeTooLarge` if the head exceeds `limits.max_handshake_size`
    /// - `Error::HandshakeRejected` if the status line is malformed
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
            format!("{} {} {}\r\n", self.version, self.status.as_u16(), self.reason).as_bytes(),
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
