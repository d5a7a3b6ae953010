//! Minimal HTTP/1.1 messages for the upgrade handshake.
//!
//! Only the message head is supported: a start line, `Name: value` header
//! lines and the terminating empty line. Bodies are never read.

mod headers;
mod request;
mod response;

pub use headers::HeaderMap;
pub use request::HttpRequest;
pub use response::HttpResponse;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};

use crate::config::Limits;
use crate::error::{Error, Result};

/// HTTP status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StatusCode(pub u16);

impl StatusCode {
    pub const SWITCHING_PROTOCOLS: StatusCode = StatusCode(101);
    pub const OK: StatusCode = StatusCode(200);
    pub const BAD_REQUEST: StatusCode = StatusCode(400);
    pub const NOT_FOUND: StatusCode = StatusCode(404);

    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self.0
    }

    /// Canonical reason phrase, or `""` for codes the crate never emits.
    #[must_use]
    pub const fn reason(self) -> &'static str {
        match self.0 {
            101 => "Switching Protocols",
            200 => "OK",
            400 => "Bad Request",
            404 => "Not Found",
            _ => "",
        }
    }
}

impl std::fmt::Display for StatusCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.0, self.reason())
    }
}

/// Read one message head: the start line plus header lines, up to and
/// including the empty line. Leading empty lines are skipped.
///
/// Returns the start line and the parsed headers.
pub(crate) async fn read_head<R>(reader: &mut R, limits: &Limits) -> Result<(String, HeaderMap)>
where
    R: AsyncBufRead + Unpin,
{
    let max = limits.max_handshake_size;
    let mut total = 0usize;
    let mut line = Vec::with_capacity(128);
    let mut start_line: Option<String> = None;
    let mut headers = HeaderMap::new();

    loop {
        line.clear();
        // One byte past the limit so an overlong head is detected rather than
        // silently cut.
        let budget = max.saturating_sub(total).saturating_add(1) as u64;
        let n = (&mut *reader).take(budget).read_until(b'\n', &mut line).await?;
        if n == 0 {
            return Err(if total == 0 {
                Error::ConnectionClosed
            } else {
                Error::TruncatedStream
            });
        }
        total += n;
        limits.check_handshake_size(total)?;
        if line.last() != Some(&b'\n') {
            return Err(Error::TruncatedStream);
        }

        let text = String::from_utf8_lossy(&line);
        let text = text.trim_end_matches(['\r', '\n']);
        match &start_line {
            None if text.is_empty() => continue,
            None => start_line = Some(text.to_string()),
            Some(_) if text.is_empty() => break,
            Some(_) => headers.parse_line(text),
        }
    }

    let start_line = start_line.unwrap_or_default();
    Ok((start_line, headers))
}
