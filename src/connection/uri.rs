//! `ws://` URI parsing for client connections.

use crate::error::{Error, Result};

/// Target of a client connection, parsed from `ws://host[:port][/path]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WsUri {
    /// Host name or address, without IPv6 brackets.
    pub host: String,
    pub port: u16,
    /// Absolute request path including any query, `/` if absent.
    pub path: String,
    default_port: bool,
}

impl WsUri {
    /// Parse `uri`, using `default_port` when the authority has no port.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidUri` for a scheme other than `ws`, an empty
    /// host, or a port that is not a number in `1..=65535`.
    pub fn parse(uri: &str, default_port: u16) -> Result<Self> {
        let invalid = |reason: &str| Error::InvalidUri(format!("{uri}: {reason}"));

        let (scheme, rest) = uri.split_once("://").ok_or_else(|| invalid("missing scheme"))?;
        if !scheme.eq_ignore_ascii_case("ws") {
            return Err(invalid("only ws:// is supported"));
        }

        let (authority, path) = match rest.find(['/', '?']) {
            Some(i) if rest[i..].starts_with('/') => (&rest[..i], rest[i..].to_string()),
            Some(i) => (&rest[..i], format!("/{}", &rest[i..])),
            None => (rest, "/".to_string()),
        };

        let (host, port) = if let Some(bracketed) = authority.strip_prefix('[') {
            let (host, tail) = bracketed
                .split_once(']')
                .ok_or_else(|| invalid("unterminated IPv6 address"))?;
            let port = match tail {
                "" => None,
                _ => Some(tail.strip_prefix(':').ok_or_else(|| invalid("garbage after host"))?),
            };
            (host, port)
        } else {
            match authority.rsplit_once(':') {
                Some((host, port)) => (host, Some(port)),
                None => (authority, None),
            }
        };

        if host.is_empty() {
            return Err(invalid("missing host"));
        }
        let (port, default_port) = match port {
            Some(p) => (
                p.parse::<u16>()
                    .ok()
                    .filter(|p| *p != 0)
                    .ok_or_else(|| invalid("invalid port"))?,
                false,
            ),
            None => (default_port, true),
        };

        Ok(Self {
            host: host.to_string(),
            port,
            path,
            default_port,
        })
    }

    /// Value for the `Host` header: the port is included only when the URI
    /// named one.
    #[must_use]
    pub fn host_header(&self) -> String {
        let host = if self.host.contains(':') {
            format!("[{}]", self.host)
        } else {
            self.host.clone()
        };
        if self.default_port {
            host
        } else {
            format!("{host}:{}", self.port)
        }
    }
}
