//! Configuration and limits for WebSocket connections.

use std::time::Duration;

/// Default maximum frame payload: 15 MiB.
pub const DEFAULT_MAX_FRAME_SIZE: usize = 15 * 1024 * 1024;

/// Size limits applied while reading frames, messages and handshake heads.
///
/// Every limit is checked against declared sizes before buffers grow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Limits {
    /// Maximum payload size of a single frame in bytes.
    ///
    /// A frame declaring a larger payload is rejected before any buffer is
    /// allocated for it.
    ///
    /// Default: 15 MB (15 * 1024 * 1024)
    pub max_frame_size: usize,

    /// Maximum size of a complete message in bytes.
    ///
    /// This applies to the total size after reassembling all fragments.
    ///
    /// Default: 64 MB (64 * 1024 * 1024)
    pub max_message_size: usize,

    /// Maximum number of fragments in a single message.
    ///
    /// Default: 128
    pub max_fragment_count: usize,

    /// Maximum size of the HTTP upgrade head in bytes.
    ///
    /// Default: 8 KB (8192)
    pub max_handshake_size: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            max_message_size: 64 * 1024 * 1024,
            max_fragment_count: 128,
            max_handshake_size: 8192,
        }
    }
}

impl Limits {
    /// Create new limits with custom values.
    #[must_use]
    pub const fn new(
        max_frame_size: usize,
        max_message_size: usize,
        max_fragment_count: usize,
        max_handshake_size: usize,
    ) -> Self {
        Self {
            max_frame_size,
            max_message_size,
            max_fragment_count,
            max_handshake_size,
        }
    }

    /// Validate a declared frame payload length.
    ///
    /// Takes the raw `u64` from the wire so that lengths beyond `usize` are
    /// rejected rather than truncated.
    ///
    /// # Errors
    ///
    /// Returns [`Error::FrameTooLarge`](crate::Error::FrameTooLarge) if `size` exceeds the configured maximum.
    pub const fn check_frame_size(&self, size: u64) -> Result<(), crate::Error> {
        if size > self.max_frame_size as u64 {
            Err(crate::Error::FrameTooLarge {
                size,
                max: self.max_frame_size,
            })
        } else {
            Ok(())
        }
    }

    /// Check the running size of a message being reassembled.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MessageTooLarge`](crate::Error::MessageTooLarge) if `size` exceeds the configured maximum.
    pub const fn check_message_size(&self, size: usize) -> Result<(), crate::Error> {
        if size > self.max_message_size {
            Err(crate::Error::MessageTooLarge {
                size,
                max: self.max_message_size,
            })
        } else {
            Ok(())
        }
    }

    /// Check the number of frames in one fragment run.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TooManyFragments`](crate::Error::TooManyFragments) if `count` exceeds the configured maximum.
    pub const fn check_fragment_count(&self, count: usize) -> Result<(), crate::Error> {
        if count > self.max_fragment_count {
            Err(crate::Error::TooManyFragments {
                count,
                max: self.max_fragment_count,
            })
        } else {
            Ok(())
        }
    }

    /// Check the bytes read so far for an HTTP head.
    ///
    /// # Errors
    ///
    /// Returns [`Error::HandshakeTooLarge`](crate::Error::HandshakeTooLarge) if `size` exceeds the configured maximum.
    pub const fn check_handshake_size(&self, size: usize) -> Result<(), crate::Error> {
        if size > self.max_handshake_size {
            Err(crate::Error::HandshakeTooLarge {
                size,
                max: self.max_handshake_size,
            })
        } else {
            Ok(())
        }
    }
}

/// Timeout configuration for WebSocket connections.
///
/// An open connection waits for data indefinitely until it is closed or
/// cancelled; only the handshake and the closing writes are bounded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timeouts {
    /// Maximum time to complete the HTTP upgrade exchange.
    ///
    /// Default: 10 seconds
    pub handshake: Duration,

    /// Maximum time `close()` spends getting its Close frame out, and the
    /// read loop spends shutting the write half down. A peer that stops
    /// reading cannot hold a close past this.
    ///
    /// Default: 5 seconds
    pub close: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            handshake: Duration::from_secs(10),
            close: Duration::from_secs(5),
        }
    }
}

impl Timeouts {
    /// Create new timeouts with custom values.
    #[must_use]
    pub const fn new(handshake: Duration, close: Duration) -> Self {
        Self { handshake, close }
    }
}

/// WebSocket connection configuration.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Resource limits.
    pub limits: Limits,

    /// Timeout configuration.
    pub timeouts: Timeouts,

    /// Allowed origins for server-side upgrades.
    ///
    /// If `Some`, only upgrade requests whose `Origin` header matches one of
    /// these values are accepted. If `None`, any non-empty origin is accepted.
    /// Default: None
    pub allowed_origins: Option<Vec<String>>,
}

impl Config {
    /// Create a new configuration with default limits.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set custom limits.
    #[must_use]
    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Set the maximum frame payload size.
    #[must_use]
    pub const fn with_max_frame_size(mut self, size: usize) -> Self {
        self.limits.max_frame_size = size;
        self
    }

    /// Set timeout configuration.
    #[must_use]
    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Set the handshake timeout.
    #[must_use]
    pub const fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts.handshake = timeout;
        self
    }

    /// Set the bound on sending the Close frame and releasing the transport.
    #[must_use]
    pub const fn with_close_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts.close = timeout;
        self
    }

    /// Set allowed origins for server-side upgrades.
    #[must_use]
    pub fn with_allowed_origins(mut self, origins: Vec<String>) -> Self {
        self.allowed_origins = Some(origins);
        self
    }

    /// Configuration for accepting connections.
    #[must_use]
    pub fn server() -> Self {
        Self::default()
    }

    /// Configuration for initiating connections.
    #[must_use]
    pub fn client() -> Self {
        Self::default()
    }

    /// Check whether `origin` passes the configured allow list.
    #[must_use]
    pub fn origin_allowed(&self, origin: &str) -> bool {
        match &self.allowed_origins {
            Some(allowed) => allowed.iter().any(|a| a == origin),
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limits_default() {
        let limits = Limits::default();
        assert_eq!(limits.max_frame_size, 15_728_640);
        assert_eq!(limits.max_message_size, 64 * 1024 * 1024);
        assert_eq!(limits.max_fragment_count, 128);
        assert_eq!(limits.max_handshake_size, 8192);
    }

    #[test]
    fn test_limits_check_frame_size() {
        let limits = Limits::default();
        assert!(limits.check_frame_size(1024).is_ok());
        assert!(limits.check_frame_size(15_728_640).is_ok());
        assert!(limits.check_frame_size(15_728_641).is_err());
        assert!(limits.check_frame_size(u64::MAX).is_err());
    }

    #[test]
    fn test_limits_check_message_size() {
        let limits = Limits::default();
        assert!(limits.check_message_size(1024).is_ok());
        assert!(limits.check_message_size(100 * 1024 * 1024).is_err());
    }

    #[test]
    fn test_limits_check_fragment_count() {
        let limits = Limits::default();
        assert!(limits.check_fragment_count(50).is_ok());
        assert!(limits.check_fragment_count(200).is_err());
    }

    #[test]
    fn test_limits_check_handshake_size() {
        let limits = Limits::default();
        assert!(limits.check_handshake_size(1024).is_ok());
        assert!(limits.check_handshake_size(10000).is_err());
    }

    #[test]
    fn test_timeouts_default() {
        assert_eq!(Timeouts::default().handshake, Duration::from_secs(10));
        assert_eq!(Timeouts::default().close, Duration::from_secs(5));
    }

    #[test]
    fn test_config_builder() {
        let config = Config::new()
            .with_max_frame_size(4096)
            .with_handshake_timeout(Duration::from_millis(250))
            .with_close_timeout(Duration::from_millis(40));

        assert_eq!(config.limits.max_frame_size, 4096);
        assert_eq!(config.timeouts.handshake, Duration::from_millis(250));
        assert_eq!(config.timeouts.close, Duration::from_millis(40));
    }

    #[test]
    fn test_origin_allow_list() {
        let open = Config::server();
        assert!(open.origin_allowed("http://anything.example"));

        let restricted = Config::server().with_allowed_origins(vec!["http://ok.example".into()]);
        assert!(restricted.origin_allowed("http://ok.example"));
        assert!(!restricted.origin_allowed("http://evil.example"));
    }
}
