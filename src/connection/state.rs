//! Connection lifecycle states.

/// Connection lifecycle state.
///
/// Transitions only move forward: `Connecting -> Open -> Closing -> Closed`.
/// `Open` may also jump straight to `Closed` when the transport fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
#[repr(u8)]
pub enum ConnectionState {
    /// Handshake in progress.
    #[default]
    Connecting = 0,
    /// Handshake done; frames flow both ways.
    Open = 1,
    /// A Close frame was sent or received; no more application sends.
    Closing = 2,
    /// Transport released. Terminal.
    Closed = 3,
}

impl ConnectionState {
    /// Only an open connection accepts application sends.
    #[must_use]
    #[inline]
    pub const fn can_send(self) -> bool {
        matches!(self, ConnectionState::Open)
    }

    #[must_use]
    #[inline]
    pub const fn is_closed(self) -> bool {
        matches!(self, ConnectionState::Closed)
    }

    pub(crate) const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Inverse of `as_u8`; out-of-range values read as `Closed`.
    pub(crate) const fn from_u8(value: u8) -> Self {
        match value {
            0 => ConnectionState::Connecting,
            1 => ConnectionState::Open,
            2 => ConnectionState::Closing,
            _ => ConnectionState::Closed,
        }
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Connecting => write!(f, "Connecting"),
            ConnectionState::Open => write!(f, "Open"),
            ConnectionState::Closing => write!(f, "Closing"),
            ConnectionState::Closed => write!(f, "Closed"),
        }
    }
}
