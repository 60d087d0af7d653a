//! Connection lifecycle states

use std::fmt;

/// Lifecycle of one transport session.
///
/// `Disconnected -> Connecting -> Connected -> Closing -> Disconnected`.
/// A fresh connection may also jump from `Disconnected` straight to `Connected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Closing,
}

impl ConnectionState {
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Disconnected, Self::Connecting | Self::Connected)
                | (Self::Connecting, Self::Connected | Self::Closing)
                | (Self::Connected, Self::Closing)
                | (Self::Closing, Self::Disconnected)
        )
    }

    pub const fn is_connected(self) -> bool {
        matches!(self, Self::Connected)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Closing => "closing",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
