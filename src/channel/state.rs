use std::fmt;

/// Lifecycle of a channel session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelStatus {
    #[default]
    Idle,
    Connecting,
    Connected,
    Error,
    Closed,
}

impl fmt::Display for ChannelStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ChannelStatus::Idle => "idle",
            ChannelStatus::Connecting => "connecting",
            ChannelStatus::Connected => "connected",
            ChannelStatus::Error => "error",
            ChannelStatus::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// What the dashboard shows: the status plus the last error text, if any.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ChannelState {
    pub status: ChannelStatus,
    pub error: Option<String>,
}

impl ChannelState {
    pub fn new(status: ChannelStatus, error: Option<String>) -> Self {
        Self { status, error }
    }

    pub fn is_connected(&self) -> bool {
        self.status == ChannelStatus::Connected
    }

    /// "Connected" or "Disconnected", as the status indicator reads.
    pub fn label(&self) -> &'static str {
        if self.is_connected() {
            "Connected"
        } else {
            "Disconnected"
        }
    }
}

pub(crate) const TRANSPORT_ERROR: &str = "WebSocket connection error";
pub(crate) const CONNECTION_CLOSED: &str = "WebSocket connection closed";
pub(crate) const HANDSHAKE_TIMEOUT: &str = "Broker handshake timed out";

pub(crate) fn broker_error(text: &str) -> String {
    format!("Broker reported error: {text}")
}
