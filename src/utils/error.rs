//! The `error` module defines the error types used within `solarlink`.
//!
//! Each layer gets its own enum: frame parsing, the web-socket link, and the
//! telemetry channel that callers talk to. Configuration errors come straight
//! from the `config` crate.

use thiserror::Error;

use crate::channel::ChannelStatus;

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("empty frame")]
    Empty,
    #[error("unknown command `{0}`")]
    UnknownCommand(String),
    #[error("malformed header line `{0}`")]
    MalformedHeader(String),
    #[error("invalid escape sequence in header `{0}`")]
    BadEscape(String),
    #[error("invalid content-length `{0}`")]
    BadContentLength(String),
    #[error("frame is not NUL-terminated")]
    MissingTerminator,
    #[error("invalid heart-beat header `{0}`")]
    BadHeartBeat(String),
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("unsupported endpoint scheme `{0}`")]
    UnsupportedScheme(String),
    #[error("websocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("binary message is not valid UTF-8")]
    InvalidUtf8,
    #[error("link closed")]
    Closed,
}

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("invalid channel configuration: {0}")]
    InvalidConfig(String),
    #[error("no tokio runtime available to drive the channel")]
    NoRuntime,
    #[error("channel is not connected (status: {0})")]
    NotConnected(ChannelStatus),
    #[error("link went away before the command was written")]
    Disconnected,
    #[error("invalid command: {0}")]
    InvalidCommand(String),
    #[error("failed to encode command body: {0}")]
    Encode(#[from] serde_json::Error),
}
