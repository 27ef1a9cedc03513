//! The `channel` module manages one telemetry session against the broker.
//!
//! A [`TelemetryChannel`] connects over a [`Transport`](crate::transport::Transport),
//! subscribes to every configured topic once per connection, hands each
//! inbound message to its [`ChannelListener`] in arrival order, and publishes
//! outbound commands while connected. When the link drops it reports the
//! failure through its [`ChannelState`] and reconnects after a fixed delay.
//!
//! Status moves `Idle -> Connecting -> Connected -> {Error, Closed}` and
//! cycles back to `Connecting` on every retry. Deactivation returns it to
//! `Idle`.

pub mod config;
pub mod handle;
pub mod listener;
pub mod message;
pub mod publisher;
pub mod state;

mod engine;

pub use config::{ChannelConfig, ReconnectPolicy};
pub use handle::TelemetryChannel;
pub use listener::ChannelListener;
pub use message::{InboundMessage, OutboundCommand};
pub use publisher::Publisher;
pub use state::{ChannelState, ChannelStatus};

#[cfg(test)]
mod tests;
