use serde::Serialize;
use tokio::sync::{mpsc, oneshot, watch};

use super::message::OutboundCommand;
use super::state::{ChannelState, ChannelStatus};
use crate::utils::error::ChannelError;

pub(crate) enum Outbound {
    Command(OutboundCommand),
    Flush(oneshot::Sender<()>),
}

/// Cloneable sending side of a channel.
///
/// Every call checks the channel status first: while the channel is not
/// connected nothing is queued and the caller gets
/// [`ChannelError::NotConnected`] back.
#[derive(Clone)]
pub struct Publisher {
    outbound: mpsc::UnboundedSender<Outbound>,
    state: watch::Receiver<ChannelState>,
}

impl Publisher {
    pub(crate) fn new(
        outbound: mpsc::UnboundedSender<Outbound>,
        state: watch::Receiver<ChannelState>,
    ) -> Self {
        Self { outbound, state }
    }

    pub fn status(&self) -> ChannelStatus {
        self.state.borrow().status
    }

    pub fn is_connected(&self) -> bool {
        self.status() == ChannelStatus::Connected
    }

    fn ensure_connected(&self) -> Result<(), ChannelError> {
        match self.status() {
            ChannelStatus::Connected => Ok(()),
            other => Err(ChannelError::NotConnected(other)),
        }
    }

    pub fn send(&self, command: OutboundCommand) -> Result<(), ChannelError> {
        self.ensure_connected()?;
        self.outbound
            .send(Outbound::Command(command))
            .map_err(|_| ChannelError::Disconnected)
    }

    pub fn publish(
        &self,
        destination: impl Into<String>,
        body: impl Into<String>,
    ) -> Result<(), ChannelError> {
        self.send(OutboundCommand::new(destination, body))
    }

    pub fn publish_json<T: Serialize + ?Sized>(
        &self,
        destination: impl Into<String>,
        value: &T,
    ) -> Result<(), ChannelError> {
        self.ensure_connected()?;
        self.send(OutboundCommand::json(destination, value)?)
    }

    /// Resolves once every command sent before it has been written to the
    /// transport.
    pub async fn flush(&self) -> Result<(), ChannelError> {
        self.ensure_connected()?;
        let (done, written) = oneshot::channel();
        self.outbound
            .send(Outbound::Flush(done))
            .map_err(|_| ChannelError::Disconnected)?;
        written.await.map_err(|_| ChannelError::Disconnected)
    }
}
