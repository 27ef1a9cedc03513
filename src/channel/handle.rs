use std::sync::Arc;

use serde::Serialize;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, info, info_span};
use uuid::Uuid;

use super::config::ChannelConfig;
use super::engine::{Engine, Shared};
use super::listener::ChannelListener;
use super::message::OutboundCommand;
use super::publisher::Publisher;
use super::state::{ChannelState, ChannelStatus};
use crate::transport::Transport;
use crate::utils::error::ChannelError;

/// One subscription session against the broker.
///
/// `activate` returns immediately in the `Connecting` state; the connection
/// itself is made by a background task on the current tokio runtime. The
/// session is torn down by [`deactivate`](Self::deactivate) or when the
/// value is dropped.
pub struct TelemetryChannel {
    id: Uuid,
    config: ChannelConfig,
    transport: Arc<dyn Transport>,
    listener: Arc<dyn ChannelListener>,
    shared: Arc<Shared>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl TelemetryChannel {
    /// Starts a session. Only an invalid config or a missing runtime is
    /// reported here; an unreachable broker shows up as a status change.
    pub fn activate<T, L>(
        config: ChannelConfig,
        transport: T,
        listener: L,
    ) -> Result<Self, ChannelError>
    where
        T: Transport,
        L: ChannelListener,
    {
        Self::start(config, Arc::new(transport), Arc::new(listener))
    }

    fn start(
        config: ChannelConfig,
        transport: Arc<dyn Transport>,
        listener: Arc<dyn ChannelListener>,
    ) -> Result<Self, ChannelError> {
        config.validate()?;
        let runtime = Handle::try_current().map_err(|_| ChannelError::NoRuntime)?;

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared::new(listener.clone(), outbound_tx));
        shared.transition(ChannelStatus::Connecting, None);

        let id = Uuid::new_v4();
        let cancel = CancellationToken::new();
        let engine = Engine::new(
            config.clone(),
            transport.clone(),
            shared.clone(),
            outbound_rx,
            cancel.clone(),
        );
        let span = info_span!("channel", session = %id, endpoint = %config.endpoint);
        let task = runtime.spawn(engine.run().instrument(span));

        info!(session = %id, endpoint = %config.endpoint, topics = ?config.topics, "channel activated");

        Ok(Self {
            id,
            config,
            transport,
            listener,
            shared,
            cancel,
            task,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }

    pub fn status(&self) -> ChannelStatus {
        self.shared.state().status
    }

    pub fn state(&self) -> ChannelState {
        self.shared.state()
    }

    pub fn last_error(&self) -> Option<String> {
        self.shared.state().error
    }

    pub fn is_connected(&self) -> bool {
        self.status() == ChannelStatus::Connected
    }

    /// Observes status changes.
    pub fn watch(&self) -> watch::Receiver<ChannelState> {
        self.shared.watch()
    }

    pub fn publisher(&self) -> Publisher {
        self.shared.publisher().clone()
    }

    pub fn publish(
        &self,
        destination: impl Into<String>,
        body: impl Into<String>,
    ) -> Result<(), ChannelError> {
        self.shared.publisher().publish(destination, body)
    }

    pub fn publish_json<T: Serialize + ?Sized>(
        &self,
        destination: impl Into<String>,
        value: &T,
    ) -> Result<(), ChannelError> {
        self.shared.publisher().publish_json(destination, value)
    }

    pub fn send(&self, command: OutboundCommand) -> Result<(), ChannelError> {
        self.shared.publisher().send(command)
    }

    pub async fn flush(&self) -> Result<(), ChannelError> {
        self.shared.publisher().flush().await
    }

    /// Waits until the channel reaches `status`. Returns the current state
    /// instead if the channel goes away first.
    pub async fn wait_for(&self, status: ChannelStatus) -> ChannelState {
        let mut changes = self.shared.watch();
        let reached = changes
            .wait_for(|state| state.status == status)
            .await
            .map(|state| state.clone());
        reached.unwrap_or_else(|_| self.shared.state())
    }

    /// Stops the session: no listener call happens after this returns and
    /// no reconnect is attempted. Calling it again is a no-op.
    pub fn deactivate(&self) {
        self.cancel.cancel();
        if self.shared.detach() {
            info!(session = %self.id, "channel deactivated");
        }
        self.task.abort();
    }

    /// Replaces the session with one built from `config`. The old session is
    /// fully torn down before the new one starts.
    pub fn reconfigure(&mut self, config: ChannelConfig) -> Result<(), ChannelError> {
        config.validate()?;
        self.deactivate();
        let next = Self::start(config, self.transport.clone(), self.listener.clone())?;
        *self = next;
        Ok(())
    }
}

impl Drop for TelemetryChannel {
    fn drop(&mut self) {
        self.deactivate();
    }
}
