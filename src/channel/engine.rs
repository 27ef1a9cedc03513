use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, watch};
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::config::ChannelConfig;
use super::listener::ChannelListener;
use super::message::InboundMessage;
use super::publisher::{Outbound, Publisher};
use super::state::{
    CONNECTION_CLOSED, ChannelState, ChannelStatus, HANDSHAKE_TIMEOUT, TRANSPORT_ERROR,
    broker_error,
};
use crate::auth::AuthSession;
use crate::stomp::{Command, Frame, HeartBeat};
use crate::transport::{Link, Transport};

/// State shared by the handle and the engine task.
///
/// The listener slot doubles as the delivery gate: status changes and
/// messages are only published while it holds a listener, and detaching takes
/// the same lock, so nothing reaches the listener once `detach` returns.
pub(crate) struct Shared {
    listener: Mutex<Option<Arc<dyn ChannelListener>>>,
    state: watch::Sender<ChannelState>,
    publisher: Publisher,
}

impl Shared {
    pub(crate) fn new(
        listener: Arc<dyn ChannelListener>,
        outbound: mpsc::UnboundedSender<Outbound>,
    ) -> Self {
        let (state, state_rx) = watch::channel(ChannelState::default());
        Self {
            listener: Mutex::new(Some(listener)),
            state,
            publisher: Publisher::new(outbound, state_rx),
        }
    }

    fn gate(&self) -> MutexGuard<'_, Option<Arc<dyn ChannelListener>>> {
        self.listener.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn publisher(&self) -> &Publisher {
        &self.publisher
    }

    pub(crate) fn state(&self) -> ChannelState {
        self.state.borrow().clone()
    }

    pub(crate) fn watch(&self) -> watch::Receiver<ChannelState> {
        self.state.subscribe()
    }

    /// Returns `false` once the channel has been detached.
    pub(crate) fn transition(&self, status: ChannelStatus, error: Option<String>) -> bool {
        let gate = self.gate();
        let Some(listener) = gate.as_ref() else {
            return false;
        };
        let state = ChannelState::new(status, error);
        debug!(status = %state.status, error = state.error.as_deref(), "status changed");
        self.state.send_replace(state.clone());
        self.notify(listener, &state);
        true
    }

    /// Returns `false` once the channel has been detached.
    pub(crate) fn deliver(&self, message: InboundMessage) -> bool {
        let gate = self.gate();
        let Some(listener) = gate.as_ref() else {
            return false;
        };
        let destination = message.destination.clone();
        if panic::catch_unwind(AssertUnwindSafe(|| listener.on_message(message))).is_err() {
            error!(%destination, "listener panicked while handling a message");
        }
        true
    }

    /// Drops the listener and resets the status to idle. Idempotent.
    pub(crate) fn detach(&self) -> bool {
        let mut gate = self.gate();
        let Some(listener) = gate.take() else {
            return false;
        };
        let state = ChannelState::default();
        self.state.send_replace(state.clone());
        self.notify(&listener, &state);
        true
    }

    fn notify(&self, listener: &Arc<dyn ChannelListener>, state: &ChannelState) {
        let publisher = &self.publisher;
        if panic::catch_unwind(AssertUnwindSafe(|| listener.on_status_change(state, publisher)))
            .is_err()
        {
            error!(status = %state.status, "listener panicked during a status change");
        }
    }
}

enum Ended {
    Closed(String),
    Failed(String),
    Detached,
}

/// Drives one channel: connect, subscribe, pump frames, and retry after the
/// configured delay until cancelled.
pub(crate) struct Engine {
    config: ChannelConfig,
    transport: Arc<dyn Transport>,
    shared: Arc<Shared>,
    outbound: mpsc::UnboundedReceiver<Outbound>,
    cancel: CancellationToken,
}

impl Engine {
    pub(crate) fn new(
        config: ChannelConfig,
        transport: Arc<dyn Transport>,
        shared: Arc<Shared>,
        outbound: mpsc::UnboundedReceiver<Outbound>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            config,
            transport,
            shared,
            outbound,
            cancel,
        }
    }

    /// Expects the status to already be `Connecting`.
    pub(crate) async fn run(mut self) {
        let cancel = self.cancel.clone();
        let mut retries: u32 = 0;

        loop {
            let ended = tokio::select! {
                biased;
                _ = cancel.cancelled() => Ended::Detached,
                ended = self.attempt(&mut retries) => ended,
            };

            let (status, text) = match ended {
                Ended::Detached => break,
                Ended::Closed(text) => (ChannelStatus::Closed, text),
                Ended::Failed(text) => (ChannelStatus::Error, text),
            };
            if !self.shared.transition(status, Some(text.clone())) {
                break;
            }

            if self.config.reconnect.exhausted(retries) {
                warn!(retries, "reconnect attempts exhausted, staying disconnected");
                break;
            }
            retries += 1;
            info!(
                attempt = retries,
                delay_ms = self.config.reconnect.delay.as_millis() as u64,
                "scheduling reconnect"
            );

            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = time::sleep(self.config.reconnect.delay) => {}
            }
            if !self.shared.transition(ChannelStatus::Connecting, Some(text)) {
                break;
            }
        }

        debug!("channel task finished");
    }

    async fn attempt(&mut self, retries: &mut u32) -> Ended {
        match establish(&self.config, self.transport.as_ref()).await {
            Ok((link, heart_beat)) => {
                *retries = 0;
                self.serve(link, heart_beat).await
            }
            Err(ended) => ended,
        }
    }

    async fn serve(&mut self, link: Link, heart_beat: HeartBeat) -> Ended {
        let Link {
            mut sink,
            mut stream,
        } = link;

        let mut stale = 0usize;
        while let Ok(queued) = self.outbound.try_recv() {
            if let Outbound::Command(_) = queued {
                stale += 1;
            }
        }
        if stale > 0 {
            warn!(stale, "discarding commands queued for a previous link");
        }

        if !self.shared.transition(ChannelStatus::Connected, None) {
            return Ended::Detached;
        }

        for (index, topic) in self.config.topics.iter().enumerate() {
            let frame = Frame::subscribe(&format!("sub-{index}"), topic);
            if let Err(e) = sink.send(frame.encode()).await {
                warn!(%topic, error = %e, "could not subscribe");
                return Ended::Failed(TRANSPORT_ERROR.to_string());
            }
            debug!(%topic, "subscribed");
        }

        let silence = (heart_beat.incoming_ms > 0)
            .then(|| Duration::from_millis(heart_beat.incoming_ms.saturating_mul(2)));
        let ping_every = Duration::from_millis(heart_beat.outgoing_ms.max(1));
        let mut ping = time::interval_at(Instant::now() + ping_every, ping_every);
        let watchdog = time::sleep(silence.unwrap_or(ping_every));
        tokio::pin!(watchdog);

        loop {
            tokio::select! {
                inbound = stream.next() => {
                    if let Some(limit) = silence {
                        watchdog.as_mut().reset(Instant::now() + limit);
                    }
                    match inbound {
                        None => {
                            info!("broker closed the link");
                            return Ended::Closed(CONNECTION_CLOSED.to_string());
                        }
                        Some(Err(e)) => {
                            warn!(error = %e, "link read failed");
                            return Ended::Failed(TRANSPORT_ERROR.to_string());
                        }
                        Some(Ok(text)) => {
                            if let Some(ended) = self.on_frame(&text) {
                                return ended;
                            }
                        }
                    }
                }
                Some(outbound) = self.outbound.recv() => match outbound {
                    Outbound::Command(command) => {
                        if let Err(e) = sink.send(command.to_frame().encode()).await {
                            warn!(destination = %command.destination, error = %e, "publish failed");
                            return Ended::Failed(TRANSPORT_ERROR.to_string());
                        }
                        debug!(destination = %command.destination, "published");
                    }
                    Outbound::Flush(done) => {
                        let _ = done.send(());
                    }
                },
                _ = ping.tick(), if heart_beat.outgoing_ms > 0 => {
                    if let Err(e) = sink.send("\n".to_string()).await {
                        warn!(error = %e, "heart-beat write failed");
                        return Ended::Failed(TRANSPORT_ERROR.to_string());
                    }
                }
                _ = &mut watchdog, if silence.is_some() => {
                    warn!("broker went silent past the heart-beat window");
                    return Ended::Closed(CONNECTION_CLOSED.to_string());
                }
            }
        }
    }

    fn on_frame(&self, text: &str) -> Option<Ended> {
        let frame = match Frame::decode(text) {
            Ok(Some(frame)) => frame,
            Ok(None) => return None,
            Err(e) => {
                warn!(error = %e, "malformed frame from broker");
                return Some(Ended::Failed(format!("Malformed broker frame: {e}")));
            }
        };

        match frame.command {
            Command::Message => {
                if self.shared.deliver(InboundMessage::from_frame(frame)) {
                    None
                } else {
                    Some(Ended::Detached)
                }
            }
            Command::Error => {
                let text = frame.error_text();
                error!(error = %text, "broker reported an error");
                Some(Ended::Failed(broker_error(&text)))
            }
            Command::Receipt => {
                debug!(receipt = frame.header("receipt-id").unwrap_or_default(), "receipt");
                None
            }
            other => {
                debug!(command = %other, "ignoring frame");
                None
            }
        }
    }
}

async fn establish(
    config: &ChannelConfig,
    transport: &dyn Transport,
) -> Result<(Link, HeartBeat), Ended> {
    match time::timeout(config.connect_timeout, handshake(config, transport)).await {
        Ok(result) => result,
        Err(_) => {
            warn!(
                timeout_ms = config.connect_timeout.as_millis() as u64,
                "broker handshake timed out"
            );
            Err(Ended::Failed(HANDSHAKE_TIMEOUT.to_string()))
        }
    }
}

async fn handshake(
    config: &ChannelConfig,
    transport: &dyn Transport,
) -> Result<(Link, HeartBeat), Ended> {
    let endpoint = &config.endpoint;
    let mut link = transport.connect(endpoint).await.map_err(|e| {
        warn!(%endpoint, error = %e, "could not open transport");
        Ended::Failed(TRANSPORT_ERROR.to_string())
    })?;

    let mut connect = Frame::connect(config.broker_host(), config.heart_beat);
    if let Some(bearer) = config.auth.as_ref().and_then(AuthSession::bearer) {
        connect = connect.with_header("Authorization", bearer);
    }
    link.sink.send(connect.encode()).await.map_err(|e| {
        warn!(error = %e, "could not write CONNECT");
        Ended::Failed(TRANSPORT_ERROR.to_string())
    })?;

    while let Some(next) = link.stream.next().await {
        let text = next.map_err(|e| {
            warn!(error = %e, "link failed during handshake");
            Ended::Failed(TRANSPORT_ERROR.to_string())
        })?;
        let frame = match Frame::decode(&text) {
            Ok(Some(frame)) => frame,
            Ok(None) => continue,
            Err(e) => {
                warn!(error = %e, "malformed frame during handshake");
                return Err(Ended::Failed(format!("Malformed broker frame: {e}")));
            }
        };

        match frame.command {
            Command::Connected => {
                let offered = match frame.header("heart-beat") {
                    Some(raw) => HeartBeat::parse(raw).unwrap_or_else(|e| {
                        warn!(error = %e, "ignoring broker heart-beat header");
                        HeartBeat::default()
                    }),
                    None => HeartBeat::default(),
                };
                let negotiated = HeartBeat::negotiate(config.heart_beat, offered);
                info!(
                    %endpoint,
                    version = frame.header("version").unwrap_or("1.0"),
                    heartbeat_out_ms = negotiated.outgoing_ms,
                    heartbeat_in_ms = negotiated.incoming_ms,
                    "connected to broker"
                );
                return Ok((link, negotiated));
            }
            Command::Error => {
                let text = frame.error_text();
                error!(error = %text, "broker refused the connection");
                return Err(Ended::Failed(broker_error(&text)));
            }
            other => {
                warn!(command = %other, "unexpected frame during handshake");
                return Err(Ended::Failed(format!(
                    "Unexpected {other} frame during handshake"
                )));
            }
        }
    }

    Err(Ended::Closed(CONNECTION_CLOSED.to_string()))
}
