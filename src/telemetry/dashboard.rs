use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, NaiveDateTime, Utc};
use tokio::sync::watch;
use tracing::{info, warn};

use super::command::{ControlCommand, InitialDataRequest, PlantRequirements, TrackerMode};
use super::destinations;
use super::sensor::SensorReading;
use crate::channel::{
    ChannelConfig, ChannelListener, ChannelState, InboundMessage, Publisher, TelemetryChannel,
};
use crate::config::DashboardSettings;
use crate::transport::Transport;
use crate::utils::error::ChannelError;

/// One point of the angle/radiation chart.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartPoint {
    pub time: NaiveDateTime,
    pub angle: Option<f64>,
    pub radiation: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertKind {
    HighWind,
    Snow,
    EmergencyStop,
    DecodeFailure,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Alert {
    pub at: DateTime<Utc>,
    pub kind: AlertKind,
    pub message: String,
}

/// Everything the monitoring view renders. In-memory only.
#[derive(Debug, Clone)]
pub struct DashboardState {
    settings: DashboardSettings,
    latest: SensorReading,
    history: VecDeque<ChartPoint>,
    alerts: VecDeque<Alert>,
    connection: ChannelState,
    mode: Option<TrackerMode>,
    target_angle: Option<f64>,
    emergency: bool,
    plant: PlantRequirements,
    received: u64,
    decode_failures: u64,
}

impl DashboardState {
    pub fn new(settings: DashboardSettings) -> Self {
        Self {
            history: VecDeque::with_capacity(settings.history_len),
            alerts: VecDeque::with_capacity(settings.alert_len),
            settings,
            latest: SensorReading::default(),
            connection: ChannelState::default(),
            mode: None,
            target_angle: None,
            emergency: false,
            plant: PlantRequirements::default(),
            received: 0,
            decode_failures: 0,
        }
    }

    pub fn latest(&self) -> &SensorReading {
        &self.latest
    }

    /// Oldest first.
    pub fn history(&self) -> impl Iterator<Item = &ChartPoint> {
        self.history.iter()
    }

    /// Oldest first.
    pub fn alerts(&self) -> impl Iterator<Item = &Alert> {
        self.alerts.iter()
    }

    pub fn connection(&self) -> &ChannelState {
        &self.connection
    }

    pub fn mode(&self) -> Option<TrackerMode> {
        self.mode
    }

    pub fn target_angle(&self) -> Option<f64> {
        self.target_angle
    }

    pub fn emergency_active(&self) -> bool {
        self.emergency
    }

    pub fn plant(&self) -> &PlantRequirements {
        &self.plant
    }

    pub fn received(&self) -> u64 {
        self.received
    }

    pub fn decode_failures(&self) -> u64 {
        self.decode_failures
    }

    /// Decodes one inbound body and folds it in. A body that does not decode
    /// is counted and logged and leaves the rest of the state untouched.
    pub fn apply(&mut self, message: &InboundMessage) -> Option<&SensorReading> {
        self.received += 1;
        let update = match SensorReading::from_json(&message.body) {
            Ok(update) => update,
            Err(e) => {
                self.decode_failures += 1;
                warn!(destination = %message.destination, error = %e, "undecodable sensor message");
                self.raise(
                    AlertKind::DecodeFailure,
                    format!("Unreadable message on {}: {e}", message.destination),
                );
                return None;
            }
        };
        if update.is_empty() {
            return None;
        }
        self.record(&update);
        Some(&self.latest)
    }

    fn record(&mut self, update: &SensorReading) {
        let previous = self.latest.clone();
        self.latest.merge(update);

        let threshold = self.settings.wind_alert_threshold;
        let windy = |reading: &SensorReading| reading.wind_speed.is_some_and(|w| w > threshold);
        if windy(&self.latest) && !windy(&previous) {
            let speed = self.latest.wind_speed.unwrap_or_default();
            self.raise(
                AlertKind::HighWind,
                format!("Wind speed high: {speed:.1} m/s"),
            );
        }
        if self.latest.snow == Some(true) && previous.snow != Some(true) {
            self.raise(AlertKind::Snow, "Snow detected".to_string());
        }

        if update.pv_angle.is_some() || update.radiation.is_some() {
            let point = ChartPoint {
                time: update.timestamp.unwrap_or_else(|| Utc::now().naive_utc()),
                angle: self.latest.pv_angle,
                radiation: self.latest.radiation,
            };
            push_bounded(&mut self.history, point, self.settings.history_len);
        }
    }

    pub fn record_command(&mut self, command: &ControlCommand) {
        self.mode = Some(command.mode);
        self.target_angle = command.target_angle;
        if command.emergency_stop {
            self.emergency = true;
            self.raise(AlertKind::EmergencyStop, "Emergency stop issued".to_string());
        } else if command.mode != TrackerMode::Safety {
            self.emergency = false;
        }
    }

    pub fn record_plant(&mut self, requirements: &PlantRequirements) {
        self.plant.merge(requirements);
    }

    pub fn set_connection(&mut self, state: ChannelState) {
        self.connection = state;
    }

    fn raise(&mut self, kind: AlertKind, message: String) {
        let alert = Alert {
            at: Utc::now(),
            kind,
            message,
        };
        push_bounded(&mut self.alerts, alert, self.settings.alert_len);
    }
}

fn push_bounded<T>(queue: &mut VecDeque<T>, item: T, limit: usize) {
    if limit == 0 {
        return;
    }
    while queue.len() >= limit {
        queue.pop_front();
    }
    queue.push_back(item);
}

struct DashboardListener {
    state: Arc<Mutex<DashboardState>>,
    requested: AtomicBool,
    readings: watch::Sender<SensorReading>,
}

impl DashboardListener {
    fn state(&self) -> MutexGuard<'_, DashboardState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ChannelListener for DashboardListener {
    fn on_message(&self, message: InboundMessage) {
        let latest = self.state().apply(&message).cloned();
        if let Some(latest) = latest {
            self.readings.send_replace(latest);
        }
    }

    fn on_status_change(&self, state: &ChannelState, publisher: &Publisher) {
        self.state().set_connection(state.clone());
        if !state.is_connected() || self.requested.swap(true, Ordering::SeqCst) {
            return;
        }
        match publisher.publish_json(destinations::INITIAL_DATA, &InitialDataRequest::default()) {
            Ok(()) => info!("requested initial plant data"),
            Err(e) => {
                warn!(error = %e, "could not request initial data");
                self.requested.store(false, Ordering::SeqCst);
            }
        }
    }
}

/// The monitoring view: a channel plus the state it feeds.
pub struct Dashboard {
    channel: TelemetryChannel,
    state: Arc<Mutex<DashboardState>>,
    readings: watch::Receiver<SensorReading>,
}

impl Dashboard {
    pub fn start<T: Transport>(
        config: ChannelConfig,
        settings: DashboardSettings,
        transport: T,
    ) -> Result<Self, ChannelError> {
        let state = Arc::new(Mutex::new(DashboardState::new(settings)));
        let (readings_tx, readings) = watch::channel(SensorReading::default());
        let listener = DashboardListener {
            state: state.clone(),
            requested: AtomicBool::new(false),
            readings: readings_tx,
        };
        let channel = TelemetryChannel::activate(config, transport, listener)?;
        Ok(Self {
            channel,
            state,
            readings,
        })
    }

    pub fn channel(&self) -> &TelemetryChannel {
        &self.channel
    }

    pub fn snapshot(&self) -> DashboardState {
        self.lock().clone()
    }

    /// Receives each merged reading as it arrives.
    pub fn readings(&self) -> watch::Receiver<SensorReading> {
        self.readings.clone()
    }

    pub fn set_mode(&self, mode: TrackerMode) -> Result<(), ChannelError> {
        self.control(destinations::CONTROL, ControlCommand::mode(mode))
    }

    pub fn set_target_angle(&self, angle: f64) -> Result<(), ChannelError> {
        self.control(destinations::CONTROL, ControlCommand::manual(angle)?)
    }

    pub fn emergency_stop(&self) -> Result<(), ChannelError> {
        self.control(destinations::EMERGENCY, ControlCommand::emergency())
    }

    pub fn push_plant_requirements(
        &self,
        requirements: &PlantRequirements,
    ) -> Result<(), ChannelError> {
        requirements.validate()?;
        self.channel
            .publish_json(destinations::PLANT_REQUIREMENTS, requirements)?;
        self.lock().record_plant(requirements);
        Ok(())
    }

    pub async fn flush(&self) -> Result<(), ChannelError> {
        self.channel.flush().await
    }

    pub fn stop(&self) {
        self.channel.deactivate();
    }

    fn control(&self, destination: &str, command: ControlCommand) -> Result<(), ChannelError> {
        self.channel.publish_json(destination, &command)?;
        info!(%destination, mode = %command.mode, angle = command.target_angle, "command sent");
        self.lock().record_command(&command);
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, DashboardState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
