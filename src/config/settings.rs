use serde::Deserialize;

/// Top-level configuration for the `solarlink` client.
///
/// Includes the channel, the dashboard and the logging settings.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct Settings {
    pub channel: ChannelSettings,
    pub dashboard: DashboardSettings,
    pub logging: LoggingSettings,
}

/// Where the broker lives and how the channel talks to it.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct ChannelSettings {
    pub endpoint: String,
    pub topics: Vec<String>,
    pub reconnect_delay_ms: u64,
    /// `None` retries forever.
    pub max_retries: Option<u32>,
    pub heartbeat_outgoing_ms: u64,
    pub heartbeat_incoming_ms: u64,
    pub connect_timeout_ms: u64,
}

/// Bounds of the monitoring view.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct DashboardSettings {
    pub history_len: usize,
    pub alert_len: usize,
    /// Wind speed (m/s) above which a reading raises an alert.
    pub wind_alert_threshold: f64,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct LoggingSettings {
    pub level: String,
}

/// Partial configuration loaded from files or environment.
///
/// Missing values are filled from [`Settings::default`].
#[derive(Debug, Deserialize, Default)]
pub struct PartialSettings {
    pub channel: Option<PartialChannelSettings>,
    pub dashboard: Option<PartialDashboardSettings>,
    pub logging: Option<PartialLoggingSettings>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialChannelSettings {
    pub endpoint: Option<String>,
    pub topics: Option<Vec<String>>,
    pub reconnect_delay_ms: Option<u64>,
    pub max_retries: Option<u32>,
    pub heartbeat_outgoing_ms: Option<u64>,
    pub heartbeat_incoming_ms: Option<u64>,
    pub connect_timeout_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialDashboardSettings {
    pub history_len: Option<usize>,
    pub alert_len: Option<usize>,
    pub wind_alert_threshold: Option<f64>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialLoggingSettings {
    pub level: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            channel: ChannelSettings::default(),
            dashboard: DashboardSettings::default(),
            logging: LoggingSettings {
                level: "info".to_string(),
            },
        }
    }
}

impl Default for ChannelSettings {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8080/ws".to_string(),
            topics: vec!["/topic/sensor-data".to_string()],
            reconnect_delay_ms: 5000,
            max_retries: None,
            heartbeat_outgoing_ms: 4000,
            heartbeat_incoming_ms: 4000,
            connect_timeout_ms: 10_000,
        }
    }
}

impl Default for DashboardSettings {
    fn default() -> Self {
        Self {
            history_len: 24,
            alert_len: 50,
            wind_alert_threshold: 15.0,
        }
    }
}
