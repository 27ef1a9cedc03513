use std::collections::HashSet;
use std::time::Duration;

use url::Url;

use crate::auth::AuthSession;
use crate::config::ChannelSettings;
use crate::stomp::HeartBeat;
use crate::utils::error::ChannelError;

/// How the channel retries after it loses the broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Fixed pause between a failure and the next attempt.
    pub delay: Duration,
    /// Consecutive failed attempts tolerated before giving up. `None` retries
    /// until the channel is deactivated.
    pub max_retries: Option<u32>,
}

impl ReconnectPolicy {
    pub fn fixed(delay: Duration) -> Self {
        Self {
            delay,
            max_retries: None,
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    pub(crate) fn exhausted(&self, retries: u32) -> bool {
        self.max_retries.is_some_and(|max| retries >= max)
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::fixed(Duration::from_millis(5000))
    }
}

/// Connection parameters for one channel session. A live channel never
/// mutates its config; see [`TelemetryChannel::reconfigure`](super::TelemetryChannel::reconfigure).
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelConfig {
    pub endpoint: Url,
    pub topics: Vec<String>,
    pub auth: Option<AuthSession>,
    pub heart_beat: HeartBeat,
    pub connect_timeout: Duration,
    pub reconnect: ReconnectPolicy,
}

impl ChannelConfig {
    pub fn new<I, S>(endpoint: Url, topics: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            endpoint,
            topics: topics.into_iter().map(Into::into).collect(),
            auth: None,
            heart_beat: HeartBeat::new(4000, 4000),
            connect_timeout: Duration::from_secs(10),
            reconnect: ReconnectPolicy::default(),
        }
    }

    pub fn from_settings(settings: &ChannelSettings) -> Result<Self, ChannelError> {
        let endpoint = Url::parse(&settings.endpoint).map_err(|e| {
            ChannelError::InvalidConfig(format!("endpoint `{}`: {e}", settings.endpoint))
        })?;
        let mut reconnect =
            ReconnectPolicy::fixed(Duration::from_millis(settings.reconnect_delay_ms));
        reconnect.max_retries = settings.max_retries;

        let config = Self::new(endpoint, settings.topics.iter().cloned())
            .with_heart_beat(HeartBeat::new(
                settings.heartbeat_outgoing_ms,
                settings.heartbeat_incoming_ms,
            ))
            .with_connect_timeout(Duration::from_millis(settings.connect_timeout_ms))
            .with_reconnect(reconnect);
        config.validate()?;
        Ok(config)
    }

    pub fn with_auth(mut self, auth: AuthSession) -> Self {
        self.auth = Some(auth);
        self
    }

    pub fn with_heart_beat(mut self, heart_beat: HeartBeat) -> Self {
        self.heart_beat = heart_beat;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_reconnect(mut self, reconnect: ReconnectPolicy) -> Self {
        self.reconnect = reconnect;
        self
    }

    pub fn validate(&self) -> Result<(), ChannelError> {
        if !matches!(self.endpoint.scheme(), "ws" | "wss" | "http" | "https") {
            return Err(ChannelError::InvalidConfig(format!(
                "endpoint scheme `{}` is not a web-socket or http scheme",
                self.endpoint.scheme()
            )));
        }
        if self.endpoint.host_str().is_none_or(str::is_empty) {
            return Err(ChannelError::InvalidConfig("endpoint has no host".into()));
        }
        if self.topics.is_empty() {
            return Err(ChannelError::InvalidConfig(
                "at least one topic is required".into(),
            ));
        }
        let mut seen = HashSet::new();
        for topic in &self.topics {
            if topic.trim().is_empty() {
                return Err(ChannelError::InvalidConfig("topic names cannot be empty".into()));
            }
            if !seen.insert(topic.as_str()) {
                return Err(ChannelError::InvalidConfig(format!(
                    "topic `{topic}` is listed twice"
                )));
            }
        }
        if self.connect_timeout.is_zero() {
            return Err(ChannelError::InvalidConfig(
                "connect timeout must be positive".into(),
            ));
        }
        Ok(())
    }

    /// Value of the CONNECT frame's `host` header.
    pub(crate) fn broker_host(&self) -> &str {
        self.endpoint.host_str().unwrap_or("localhost")
    }
}
