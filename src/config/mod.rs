mod settings;

use config::{Config, ConfigError, Environment, File};

use settings::{
    PartialChannelSettings, PartialDashboardSettings, PartialLoggingSettings, PartialSettings,
};

pub use settings::{ChannelSettings, DashboardSettings, LoggingSettings, Settings};


/// Loads `config/default` (any format the `config` crate knows) and the
/// `SOLARLINK_` environment, merged over the defaults.
pub fn load_config() -> Result<Settings, ConfigError> {
    load_config_from("config/default")
}

/// Like [`load_config`], reading the file at `path` instead. A missing file
/// is not an error.
///
/// Environment keys look like `SOLARLINK_CHANNEL__ENDPOINT`; topics are a
/// comma separated list.
pub fn load_config_from(path: &str) -> Result<Settings, ConfigError> {
    let builder = Config::builder()
        .add_source(File::with_name(path).required(false))
        .add_source(
            Environment::with_prefix("SOLARLINK")
                .prefix_separator("_")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("channel.topics")
                .try_parsing(true),
        );

    let config = builder.build()?;
    let partial: PartialSettings = config.try_deserialize()?;

    Ok(merge(partial, Settings::default()))
}

fn merge(partial: PartialSettings, default: Settings) -> Settings {
    let channel = partial.channel.unwrap_or_default();
    let dashboard = partial.dashboard.unwrap_or_default();
    let logging = partial.logging.unwrap_or_default();

    Settings {
        channel: merge_channel(channel, default.channel),
        dashboard: merge_dashboard(dashboard, default.dashboard),
        logging: merge_logging(logging, default.logging),
    }
}

fn merge_channel(partial: PartialChannelSettings, default: ChannelSettings) -> ChannelSettings {
    ChannelSettings {
        endpoint: partial.endpoint.unwrap_or(default.endpoint),
        topics: partial.topics.unwrap_or(default.topics),
        reconnect_delay_ms: partial
            .reconnect_delay_ms
            .unwrap_or(default.reconnect_delay_ms),
        max_retries: partial.max_retries.or(default.max_retries),
        heartbeat_outgoing_ms: partial
            .heartbeat_outgoing_ms
            .unwrap_or(default.heartbeat_outgoing_ms),
        heartbeat_incoming_ms: partial
            .heartbeat_incoming_ms
            .unwrap_or(default.heartbeat_incoming_ms),
        connect_timeout_ms: partial
            .connect_timeout_ms
            .unwrap_or(default.connect_timeout_ms),
    }
}

fn merge_dashboard(
    partial: PartialDashboardSettings,
    default: DashboardSettings,
) -> DashboardSettings {
    DashboardSettings {
        history_len: partial.history_len.unwrap_or(default.history_len),
        alert_len: partial.alert_len.unwrap_or(default.alert_len),
        wind_alert_threshold: partial
            .wind_alert_threshold
            .unwrap_or(default.wind_alert_threshold),
    }
}

fn merge_logging(partial: PartialLoggingSettings, default: LoggingSettings) -> LoggingSettings {
    LoggingSettings {
        level: partial.level.unwrap_or(default.level),
    }
}
