use std::sync::{Arc, Mutex};
use std::time::Duration;

use url::Url;

use super::{
    ChannelConfig, ChannelListener, ChannelState, ChannelStatus, InboundMessage,
    OutboundCommand, Publisher, ReconnectPolicy, TelemetryChannel,
};
use crate::auth::AuthSession;
use crate::stomp::{Command, Frame};
use crate::transport::scripted::ScriptedTransport;
use crate::utils::error::ChannelError;

const SENSOR_TOPIC: &str = "/topic/sensor-data";

#[derive(Clone, Default)]
struct Recorder {
    statuses: Arc<Mutex<Vec<ChannelStatus>>>,
    bodies: Arc<Mutex<Vec<String>>>,
}

impl Recorder {
    fn bodies(&self) -> Vec<String> {
        self.bodies.lock().unwrap().clone()
    }

    fn statuses(&self) -> Vec<ChannelStatus> {
        self.statuses.lock().unwrap().clone()
    }
}

impl ChannelListener for Recorder {
    fn on_message(&self, message: InboundMessage) {
        if message.body == "boom" {
            panic!("listener choked on a message");
        }
        self.bodies.lock().unwrap().push(message.body);
    }

    fn on_status_change(&self, state: &ChannelState, _publisher: &Publisher) {
        self.statuses.lock().unwrap().push(state.status);
    }
}

fn config(topics: &[&str]) -> ChannelConfig {
    ChannelConfig::new(
        Url::parse("http://localhost:8080/ws").unwrap(),
        topics.iter().copied(),
    )
}

async fn until(what: &str, mut check: impl FnMut() -> bool) {
    for _ in 0..2000 {
        if check() {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("gave up waiting for {what}");
}

async fn settle() {
    for _ in 0..200 {
        tokio::task::yield_now().await;
    }
}

async fn connected_channel(
    topics: &[&str],
) -> (TelemetryChannel, ScriptedTransport, Recorder) {
    let transport = ScriptedTransport::new();
    let recorder = Recorder::default();
    let channel =
        TelemetryChannel::activate(config(topics), transport.clone(), recorder.clone()).unwrap();
    until("first connect", || transport.connects() == 1).await;
    until("CONNECT frame", || !transport.sent_with(Command::Connect).is_empty()).await;
    assert!(transport.accept());
    until("subscriptions", || {
        transport.sent_with(Command::Subscribe).len() == topics.len()
    })
    .await;
    assert_eq!(channel.status(), ChannelStatus::Connected);
    (channel, transport, recorder)
}

#[tokio::test]
async fn test_activate_is_connecting_immediately() {
    let transport = ScriptedTransport::new();
    let channel =
        TelemetryChannel::activate(config(&[SENSOR_TOPIC]), transport.clone(), Recorder::default())
            .unwrap();
    assert_eq!(channel.status(), ChannelStatus::Connecting);
    assert_eq!(channel.last_error(), None);

    until("CONNECT frame", || !transport.sent_with(Command::Connect).is_empty()).await;
    let connect = &transport.sent_with(Command::Connect)[0];
    assert_eq!(connect.header("accept-version"), Some("1.2,1.1,1.0"));
    assert_eq!(connect.header("host"), Some("localhost"));
    assert_eq!(connect.header("heart-beat"), Some("4000,4000"));
    assert!(connect.header("Authorization").is_none());
}

#[tokio::test]
async fn test_activate_rejects_invalid_config() {
    let transport = ScriptedTransport::new();
    let empty = TelemetryChannel::activate(config(&[]), transport.clone(), Recorder::default());
    assert!(matches!(empty, Err(ChannelError::InvalidConfig(_))));

    let duplicate = TelemetryChannel::activate(
        config(&[SENSOR_TOPIC, SENSOR_TOPIC]),
        transport.clone(),
        Recorder::default(),
    );
    assert!(matches!(duplicate, Err(ChannelError::InvalidConfig(_))));

    let blank = TelemetryChannel::activate(config(&[" "]), transport.clone(), Recorder::default());
    assert!(matches!(blank, Err(ChannelError::InvalidConfig(_))));

    let wrong_scheme = ChannelConfig::new(Url::parse("ftp://broker/ws").unwrap(), [SENSOR_TOPIC]);
    assert!(matches!(
        TelemetryChannel::activate(wrong_scheme, transport.clone(), Recorder::default()),
        Err(ChannelError::InvalidConfig(_))
    ));
    assert_eq!(transport.connects(), 0);
}

#[test]
fn test_activate_without_runtime_fails() {
    let result = TelemetryChannel::activate(
        config(&[SENSOR_TOPIC]),
        ScriptedTransport::new(),
        Recorder::default(),
    );
    assert!(matches!(result, Err(ChannelError::NoRuntime)));
}

#[tokio::test]
async fn test_auth_session_token_goes_on_connect() {
    let transport = ScriptedTransport::new();
    let config = config(&[SENSOR_TOPIC]).with_auth(AuthSession::new("s3cret", "USER"));
    let _channel =
        TelemetryChannel::activate(config, transport.clone(), Recorder::default()).unwrap();
    until("CONNECT frame", || !transport.sent_with(Command::Connect).is_empty()).await;
    assert_eq!(
        transport.sent_with(Command::Connect)[0].header("Authorization"),
        Some("Bearer s3cret")
    );
}

#[tokio::test]
async fn test_connect_subscribes_every_topic_once() {
    let topics = ["/topic/sensor-data", "/topic/emergency", "/topic/alerts"];
    let (channel, transport, recorder) = connected_channel(&topics).await;
    settle().await;

    let subscribes = transport.sent_with(Command::Subscribe);
    assert_eq!(subscribes.len(), 3);
    let destinations: Vec<_> = subscribes
        .iter()
        .map(|frame| frame.header("destination").unwrap().to_string())
        .collect();
    assert_eq!(destinations, topics);

    let mut ids: Vec<_> = subscribes.iter().map(|frame| frame.header("id").unwrap()).collect();
    ids.dedup();
    assert_eq!(ids.len(), 3);

    assert_eq!(channel.last_error(), None);
    assert_eq!(
        recorder.statuses(),
        vec![ChannelStatus::Connecting, ChannelStatus::Connected]
    );
}

#[tokio::test]
async fn test_messages_are_delivered_in_order() {
    let (_channel, transport, recorder) = connected_channel(&[SENSOR_TOPIC]).await;

    let sent: Vec<String> = (0..25).map(|n| format!("{{\"seq\":{n}}}")).collect();
    for body in &sent {
        assert!(transport.deliver(SENSOR_TOPIC, body));
    }
    until("all messages", || recorder.bodies().len() == sent.len()).await;
    settle().await;
    assert_eq!(recorder.bodies(), sent);
}

#[tokio::test]
async fn test_heartbeats_and_receipts_are_not_delivered() {
    let (channel, transport, recorder) = connected_channel(&[SENSOR_TOPIC]).await;
    assert!(transport.push("\n"));
    assert!(transport.push_frame(&Frame::new(Command::Receipt).with_header("receipt-id", "1")));
    assert!(transport.deliver(SENSOR_TOPIC, "after"));
    until("message", || recorder.bodies().len() == 1).await;
    assert_eq!(recorder.bodies(), vec!["after".to_string()]);
    assert!(channel.is_connected());
}

#[tokio::test]
async fn test_publish_while_connecting_is_rejected() {
    let transport = ScriptedTransport::new();
    let channel =
        TelemetryChannel::activate(config(&[SENSOR_TOPIC]), transport.clone(), Recorder::default())
            .unwrap();
    until("first connect", || transport.connects() == 1).await;

    let result = channel.publish("/app/control", "{}");
    assert!(matches!(
        result,
        Err(ChannelError::NotConnected(ChannelStatus::Connecting))
    ));

    transport.accept();
    until("connected", || channel.is_connected()).await;
    settle().await;
    assert!(transport.sent_with(Command::Send).is_empty());
}

#[tokio::test]
async fn test_publish_while_connected_sends_once() {
    let (channel, transport, _recorder) = connected_channel(&[SENSOR_TOPIC]).await;

    channel.publish("/app/control", r#"{"mode":"AUTOTRACK"}"#).unwrap();
    until("SEND frame", || transport.sent_with(Command::Send).len() == 1).await;
    settle().await;

    let sends = transport.sent_with(Command::Send);
    assert_eq!(sends.len(), 1);
    assert_eq!(sends[0].header("destination"), Some("/app/control"));
    assert_eq!(sends[0].body, r#"{"mode":"AUTOTRACK"}"#);
}

#[tokio::test]
async fn test_publishes_keep_call_order_and_flush_waits() {
    let (channel, transport, _recorder) = connected_channel(&[SENSOR_TOPIC]).await;

    channel
        .send(OutboundCommand::new("/app/control", "first").with_header("priority", "high"))
        .unwrap();
    channel
        .publish_json("/app/plant-requirements", &serde_json::json!({"shading": 40}))
        .unwrap();
    channel.flush().await.unwrap();

    let sends = transport.sent_with(Command::Send);
    assert_eq!(sends.len(), 2);
    assert_eq!(sends[0].body, "first");
    assert_eq!(sends[0].header("priority"), Some("high"));
    assert_eq!(sends[1].header("destination"), Some("/app/plant-requirements"));
    assert_eq!(sends[1].header("content-type"), Some("application/json"));
    assert_eq!(sends[1].body, r#"{"shading":40}"#);
}

#[tokio::test]
async fn test_flush_while_disconnected_is_rejected() {
    let transport = ScriptedTransport::new();
    let channel =
        TelemetryChannel::activate(config(&[SENSOR_TOPIC]), transport, Recorder::default())
            .unwrap();
    assert!(matches!(
        channel.flush().await,
        Err(ChannelError::NotConnected(_))
    ));
}

#[tokio::test(start_paused = true)]
async fn test_deactivate_stops_delivery_and_retries() {
    let (channel, transport, recorder) = connected_channel(&[SENSOR_TOPIC]).await;
    transport.deliver(SENSOR_TOPIC, "before");
    until("first message", || recorder.bodies().len() == 1).await;

    channel.deactivate();
    assert_eq!(channel.status(), ChannelStatus::Idle);
    assert_eq!(recorder.statuses().last(), Some(&ChannelStatus::Idle));

    transport.deliver(SENSOR_TOPIC, "after");
    transport.close();
    settle().await;
    tokio::time::sleep(Duration::from_secs(60)).await;
    settle().await;

    assert_eq!(recorder.bodies(), vec!["before".to_string()]);
    assert_eq!(transport.connects(), 1);
    assert!(matches!(
        channel.publish("/app/control", "{}"),
        Err(ChannelError::NotConnected(ChannelStatus::Idle))
    ));

    channel.deactivate();
    assert_eq!(channel.status(), ChannelStatus::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_deactivate_while_connecting_discards_late_handshake() {
    let transport = ScriptedTransport::new();
    let recorder = Recorder::default();
    let channel =
        TelemetryChannel::activate(config(&[SENSOR_TOPIC]), transport.clone(), recorder.clone())
            .unwrap();
    until("CONNECT frame", || !transport.sent_with(Command::Connect).is_empty()).await;

    channel.deactivate();
    transport.accept();
    settle().await;

    assert_eq!(channel.status(), ChannelStatus::Idle);
    assert!(transport.sent_with(Command::Subscribe).is_empty());
    assert!(!recorder.statuses().contains(&ChannelStatus::Connected));
}

#[tokio::test(start_paused = true)]
async fn test_close_reconnects_after_fixed_delay() {
    let (channel, transport, _recorder) = connected_channel(&[SENSOR_TOPIC]).await;
    let delay = channel.config().reconnect.delay;

    for cycle in 1..=3 {
        transport.close();
        until("closed", || channel.status() == ChannelStatus::Closed).await;
        assert_eq!(channel.last_error().as_deref(), Some("WebSocket connection closed"));
        assert_eq!(transport.connects(), cycle);

        tokio::time::sleep(delay - Duration::from_millis(1)).await;
        settle().await;
        assert_eq!(transport.connects(), cycle, "reconnected before the delay");

        tokio::time::sleep(Duration::from_millis(2)).await;
        until("reconnect", || transport.connects() == cycle + 1).await;
        assert_eq!(channel.status(), ChannelStatus::Connecting);

        until("CONNECT frame", || {
            transport.sent_with(Command::Connect).len() == cycle + 1
        })
        .await;
        transport.accept();
        until("connected again", || channel.is_connected()).await;
        assert_eq!(channel.last_error(), None);
    }

    // one SUBSCRIBE per topic for every connection
    until("subscriptions", || transport.sent_with(Command::Subscribe).len() == 4).await;
}

#[tokio::test(start_paused = true)]
async fn test_refused_connection_reports_error_and_retries() {
    let transport = ScriptedTransport::new();
    transport.refuse_next(1);
    let channel =
        TelemetryChannel::activate(config(&[SENSOR_TOPIC]), transport.clone(), Recorder::default())
            .unwrap();

    until("error", || channel.status() == ChannelStatus::Error).await;
    assert_eq!(channel.last_error().as_deref(), Some("WebSocket connection error"));

    tokio::time::sleep(channel.config().reconnect.delay).await;
    until("second attempt", || transport.connects() == 2).await;
    // the error text stays visible while retrying
    assert_eq!(channel.status(), ChannelStatus::Connecting);
    assert_eq!(channel.last_error().as_deref(), Some("WebSocket connection error"));

    until("CONNECT frame", || !transport.sent_with(Command::Connect).is_empty()).await;
    transport.accept();
    until("connected", || channel.is_connected()).await;
    assert_eq!(channel.last_error(), None);
}

#[tokio::test(start_paused = true)]
async fn test_broker_error_frame_drops_connection() {
    let (channel, transport, _recorder) = connected_channel(&[SENSOR_TOPIC]).await;
    transport.push_frame(
        &Frame::new(Command::Error)
            .with_header("message", "Subscription rejected")
            .with_body("no such destination"),
    );
    until("error", || channel.status() == ChannelStatus::Error).await;
    assert_eq!(
        channel.last_error().as_deref(),
        Some("Broker reported error: Subscription rejected")
    );

    tokio::time::sleep(channel.config().reconnect.delay).await;
    until("reconnect", || transport.connects() == 2).await;
}

#[tokio::test(start_paused = true)]
async fn test_broker_error_during_handshake() {
    let transport = ScriptedTransport::new();
    let channel =
        TelemetryChannel::activate(config(&[SENSOR_TOPIC]), transport.clone(), Recorder::default())
            .unwrap();
    until("CONNECT frame", || !transport.sent_with(Command::Connect).is_empty()).await;
    transport.push_frame(&Frame::new(Command::Error).with_header("message", "Bad credentials"));
    until("error", || channel.status() == ChannelStatus::Error).await;
    assert_eq!(
        channel.last_error().as_deref(),
        Some("Broker reported error: Bad credentials")
    );
    assert!(transport.sent_with(Command::Subscribe).is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_read_failure_is_a_transport_error() {
    let (channel, transport, _recorder) = connected_channel(&[SENSOR_TOPIC]).await;
    transport.break_link();
    until("error", || channel.status() == ChannelStatus::Error).await;
    assert_eq!(channel.last_error().as_deref(), Some("WebSocket connection error"));
}

#[tokio::test(start_paused = true)]
async fn test_malformed_frame_is_a_protocol_error() {
    let (channel, transport, _recorder) = connected_channel(&[SENSOR_TOPIC]).await;
    transport.push("GIBBERISH\n\n\0");
    until("error", || channel.status() == ChannelStatus::Error).await;
    assert!(
        channel
            .last_error()
            .unwrap()
            .starts_with("Malformed broker frame")
    );
}

#[tokio::test(start_paused = true)]
async fn test_handshake_timeout() {
    let transport = ScriptedTransport::new();
    let config = config(&[SENSOR_TOPIC]).with_connect_timeout(Duration::from_secs(2));
    let channel = TelemetryChannel::activate(config, transport.clone(), Recorder::default()).unwrap();
    until("CONNECT frame", || !transport.sent_with(Command::Connect).is_empty()).await;

    tokio::time::sleep(Duration::from_millis(2001)).await;
    until("error", || channel.status() == ChannelStatus::Error).await;
    assert_eq!(channel.last_error().as_deref(), Some("Broker handshake timed out"));
}

#[tokio::test(start_paused = true)]
async fn test_max_retries_bounds_reconnects() {
    let transport = ScriptedTransport::new();
    transport.refuse_next(100);
    let policy = ReconnectPolicy::fixed(Duration::from_secs(1)).with_max_retries(2);
    let config = config(&[SENSOR_TOPIC]).with_reconnect(policy);
    let channel = TelemetryChannel::activate(config, transport.clone(), Recorder::default()).unwrap();

    for _ in 0..10 {
        tokio::time::sleep(Duration::from_secs(1)).await;
        settle().await;
    }
    assert_eq!(transport.connects(), 3);
    assert_eq!(channel.status(), ChannelStatus::Error);
}

#[tokio::test(start_paused = true)]
async fn test_heartbeats_are_written_and_silence_closes() {
    let transport = ScriptedTransport::new();
    let channel =
        TelemetryChannel::activate(config(&[SENSOR_TOPIC]), transport.clone(), Recorder::default())
            .unwrap();
    until("CONNECT frame", || !transport.sent_with(Command::Connect).is_empty()).await;
    transport.push_frame(
        &Frame::new(Command::Connected)
            .with_header("version", "1.2")
            .with_header("heart-beat", "1000,1000"),
    );
    until("connected", || channel.is_connected()).await;

    tokio::time::sleep(Duration::from_millis(4001)).await;
    settle().await;
    assert!(transport.heartbeats() >= 1);
    assert!(channel.is_connected());

    tokio::time::sleep(Duration::from_secs(5)).await;
    until("closed", || channel.status() == ChannelStatus::Closed).await;
}

#[tokio::test]
async fn test_panicking_listener_does_not_stop_delivery() {
    let (channel, transport, recorder) = connected_channel(&[SENSOR_TOPIC]).await;
    transport.deliver(SENSOR_TOPIC, "boom");
    transport.deliver(SENSOR_TOPIC, "still here");
    until("second message", || recorder.bodies().len() == 1).await;
    assert_eq!(recorder.bodies(), vec!["still here".to_string()]);
    assert!(channel.is_connected());
}

#[tokio::test]
async fn test_reconfigure_replaces_the_session() {
    let (mut channel, transport, recorder) = connected_channel(&[SENSOR_TOPIC]).await;
    let old_id = channel.id();

    channel
        .reconfigure(config(&[SENSOR_TOPIC, "/topic/emergency"]))
        .unwrap();
    assert_ne!(channel.id(), old_id);
    assert_eq!(channel.status(), ChannelStatus::Connecting);

    until("second connect", || transport.connects() == 2).await;
    until("CONNECT frame", || transport.sent_with(Command::Connect).len() == 2).await;
    transport.accept();
    until("connected", || channel.is_connected()).await;
    until("subscriptions", || transport.sent_with(Command::Subscribe).len() == 3).await;

    transport.deliver("/topic/emergency", "stop");
    until("message", || recorder.bodies().len() == 1).await;
    assert_eq!(recorder.bodies(), vec!["stop".to_string()]);
}

#[tokio::test]
async fn test_reconfigure_with_invalid_config_keeps_session() {
    let (mut channel, _transport, _recorder) = connected_channel(&[SENSOR_TOPIC]).await;
    assert!(channel.reconfigure(config(&[])).is_err());
    assert!(channel.is_connected());
}

#[tokio::test]
async fn test_wait_for_connected() {
    let transport = ScriptedTransport::new();
    let channel =
        TelemetryChannel::activate(config(&[SENSOR_TOPIC]), transport.clone(), Recorder::default())
            .unwrap();
    let accept = {
        let transport = transport.clone();
        tokio::spawn(async move {
            until("CONNECT frame", || !transport.sent_with(Command::Connect).is_empty()).await;
            transport.accept();
        })
    };
    let state = channel.wait_for(ChannelStatus::Connected).await;
    assert!(state.is_connected());
    assert_eq!(state.label(), "Connected");
    accept.await.unwrap();
}

#[tokio::test]
async fn test_end_to_end_sensor_and_control() {
    let transport = ScriptedTransport::new();
    let received: Arc<Mutex<Vec<InboundMessage>>> = Arc::default();
    let sink = received.clone();
    let channel = TelemetryChannel::activate(
        config(&[SENSOR_TOPIC]),
        transport.clone(),
        move |message: InboundMessage| sink.lock().unwrap().push(message),
    )
    .unwrap();

    until("CONNECT frame", || !transport.sent_with(Command::Connect).is_empty()).await;
    transport.accept();
    until("connected", || channel.is_connected()).await;

    let reading = r#"{"wind_speed": 12.5, "temperature": 21.0}"#;
    transport.deliver(SENSOR_TOPIC, reading);
    until("reading", || received.lock().unwrap().len() == 1).await;
    settle().await;
    {
        let received = received.lock().unwrap();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].destination, SENSOR_TOPIC);
        assert_eq!(received[0].body, reading);
        let value: serde_json::Value = received[0].json().unwrap();
        assert_eq!(value["wind_speed"], 12.5);
    }

    let command = r#"{"mode":"MANUAL","targetAngle":30,"emergencyStop":false}"#;
    channel.publish("/app/control", command).unwrap();
    channel.flush().await.unwrap();
    let sends = transport.sent_with(Command::Send);
    assert_eq!(sends.len(), 1);
    assert_eq!(sends[0].header("destination"), Some("/app/control"));
    assert_eq!(sends[0].body, command);
}
