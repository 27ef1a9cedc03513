use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::stomp::Frame;

/// One message delivered from a subscribed topic. The body is handed over
/// untouched; decoding it is the listener's business.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub destination: String,
    pub subscription: Option<String>,
    pub message_id: Option<String>,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl InboundMessage {
    pub(crate) fn from_frame(frame: Frame) -> Self {
        let lookup = |name: &str| frame.header(name).map(str::to_string);
        Self {
            destination: lookup("destination").unwrap_or_default(),
            subscription: lookup("subscription"),
            message_id: lookup("message-id"),
            headers: frame.headers.clone(),
            body: frame.body,
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_str(&self.body)
    }
}

/// A command the caller wants written to a destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundCommand {
    pub destination: String,
    pub body: String,
    pub headers: Vec<(String, String)>,
}

impl OutboundCommand {
    pub fn new(destination: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            destination: destination.into(),
            body: body.into(),
            headers: Vec::new(),
        }
    }

    pub fn json<T: Serialize + ?Sized>(
        destination: impl Into<String>,
        value: &T,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self::new(destination, serde_json::to_string(value)?)
            .with_header("content-type", "application/json"))
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub(crate) fn to_frame(&self) -> Frame {
        Frame::send(&self.destination, &self.body, &self.headers)
    }
}
