//! In-memory transport used by the channel tests.
//!
//! Every link records what the channel writes and reads whatever the test
//! pushes. Closing the peer ends the current link's stream.

use std::sync::{Arc, Mutex, MutexGuard};

use futures::channel::mpsc::{self, UnboundedSender};
use futures::future::BoxFuture;
use futures::{StreamExt, sink};
use url::Url;

use super::{Link, Transport};
use crate::stomp::{Command, Frame};
use crate::utils::error::TransportError;

#[derive(Default)]
struct Script {
    connects: usize,
    refuse: usize,
    sent: Vec<String>,
    peer: Option<UnboundedSender<Result<String, TransportError>>>,
}

#[derive(Clone, Default)]
pub(crate) struct ScriptedTransport {
    script: Arc<Mutex<Script>>,
}

impl ScriptedTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn script(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap()
    }

    /// Makes the next `count` connection attempts fail.
    pub(crate) fn refuse_next(&self, count: usize) {
        self.script().refuse = count;
    }

    pub(crate) fn connects(&self) -> usize {
        self.script().connects
    }

    /// Every frame the channel wrote, heart-beats excluded.
    pub(crate) fn sent_frames(&self) -> Vec<Frame> {
        self.script()
            .sent
            .iter()
            .filter_map(|text| Frame::decode(text).expect("channel wrote a bad frame"))
            .collect()
    }

    pub(crate) fn heartbeats(&self) -> usize {
        self.script()
            .sent
            .iter()
            .filter(|text| matches!(Frame::decode(text), Ok(None)))
            .count()
    }

    pub(crate) fn sent_with(&self, command: Command) -> Vec<Frame> {
        self.sent_frames()
            .into_iter()
            .filter(|frame| frame.command == command)
            .collect()
    }

    /// Pushes raw text to the channel. Returns `false` when no link is open.
    pub(crate) fn push(&self, text: impl Into<String>) -> bool {
        match self.script().peer.as_ref() {
            Some(peer) => peer.unbounded_send(Ok(text.into())).is_ok(),
            None => false,
        }
    }

    pub(crate) fn push_frame(&self, frame: &Frame) -> bool {
        self.push(frame.encode())
    }

    /// Answers the pending CONNECT with a CONNECTED frame, heart-beats off.
    pub(crate) fn accept(&self) -> bool {
        self.push_frame(
            &Frame::new(Command::Connected)
                .with_header("version", "1.2")
                .with_header("heart-beat", "0,0"),
        )
    }

    pub(crate) fn deliver(&self, destination: &str, body: &str) -> bool {
        self.push_frame(
            &Frame::new(Command::Message)
                .with_header("destination", destination)
                .with_header("subscription", "sub-0")
                .with_header("message-id", uuid::Uuid::new_v4().to_string())
                .with_body(body),
        )
    }

    /// Ends the current link from the broker side.
    pub(crate) fn close(&self) {
        self.script().peer = None;
    }

    /// Fails the current link with a transport-level read error.
    pub(crate) fn break_link(&self) {
        let peer = self.script().peer.take();
        if let Some(peer) = peer {
            let _ = peer.unbounded_send(Err(TransportError::Closed));
        }
    }
}

impl Transport for ScriptedTransport {
    fn connect(&self, _endpoint: &Url) -> BoxFuture<'static, Result<Link, TransportError>> {
        let mut script = self.script();
        script.connects += 1;
        if script.refuse > 0 {
            script.refuse -= 1;
            let refused = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
            return Box::pin(futures::future::ready(Err(TransportError::Io(refused))));
        }

        let (peer, inbound) = mpsc::unbounded();
        script.peer = Some(peer);

        let record = self.script.clone();
        let sink = sink::unfold(record, |record, text: String| async move {
            record.lock().unwrap().sent.push(text);
            Ok::<_, TransportError>(record)
        });

        let link = Link {
            sink: Box::pin(sink),
            stream: inbound.boxed(),
        };
        Box::pin(futures::future::ready(Ok(link)))
    }
}
