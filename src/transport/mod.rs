//! The `transport` module carries broker frames between the channel and the
//! broker endpoint.
//!
//! A [`Transport`] opens a [`Link`]: a sink of outgoing text frames and a
//! stream of incoming ones. The channel never touches the socket directly,
//! which lets tests drive it with an in-memory link.

pub mod websocket;

#[cfg(test)]
pub(crate) mod scripted;


use std::pin::Pin;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::{Sink, Stream};
use url::Url;

use crate::utils::error::TransportError;

pub use websocket::WebSocketTransport;

pub type FrameSink = Pin<Box<dyn Sink<String, Error = TransportError> + Send>>;
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<String, TransportError>> + Send>>;

/// An open, bidirectional connection to the broker.
pub struct Link {
    pub sink: FrameSink,
    pub stream: FrameStream,
}

pub trait Transport: Send + Sync + 'static {
    /// Opens a new link to `endpoint`. Every call yields an independent link.
    fn connect(&self, endpoint: &Url) -> BoxFuture<'static, Result<Link, TransportError>>;
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn connect(&self, endpoint: &Url) -> BoxFuture<'static, Result<Link, TransportError>> {
        (**self).connect(endpoint)
    }
}
