//! Web-socket transport
//!
//! Opens a tokio-tungstenite client connection and adapts it to the text
//! frame [`Link`] the channel expects:
//! - `http://` and `https://` endpoints are mapped to `ws://` and `wss://`,
//!   so the dashboard's `http://host:port/ws` address can be used as is
//! - binary messages are decoded as UTF-8
//! - ping, pong and close control messages are handled by tungstenite and
//!   never reach the channel

use futures::future::{self, BoxFuture};
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::connect_async;
use tracing::debug;
use tungstenite::protocol::Message as WsMessage;
use url::Url;

use super::{Link, Transport};
use crate::utils::error::TransportError;

#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketTransport;

impl WebSocketTransport {
    pub fn new() -> Self {
        Self
    }
}

/// Maps an endpoint onto the web-socket scheme tungstenite can dial.
pub fn websocket_url(endpoint: &Url) -> Result<Url, TransportError> {
    let scheme = match endpoint.scheme() {
        "ws" | "wss" => return Ok(endpoint.clone()),
        "http" => "ws",
        "https" => "wss",
        other => return Err(TransportError::UnsupportedScheme(other.to_string())),
    };
    let mut url = endpoint.clone();
    url.set_scheme(scheme)
        .map_err(|_| TransportError::UnsupportedScheme(endpoint.scheme().to_string()))?;
    Ok(url)
}

impl Transport for WebSocketTransport {
    fn connect(&self, endpoint: &Url) -> BoxFuture<'static, Result<Link, TransportError>> {
        let target = websocket_url(endpoint);

        Box::pin(async move {
            let target = target?;
            debug!(url = %target, "opening web-socket");
            let (ws_stream, _response) = connect_async(target.as_str()).await?;
            let (ws_sender, ws_receiver) = ws_stream.split();

            let sink = ws_sender
                .sink_map_err(TransportError::from)
                .with(|text: String| {
                    future::ready(Ok::<_, TransportError>(WsMessage::Text(text.into())))
                });

            let stream = ws_receiver.filter_map(|msg| {
                future::ready(match msg {
                    Ok(WsMessage::Text(text)) => Some(Ok(text.as_str().to_owned())),
                    Ok(WsMessage::Binary(data)) => {
                        Some(String::from_utf8(data.to_vec()).map_err(|_| TransportError::InvalidUtf8))
                    }
                    Ok(_) => None,
                    Err(e) => Some(Err(TransportError::from(e))),
                })
            });

            Ok(Link {
                sink: Box::pin(sink),
                stream: Box::pin(stream),
            })
        })
    }
}
