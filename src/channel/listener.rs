use super::message::InboundMessage;
use super::publisher::Publisher;
use super::state::ChannelState;

/// Receives what a channel produces.
///
/// Calls are strictly sequential and arrive in transport order. They run on
/// the channel's task while it holds its delivery gate, so a listener must not
/// block for long and must not deactivate its own channel from inside a
/// callback.
pub trait ChannelListener: Send + Sync + 'static {
    fn on_message(&self, message: InboundMessage);

    /// Called after every status transition. `publisher` can be used to
    /// answer a fresh connection, e.g. with a snapshot request.
    fn on_status_change(&self, _state: &ChannelState, _publisher: &Publisher) {}
}

impl<F> ChannelListener for F
where
    F: Fn(InboundMessage) + Send + Sync + 'static,
{
    fn on_message(&self, message: InboundMessage) {
        self(message)
    }
}
