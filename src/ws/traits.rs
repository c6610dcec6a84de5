//! Core traits for generic WebSocket infrastructure.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use url::Url;

use super::error::WsError;

/// Decode strategy for turning an inbound text frame into a typed message.
///
/// A frame that fails to decode is not an error for subscribers: the manager
/// delivers it as [`Payload::Raw`](super::Payload::Raw) instead.
///
/// # Example
///
/// ```ignore
/// pub struct UpperCase;
///
/// impl MessageDecoder<String> for UpperCase {
///     fn decode(&self, text: &str) -> crate::Result<String> {
///         Ok(text.to_uppercase())
///     }
/// }
/// ```
pub trait MessageDecoder<M>: Send + Sync + 'static {
    /// Decode a single text frame.
    fn decode(&self, text: &str) -> crate::Result<M>;
}

/// Decodes frames as JSON into `M`.
pub struct JsonDecoder<M> {
    _phantom: PhantomData<fn() -> M>,
}

impl<M> JsonDecoder<M> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            _phantom: PhantomData,
        }
    }
}

impl<M> Default for JsonDecoder<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M> Clone for JsonDecoder<M> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<M> fmt::Debug for JsonDecoder<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("JsonDecoder")
    }
}

impl<M: DeserializeOwned + 'static> MessageDecoder<M> for JsonDecoder<M> {
    fn decode(&self, text: &str) -> crate::Result<M> {
        Ok(serde_json::from_str(text)?)
    }
}

/// Receives the lifecycle events of one transport.
///
/// A transport reports `on_open` at most once, any number of `on_message` calls
/// while open, and exactly one `on_close` at the end of its life. `on_error` may
/// precede `on_close` but never replaces it.
pub trait TransportListener: Send + Sync + 'static {
    fn on_open(&self);
    fn on_message(&self, text: String);
    fn on_error(&self, error: &WsError);
    fn on_close(&self);
}

/// Handle to one message-oriented, full-duplex connection.
pub trait Transport: Send + Sync + 'static {
    /// Whether the connection is open for sending.
    fn is_open(&self) -> bool;

    /// Queue a text frame for transmission.
    fn send(&self, text: String) -> Result<(), WsError>;

    /// Start closing the connection. The close is reported through
    /// [`TransportListener::on_close`].
    fn close(&self);
}

/// Opens transports.
///
/// Implementations must not call into `listener` before `open` returns; all events
/// are reported from a later scheduling turn.
pub trait Connector: Send + Sync + 'static {
    fn open(&self, endpoint: &Url, listener: Arc<dyn TransportListener>) -> Box<dyn Transport>;
}

/// A callback registered with a [`Scheduler`].
pub type ScheduledCallback = Box<dyn FnOnce() + Send + 'static>;

/// Schedule-after-delay capability used for reconnection timers.
///
/// Implementations must run `callback` from a later scheduling turn, never from
/// inside `schedule` itself.
pub trait Scheduler: Send + Sync + 'static {
    fn schedule(&self, delay: Duration, callback: ScheduledCallback) -> Box<dyn ScheduledTask>;
}

/// Handle to a callback registered with a [`Scheduler`].
pub trait ScheduledTask: Send + Sync + 'static {
    /// Prevent the callback from running if it has not started yet.
    fn cancel(&self);
}
