#![expect(
    clippy::module_name_repetitions,
    reason = "Connection types expose their domain in the name for clarity"
)]

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::{Duration, Instant};

use backoff::backoff::{Backoff as _, Constant};
use serde::Serialize;
use tokio::sync::watch;
use url::Url;

use super::config::Config;
use super::error::WsError;
use super::handler::{ErrorHandler, LifecycleHandler, MessageHandler, Registry, Subscription};
use super::timer::TokioScheduler;
use super::traits::{
    Connector, JsonDecoder, MessageDecoder, ScheduledTask, Scheduler, Transport,
    TransportListener,
};
use super::transport::WsConnector;
use crate::Result;

/// Connection state tracking.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Not connected, and no reconnect is pending
    Disconnected,
    /// A transport has been requested and has not opened yet
    Connecting,
    /// Successfully connected
    Connected {
        /// When the connection was established
        since: Instant,
    },
    /// Waiting for the reconnect timer after an unexpected close
    Reconnecting {
        /// Consecutive reconnect attempts since the last successful open
        attempt: u32,
    },
}

impl ConnectionState {
    /// Check if the connection is currently active.
    #[must_use]
    pub const fn is_connected(self) -> bool {
        matches!(self, Self::Connected { .. })
    }
}

/// An inbound message as delivered to subscribers.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq)]
pub enum Payload<M> {
    /// The frame decoded into the manager's message type
    Decoded(M),
    /// The frame could not be decoded and is passed through untouched
    Raw(String),
}

impl<M> Payload<M> {
    /// The decoded message, if decoding succeeded.
    #[must_use]
    pub const fn decoded(&self) -> Option<&M> {
        match self {
            Self::Decoded(message) => Some(message),
            Self::Raw(_) => None,
        }
    }

    /// The raw frame text, if decoding failed.
    #[must_use]
    pub fn raw(&self) -> Option<&str> {
        match self {
            Self::Decoded(_) => None,
            Self::Raw(text) => Some(text),
        }
    }
}

type MessageFn<M> = dyn Fn(&Payload<M>) + Send + Sync;
type LifecycleFn = dyn Fn() + Send + Sync;
type ErrorFn = dyn Fn(&WsError) + Send + Sync;

/// Transport and timer bookkeeping, guarded by one lock.
///
/// The published [`ConnectionState`] is only written while this lock is held.
struct Link {
    /// Live transport and the generation it was opened under
    transport: Option<(u64, Box<dyn Transport>)>,
    /// Pending reconnect timer and its id
    reconnect: Option<(u64, Box<dyn ScheduledTask>)>,
    /// Cleared by `disconnect`, set by `connect`
    auto_reconnect: bool,
    generation: u64,
    timer_seq: u64,
    attempt: u32,
    backoff: Constant,
}

struct Inner<M, D> {
    endpoint: Url,
    category: String,
    decoder: D,
    connector: Arc<dyn Connector>,
    scheduler: Arc<dyn Scheduler>,
    link: Mutex<Link>,
    state_tx: watch::Sender<ConnectionState>,
    message_handlers: Arc<Registry<MessageFn<M>>>,
    connect_handlers: Arc<Registry<LifecycleFn>>,
    disconnect_handlers: Arc<Registry<LifecycleFn>>,
    error_handlers: Arc<Registry<ErrorFn>>,
}

/// Manages one WebSocket endpoint: its transport, its reconnect timer and the
/// handlers subscribed to it.
///
/// The manager never returns errors from its runtime operations. Failures are
/// observed through [`on_disconnect`](Self::on_disconnect),
/// [`on_error`](Self::on_error) and the log.
///
/// After a transport closes unexpectedly, a single reconnect is scheduled after the
/// configured fixed delay. [`disconnect`](Self::disconnect) cancels that loop until
/// [`connect`](Self::connect) is called again.
///
/// # Type Parameters
///
/// - `M`: Message type carried by this endpoint
/// - `D`: Decoder implementing [`MessageDecoder<M>`], JSON by default
///
/// # Example
///
/// ```ignore
/// let manager: ConnectionManager<serde_json::Value> =
///     ConnectionManager::new("ws://localhost:8080/ws/todos/created", Config::default(), JsonDecoder::new())?;
///
/// let subscription = manager.subscribe(|payload: &Payload<serde_json::Value>| {
///     println!("Received: {payload:?}");
/// });
/// manager.connect();
/// // Later...
/// subscription.unsubscribe();
/// manager.disconnect();
/// ```
pub struct ConnectionManager<M, D = JsonDecoder<M>> {
    inner: Arc<Inner<M, D>>,
}

impl<M, D> Clone for ConnectionManager<M, D> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<M, D> fmt::Debug for ConnectionManager<M, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("endpoint", &self.inner.endpoint.as_str())
            .field("category", &self.inner.category)
            .field("state", &*self.inner.state_tx.borrow())
            .finish_non_exhaustive()
    }
}

impl<M, D> ConnectionManager<M, D>
where
    M: 'static,
    D: MessageDecoder<M>,
{
    /// Create a manager that connects with `tokio-tungstenite` and schedules
    /// reconnects on the Tokio timer.
    ///
    /// Nothing is opened until [`connect`](Self::connect) is called, which must
    /// happen inside a Tokio runtime.
    pub fn new(endpoint: &str, config: Config, decoder: D) -> Result<Self> {
        Self::with_parts(
            endpoint,
            config,
            decoder,
            Arc::new(WsConnector),
            Arc::new(TokioScheduler),
        )
    }

    /// Create a manager on top of a custom transport and timer.
    pub fn with_parts(
        endpoint: &str,
        config: Config,
        decoder: D,
        connector: Arc<dyn Connector>,
        scheduler: Arc<dyn Scheduler>,
    ) -> Result<Self> {
        let endpoint = Url::parse(endpoint)?;
        if !matches!(endpoint.scheme(), "ws" | "wss") {
            return Err(WsError::InvalidEndpoint(endpoint.to_string()).into());
        }

        let category = endpoint
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .filter(|segment| !segment.is_empty())
            .unwrap_or("unknown")
            .to_owned();

        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);

        Ok(Self {
            inner: Arc::new(Inner {
                endpoint,
                category,
                decoder,
                connector,
                scheduler,
                link: Mutex::new(Link {
                    transport: None,
                    reconnect: None,
                    auto_reconnect: false,
                    generation: 0,
                    timer_seq: 0,
                    attempt: 0,
                    backoff: config.reconnect.into(),
                }),
                state_tx,
                message_handlers: Registry::new(),
                connect_handlers: Registry::new(),
                disconnect_handlers: Registry::new(),
                error_handlers: Registry::new(),
            }),
        })
    }

    /// Open a transport unless one already exists.
    ///
    /// Returns immediately; the outcome is reported to the connect or disconnect
    /// handlers. A pending reconnect timer is cancelled since this call supersedes it.
    pub fn connect(&self) {
        let mut link = self.link();
        link.auto_reconnect = true;

        if link.transport.is_some() {
            return;
        }

        if let Some((_, timer)) = link.reconnect.take() {
            timer.cancel();
            link.attempt = 0;
            link.backoff.reset();
        }

        link.generation += 1;
        let generation = link.generation;

        _ = self.inner.state_tx.send_replace(ConnectionState::Connecting);

        let listener = Arc::new(Listener {
            inner: Arc::downgrade(&self.inner),
            generation,
        });
        let transport = self.inner.connector.open(&self.inner.endpoint, listener);
        link.transport = Some((generation, transport));
    }

    /// Cancel any pending reconnect and close the transport.
    ///
    /// Disconnect handlers still run once the transport reports its close, but no
    /// reconnect follows until [`connect`](Self::connect) is called again.
    pub fn disconnect(&self) {
        let (timer, transport) = {
            let mut link = self.link();
            link.auto_reconnect = false;
            link.attempt = 0;
            link.backoff.reset();
            _ = self
                .inner
                .state_tx
                .send_replace(ConnectionState::Disconnected);
            (link.reconnect.take(), link.transport.take())
        };

        if let Some((_, timer)) = timer {
            timer.cancel();
        }
        if let Some((_, transport)) = transport {
            transport.close();
        }
    }

    /// Send `data` as compact JSON if the transport is open.
    ///
    /// Every value is encoded, so a string or a unit enum variant goes out as a JSON
    /// string literal. Use [`send_text`](Self::send_text) for text that must be
    /// transmitted as it is. While disconnected the message is dropped, see
    /// [`send_text`](Self::send_text).
    pub fn send<T: Serialize + ?Sized>(&self, data: &T) {
        let text = match serde_json::to_string(data) {
            Ok(text) => text,
            Err(e) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(category = %self.inner.category, error = %e, "Unable to serialize outbound message");
                #[cfg(not(feature = "tracing"))]
                let _ = &e;
                return;
            }
        };

        self.send_text(text);
    }

    /// Send a text frame verbatim if the transport is open.
    ///
    /// While disconnected the frame is dropped: a warning is logged and error
    /// handlers receive [`WsError::NotConnected`]. Nothing is queued or retried.
    pub fn send_text<S: Into<String>>(&self, text: S) {
        let outcome = {
            let link = self.link();
            match &link.transport {
                Some((_, transport)) if transport.is_open() => transport.send(text.into()),
                _ => Err(WsError::NotConnected),
            }
        };

        let Err(error) = outcome else {
            return;
        };

        #[cfg(feature = "tracing")]
        {
            if matches!(error, WsError::NotConnected) {
                tracing::warn!(
                    category = %self.inner.category,
                    "WebSocket is not connected. Cannot send message."
                );
            } else {
                tracing::warn!(category = %self.inner.category, %error, "Failed to send WebSocket message");
            }
        }

        self.inner
            .error_handlers
            .dispatch(&self.inner.category, |handler| handler(&error));
    }

    /// Register a handler for inbound messages.
    pub fn subscribe<H: Into<MessageHandler<M>>>(&self, handler: H) -> Subscription {
        self.inner.message_handlers.insert(&handler.into())
    }

    /// Register a handler called each time a transport opens.
    pub fn on_connect<H: Into<LifecycleHandler>>(&self, handler: H) -> Subscription {
        self.inner.connect_handlers.insert(&handler.into())
    }

    /// Register a handler called each time a transport closes.
    pub fn on_disconnect<H: Into<LifecycleHandler>>(&self, handler: H) -> Subscription {
        self.inner.disconnect_handlers.insert(&handler.into())
    }

    /// Register a handler for transport-level errors.
    ///
    /// Errors are informational; every error is followed by a close, which is what
    /// drives reconnection.
    pub fn on_error<H: Into<ErrorHandler>>(&self, handler: H) -> Subscription {
        self.inner.error_handlers.insert(&handler.into())
    }

    /// Whether the transport is currently open.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.link()
            .transport
            .as_ref()
            .is_some_and(|(_, transport)| transport.is_open())
    }

    /// Whether a reconnect timer is pending.
    #[must_use]
    pub fn is_reconnect_pending(&self) -> bool {
        self.link().reconnect.is_some()
    }

    /// Get the current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.inner.state_tx.borrow()
    }

    /// Subscribe to connection state changes.
    #[must_use]
    pub fn state_receiver(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state_tx.subscribe()
    }

    /// The endpoint this manager connects to.
    #[must_use]
    pub fn endpoint(&self) -> &Url {
        &self.inner.endpoint
    }

    /// Label taken from the last segment of the endpoint path.
    #[must_use]
    pub fn category(&self) -> &str {
        &self.inner.category
    }

    /// Number of registered message handlers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner.message_handlers.len()
    }

    fn link(&self) -> MutexGuard<'_, Link> {
        self.inner.link.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether `generation` still owns the live transport.
    fn is_current(&self, generation: u64) -> bool {
        self.link()
            .transport
            .as_ref()
            .is_some_and(|(g, _)| *g == generation)
    }

    fn handle_open(&self, generation: u64) {
        {
            let mut link = self.link();
            if !link.transport.as_ref().is_some_and(|(g, _)| *g == generation) {
                return;
            }
            link.attempt = 0;
            link.backoff.reset();
            _ = self.inner.state_tx.send_replace(ConnectionState::Connected {
                since: Instant::now(),
            });
        }

        if !self.is_current(generation) {
            return;
        }

        #[cfg(feature = "tracing")]
        tracing::info!(category = %self.inner.category, "WebSocket connected");

        self.inner
            .connect_handlers
            .dispatch(&self.inner.category, |handler| handler());
    }

    fn handle_message(&self, generation: u64, text: String) {
        if !self.is_current(generation) {
            return;
        }

        let payload = match self.inner.decoder.decode(&text) {
            Ok(message) => Payload::Decoded(message),
            Err(e) => {
                #[cfg(feature = "tracing")]
                tracing::trace!(category = %self.inner.category, %text, error = %e, "Delivering undecodable frame as raw text");
                #[cfg(not(feature = "tracing"))]
                let _ = &e;
                Payload::Raw(text)
            }
        };

        self.inner
            .message_handlers
            .dispatch(&self.inner.category, |handler| handler(&payload));
    }

    fn handle_error(&self, error: &WsError) {
        #[cfg(feature = "tracing")]
        tracing::error!(category = %self.inner.category, %error, "WebSocket error");

        self.inner
            .error_handlers
            .dispatch(&self.inner.category, |handler| handler(error));
    }

    fn handle_close(&self, generation: u64) {
        let unexpected = {
            let mut link = self.link();
            match link.transport.as_ref().map(|(g, _)| *g) {
                Some(current) if current == generation => {
                    link.transport = None;
                    _ = self
                        .inner
                        .state_tx
                        .send_replace(ConnectionState::Disconnected);
                    true
                }
                // A newer transport is already live; this close belongs to a superseded one.
                Some(_) => return,
                None => false,
            }
        };

        #[cfg(feature = "tracing")]
        tracing::info!(category = %self.inner.category, "WebSocket disconnected");

        self.inner
            .disconnect_handlers
            .dispatch(&self.inner.category, |handler| handler());

        if unexpected {
            self.schedule_reconnect();
        }
    }

    fn schedule_reconnect(&self) {
        let mut link = self.link();
        if !link.auto_reconnect || link.transport.is_some() || link.reconnect.is_some() {
            return;
        }

        let delay = link.backoff.next_backoff().unwrap_or(Duration::ZERO);
        link.timer_seq += 1;
        let id = link.timer_seq;
        link.attempt = link.attempt.saturating_add(1);
        let attempt = link.attempt;

        let weak = Arc::downgrade(&self.inner);
        let timer = self.inner.scheduler.schedule(
            delay,
            Box::new(move || {
                if let Some(inner) = weak.upgrade() {
                    ConnectionManager { inner }.fire_reconnect(id);
                }
            }),
        );
        link.reconnect = Some((id, timer));

        _ = self
            .inner
            .state_tx
            .send_replace(ConnectionState::Reconnecting { attempt });
    }

    fn fire_reconnect(&self, id: u64) {
        {
            let mut link = self.link();
            if !link.reconnect.as_ref().is_some_and(|(i, _)| *i == id) {
                return;
            }
            link.reconnect = None;
        }

        #[cfg(feature = "tracing")]
        tracing::info!(category = %self.inner.category, "Attempting to reconnect WebSocket...");

        self.connect();
    }
}

/// Routes one transport's events back to its manager.
///
/// Holds only a weak reference so a dropped manager is not kept alive by a
/// lingering transport task.
struct Listener<M, D> {
    inner: Weak<Inner<M, D>>,
    generation: u64,
}

impl<M, D> Listener<M, D> {
    fn manager(&self) -> Option<ConnectionManager<M, D>> {
        self.inner.upgrade().map(|inner| ConnectionManager { inner })
    }
}

impl<M, D> TransportListener for Listener<M, D>
where
    M: 'static,
    D: MessageDecoder<M>,
{
    fn on_open(&self) {
        if let Some(manager) = self.manager() {
            manager.handle_open(self.generation);
        }
    }

    fn on_message(&self, text: String) {
        if let Some(manager) = self.manager() {
            manager.handle_message(self.generation, text);
        }
    }

    fn on_error(&self, error: &WsError) {
        if let Some(manager) = self.manager() {
            manager.handle_error(error);
        }
    }

    fn on_close(&self) {
        if let Some(manager) = self.manager() {
            manager.handle_close(self.generation);
        }
    }
}
