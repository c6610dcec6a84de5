//! Core WebSocket infrastructure.
//!
//! This module provides a generic, self-healing connection manager that can be
//! specialized for any endpoint by choosing a message type and a decoder.
//!
//! # Architecture
//!
//! - [`ConnectionManager`]: Owns one endpoint's transport, reconnect timer and handlers
//! - [`MessageDecoder`]: Trait for decoding incoming text frames
//! - [`Connector`] / [`Transport`]: Seam over the underlying WebSocket implementation
//! - [`Scheduler`]: Seam over the timer used for reconnects
//!
//! # Example
//!
//! ```ignore
//! let connection: ConnectionManager<MyMessage> =
//!     ConnectionManager::new(endpoint, Config::default(), JsonDecoder::new())?;
//! let subscription = connection.subscribe(|payload: &Payload<MyMessage>| { /* ... */ });
//! connection.connect();
//! ```

pub mod config;
pub mod connection;
pub mod error;
pub mod handler;
#[cfg(test)]
pub(crate) mod testing;
pub mod timer;
pub mod traits;
pub mod transport;

pub use connection::{ConnectionManager, ConnectionState, Payload};
#[expect(
    clippy::module_name_repetitions,
    reason = "WsError includes module name for clarity when used outside this module"
)]
pub use error::WsError;
pub use handler::{ErrorHandler, Handler, LifecycleHandler, MessageHandler, Subscription};
pub use timer::TokioScheduler;
pub use traits::*;
pub use transport::WsConnector;
