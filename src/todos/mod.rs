//! Real-time todo notifications.
//!
//! The server broadcasts every todo change on one of three WebSocket endpoints,
//! one per [`Category`]. [`Channels`] builds a [`ConnectionManager`](crate::ws::ConnectionManager)
//! for each of them, typed to the payload that endpoint carries:
//!
//! - **created** and **updated**: a full [`Todo`]
//! - **deleted**: a [`TodoDeleted`] carrying only the id
//!
//! Notifications arrive for changes made by any client, including ones this process
//! did not initiate.
//!
//! # Example
//!
//! ```rust, no_run
//! use todo_realtime::todos::{Channels, TodoDeleted};
//! use todo_realtime::ws::Payload;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let channels = Channels::from_env()?;
//!
//!     let _deleted = channels.deleted().subscribe(|payload: &Payload<TodoDeleted>| {
//!         if let Some(event) = payload.decoded() {
//!             println!("todo {} was deleted", event.id);
//!         }
//!     });
//!     channels.connect_all();
//!
//!     tokio::time::sleep(std::time::Duration::from_secs(60)).await;
//!     channels.disconnect_all();
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod types;

pub use client::{BASE_URL_VAR, Channels, DEFAULT_BASE_URL};
pub use types::{Category, Todo, TodoDeleted};
