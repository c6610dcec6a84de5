use std::sync::Arc;

use url::Url;

use super::types::{Category, Todo, TodoDeleted};
use crate::Result;
use crate::ws::config::Config;
use crate::ws::{
    Connector, ConnectionManager, JsonDecoder, Scheduler, TokioScheduler, WsConnector,
};

/// Environment variable holding the WebSocket base address.
pub const BASE_URL_VAR: &str = "TODO_WS_BASE_URL";

/// Base address used when [`BASE_URL_VAR`] is unset.
pub const DEFAULT_BASE_URL: &str = "ws://localhost:8080";

/// One connection manager per todo event category.
///
/// Build it once at startup and hand clones to whatever needs real-time updates;
/// clones share the same underlying connections and handlers.
///
/// # Example
///
/// ```rust, no_run
/// use todo_realtime::todos::Channels;
/// use todo_realtime::ws::Payload;
/// use todo_realtime::todos::Todo;
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let channels = Channels::from_env()?;
///
///     let subscription = channels.created().subscribe(|payload: &Payload<Todo>| {
///         if let Some(todo) = payload.decoded() {
///             println!("created: {}", todo.title);
///         }
///     });
///     channels.connect_all();
///
///     // Later...
///     subscription.unsubscribe();
///     channels.disconnect_all();
///     Ok(())
/// }
/// ```
#[derive(Clone, Debug)]
pub struct Channels {
    created: ConnectionManager<Todo>,
    updated: ConnectionManager<Todo>,
    deleted: ConnectionManager<TodoDeleted>,
}

impl Channels {
    /// Build channels against the base address in [`BASE_URL_VAR`], falling back to
    /// [`DEFAULT_BASE_URL`].
    pub fn from_env() -> Result<Self> {
        let base = std::env::var(BASE_URL_VAR).unwrap_or_else(|_| DEFAULT_BASE_URL.to_owned());
        Self::new(&base, Config::default())
    }

    /// Build channels against `base` using `tokio-tungstenite` and the Tokio timer.
    pub fn new(base: &str, config: Config) -> Result<Self> {
        Self::with_parts(
            base,
            config,
            Arc::new(WsConnector),
            Arc::new(TokioScheduler),
        )
    }

    /// Build channels on top of a custom transport and timer.
    pub fn with_parts(
        base: &str,
        config: Config,
        connector: Arc<dyn Connector>,
        scheduler: Arc<dyn Scheduler>,
    ) -> Result<Self> {
        let endpoint_of = |category: Category| -> Result<String> {
            Ok(Self::endpoint(base, category)?.to_string())
        };

        Ok(Self {
            created: ConnectionManager::with_parts(
                &endpoint_of(Category::Created)?,
                config.clone(),
                JsonDecoder::new(),
                Arc::clone(&connector),
                Arc::clone(&scheduler),
            )?,
            updated: ConnectionManager::with_parts(
                &endpoint_of(Category::Updated)?,
                config.clone(),
                JsonDecoder::new(),
                Arc::clone(&connector),
                Arc::clone(&scheduler),
            )?,
            deleted: ConnectionManager::with_parts(
                &endpoint_of(Category::Deleted)?,
                config,
                JsonDecoder::new(),
                connector,
                scheduler,
            )?,
        })
    }

    /// Address of `category`'s endpoint under `base`.
    pub fn endpoint(base: &str, category: Category) -> Result<Url> {
        Ok(Url::parse(base)?.join(category.path())?)
    }

    /// Manager for [`Category::Created`].
    #[must_use]
    pub fn created(&self) -> &ConnectionManager<Todo> {
        &self.created
    }

    /// Manager for [`Category::Updated`].
    #[must_use]
    pub fn updated(&self) -> &ConnectionManager<Todo> {
        &self.updated
    }

    /// Manager for [`Category::Deleted`].
    #[must_use]
    pub fn deleted(&self) -> &ConnectionManager<TodoDeleted> {
        &self.deleted
    }

    /// Connect every category.
    pub fn connect_all(&self) {
        self.created.connect();
        self.updated.connect();
        self.deleted.connect();
    }

    /// Disconnect every category and stop their reconnect loops.
    pub fn disconnect_all(&self) {
        self.created.disconnect();
        self.updated.disconnect();
        self.deleted.disconnect();
    }

    /// Whether `category`'s transport is open.
    #[must_use]
    pub fn is_connected(&self, category: Category) -> bool {
        match category {
            Category::Created => self.created.is_connected(),
            Category::Updated => self.updated.is_connected(),
            Category::Deleted => self.deleted.is_connected(),
        }
    }
}
