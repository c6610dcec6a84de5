//! Live view of todo changes pushed by the server.
//!
//! Connects the created, updated and deleted channels, keeps a local map of todos
//! up to date from the notifications, and logs connectivity changes for two minutes.
//!
//! Run against a local server:
//! ```sh
//! TODO_WS_BASE_URL=ws://localhost:8080 RUST_LOG=info cargo run --example realtime_todos
//! ```

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use todo_realtime::todos::{Category, Channels, Todo, TodoDeleted};
use todo_realtime::ws::Payload;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

type Todos = Arc<Mutex<BTreeMap<i64, Todo>>>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let channels = Channels::from_env()?;
    let todos: Todos = Arc::default();

    let subscriptions = vec![
        channels.created().subscribe({
            let todos = Arc::clone(&todos);
            move |payload: &Payload<Todo>| match payload {
                Payload::Decoded(todo) => {
                    info!(category = %Category::Created, id = todo.id, title = %todo.title);
                    todos
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .insert(todo.id, todo.clone());
                }
                other => warn!(category = %Category::Created, payload = ?other, "Unexpected payload"),
            }
        }),
        channels.updated().subscribe({
            let todos = Arc::clone(&todos);
            move |payload: &Payload<Todo>| {
                if let Some(todo) = payload.decoded() {
                    let mut todos = todos.lock().unwrap_or_else(PoisonError::into_inner);
                    // Only track updates for todos this view already knows about.
                    if let Some(existing) = todos.get_mut(&todo.id) {
                        info!(category = %Category::Updated, id = todo.id, completed = todo.completed);
                        *existing = todo.clone();
                    }
                }
            }
        }),
        channels.deleted().subscribe({
            let todos = Arc::clone(&todos);
            move |payload: &Payload<TodoDeleted>| {
                if let Some(event) = payload.decoded() {
                    info!(category = %Category::Deleted, id = event.id);
                    todos
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .remove(&event.id);
                }
            }
        }),
        channels
            .created()
            .on_disconnect(|| warn!("Realtime updates paused, reconnecting")),
        channels
            .created()
            .on_connect(|| info!("Realtime updates active")),
    ];

    channels.connect_all();

    tokio::time::sleep(Duration::from_secs(120)).await;

    for subscription in &subscriptions {
        subscription.unsubscribe();
    }
    channels.disconnect_all();

    let todos = todos.lock().unwrap_or_else(PoisonError::into_inner);
    info!(tracked = todos.len(), "Shutting down");

    Ok(())
}
