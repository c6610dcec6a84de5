use bon::Builder;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Server-side event kinds for todos. Each one has its own WebSocket endpoint.
#[non_exhaustive]
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum_macros::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Category {
    /// A todo was created
    Created,
    /// A todo was updated
    Updated,
    /// A todo was deleted
    Deleted,
}

impl Category {
    /// Every category, in the order channels are built.
    pub const ALL: [Self; 3] = [Self::Created, Self::Updated, Self::Deleted];

    /// Endpoint path, joined onto the base address.
    #[must_use]
    pub const fn path(self) -> &'static str {
        match self {
            Self::Created => "/ws/todos/created",
            Self::Updated => "/ws/todos/updated",
            Self::Deleted => "/ws/todos/deleted",
        }
    }
}

/// A todo as broadcast on the `created` and `updated` channels.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Builder)]
#[serde(rename_all = "camelCase")]
pub struct Todo {
    pub id: i64,
    /// Owner of the todo
    pub user_id: i64,
    #[builder(into)]
    pub title: String,
    pub completed: bool,
    pub created_at: DateTime<Utc>,
}

/// Broadcast on the `deleted` channel.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TodoDeleted {
    /// Id of the removed todo
    pub id: i64,
}

impl TodoDeleted {
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self { id }
    }
}
