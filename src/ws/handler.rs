//! Subscriber registries and the unsubscribe capability they hand out.

use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use super::error::WsError;

/// A shared reference to a callback.
///
/// Registries compare handlers by reference identity: registering clones of the same
/// `Handler` twice keeps a single entry, while two separately created handlers are
/// always distinct, even when built from identical closures.
pub struct Handler<F: ?Sized>(Arc<F>);

/// Called with every inbound message.
pub type MessageHandler<M> = Handler<dyn Fn(&super::Payload<M>) + Send + Sync>;
/// Called when a transport opens or closes.
pub type LifecycleHandler = Handler<dyn Fn() + Send + Sync>;
/// Called with transport-level errors.
pub type ErrorHandler = Handler<dyn Fn(&WsError) + Send + Sync>;

impl<F: ?Sized> Handler<F> {
    fn same(&self, other: &Arc<F>) -> bool {
        Arc::as_ptr(&self.0).cast::<()>() == Arc::as_ptr(other).cast::<()>()
    }
}

impl<F: ?Sized> Clone for Handler<F> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<F: ?Sized> fmt::Debug for Handler<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Handler")
            .field(&Arc::as_ptr(&self.0).cast::<()>())
            .finish()
    }
}

impl<M, C> From<C> for Handler<dyn Fn(&super::Payload<M>) + Send + Sync>
where
    M: 'static,
    C: Fn(&super::Payload<M>) + Send + Sync + 'static,
{
    fn from(callback: C) -> Self {
        Self(Arc::new(callback))
    }
}

impl<C> From<C> for Handler<dyn Fn() + Send + Sync>
where
    C: Fn() + Send + Sync + 'static,
{
    fn from(callback: C) -> Self {
        Self(Arc::new(callback))
    }
}

impl<C> From<C> for Handler<dyn Fn(&WsError) + Send + Sync>
where
    C: Fn(&WsError) + Send + Sync + 'static,
{
    fn from(callback: C) -> Self {
        Self(Arc::new(callback))
    }
}

/// Removal side of a registry, with the handler type erased.
trait Unregister: Send + Sync {
    fn unregister(&self, id: u64);
}

/// Capability to remove one handler from the registry it was added to.
///
/// Dropping a `Subscription` leaves the handler registered; only
/// [`unsubscribe`](Self::unsubscribe) removes it. Calling `unsubscribe` more than
/// once, or after the manager is gone, does nothing.
#[must_use = "the handler stays registered until `unsubscribe` is called"]
#[derive(Clone)]
pub struct Subscription {
    registry: Weak<dyn Unregister>,
    id: u64,
}

impl Subscription {
    pub fn unsubscribe(&self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.unregister(self.id);
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

struct Entries<F: ?Sized> {
    next_id: u64,
    handlers: Vec<(u64, Arc<F>)>,
}

/// A set of handlers kept in registration order.
pub(crate) struct Registry<F: ?Sized> {
    entries: Mutex<Entries<F>>,
}

impl<F: ?Sized + Send + Sync + 'static> Registry<F> {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            entries: Mutex::new(Entries {
                next_id: 0,
                handlers: Vec::new(),
            }),
        })
    }

    /// Add `handler` unless it is already present. Both cases return a subscription
    /// that removes the single shared entry.
    pub(crate) fn insert(self: &Arc<Self>, handler: &Handler<F>) -> Subscription {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);

        let id = match entries.handlers.iter().find(|(_, h)| handler.same(h)) {
            Some((id, _)) => *id,
            None => {
                let id = entries.next_id;
                entries.next_id += 1;
                entries.handlers.push((id, Arc::clone(&handler.0)));
                id
            }
        };

        let registry: Weak<Self> = Arc::downgrade(self);
        let registry: Weak<dyn Unregister> = registry;
        Subscription { registry, id }
    }

    /// Handlers present right now, for one dispatch turn.
    pub(crate) fn snapshot(&self) -> Vec<Arc<F>> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .handlers
            .iter()
            .map(|(_, h)| Arc::clone(h))
            .collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .handlers
            .len()
    }

    /// Invoke every handler of the current snapshot in registration order.
    ///
    /// A panicking handler is reported and skipped; the rest still run.
    pub(crate) fn dispatch<I: Fn(&F)>(&self, label: &str, invoke: I) {
        for handler in self.snapshot() {
            let outcome = catch_unwind(AssertUnwindSafe(|| invoke(&handler)));
            if outcome.is_err() {
                #[cfg(feature = "tracing")]
                tracing::error!(category = %label, "Handler panicked during dispatch");
                #[cfg(not(feature = "tracing"))]
                let _ = label;
            }
        }
    }
}

impl<F: ?Sized + Send + Sync> Unregister for Registry<F> {
    fn unregister(&self, id: u64) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .handlers
            .retain(|(entry, _)| *entry != id);
    }
}
