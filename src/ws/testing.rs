//! In-memory transport and timer used to drive managers step by step in tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use url::Url;

use super::error::WsError;
use super::traits::{
    Connector, ScheduledCallback, ScheduledTask, Scheduler, Transport, TransportListener,
};

/// One transport opened through [`MockConnector`], with hooks to play the server side.
pub(crate) struct MockLink {
    pub(crate) endpoint: Url,
    listener: Arc<dyn TransportListener>,
    open: AtomicBool,
    closed: AtomicBool,
    sent: Mutex<Vec<String>>,
}

impl MockLink {
    pub(crate) fn open(&self) {
        self.open.store(true, Ordering::SeqCst);
        self.listener.on_open();
    }

    pub(crate) fn message(&self, text: &str) {
        self.listener.on_message(text.to_owned());
    }

    pub(crate) fn error(&self) {
        self.listener.on_error(&WsError::ConnectionClosed);
    }

    /// Connection refused before opening: error, then close.
    pub(crate) fn fail(&self) {
        self.error();
        self.close();
    }

    pub(crate) fn close(&self) {
        self.open.store(false, Ordering::SeqCst);
        self.listener.on_close();
    }

    pub(crate) fn was_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub(crate) fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }
}

struct MockTransport(Arc<MockLink>);

impl Transport for MockTransport {
    fn is_open(&self) -> bool {
        self.0.open.load(Ordering::SeqCst)
    }

    fn send(&self, text: String) -> Result<(), WsError> {
        self.0.sent.lock().unwrap().push(text);
        Ok(())
    }

    fn close(&self) {
        self.0.open.store(false, Ordering::SeqCst);
        self.0.closed.store(true, Ordering::SeqCst);
    }
}

#[derive(Default)]
pub(crate) struct MockConnector {
    links: Mutex<Vec<Arc<MockLink>>>,
}

impl MockConnector {
    pub(crate) fn open_count(&self) -> usize {
        self.links.lock().unwrap().len()
    }

    pub(crate) fn last(&self) -> Arc<MockLink> {
        Arc::clone(self.links.lock().unwrap().last().unwrap())
    }

    pub(crate) fn all(&self) -> Vec<Arc<MockLink>> {
        self.links.lock().unwrap().clone()
    }
}

impl Connector for MockConnector {
    fn open(&self, endpoint: &Url, listener: Arc<dyn TransportListener>) -> Box<dyn Transport> {
        let link = Arc::new(MockLink {
            endpoint: endpoint.clone(),
            listener,
            open: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            sent: Mutex::new(Vec::new()),
        });
        self.links.lock().unwrap().push(Arc::clone(&link));
        Box::new(MockTransport(link))
    }
}

struct Slot {
    delay: Duration,
    callback: Option<ScheduledCallback>,
    cancelled: Arc<AtomicBool>,
}

impl Slot {
    fn is_pending(&self) -> bool {
        self.callback.is_some() && !self.cancelled.load(Ordering::SeqCst)
    }
}

struct ManualTask(Arc<AtomicBool>);

impl ScheduledTask for ManualTask {
    fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

/// Timer whose callbacks only run when the test fires them.
#[derive(Default)]
pub(crate) struct ManualScheduler {
    slots: Mutex<Vec<Slot>>,
}

impl ManualScheduler {
    /// Callbacks scheduled and neither fired nor cancelled.
    pub(crate) fn pending(&self) -> usize {
        self.slots
            .lock()
            .unwrap()
            .iter()
            .filter(|slot| slot.is_pending())
            .count()
    }

    /// Every callback ever scheduled.
    pub(crate) fn scheduled(&self) -> usize {
        self.slots.lock().unwrap().len()
    }

    pub(crate) fn last_delay(&self) -> Option<Duration> {
        self.slots.lock().unwrap().last().map(|slot| slot.delay)
    }

    /// Run the oldest pending callback. Returns false when nothing is pending.
    pub(crate) fn fire_next(&self) -> bool {
        let callback = {
            let mut slots = self.slots.lock().unwrap();
            slots
                .iter_mut()
                .find(|slot| slot.is_pending())
                .and_then(|slot| slot.callback.take())
        };

        match callback {
            Some(callback) => {
                callback();
                true
            }
            None => false,
        }
    }

    /// Run every callback pending right now.
    pub(crate) fn fire_all(&self) {
        for _ in 0..self.pending() {
            self.fire_next();
        }
    }
}

impl Scheduler for ManualScheduler {
    fn schedule(&self, delay: Duration, callback: ScheduledCallback) -> Box<dyn ScheduledTask> {
        let cancelled = Arc::new(AtomicBool::new(false));
        self.slots.lock().unwrap().push(Slot {
            delay,
            callback: Some(callback),
            cancelled: Arc::clone(&cancelled),
        });
        Box::new(ManualTask(cancelled))
    }
}
