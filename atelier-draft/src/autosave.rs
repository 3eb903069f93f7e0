//! Autosave debounce
//!
//! A fixed-delay timer owned by the store. Every mutation re-arms it; when
//! it fires it emits [`DraftEvent::AutosaveDue`] on the store's event
//! channel: a trigger hook for the caller to invoke `save()`, never a save
//! itself. A successful save cancels it. Dropping the store aborts any
//! armed timer deterministically.

use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::trace;

use crate::store::DraftEvent;

pub(crate) struct Autosave {
    delay: Duration,
    events: broadcast::Sender<DraftEvent>,
    timer: Mutex<Option<JoinHandle<()>>>,
}

impl Autosave {
    pub(crate) fn new(delay: Duration, events: broadcast::Sender<DraftEvent>) -> Self {
        Self {
            delay,
            events,
            timer: Mutex::new(None),
        }
    }

    /// (Re)start the debounce window. Requires a running tokio runtime.
    pub(crate) fn rearm(&self) {
        let mut timer = self.timer.lock();
        if let Some(handle) = timer.take() {
            handle.abort();
        }
        let delay = self.delay;
        let events = self.events.clone();
        *timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            trace!("autosave window elapsed");
            let _ = events.send(DraftEvent::AutosaveDue);
        }));
    }

    pub(crate) fn cancel(&self) {
        if let Some(handle) = self.timer.lock().take() {
            handle.abort();
        }
    }
}

impl Drop for Autosave {
    fn drop(&mut self) {
        self.cancel();
    }
}
