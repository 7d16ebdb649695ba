//! Pending-event queue.
//!
//! Decoding enqueues one deferred invocation per message; nothing runs until
//! the owner drains the queue. Enqueue never blocks and may happen from
//! inside a handler that is itself being drained.

use std::sync::{Mutex, PoisonError};

use tokio::sync::mpsc::{self, error::TryRecvError, UnboundedReceiver, UnboundedSender};

use crate::error::Result;

/// A decoded event bound to its target, waiting to be delivered.
pub type PendingEvent = Box<dyn FnOnce() -> Result<()> + Send>;

/// FIFO of pending events.
pub struct EventQueue {
    tx: UnboundedSender<PendingEvent>,
    rx: Mutex<UnboundedReceiver<PendingEvent>>,
}

impl EventQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx: Mutex::new(rx),
        }
    }

    /// Append an event.
    pub fn push(&self, event: PendingEvent) {
        // The receiver lives as long as the queue, so send cannot fail
        if self.tx.send(event).is_err() {
            tracing::error!("Event queue receiver dropped");
        }
    }

    fn pop(&self) -> Option<PendingEvent> {
        let mut rx = self.rx.lock().unwrap_or_else(PoisonError::into_inner);
        match rx.try_recv() {
            Ok(event) => Some(event),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    /// Run queued events in FIFO order until the queue is empty.
    ///
    /// Events enqueued while draining run in the same call. The first error
    /// stops the drain; the remaining events stay queued.
    pub fn drain(&self) -> Result<usize> {
        let mut ran = 0;
        while let Some(event) = self.pop() {
            ran += 1;
            event()?;
        }
        Ok(ran)
    }
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::WaywireError;
    use std::sync::Arc;

    fn recorder(log: &Arc<Mutex<Vec<u32>>>, n: u32) -> PendingEvent {
        let log = log.clone();
        Box::new(move || {
            log.lock().unwrap().push(n);
            Ok(())
        })
    }

    #[test]
    fn test_drain_runs_in_order() {
        let queue = EventQueue::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        for n in 0..4 {
            queue.push(recorder(&log, n));
        }

        assert_eq!(queue.drain().unwrap(), 4);
        assert_eq!(*log.lock().unwrap(), vec![0, 1, 2, 3]);
        assert_eq!(queue.drain().unwrap(), 0);
    }

    #[test]
    fn test_events_pushed_while_draining_run_in_same_drain() {
        let queue = Arc::new(EventQueue::new());
        let log = Arc::new(Mutex::new(Vec::new()));

        let inner_queue = queue.clone();
        let inner_log = log.clone();
        queue.push(Box::new(move || {
            inner_log.lock().unwrap().push(1);
            inner_queue.push(recorder(&inner_log, 2));
            Ok(())
        }));

        assert_eq!(queue.drain().unwrap(), 2);
        assert_eq!(*log.lock().unwrap(), vec![1, 2]);
    }

    #[test]
    fn test_error_stops_drain_and_keeps_rest() {
        let queue = EventQueue::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        queue.push(recorder(&log, 1));
        queue.push(Box::new(|| Err(WaywireError::Protocol("boom".into()))));
        queue.push(recorder(&log, 3));

        assert!(queue.drain().is_err());
        assert_eq!(*log.lock().unwrap(), vec![1]);

        assert_eq!(queue.drain().unwrap(), 1);
        assert_eq!(*log.lock().unwrap(), vec![1, 3]);
    }
}
