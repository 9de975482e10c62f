//! Notification buffering between the connection listener and the event
//! worker.

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

use crate::types::Notification;

/// Outcome of a blocking wait on an [`EventQueue`].
#[derive(Debug, PartialEq)]
pub enum Wait {
    Event(Notification),
    /// Woken by [`EventQueue::interrupt`] with nothing to deliver.
    Interrupted,
    /// The connection is gone and every buffered notification was handed out.
    Closed(String),
}

/// Auto-reset waitable object: `set` wakes exactly one `wait`, after which
/// the signal is clear again.
#[derive(Debug, Default)]
pub struct WaitSignal {
    signaled: Mutex<bool>,
    cond: Condvar,
}

impl WaitSignal {
    pub fn new() -> WaitSignal {
        WaitSignal::default()
    }

    pub fn set(&self) {
        let mut signaled = self.signaled.lock().unwrap_or_else(PoisonError::into_inner);
        *signaled = true;
        self.cond.notify_one();
    }

    pub fn wait(&self) {
        let mut signaled = self.signaled.lock().unwrap_or_else(PoisonError::into_inner);
        while !*signaled {
            signaled = self
                .cond
                .wait(signaled)
                .unwrap_or_else(PoisonError::into_inner);
        }
        *signaled = false;
    }
}

#[derive(Debug, Default)]
struct QueueState {
    pending: VecDeque<Notification>,
    interrupted: bool,
    closed: Option<String>,
    signal: Option<Arc<WaitSignal>>,
}

/// FIFO of notifications received from the reader and not yet delivered.
#[derive(Debug, Default)]
pub struct EventQueue {
    state: Mutex<QueueState>,
    ready: Condvar,
}

impl EventQueue {
    pub fn new() -> EventQueue {
        EventQueue::default()
    }

    fn state(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn push(&self, notification: Notification) {
        let mut state = self.state();
        if state.closed.is_some() {
            return;
        }
        state.pending.push_back(notification);
        if let Some(signal) = &state.signal {
            signal.set();
        }
        self.ready.notify_one();
    }

    /// Marks the queue closed. Only the first reason is kept.
    pub fn close(&self, reason: impl Into<String>) {
        let mut state = self.state();
        if state.closed.is_none() {
            state.closed = Some(reason.into());
        }
        if let Some(signal) = &state.signal {
            signal.set();
        }
        self.ready.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.state().closed.is_some()
    }

    /// Wakes a thread blocked in [`wait_next`](EventQueue::wait_next).
    pub fn interrupt(&self) {
        let mut state = self.state();
        state.interrupted = true;
        self.ready.notify_all();
    }

    /// Blocks until a notification, an interrupt, or closure.
    ///
    /// Buffered notifications are returned before an interrupt or closure is
    /// reported.
    pub fn wait_next(&self) -> Wait {
        let mut state = self.state();
        loop {
            if let Some(notification) = state.pending.pop_front() {
                return Wait::Event(notification);
            }
            if state.interrupted {
                state.interrupted = false;
                return Wait::Interrupted;
            }
            if let Some(reason) = &state.closed {
                return Wait::Closed(reason.clone());
            }
            state = self
                .ready
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Takes every buffered notification, oldest first, together with the
    /// close reason if the queue has been closed.
    pub fn drain(&self) -> (Vec<Notification>, Option<String>) {
        let mut state = self.state();
        let events = state.pending.drain(..).collect();
        (events, state.closed.clone())
    }

    /// Installs a waitable that is set whenever a notification arrives or
    /// the queue closes.
    pub fn register_signal(&self) -> Arc<WaitSignal> {
        let mut state = self.state();
        let signal = Arc::new(WaitSignal::new());
        if !state.pending.is_empty() || state.closed.is_some() {
            signal.set();
        }
        state.signal = Some(signal.clone());
        signal
    }

    pub fn unregister_signal(&self) {
        self.state().signal = None;
    }

    pub fn has_signal(&self) -> bool {
        self.state().signal.is_some()
    }
}
