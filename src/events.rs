//! Background delivery of reader notifications.
//!
//! One worker thread per session takes notifications out of the session's
//! [`EventQueue`] and hands them to a single handler, in the order the reader
//! produced them. How the worker blocks is decided by the [`DeliveryMode`]
//! given to [`EventDelivery::start`]:
//!
//! * `CallbackDriven` parks in [`EventQueue::wait_next`] and dispatches each
//!   notification as it is yielded.
//! * `WaitDriven` parks on a [`WaitSignal`] registered with the queue and,
//!   once woken, drains whatever is pending.
//!
//! The worker only keeps a weak reference to the queue, so it never extends
//! the life of the session that owns it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};

use clap::ValueEnum;
use tracing::{debug, error, info, warn};

use crate::error::Error;
use crate::queue::{EventQueue, Wait, WaitSignal};
use crate::types::Notification;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DeliveryMode {
    #[value(name = "callback")]
    CallbackDriven,
    #[value(name = "wait")]
    WaitDriven,
}

impl Default for DeliveryMode {
    fn default() -> DeliveryMode {
        DeliveryMode::CallbackDriven
    }
}

pub type Handler = Box<dyn FnMut(Notification) + Send>;

/// How the worker waits for notifications.
pub trait Delivery: Send + Sync {
    fn mode(&self) -> DeliveryMode;

    /// Blocks until there is something to deliver and delivers it. An error
    /// ends the worker.
    fn pump(&self, queue: &EventQueue, handler: &mut Handler) -> Result<(), Error>;

    /// Wakes a worker blocked in [`pump`](Delivery::pump).
    fn unblock(&self, queue: &EventQueue);

    /// Drops whatever the strategy registered with the queue.
    fn release(&self, queue: &EventQueue);
}

pub struct CallbackDelivery;

impl Delivery for CallbackDelivery {
    fn mode(&self) -> DeliveryMode {
        DeliveryMode::CallbackDriven
    }

    fn pump(&self, queue: &EventQueue, handler: &mut Handler) -> Result<(), Error> {
        match queue.wait_next() {
            Wait::Event(notification) => handler(notification),
            Wait::Interrupted => {}
            Wait::Closed(reason) => return Err(Error::WorkerFault(reason)),
        }
        Ok(())
    }

    fn unblock(&self, queue: &EventQueue) {
        queue.interrupt();
    }

    fn release(&self, _queue: &EventQueue) {}
}

pub struct WaitDelivery {
    signal: Arc<WaitSignal>,
}

impl WaitDelivery {
    pub fn register(queue: &EventQueue) -> WaitDelivery {
        WaitDelivery {
            signal: queue.register_signal(),
        }
    }
}

impl Delivery for WaitDelivery {
    fn mode(&self) -> DeliveryMode {
        DeliveryMode::WaitDriven
    }

    fn pump(&self, queue: &EventQueue, handler: &mut Handler) -> Result<(), Error> {
        self.signal.wait();
        let (pending, closed) = queue.drain();
        for notification in pending {
            handler(notification);
        }
        match closed {
            Some(reason) => Err(Error::WorkerFault(reason)),
            None => Ok(()),
        }
    }

    fn unblock(&self, _queue: &EventQueue) {
        self.signal.set();
    }

    fn release(&self, queue: &EventQueue) {
        queue.unregister_signal();
    }
}

struct Worker {
    thread: JoinHandle<()>,
    stop: Arc<AtomicBool>,
    strategy: Arc<dyn Delivery>,
    queue: Weak<EventQueue>,
}

/// Owner of the event worker. Idle until [`start`](EventDelivery::start).
#[derive(Default)]
pub struct EventDelivery {
    worker: Option<Worker>,
}

impl EventDelivery {
    pub fn new() -> EventDelivery {
        EventDelivery::default()
    }

    pub fn is_running(&self) -> bool {
        self.worker.is_some()
    }

    pub fn mode(&self) -> Option<DeliveryMode> {
        self.worker.as_ref().map(|w| w.strategy.mode())
    }

    /// Spawns the worker. Fails if one is already running or the queue's
    /// session is gone.
    pub fn start<F>(
        &mut self,
        queue: Weak<EventQueue>,
        mode: DeliveryMode,
        handler: F,
    ) -> Result<(), Error>
    where
        F: FnMut(Notification) + Send + 'static,
    {
        if self.worker.is_some() {
            return Err(Error::Program("event worker is already running".to_string()));
        }
        let strategy: Arc<dyn Delivery> = {
            let queue = queue
                .upgrade()
                .ok_or_else(|| Error::Program("session is already closed".to_string()))?;
            match mode {
                DeliveryMode::CallbackDriven => Arc::new(CallbackDelivery),
                DeliveryMode::WaitDriven => Arc::new(WaitDelivery::register(&queue)),
            }
        };
        let stop = Arc::new(AtomicBool::new(false));

        let spawned = {
            let queue = queue.clone();
            let strategy = strategy.clone();
            let stop = stop.clone();
            let handler: Handler = Box::new(handler);
            thread::Builder::new()
                .name("rfid-events".to_string())
                .spawn(move || run(queue, strategy, stop, handler))
        };
        let thread = match spawned {
            Ok(thread) => thread,
            Err(e) => {
                if let Some(queue) = queue.upgrade() {
                    strategy.release(&queue);
                }
                return Err(e.into());
            }
        };
        info!(?mode, "event worker started");

        self.worker = Some(Worker {
            thread,
            stop,
            strategy,
            queue,
        });
        Ok(())
    }

    /// Signals the worker, waits for it to exit and releases the strategy.
    /// Does nothing when no worker is running.
    pub fn stop(&mut self) {
        let worker = match self.worker.take() {
            Some(worker) => worker,
            None => return,
        };
        worker.stop.store(true, Ordering::Release);
        if let Some(queue) = worker.queue.upgrade() {
            worker.strategy.unblock(&queue);
        }
        if worker.thread.join().is_err() {
            warn!("event worker panicked");
        }
        if let Some(queue) = worker.queue.upgrade() {
            worker.strategy.release(&queue);
        }
        info!("event worker stopped");
    }
}

impl Drop for EventDelivery {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run(queue: Weak<EventQueue>, strategy: Arc<dyn Delivery>, stop: Arc<AtomicBool>, mut handler: Handler) {
    while !stop.load(Ordering::Acquire) {
        let queue = match queue.upgrade() {
            Some(queue) => queue,
            None => {
                debug!("event queue dropped, worker exiting");
                return;
            }
        };
        if let Err(e) = strategy.pump(&queue, &mut handler) {
            error!(error = %e, "event worker exiting");
            return;
        }
    }
    debug!("event worker observed stop");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::time::Duration;

    const TIMEOUT: Duration = Duration::from_secs(5);

    fn tag_event(n: u16) -> Notification {
        Notification::AntennaConnected(n)
    }

    fn check_order(mode: DeliveryMode) {
        let queue = Arc::new(EventQueue::new());
        let (tx, rx) = mpsc::channel();
        let mut delivery = EventDelivery::new();

        for n in 0..10 {
            queue.push(tag_event(n));
        }
        delivery
            .start(Arc::downgrade(&queue), mode, move |n| {
                let _ = tx.send(n);
            })
            .unwrap();
        assert_eq!(delivery.mode(), Some(mode));
        for n in 10..50 {
            queue.push(tag_event(n));
        }

        let received: Vec<Notification> = (0..50).map(|_| rx.recv_timeout(TIMEOUT).unwrap()).collect();
        let expected: Vec<Notification> = (0..50).map(tag_event).collect();
        assert_eq!(received, expected);

        delivery.stop();
        assert!(!delivery.is_running());
    }

    #[test]
    fn test_callback_driven_order() {
        check_order(DeliveryMode::CallbackDriven);
    }

    #[test]
    fn test_wait_driven_order() {
        check_order(DeliveryMode::WaitDriven);
    }

    #[test]
    fn test_stop_is_idempotent() {
        for &mode in &[DeliveryMode::CallbackDriven, DeliveryMode::WaitDriven] {
            let queue = Arc::new(EventQueue::new());
            let mut delivery = EventDelivery::new();
            delivery.stop();
            delivery.start(Arc::downgrade(&queue), mode, |_| {}).unwrap();
            delivery.stop();
            delivery.stop();
            assert!(!delivery.is_running());
            assert!(!queue.has_signal());
        }
    }

    #[test]
    fn test_start_twice_fails() {
        let queue = Arc::new(EventQueue::new());
        let mut delivery = EventDelivery::new();
        delivery
            .start(Arc::downgrade(&queue), DeliveryMode::CallbackDriven, |_| {})
            .unwrap();
        assert!(delivery
            .start(Arc::downgrade(&queue), DeliveryMode::WaitDriven, |_| {})
            .is_err());
        assert_eq!(delivery.mode(), Some(DeliveryMode::CallbackDriven));
    }

    #[test]
    fn test_restart_after_stop() {
        let queue = Arc::new(EventQueue::new());
        let mut delivery = EventDelivery::new();
        delivery
            .start(Arc::downgrade(&queue), DeliveryMode::WaitDriven, |_| {})
            .unwrap();
        delivery.stop();

        let (tx, rx) = mpsc::channel();
        delivery
            .start(Arc::downgrade(&queue), DeliveryMode::CallbackDriven, move |n| {
                let _ = tx.send(n);
            })
            .unwrap();
        queue.push(Notification::InventoryStarted);
        assert_eq!(rx.recv_timeout(TIMEOUT).unwrap(), Notification::InventoryStarted);
    }

    #[test]
    fn test_start_on_dropped_queue_fails() {
        let queue = Arc::new(EventQueue::new());
        let weak = Arc::downgrade(&queue);
        drop(queue);
        let mut delivery = EventDelivery::new();
        assert!(delivery.start(weak, DeliveryMode::CallbackDriven, |_| {}).is_err());
        assert!(!delivery.is_running());
    }

    #[test]
    fn test_worker_exits_when_queue_closes() {
        for &mode in &[DeliveryMode::CallbackDriven, DeliveryMode::WaitDriven] {
            let queue = Arc::new(EventQueue::new());
            let (tx, rx) = mpsc::channel();
            let mut delivery = EventDelivery::new();
            delivery
                .start(Arc::downgrade(&queue), mode, move |n| {
                    let _ = tx.send(n);
                })
                .unwrap();

            queue.push(Notification::ReaderException("antenna fault".to_string()));
            queue.close("connection reset");

            assert_eq!(
                rx.recv_timeout(TIMEOUT).unwrap(),
                Notification::ReaderException("antenna fault".to_string())
            );
            // the worker drops the handler, and with it the sender, on exit
            assert!(rx.recv_timeout(TIMEOUT).is_err());
            delivery.stop();
        }
    }

    #[test]
    fn test_stop_after_owner_dropped() {
        let queue = Arc::new(EventQueue::new());
        let mut delivery = EventDelivery::new();
        delivery
            .start(Arc::downgrade(&queue), DeliveryMode::CallbackDriven, |_| {})
            .unwrap();
        drop(queue);
        delivery.stop();
        assert!(!delivery.is_running());
    }
}
