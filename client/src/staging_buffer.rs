use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use ingestion_protocol::WireMessage;
use ingestion_std::errors::{BufferError, PreconditionError};
use tokio::sync::Notify;
use tracing::debug;

/// Whether the buffer's capacity is measured in bytes of allocation or in
/// number of queued messages. The allocation-accounted variant is canonical;
/// the count-accounted variant is retained as a configuration choice, not a
/// separate component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferBound {
    Allocation,
    Count,
}

struct State {
    queue: VecDeque<WireMessage>,
    allocation: u64,
}

impl State {
    fn usage(&self, bound: BufferBound) -> u64 {
        match bound {
            BufferBound::Allocation => self.allocation,
            BufferBound::Count => self.queue.len() as u64,
        }
    }
}

/// A bounded FIFO of WireMessages with allocation accounting. Two condition
/// variables govern waiters: `ready` (usage < capacity) and `empty`
/// (size == 0). Every removal recomputes usage and notifies both.
pub struct StagingBuffer {
    state: Mutex<State>,
    ready: Notify,
    empty: Notify,
    capacity: u64,
    bound: BufferBound,
    back_pressure: AtomicBool,
    active: AtomicBool,
    terminated: AtomicBool,
}

impl StagingBuffer {
    pub fn new(capacity: u64, bound: BufferBound) -> Self {
        Self {
            state: Mutex::new(State {
                queue: VecDeque::new(),
                allocation: 0,
            }),
            ready: Notify::new(),
            empty: Notify::new(),
            capacity,
            bound,
            back_pressure: AtomicBool::new(true),
            active: AtomicBool::new(false),
            terminated: AtomicBool::new(false),
        }
    }

    pub fn enable_back_pressure(&self) {
        self.back_pressure.store(true, Ordering::SeqCst);
    }

    pub fn disable_back_pressure(&self) {
        self.back_pressure.store(false, Ordering::SeqCst);
        self.ready.notify_waiters();
    }

    pub fn has_back_pressure(&self) -> bool {
        self.back_pressure.load(Ordering::SeqCst)
    }

    pub fn activate(&self) {
        self.active.store(true, Ordering::SeqCst);
        self.terminated.store(false, Ordering::SeqCst);
    }

    /// Refuses new offers; keeps serving takes until empty, then terminates.
    pub fn shutdown(&self) {
        self.active.store(false, Ordering::SeqCst);
    }

    /// Refuses new offers; clears pending messages immediately and wakes
    /// every waiter.
    pub fn shutdown_now(&self) {
        self.active.store(false, Ordering::SeqCst);
        {
            let mut state = self.state.lock().unwrap();
            state.queue.clear();
            state.allocation = 0;
        }
        self.terminated.store(true, Ordering::SeqCst);
        self.ready.notify_waiters();
        self.empty.notify_waiters();
    }

    fn is_full(&self, state: &State) -> bool {
        self.back_pressure.load(Ordering::SeqCst) && state.usage(self.bound) >= self.capacity
    }

    fn push(&self, message: WireMessage) {
        {
            let mut state = self.state.lock().unwrap();
            state.allocation += message.serialized_size();
            state.queue.push_back(message);
        }
        // Wakes any consumer parked in `take`/`poll_timeout` waiting on a
        // non-empty queue; waiters re-check their own predicate on wake.
        self.empty.notify_waiters();
    }

    /// Adds one message, blocking while backpressure is active and usage is
    /// at or above capacity. This is "block-then-add": the offer always
    /// succeeds once unblocked, even if the single message pushes usage
    /// above capacity.
    pub async fn offer(&self, message: WireMessage) -> Result<(), BufferError> {
        if !self.active.load(Ordering::SeqCst) {
            return Err(PreconditionError::BufferInactive.into());
        }

        loop {
            let notified = self.ready.notified();

            let full = {
                let state = self.state.lock().unwrap();
                self.is_full(&state)
            };

            if !full {
                break;
            }

            notified.await;
        }

        self.push(message);
        Ok(())
    }

    pub async fn offer_all(&self, messages: Vec<WireMessage>) -> Result<(), BufferError> {
        for message in messages {
            self.offer(message).await?;
        }
        Ok(())
    }

    /// Like `offer`, but gives up and returns `Ok(false)` if still blocked
    /// after `timeout`.
    pub async fn offer_timeout(&self, message: WireMessage, timeout: Duration) -> Result<bool, BufferError> {
        match tokio::time::timeout(timeout, self.offer(message)).await {
            Ok(result) => result.map(|_| true),
            Err(_) => Ok(false),
        }
    }

    fn pop(&self) -> Option<WireMessage> {
        let (message, now_ready, now_empty) = {
            let mut state = self.state.lock().unwrap();
            let message = state.queue.pop_front();
            if let Some(message) = &message {
                state.allocation = state.allocation.saturating_sub(message.serialized_size());
            }
            let ready = !self.is_full(&state);
            let empty = state.queue.is_empty();
            (message, ready, empty)
        };

        if message.is_some() {
            if now_ready {
                self.ready.notify_waiters();
            }
            if now_empty {
                self.empty.notify_waiters();
            }
        }

        message
    }

    /// Removes one message, waiting while the queue is empty.
    pub async fn take(&self) -> Option<WireMessage> {
        loop {
            let notified = self.empty.notified();

            if let Some(message) = self.pop() {
                return Some(message);
            }

            if self.terminated.load(Ordering::SeqCst) {
                return None;
            }

            if !self.active.load(Ordering::SeqCst) && self.get_queue_size() == 0 {
                return None;
            }

            notified.await;
        }
    }

    pub fn poll(&self) -> Option<WireMessage> {
        self.pop()
    }

    pub async fn poll_timeout(&self, timeout: Duration) -> Option<WireMessage> {
        match tokio::time::timeout(timeout, self.take()).await {
            Ok(message) => message,
            Err(_) => None,
        }
    }

    /// Blocks until usage < capacity. Valid even with backpressure disabled.
    pub async fn await_queue_ready(&self) {
        loop {
            let notified = self.ready.notified();
            let ready = {
                let state = self.state.lock().unwrap();
                state.usage(self.bound) < self.capacity
            };
            if ready {
                return;
            }
            notified.await;
        }
    }

    pub async fn await_queue_empty(&self) {
        loop {
            let notified = self.empty.notified();
            if self.get_queue_size() == 0 {
                debug!("staging buffer drained");
                return;
            }
            notified.await;
        }
    }

    pub fn get_queue_size(&self) -> usize {
        self.state.lock().unwrap().queue.len()
    }

    pub fn get_queue_allocation(&self) -> u64 {
        self.state.lock().unwrap().allocation
    }

    pub fn get_capacity(&self) -> u64 {
        self.capacity
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// True while the buffer might still yield a message: active, or
    /// draining a non-empty queue after a graceful shutdown.
    pub fn is_supplying(&self) -> bool {
        self.is_active() || self.get_queue_size() > 0
    }
}
