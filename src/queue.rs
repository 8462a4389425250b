//! Bounded blocking frame queue.
//!
//! [`FrameQueue`] is the hand-off point between the decode driver and the
//! saver pool. It is a fixed-capacity FIFO guarded by one mutex and two
//! condition variables:
//!
//! - [`push`](FrameQueue::push) blocks while the queue is full, which keeps
//!   the driver from decoding arbitrarily far ahead of the savers.
//! - [`pop`](FrameQueue::pop) blocks while the queue is empty and input has
//!   not ended. Once [`signal_done`](FrameQueue::signal_done) has been
//!   called, `pop` drains whatever is buffered and then returns `None`
//!   without blocking.
//!
//! Neither operation has a timeout. A push after every consumer has exited
//! would block forever, so the shutdown order is: signal done, then join the
//! consumers.
//!
//! # Example
//!
//! ```
//! use std::{sync::Arc, thread};
//!
//! use frame_extractor::FrameQueue;
//!
//! let queue = Arc::new(FrameQueue::new(2)?);
//! let consumer = {
//!     let queue = Arc::clone(&queue);
//!     thread::spawn(move || {
//!         let mut seen = Vec::new();
//!         while let Some(item) = queue.pop() {
//!             seen.push(item);
//!         }
//!         seen
//!     })
//! };
//!
//! for item in 0..5 {
//!     queue.push(item).expect("queue is open");
//! }
//! queue.signal_done();
//! assert_eq!(consumer.join().unwrap(), vec![0, 1, 2, 3, 4]);
//! # Ok::<(), frame_extractor::ExtractError>(())
//! ```

use std::{
    collections::VecDeque,
    fmt::{Debug, Display, Formatter, Result as FmtResult},
    sync::{Condvar, Mutex, MutexGuard, PoisonError},
};

use crate::error::ExtractError;

/// Default number of frames buffered between the driver and the savers.
pub const DEFAULT_QUEUE_CAPACITY: usize = 32;

/// Returned by [`FrameQueue::push`] after [`FrameQueue::signal_done`]; hands
/// the rejected item back to the caller.
pub struct QueueClosed<T>(pub T);

impl<T> Debug for QueueClosed<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str("QueueClosed(..)")
    }
}

impl<T> Display for QueueClosed<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str("push on a queue that was already signalled done")
    }
}

impl<T> std::error::Error for QueueClosed<T> {}

struct QueueState<T> {
    items: VecDeque<T>,
    done: bool,
}

/// Fixed-capacity blocking FIFO with a one-way end-of-input signal.
pub struct FrameQueue<T> {
    state: Mutex<QueueState<T>>,
    not_full: Condvar,
    not_empty: Condvar,
    capacity: usize,
}

impl<T> Debug for FrameQueue<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let state = self.lock();
        f.debug_struct("FrameQueue")
            .field("len", &state.items.len())
            .field("capacity", &self.capacity)
            .field("done", &state.done)
            .finish()
    }
}

impl<T> FrameQueue<T> {
    /// Create a queue holding at most `capacity` items.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractError::ConfigurationError`] if `capacity` is zero.
    pub fn new(capacity: usize) -> Result<Self, ExtractError> {
        if capacity == 0 {
            return Err(ExtractError::ConfigurationError(
                "queue capacity must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            state: Mutex::new(QueueState {
                items: VecDeque::with_capacity(capacity),
                done: false,
            }),
            not_full: Condvar::new(),
            not_empty: Condvar::new(),
            capacity,
        })
    }

    // A panic while holding the lock cannot leave `QueueState` half-updated,
    // so poisoning is ignored.
    fn lock(&self) -> MutexGuard<'_, QueueState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append `item`, blocking while the queue is full.
    ///
    /// Wakes one blocked consumer.
    ///
    /// # Errors
    ///
    /// Returns the item inside [`QueueClosed`] if the queue has already been
    /// signalled done.
    pub fn push(&self, item: T) -> Result<(), QueueClosed<T>> {
        let mut state = self.lock();
        while state.items.len() >= self.capacity && !state.done {
            state = self
                .not_full
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
        if state.done {
            return Err(QueueClosed(item));
        }

        state.items.push_back(item);
        drop(state);
        self.not_empty.notify_one();
        Ok(())
    }

    /// Remove the oldest item, blocking while the queue is empty and not done.
    ///
    /// Returns `None` only once the queue is both empty and done. Wakes one
    /// blocked producer.
    pub fn pop(&self) -> Option<T> {
        let mut state = self.lock();
        while state.items.is_empty() && !state.done {
            state = self
                .not_empty
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }

        let item = state.items.pop_front()?;
        drop(state);
        self.not_full.notify_one();
        Some(item)
    }

    /// Mark the end of input and wake every blocked consumer.
    ///
    /// Idempotent; `done` is never cleared.
    pub fn signal_done(&self) {
        let mut state = self.lock();
        state.done = true;
        drop(state);
        self.not_empty.notify_all();
        self.not_full.notify_all();
    }

    /// Number of buffered items.
    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    /// Returns `true` if nothing is buffered.
    pub fn is_empty(&self) -> bool {
        self.lock().items.is_empty()
    }

    /// Maximum number of buffered items.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Whether [`signal_done`](FrameQueue::signal_done) has been called.
    pub fn is_done(&self) -> bool {
        self.lock().done
    }
}
