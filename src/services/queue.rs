//! FIFO hand-off between producer threads and the single worker thread.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

/// Multi-producer, single-consumer FIFO queue.
///
/// The lock is held only while an item is pushed or popped. Once
/// [`close`](CommandQueue::close) has been called, pushes are rejected and
/// [`pop`](CommandQueue::pop) keeps returning the remaining items until the
/// queue is empty.
pub struct CommandQueue<T> {
    state: Mutex<QueueState<T>>,
    work_available: Condvar,
}

struct QueueState<T> {
    pending: VecDeque<T>,
    closed: bool,
}

impl<T> CommandQueue<T> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(QueueState {
                pending: VecDeque::new(),
                closed: false,
            }),
            work_available: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append an item. Returns it back if the queue has been closed.
    pub fn push(&self, item: T) -> Result<(), T> {
        {
            let mut state = self.lock();
            if state.closed {
                return Err(item);
            }
            state.pending.push_back(item);
        }
        self.work_available.notify_one();
        Ok(())
    }

    /// Block until an item is available and remove it.
    ///
    /// Returns `None` once the queue is closed and fully drained.
    pub fn pop(&self) -> Option<T> {
        let mut state = self.lock();
        loop {
            if let Some(item) = state.pending.pop_front() {
                return Some(item);
            }
            if state.closed {
                return None;
            }
            state = self
                .work_available
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Stop accepting new items and wake the consumer.
    pub fn close(&self) {
        self.lock().closed = true;
        self.work_available.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    pub fn len(&self) -> usize {
        self.lock().pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> Default for CommandQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}
