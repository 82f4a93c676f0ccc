// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

// cspell:words eventfd epoll

//! Fixed capacity [FIFO] queue. See [`FixedQueue`] for details.
//!
//! [FIFO]: https://en.wikipedia.org/wiki/FIFO_(computing_and_electronics)

use super::{EventFdCreationError, QueueSignal};
use miette::Diagnostic;
use std::{collections::VecDeque,
          fmt::{Debug, Formatter},
          io,
          os::fd::{AsFd, AsRawFd, BorrowedFd, RawFd},
          sync::{Condvar, Mutex, MutexGuard, PoisonError}};

/// A bounded queue that is safe for many concurrent producers and one consumer.
///
/// # Backpressure
///
/// [`enqueue()`] blocks while the queue holds [`capacity()`] items. [`try_enqueue()`]
/// returns the item back instead. Both fail once the queue is [`close()`]d, which also
/// wakes every producer that is currently blocked.
///
/// # Readable Signal
///
/// [`dequeue_fd()`] is readable exactly while the queue is non-empty. It is backed by
/// a [`QueueSignal`] whose count is kept equal to the number of queued items. Items are
/// pushed and the count incremented under the same lock (and likewise popped and
/// decremented), so a reactor can register the fd and use readiness as "an item is
/// waiting".
///
/// ```text
/// producers ──enqueue()──► ┌──────────────┐ ──try_dequeue()──► consumer
///                          │ items + count│
///                          └──────┬───────┘
///                                 │ dequeue_fd() readable while count > 0
///                                 ▼
///                              reactor
/// ```
///
/// # Teardown
///
/// Dropping the queue drops any items still in it, without running them.
///
/// [`capacity()`]: Self::capacity
/// [`close()`]: Self::close
/// [`dequeue_fd()`]: Self::dequeue_fd
/// [`enqueue()`]: Self::enqueue
/// [`try_enqueue()`]: Self::try_enqueue
pub struct FixedQueue<T> {
    capacity: usize,
    state: Mutex<QueueState<T>>,
    not_full: Condvar,
    not_empty: Condvar,
    readable_signal: QueueSignal,
}

struct QueueState<T> {
    items: VecDeque<T>,
    is_closed: bool,
}

/// Errors from [`FixedQueue::new()`].
#[derive(Debug, thiserror::Error, Diagnostic)]
pub enum QueueCreationError {
    #[error("Queue capacity must be greater than zero")]
    #[diagnostic(
        code(worker_thread::queue::zero_capacity),
        help("A zero capacity queue blocks every enqueue forever")
    )]
    ZeroCapacity,

    #[error(transparent)]
    #[diagnostic(transparent)]
    Signal(#[from] EventFdCreationError),
}

/// The item handed back by a failed enqueue.
pub enum EnqueueError<T> {
    /// Only returned by [`FixedQueue::try_enqueue()`].
    Full(T),
    /// The queue was [closed](FixedQueue::close).
    Closed(T),
    /// The readable signal could not be incremented.
    Signal(T, io::Error),
}

impl<T> EnqueueError<T> {
    /// Returns the item that could not be enqueued.
    pub fn into_inner(self) -> T {
        match self {
            Self::Full(item) | Self::Closed(item) | Self::Signal(item, _) => item,
        }
    }
}

impl<T> Debug for EnqueueError<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Full(_) => write!(f, "Full(..)"),
            Self::Closed(_) => write!(f, "Closed(..)"),
            Self::Signal(_, err) => write!(f, "Signal(.., {err:?})"),
        }
    }
}

impl<T> FixedQueue<T> {
    /// # Errors
    ///
    /// Returns [`QueueCreationError::ZeroCapacity`] for a `capacity` of `0`, or
    /// [`QueueCreationError::Signal`] if the readable signal can't be created.
    pub fn new(capacity: usize) -> Result<Self, QueueCreationError> {
        if capacity == 0 {
            return Err(QueueCreationError::ZeroCapacity);
        }
        Ok(Self {
            capacity,
            state: Mutex::new(QueueState {
                items: VecDeque::with_capacity(capacity),
                is_closed: false,
            }),
            not_full: Condvar::new(),
            not_empty: Condvar::new(),
            readable_signal: QueueSignal::new()?,
        })
    }

    #[must_use]
    pub fn capacity(&self) -> usize { self.capacity }

    #[must_use]
    pub fn len(&self) -> usize { self.lock_state().items.len() }

    #[must_use]
    pub fn is_empty(&self) -> bool { self.lock_state().items.is_empty() }

    #[must_use]
    pub fn is_closed(&self) -> bool { self.lock_state().is_closed }

    /// Appends `item`, blocking while the queue is full.
    ///
    /// # Errors
    ///
    /// Returns the item in [`EnqueueError::Closed`] if the queue is closed (including
    /// while this call was blocked waiting for space), or in [`EnqueueError::Signal`] if
    /// the readable signal could not be incremented.
    pub fn enqueue(&self, item: T) -> Result<(), EnqueueError<T>> {
        let mut state = self.lock_state();
        while !state.is_closed && state.items.len() >= self.capacity {
            state = self
                .not_full
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
        self.push_locked(&mut state, item)
    }

    /// Appends `item` without blocking.
    ///
    /// # Errors
    ///
    /// Returns the item in [`EnqueueError::Full`] if there is no space, otherwise the
    /// same errors as [`enqueue()`](Self::enqueue).
    pub fn try_enqueue(&self, item: T) -> Result<(), EnqueueError<T>> {
        let mut state = self.lock_state();
        if !state.is_closed && state.items.len() >= self.capacity {
            return Err(EnqueueError::Full(item));
        }
        self.push_locked(&mut state, item)
    }

    /// Removes the front item, blocking while the queue is empty.
    ///
    /// Returns [`None`] once the queue is closed and empty. Items that were queued
    /// before [`close()`](Self::close) are still handed out.
    pub fn dequeue(&self) -> Option<T> {
        let mut state = self.lock_state();
        loop {
            if let Some(item) = self.pop_locked(&mut state) {
                return Some(item);
            }
            if state.is_closed {
                return None;
            }
            state = self
                .not_empty
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Removes the front item if there is one. Never blocks.
    pub fn try_dequeue(&self) -> Option<T> {
        let mut state = self.lock_state();
        self.pop_locked(&mut state)
    }

    /// Stops accepting items and wakes every blocked producer and consumer.
    ///
    /// Items already queued stay in the queue. Closing is permanent and idempotent.
    pub fn close(&self) {
        let mut state = self.lock_state();
        state.is_closed = true;
        drop(state);
        self.not_full.notify_all();
        self.not_empty.notify_all();
    }

    /// [Closes](Self::close) the queue and removes every item still in it.
    ///
    /// The items are returned rather than dropped so the caller decides where their
    /// destructors run (outside of the queue lock).
    pub fn close_and_take_all(&self) -> Vec<T> {
        let mut state = self.lock_state();
        state.is_closed = true;
        let mut taken = Vec::with_capacity(state.items.len());
        while let Some(item) = self.pop_locked(&mut state) {
            taken.push(item);
        }
        drop(state);
        self.not_full.notify_all();
        self.not_empty.notify_all();
        taken
    }

    /// File descriptor that is readable while the queue is non-empty.
    ///
    /// Register it with a reactor for read interest. See [Readable Signal].
    ///
    /// [Readable Signal]: FixedQueue#readable-signal
    #[must_use]
    pub fn dequeue_fd(&self) -> BorrowedFd<'_> { self.readable_signal.as_fd() }

    fn lock_state(&self) -> MutexGuard<'_, QueueState<T>> {
        // Items never run under this lock, so a poisoned lock still holds a consistent
        // queue.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn push_locked(
        &self,
        state: &mut MutexGuard<'_, QueueState<T>>,
        item: T,
    ) -> Result<(), EnqueueError<T>> {
        if state.is_closed {
            return Err(EnqueueError::Closed(item));
        }
        // Signal first: if it fails the item is handed back and the count still equals
        // the number of items.
        if let Err(err) = self.readable_signal.post() {
            return Err(EnqueueError::Signal(item, err));
        }
        state.items.push_back(item);
        self.not_empty.notify_one();
        Ok(())
    }

    fn pop_locked(&self, state: &mut MutexGuard<'_, QueueState<T>>) -> Option<T> {
        let item = state.items.pop_front()?;
        match self.readable_signal.try_take() {
            Ok(true) => {}
            Ok(false) => tracing::error!(
                message = "fixed_queue: readable signal count was behind the item count"
            ),
            Err(err) => tracing::error!(
                message = "fixed_queue: failed to take readable signal",
                error = ?err
            ),
        }
        self.not_full.notify_one();
        Some(item)
    }
}

impl<T> AsRawFd for FixedQueue<T> {
    fn as_raw_fd(&self) -> RawFd { self.readable_signal.as_raw_fd() }
}

impl<T> Debug for FixedQueue<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let state = self.lock_state();
        f.debug_struct("FixedQueue")
            .field("capacity", &self.capacity)
            .field("len", &state.items.len())
            .field("is_closed", &state.is_closed)
            .finish_non_exhaustive()
    }
}
