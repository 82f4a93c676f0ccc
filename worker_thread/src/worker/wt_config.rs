// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! Per-thread tuning: [`WorkerThreadConfig`] and [`FullQueuePolicy`].

/// Capacity of the work queue used by [`WorkerThread::new()`].
///
/// [`WorkerThread::new()`]: super::WorkerThread::new
pub const DEFAULT_WORK_QUEUE_CAPACITY: usize = 128;

/// What [`WorkerThread::post()`] does when it is called *from the worker thread
/// itself* and the work queue is full.
///
/// Posts from any other thread always block until there is space.
///
/// [`WorkerThread::post()`]: super::WorkerThread::post
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FullQueuePolicy {
    /// Return [`WorkerThreadError::QueueFullOnOwningThread`]. The only consumer of the
    /// queue is the posting thread, so blocking would never return.
    ///
    /// [`WorkerThreadError::QueueFullOnOwningThread`]: super::WorkerThreadError::QueueFullOnOwningThread
    #[default]
    FailFast,
    /// Block like any other producer. Only safe if something else can drain the
    /// queue, e.g. a [close](crate::FixedQueue::close) from another thread.
    Block,
}

/// Controls the work queue of a [`WorkerThread`].
///
/// ```text
/// post() ──► [ queue_capacity slots ] ──► run loop
///                                          │ stop()
///                                          ▼
///                            drain: run up to drain_limit items,
///                            then warn + discard the rest
/// ```
///
/// [`WorkerThread`]: super::WorkerThread
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerThreadConfig {
    /// Maximum number of queued items. Producers block (backpressure) beyond this.
    pub queue_capacity: usize,

    /// Maximum number of items run after the reactor has stopped. [`None`] means
    /// `queue_capacity`, which drains everything that can be queued when the stop
    /// arrives; anything posted while draining beyond that is discarded with a
    /// warning.
    pub drain_limit: Option<usize>,

    /// See [`FullQueuePolicy`].
    pub full_queue_on_owning_thread: FullQueuePolicy,
}

impl WorkerThreadConfig {
    #[must_use]
    pub fn effective_drain_limit(&self) -> usize {
        self.drain_limit.unwrap_or(self.queue_capacity)
    }
}

/// 128 slots, drain up to a full queue, fail fast on self-posts.
impl Default for WorkerThreadConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_WORK_QUEUE_CAPACITY,
            drain_limit: None,
            full_queue_on_owning_thread: FullQueuePolicy::FailFast,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    #[test]
    fn test_default_config() {
        let config = WorkerThreadConfig::default();
        assert_eq!(config.queue_capacity, 128);
        assert_eq!(config.full_queue_on_owning_thread, FullQueuePolicy::FailFast);
    }

    #[test_case(None, 128 ; "defaults to capacity")]
    #[test_case(Some(4), 4 ; "explicit limit")]
    #[test_case(Some(0), 0 ; "no drain")]
    fn test_effective_drain_limit(drain_limit: Option<usize>, expected: usize) {
        let config = WorkerThreadConfig {
            drain_limit,
            ..Default::default()
        };
        assert_eq!(config.effective_drain_limit(), expected);
    }
}
