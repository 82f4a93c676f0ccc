// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! Lifecycle tracking for a worker thread. See [`WorkerLiveness`] and
//! [`LivenessState`].

use std::sync::atomic::{AtomicU8, Ordering};

/// Where a worker thread is in its one-way lifecycle.
///
/// ```text
/// Starting ──► Running ──► Stopping ──► Terminated
///     │                                      ▲
///     └──────── initialization failed ───────┘
/// ```
///
/// The discriminants are ordered so that a transition is a [`fetch_max()`]: a state
/// can only move forward, and a late "running" can never overwrite "terminated".
///
/// [`fetch_max()`]: std::sync::atomic::AtomicU8::fetch_max
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum LivenessState {
    /// Spawned, self-initialization not finished yet.
    Starting = 0,
    /// The reactor loop is running and posted work will execute.
    Running = 1,
    /// A stop was requested. Work already queued is still drained.
    Stopping = 2,
    /// The thread has exited (normally, after a failed start, or by panic).
    Terminated = 3,
}

impl LivenessState {
    const fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Starting,
            1 => Self::Running,
            2 => Self::Stopping,
            _ => Self::Terminated,
        }
    }

    /// `true` while a post can still be executed.
    #[must_use]
    pub const fn is_accepting_work(self) -> bool {
        matches!(self, Self::Starting | Self::Running | Self::Stopping)
    }
}

/// Shared, lock-free [`LivenessState`] cell.
///
/// Read from any thread (e.g. by [`WorkerThread::liveness()`]) while the worker
/// thread advances it. All operations use [`SeqCst`].
///
/// [`SeqCst`]: std::sync::atomic::Ordering::SeqCst
/// [`WorkerThread::liveness()`]: super::WorkerThread::liveness
#[derive(Debug)]
pub struct WorkerLiveness(AtomicU8);

impl WorkerLiveness {
    #[must_use]
    pub fn new() -> Self { Self(AtomicU8::new(LivenessState::Starting as u8)) }

    #[must_use]
    pub fn get(&self) -> LivenessState { LivenessState::from_u8(self.0.load(Ordering::SeqCst)) }

    /// Moves forward to `state`. Moving backward is a no-op. Returns the previous state.
    pub fn advance_to(&self, state: LivenessState) -> LivenessState {
        LivenessState::from_u8(self.0.fetch_max(state as u8, Ordering::SeqCst))
    }
}

impl Default for WorkerLiveness {
    fn default() -> Self { Self::new() }
}
