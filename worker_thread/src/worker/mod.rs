// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

// cspell:words eventfd epoll gettid

//! The owned worker thread. See [`WorkerThread`].
//!
//! # Architecture
//!
//! ```text
//!  any thread                              dedicated thread
//! ┌─────────────────────┐                 ┌──────────────────────────────────────┐
//! │ post(f)             │                 │ Reactor::start()                     │
//! │ register(obj)       │──► WorkQueue ──►│   queue fd readable → run 1 item     │
//! │ unregister(obj) ◄───┼── reply ────────│   obj fd readable   → obj callback   │
//! │ stop()              │──► Waker ──────►│ drain (≤ drain limit)                │
//! │ free() / drop       │──► join ◄───────│ TerminationGuard: close + discard    │
//! └─────────────────────┘                 └──────────────────────────────────────┘
//! ```
//!
//! The work queue's readable signal (an [`eventfd`]) is itself a [`ReactorObject`] on
//! the reactor, so posted closures and source callbacks are interleaved on one thread
//! and never run concurrently. Source registration and unregistration are posted
//! closures too, which is what keeps the reactor's source table single threaded.
//!
//! # Start Handshake
//!
//! [`WorkerThread::new()`] blocks on a one-shot channel until the spawned thread has
//! learned its [`gettid(2)`], registered the queue, and run
//! [`ResourceFactory::on_thread_start()`]. If any of those fail, the thread reports
//! the error and exits, and `new()` joins it before returning
//! [`WorkerThreadError::InitializationFailed`].
//!
//! # Shutdown
//!
//! 1. [`WorkerThread::stop()`] wakes the reactor, which returns after the current batch
//!    of events.
//! 2. Queued items run, up to [`WorkerThreadConfig::drain_limit`].
//! 3. A termination guard (which also runs when a work item panics) marks the
//!    thread [`Terminated`], closes the queue so blocked producers return, and drops
//!    whatever is left without running it.
//! 4. [`WorkerThread::free()`] (or [`Drop`]) joins the thread.
//!
//! [`Terminated`]: LivenessState::Terminated
//! [`ReactorObject`]: crate::ReactorObject
//! [`eventfd`]: https://man7.org/linux/man-pages/man2/eventfd.2.html
//! [`gettid(2)`]: https://man7.org/linux/man-pages/man2/gettid.2.html

/// Verbose lifecycle tracing for the worker thread and its reactor. Warnings and errors
/// are logged regardless.
pub const DEBUG_WORKER_THREAD: bool = false;

// Attach sources.
pub mod wt_config;
pub mod wt_handle;
pub mod wt_liveness;
pub mod wt_resource_factory;
mod wt_run_loop;
pub mod wt_types;
pub mod wt_work_item;

// Re-export.
pub use wt_config::*;
pub use wt_handle::*;
pub use wt_liveness::*;
pub use wt_resource_factory::*;
pub use wt_types::*;
pub use wt_work_item::*;

use wt_run_loop::{WorkerShared, run_worker_thread};

#[cfg(test)]
mod tests;
