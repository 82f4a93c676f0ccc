// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

// cspell:words epoll eventfd

//! An owned worker thread: one dedicated OS thread per instance, running a [`mio`]
//! reactor that is fed by a bounded work queue.
//!
//! Components in a protocol stack (connection managers, channel schedulers, I/O
//! handlers) each need a serialized execution context. A [`WorkerThread`] provides
//! exactly that:
//!
//! - [`WorkerThread::new()`] blocks until the spawned thread has either fully
//!   initialized or cleanly failed. You never get a handle to a half-started thread.
//! - [`WorkerThread::post()`] moves a closure onto the thread. Closures run one at a
//!   time, in [FIFO] order.
//! - [`WorkerThread::register()`] and [`WorkerThread::unregister()`] attach and detach
//!   [`ReactorObject`]s. Both travel through the work queue, so the reactor's source
//!   table is only ever mutated on the owning thread. When [`unregister()`] returns,
//!   the source's callbacks will never fire again.
//! - Dropping (or [`free()`]-ing) the handle stops the reactor, drains queued work,
//!   and joins the thread.
//!
//! ```no_run
//! use std::sync::{Arc, Mutex};
//! use worker_thread::WorkerThread;
//!
//! # fn main() -> miette::Result<()> {
//! let thread = WorkerThread::new("hci_thread")?;
//! let seen = Arc::new(Mutex::new(Vec::new()));
//! for it in 1..=3 {
//!     let seen = Arc::clone(&seen);
//!     thread.post(move || seen.lock().unwrap().push(it))?;
//! }
//! thread.free();
//! assert_eq!(*seen.lock().unwrap(), vec![1, 2, 3]);
//! # Ok(())
//! # }
//! ```
//!
//! [FIFO]: https://en.wikipedia.org/wiki/FIFO_(computing_and_electronics)
//! [`free()`]: WorkerThread::free
//! [`unregister()`]: WorkerThread::unregister

// Enforce strict error handling in production library code only. Tests are allowed to
// use .unwrap() (workspace `Cargo.toml` config allows it).
#![cfg_attr(not(test), deny(clippy::unwrap_in_result))]

// Attach modules (re-exported below to provide clean public API).
pub mod log;
pub mod reactor;
pub mod work_queue;
pub mod worker;

// Re-export stable public API using glob imports for ergonomic, flat API surface.
pub use log::*;
pub use reactor::*;
pub use work_queue::*;
pub use worker::*;
