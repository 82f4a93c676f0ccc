// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

// cspell:words epoll kqueue reregister

//! Readiness driven event loop built on [`mio`]. See [`Reactor`] and [`ReactorObject`].
//!
//! # Level-Triggered Dispatch
//!
//! [`mio`] registers every source edge-triggered (`EPOLLET`): a source that is still
//! readable after its callback returns is not reported again until new data arrives.
//! Callers of this module expect level-triggered behavior instead; for example the
//! worker thread's queue callback consumes exactly one item per dispatch and relies on
//! being called again while items remain.
//!
//! [`Reactor`] bridges the two by re-arming a source with [`Registry::reregister()`]
//! after its callbacks run. Re-arming a source that is still ready queues a fresh event
//! immediately, so the next [`Poll::poll()`] reports it again:
//!
//! ```text
//! poll() ─► event(token) ─► read_ready() ─► still registered? ─► reregister(token)
//!   ▲                                                                   │
//!   └───────────── fd still readable → new event queued ◄───────────────┘
//! ```
//!
//! [`Poll::poll()`]: mio::Poll::poll
//! [`Registry::reregister()`]: mio::Registry::reregister

// Attach sources.
pub mod reactor_engine;
pub mod reactor_object;
pub mod reactor_types;

// Re-export.
pub use reactor_engine::*;
pub use reactor_object::*;
pub use reactor_types::*;
