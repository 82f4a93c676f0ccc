// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! Tests that drive a real [`WorkerThread`] through its whole lifecycle.
//!
//! - [`wt_lifecycle_tests`]: posting, ordering, drain on free, panics, self posts.
//! - [`wt_registration_tests`]: attaching and detaching [`ReactorObject`]s.
//! - [`wt_factory_tests`]: failure injection and resource accounting through a test
//!   [`ResourceFactory`]. These share static state and run [`serial`].
//!
//! [`ReactorObject`]: crate::ReactorObject
//! [`ResourceFactory`]: super::ResourceFactory
//! [`WorkerThread`]: super::WorkerThread
//! [`serial`]: serial_test::serial

mod wt_lifecycle_tests;

use super::WorkerThread;
use std::{sync::mpsc,
          thread,
          time::{Duration, Instant}};

/// Generous upper bound for anything a test waits on.
const WAIT_TIMEOUT: Duration = Duration::from_secs(5);

/// Polls `condition` until it holds. Panics after [`WAIT_TIMEOUT`].
fn wait_until(what: &str, condition: impl Fn() -> bool) {
    let start = Instant::now();
    while !condition() {
        assert!(start.elapsed() < WAIT_TIMEOUT, "timed out waiting for {what}");
        thread::sleep(Duration::from_millis(2));
    }
}

/// Holds the worker inside a work item until released, so tests can queue work
/// behind it deterministically.
struct Gate {
    release_tx: mpsc::Sender<()>,
}

impl Gate {
    /// Posts the blocking item and waits until the worker is inside it (so the queue is
    /// empty again).
    fn close_on(thread: &WorkerThread) -> Self {
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let (entered_tx, entered_rx) = mpsc::channel::<()>();
        thread
            .post(move || {
                entered_tx.send(()).ok();
                release_rx.recv().ok();
            })
            .unwrap();
        entered_rx.recv_timeout(WAIT_TIMEOUT).unwrap();
        Self { release_tx }
    }

    fn open(self) { self.release_tx.send(()).ok(); }
}
