// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

// cspell:words gettid

//! Code that runs on the dedicated thread: self-initialization, the reactor loop, the
//! shutdown drain, and the [RAII] teardown in [`TerminationGuard`].
//!
//! [RAII]: https://en.wikipedia.org/wiki/Resource_acquisition_is_initialization

use super::{DEBUG_WORKER_THREAD, LivenessState, OsThreadId, ResourceFactory, ThreadName,
            ThreadStartInfo, WorkQueue, WorkerLiveness, WorkerThreadConfig};
use crate::{Reactor, ReactorObject, ReactorStatus};
use miette::{IntoDiagnostic, WrapErr};
use std::sync::{Arc, mpsc::SyncSender};

/// One-shot channel the spawned thread answers the creator on.
pub(super) type StartHandshake = SyncSender<Result<OsThreadId, miette::Report>>;

/// State shared by a [`WorkerThread`] handle and the thread it owns.
///
/// [`WorkerThread`]: super::WorkerThread
#[derive(Debug)]
pub(super) struct WorkerShared {
    pub name: ThreadName,
    pub reactor: Arc<Reactor>,
    pub queue: Arc<WorkQueue>,
    pub liveness: WorkerLiveness,
    pub config: WorkerThreadConfig,
}

/// Runs on the worker thread's exit, including unwinding out of a panicking work
/// item.
///
/// 1. Marks the thread [`Terminated`], so new posts fail fast.
/// 2. Closes the queue, which wakes producers blocked on a full queue, and drops every
///    item left in it without running it.
/// 3. Unregisters the queue's own reactor object, whose callback holds a clone of the
///    queue.
///
/// [`Terminated`]: LivenessState::Terminated
struct TerminationGuard {
    shared: Arc<WorkerShared>,
    queue_object: Option<Arc<ReactorObject>>,
}

impl Drop for TerminationGuard {
    fn drop(&mut self) {
        self.shared.liveness.advance_to(LivenessState::Terminated);

        let discarded = self.shared.queue.close_and_take_all();
        if !discarded.is_empty() {
            tracing::warn!(
                message = "worker thread: discarding work that never ran",
                thread = %self.shared.name,
                count = discarded.len()
            );
        }
        drop(discarded);

        if let Some(queue_object) = self.queue_object.take() {
            if let Err(err) = self.shared.reactor.unregister(&queue_object) {
                tracing::warn!(
                    message = "worker thread: failed to unregister work queue",
                    thread = %self.shared.name,
                    error = ?err
                );
            }
        }

        DEBUG_WORKER_THREAD.then(|| {
            tracing::debug!(message = "worker thread: terminated", thread = %self.shared.name);
        });
    }
}

/// The body of the dedicated thread.
///
/// ```text
/// initialize ──ok──► handshake(Ok) ──► reactor.start() ──► drain ──► guard drop
///     │
///     └──err──► handshake(Err) ──────────────────────────────────► guard drop
/// ```
pub(super) fn run_worker_thread<F: ResourceFactory>(
    shared: Arc<WorkerShared>,
    start_handshake: StartHandshake,
) {
    let mut guard = TerminationGuard {
        shared: Arc::clone(&shared),
        queue_object: None,
    };

    let tid = match initialize::<F>(&shared, &mut guard) {
        Ok(tid) => tid,
        Err(report) => {
            // The creator is blocked on this reply; it joins us next.
            start_handshake.send(Err(report)).ok();
            return;
        }
    };

    shared.liveness.advance_to(LivenessState::Running);
    if start_handshake.send(Ok(tid)).is_err() {
        return;
    }
    drop(start_handshake);

    DEBUG_WORKER_THREAD.then(|| {
        tracing::debug!(message = "worker thread: running", thread = %shared.name, tid = %tid);
    });

    let status = shared.reactor.start();
    shared.liveness.advance_to(LivenessState::Stopping);
    if status == ReactorStatus::Error {
        tracing::error!(
            message = "worker thread: reactor failed, shutting down",
            thread = %shared.name
        );
    }

    drain(&shared);
}

/// Learns the OS thread id, wires the work queue into the reactor, then runs the
/// factory hook.
fn initialize<F: ResourceFactory>(
    shared: &WorkerShared,
    guard: &mut TerminationGuard,
) -> miette::Result<OsThreadId> {
    let tid = OsThreadId::current();

    // Each readiness dispatch runs exactly one item; the reactor re-arms the fd while
    // items remain.
    let queue_object = ReactorObject::readable(&shared.queue.dequeue_fd(), {
        let queue = Arc::clone(&shared.queue);
        move || {
            if let Some(item) = queue.try_dequeue() {
                item.run();
            }
        }
    });
    shared
        .reactor
        .register(&queue_object)
        .into_diagnostic()
        .wrap_err("Failed to register the work queue with the reactor")?;
    guard.queue_object = Some(queue_object);

    F::on_thread_start(&ThreadStartInfo {
        name: shared.name.clone(),
        tid,
    })?;

    Ok(tid)
}

/// Runs what is still queued after the reactor stopped, up to the drain limit.
fn drain(shared: &WorkerShared) {
    let limit = shared.config.effective_drain_limit();
    let mut ran = 0;
    while ran < limit {
        let Some(item) = shared.queue.try_dequeue() else {
            break;
        };
        item.run();
        ran += 1;
    }

    let left_behind = shared.queue.len();
    if left_behind > 0 {
        tracing::warn!(
            message = "worker thread: drain limit reached on shutdown",
            thread = %shared.name,
            drain_limit = limit,
            left_behind
        );
    }

    DEBUG_WORKER_THREAD.then(|| {
        tracing::debug!(message = "worker thread: drained", thread = %shared.name, ran);
    });
}
