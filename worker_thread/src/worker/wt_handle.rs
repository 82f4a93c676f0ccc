// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

// cspell:words gettid

//! The owning handle of a worker thread. See [`WorkerThread`].

use super::{DEBUG_WORKER_THREAD, FullQueuePolicy, LivenessState, OsResourceFactory,
            OsThreadId, ResourceFactory, ResourceKind, ThreadName, WorkItem,
            WorkerLiveness, WorkerShared, WorkerThreadConfig, WorkerThreadError,
            run_worker_thread};
use crate::{EnqueueError, Reactor, ReactorObject};
use std::{fmt::{Debug, Formatter},
          sync::{Arc, mpsc},
          thread::{self, JoinHandle, ThreadId}};

/// One dedicated OS thread running a [`Reactor`], fed by a bounded work queue.
///
/// # Lifecycle
///
/// | Step                   | Caller blocks until                              |
/// | :--------------------- | :----------------------------------------------- |
/// | [`new()`]              | the thread is running, or failed and was joined  |
/// | [`post()`]             | there is room in the queue                       |
/// | [`register()`]         | the request is queued                            |
/// | [`unregister()`]       | the worker confirmed the source is detached      |
/// | [`stop()`]             | never blocks                                     |
/// | [`free()`] / [`Drop`]  | queued work was drained and the thread joined    |
///
/// # Ordering
///
/// Everything goes through one [FIFO] queue, so requests take effect in the order
/// they were made: a [`register()`] made before a [`post()`] is in effect when that
/// posted closure runs.
///
/// # Panics In Work
///
/// Work items are not isolated from each other. A panicking item ends the thread;
/// later posts fail with [`WorkerThreadError::OperationIgnored`], and [`free()`] logs
/// the panic instead of propagating it.
///
/// [FIFO]: https://en.wikipedia.org/wiki/FIFO_(computing_and_electronics)
/// [`free()`]: Self::free
/// [`new()`]: Self::new
/// [`post()`]: Self::post
/// [`register()`]: Self::register
/// [`stop()`]: Self::stop
/// [`unregister()`]: Self::unregister
pub struct WorkerThread {
    shared: Arc<WorkerShared>,
    tid: OsThreadId,
    thread_id: ThreadId,
    /// [`None`] once joined (or detached).
    join_handle: Option<JoinHandle<()>>,
}

impl WorkerThread {
    /// Creates a worker thread with [`WorkerThreadConfig::default()`] and real OS
    /// resources.
    ///
    /// # Errors
    ///
    /// See [`new_with_config()`](Self::new_with_config).
    pub fn new(name: &str) -> Result<Self, WorkerThreadError> {
        Self::new_with_config::<OsResourceFactory>(name, WorkerThreadConfig::default())
    }

    /// Creates the reactor and the work queue through `F`, spawns the thread, and
    /// waits for it to finish initializing.
    ///
    /// Names longer than [`THREAD_NAME_MAX`] bytes are truncated.
    ///
    /// # Errors
    ///
    /// - [`WorkerThreadError::InvalidName`] - `name` is empty or contains NUL.
    /// - [`WorkerThreadError::ResourceExhausted`] - a resource or the thread itself
    ///   could not be created. Anything already created is released.
    /// - [`WorkerThreadError::InitializationFailed`] - the thread could not set itself
    ///   up. It has been joined and everything it owned is released.
    ///
    /// [`THREAD_NAME_MAX`]: super::THREAD_NAME_MAX
    pub fn new_with_config<F: ResourceFactory>(
        name: &str,
        config: WorkerThreadConfig,
    ) -> Result<Self, WorkerThreadError> {
        let name = ThreadName::try_new(name)?;
        let reactor = F::create_reactor()?;
        let queue = F::create_work_queue(config.queue_capacity)?;
        let shared = Arc::new(WorkerShared {
            name: name.clone(),
            reactor,
            queue,
            liveness: WorkerLiveness::new(),
            config,
        });

        let (start_tx, start_rx) = mpsc::sync_channel(1);
        let join_handle = thread::Builder::new()
            .name(name.to_string())
            .spawn({
                let shared = Arc::clone(&shared);
                move || run_worker_thread::<F>(shared, start_tx)
            })
            .map_err(|source| WorkerThreadError::ResourceExhausted {
                resource: ResourceKind::Thread,
                source,
            })?;
        let thread_id = join_handle.thread().id();

        let report = match start_rx.recv() {
            Ok(Ok(tid)) => {
                DEBUG_WORKER_THREAD.then(|| {
                    tracing::debug!(message = "worker thread: started", thread = %name, tid = %tid);
                });
                return Ok(Self {
                    shared,
                    tid,
                    thread_id,
                    join_handle: Some(join_handle),
                });
            }
            Ok(Err(report)) => report,
            Err(mpsc::RecvError) => {
                miette::miette!("Thread exited before completing its start handshake")
            }
        };

        join_and_log(join_handle, &name);
        Err(WorkerThreadError::InitializationFailed { name, report })
    }

    /// Queues `work` to run on the worker thread.
    ///
    /// Blocks while the queue is full. When called from the worker thread itself on a
    /// full queue, the [`FullQueuePolicy`] in effect decides (fail fast by default).
    ///
    /// # Errors
    ///
    /// - [`WorkerThreadError::OperationIgnored`] - the thread has terminated. `work`
    ///   is dropped without running.
    /// - [`WorkerThreadError::QueueFullOnOwningThread`] - see [`FullQueuePolicy`].
    /// - [`WorkerThreadError::ResourceExhausted`] - the queue's readable signal
    ///   could not be raised.
    pub fn post(&self, work: impl FnOnce() + Send + 'static) -> Result<(), WorkerThreadError> {
        self.enqueue(WorkItem::new(work))
    }

    /// Attaches `object` to this thread's reactor. Asynchronous: the request is queued
    /// and applied on the worker thread. A failure to register there is logged.
    ///
    /// The caller keeps the resource behind the object's fd alive until the object has
    /// been [unregistered](Self::unregister).
    ///
    /// # Errors
    ///
    /// Same as [`post()`](Self::post).
    pub fn register(&self, object: &Arc<ReactorObject>) -> Result<(), WorkerThreadError> {
        let reactor = Arc::clone(&self.shared.reactor);
        let object = Arc::clone(object);
        let name = self.shared.name.clone();
        self.post(move || {
            if let Err(err) = reactor.register(&object) {
                tracing::error!(
                    message = "worker thread: failed to register object",
                    thread = %name,
                    object = ?object,
                    error = ?err
                );
            }
        })
    }

    /// Detaches `object` from this thread's reactor and waits until that is done.
    /// Once this returns `Ok`, none of the object's callbacks will run again.
    ///
    /// Called from the worker thread itself (e.g. from one of the object's own
    /// callbacks), the detach happens immediately.
    ///
    /// # Errors
    ///
    /// - Same as [`post()`](Self::post).
    /// - [`WorkerThreadError::UnregisterAbandoned`] - the thread terminated with the
    ///   request still queued.
    pub fn unregister(&self, object: &Arc<ReactorObject>) -> Result<(), WorkerThreadError> {
        if self.is_self() {
            unregister_logged(&self.shared.reactor, object, &self.shared.name);
            return Ok(());
        }

        let (reply_tx, reply_rx) = mpsc::sync_channel(1);
        self.post_unregister(object, move || {
            reply_tx.send(()).ok();
        })?;
        reply_rx
            .recv()
            .map_err(|_| WorkerThreadError::UnregisterAbandoned {
                name: self.shared.name.clone(),
            })
    }

    /// Like [`unregister()`](Self::unregister), but suspends instead of blocking while
    /// waiting for the confirmation.
    ///
    /// Queueing the request can still block if the work queue is full.
    ///
    /// # Errors
    ///
    /// Same as [`unregister()`](Self::unregister).
    pub async fn unregister_async(
        &self,
        object: &Arc<ReactorObject>,
    ) -> Result<(), WorkerThreadError> {
        if self.is_self() {
            unregister_logged(&self.shared.reactor, object, &self.shared.name);
            return Ok(());
        }

        let (reply_tx, reply_rx) = tokio::sync::oneshot::channel();
        self.post_unregister(object, move || {
            reply_tx.send(()).ok();
        })?;
        reply_rx
            .await
            .map_err(|_| WorkerThreadError::UnregisterAbandoned {
                name: self.shared.name.clone(),
            })
    }

    /// Asks the reactor loop to exit. Never blocks, does not wait for queued work.
    /// Idempotent. Work still queued runs during the drain in [`free()`](Self::free).
    pub fn stop(&self) {
        self.shared.liveness.advance_to(LivenessState::Stopping);
        self.shared.reactor.stop();
    }

    /// Stops the thread, lets it drain queued work (up to the configured drain limit),
    /// and joins it. Items left over after the drain are dropped without running.
    ///
    /// Same as dropping the handle.
    pub fn free(mut self) { self.shutdown(); }

    #[must_use]
    pub fn name(&self) -> &ThreadName { &self.shared.name }

    /// The reactor this thread runs. Use it to inspect registrations; attach and
    /// detach sources through [`register()`](Self::register) and
    /// [`unregister()`](Self::unregister).
    #[must_use]
    pub fn reactor(&self) -> &Arc<Reactor> { &self.shared.reactor }

    /// Kernel thread id, as seen by `ps -L`.
    #[must_use]
    pub fn tid(&self) -> OsThreadId { self.tid }

    /// `true` when called from this worker thread.
    #[must_use]
    pub fn is_self(&self) -> bool { thread::current().id() == self.thread_id }

    #[must_use]
    pub fn liveness(&self) -> LivenessState { self.shared.liveness.get() }

    #[must_use]
    pub fn config(&self) -> &WorkerThreadConfig { &self.shared.config }

    /// Number of items queued and not yet picked up by the worker thread.
    #[must_use]
    pub fn pending_work(&self) -> usize { self.shared.queue.len() }

    fn enqueue(&self, item: WorkItem) -> Result<(), WorkerThreadError> {
        if !self.shared.liveness.get().is_accepting_work() {
            return Err(self.operation_ignored());
        }

        let fail_fast = self.shared.config.full_queue_on_owning_thread
            == FullQueuePolicy::FailFast
            && self.is_self();
        let result = if fail_fast {
            self.shared.queue.try_enqueue(item)
        } else {
            self.shared.queue.enqueue(item)
        };

        result.map_err(|err| match err {
            EnqueueError::Full(_) => WorkerThreadError::QueueFullOnOwningThread {
                name: self.shared.name.clone(),
            },
            EnqueueError::Closed(_) => self.operation_ignored(),
            EnqueueError::Signal(_, source) => WorkerThreadError::ResourceExhausted {
                resource: ResourceKind::WorkQueue,
                source,
            },
        })
    }

    fn post_unregister(
        &self,
        object: &Arc<ReactorObject>,
        on_done: impl FnOnce() + Send + 'static,
    ) -> Result<(), WorkerThreadError> {
        let reactor = Arc::clone(&self.shared.reactor);
        let object = Arc::clone(object);
        let name = self.shared.name.clone();
        self.post(move || {
            unregister_logged(&reactor, &object, &name);
            on_done();
        })
    }

    fn operation_ignored(&self) -> WorkerThreadError {
        WorkerThreadError::OperationIgnored {
            name: self.shared.name.clone(),
            state: self.shared.liveness.get(),
        }
    }

    fn shutdown(&mut self) {
        self.stop();
        let Some(join_handle) = self.join_handle.take() else {
            return;
        };

        // Dropped from one of its own work items: joining would wait on ourselves. The
        // thread drains and tears down once the current item returns.
        if self.is_self() {
            DEBUG_WORKER_THREAD.then(|| {
                tracing::debug!(
                    message = "worker thread: handle dropped on its own thread, detaching",
                    thread = %self.shared.name
                );
            });
            return;
        }

        join_and_log(join_handle, &self.shared.name);
    }
}

impl Drop for WorkerThread {
    fn drop(&mut self) { self.shutdown(); }
}

impl Debug for WorkerThread {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerThread")
            .field("name", &self.shared.name)
            .field("tid", &self.tid)
            .field("liveness", &self.shared.liveness.get())
            .field("queue", &self.shared.queue)
            .finish_non_exhaustive()
    }
}

/// Removal from the dispatch table can't fail, so the object is detached even when
/// the OS deregistration reports an error.
fn unregister_logged(reactor: &Reactor, object: &ReactorObject, name: &ThreadName) {
    if let Err(err) = reactor.unregister(object) {
        tracing::warn!(
            message = "worker thread: OS deregistration failed",
            thread = %name,
            object = ?object,
            error = ?err
        );
    }
}

fn join_and_log(join_handle: JoinHandle<()>, name: &ThreadName) {
    if join_handle.join().is_err() {
        tracing::error!(
            message = "worker thread: thread panicked, panic was not propagated",
            thread = %name
        );
    }
}
