// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

// cspell:words eventfd epoll

//! [Dependency injection] seam for the OS resources a worker thread owns. See
//! [`ResourceFactory`].
//!
//! [Dependency injection]: https://en.wikipedia.org/wiki/Dependency_injection

use super::{ResourceKind, ThreadStartInfo, WorkQueue, WorkerThreadError};
use crate::{QueueCreationError, Reactor};
use std::{io, sync::Arc};

/// Creates the reactor and work queue for [`WorkerThread::new_with_config()`], and gets
/// a hook on the spawned thread before its loop starts.
///
/// All functions are associated (no `self`), like a constructor table: the factory is
/// chosen at compile time as a type parameter, and production code pays nothing for
/// the indirection. Tests implement it to inject failures and to keep [`Weak`]
/// references for resource accounting.
///
/// | Function                | Runs on         | Failure becomes                             |
/// | :---------------------- | :-------------- | :------------------------------------------ |
/// | [`create_reactor()`]    | creating thread | [`WorkerThreadError::ResourceExhausted`]    |
/// | [`create_work_queue()`] | creating thread | [`WorkerThreadError::ResourceExhausted`]    |
/// | [`on_thread_start()`]   | worker thread   | [`WorkerThreadError::InitializationFailed`] |
///
/// [`Weak`]: std::sync::Weak
/// [`WorkerThread::new_with_config()`]: super::WorkerThread::new_with_config
/// [`create_reactor()`]: Self::create_reactor
/// [`create_work_queue()`]: Self::create_work_queue
/// [`on_thread_start()`]: Self::on_thread_start
pub trait ResourceFactory: 'static {
    /// # Errors
    ///
    /// Returns [`WorkerThreadError::ResourceExhausted`] if the [`epoll`] instance or
    /// its stop waker can't be created.
    ///
    /// [`epoll`]: https://man7.org/linux/man-pages/man7/epoll.7.html
    fn create_reactor() -> Result<Arc<Reactor>, WorkerThreadError> { create_os_reactor() }

    /// # Errors
    ///
    /// Returns [`WorkerThreadError::ResourceExhausted`] if the queue's [`eventfd`]
    /// can't be created or `capacity` is zero.
    ///
    /// [`eventfd`]: https://man7.org/linux/man-pages/man2/eventfd.2.html
    fn create_work_queue(capacity: usize) -> Result<Arc<WorkQueue>, WorkerThreadError> {
        create_os_work_queue(capacity)
    }

    /// Runs on the new thread after it has named itself and registered its work queue,
    /// right before the reactor loop starts. An error aborts the start: the thread
    /// exits without running its loop.
    ///
    /// # Errors
    ///
    /// Any error is reported to the creator as
    /// [`WorkerThreadError::InitializationFailed`].
    fn on_thread_start(_info: &ThreadStartInfo) -> miette::Result<()> { Ok(()) }
}

/// The production factory: a real [`Reactor`] and [`WorkQueue`], no start hook.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsResourceFactory;

impl ResourceFactory for OsResourceFactory {}

/// # Errors
///
/// See [`ResourceFactory::create_reactor()`].
pub fn create_os_reactor() -> Result<Arc<Reactor>, WorkerThreadError> {
    Reactor::new()
        .map(Arc::new)
        .map_err(|err| WorkerThreadError::ResourceExhausted {
            resource: ResourceKind::Reactor,
            source: err.into_io_error(),
        })
}

/// # Errors
///
/// See [`ResourceFactory::create_work_queue()`].
pub fn create_os_work_queue(capacity: usize) -> Result<Arc<WorkQueue>, WorkerThreadError> {
    WorkQueue::new(capacity).map(Arc::new).map_err(|err| {
        let source = match err {
            QueueCreationError::Signal(signal_err) => signal_err.0,
            zero @ QueueCreationError::ZeroCapacity => {
                io::Error::new(io::ErrorKind::InvalidInput, zero)
            }
        };
        WorkerThreadError::ResourceExhausted {
            resource: ResourceKind::WorkQueue,
            source,
        }
    })
}
