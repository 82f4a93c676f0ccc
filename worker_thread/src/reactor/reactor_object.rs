// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! Event source descriptor registered with a [`Reactor`]. See [`ReactorObject`].
//!
//! [`Reactor`]: super::Reactor

use super::{ReactorInterest, ReactorObjectId};
use std::{fmt::{Debug, Formatter},
          os::fd::{AsFd, AsRawFd, RawFd},
          sync::{Arc,
                 atomic::{AtomicUsize, Ordering}}};

/// Callback invoked on the reactor's thread when a source becomes ready.
pub type ReadyCallback = Box<dyn Fn() + Send + Sync + 'static>;

/// Ids start at `1`; `0` is [`STOP_WAKER_TOKEN`].
///
/// [`STOP_WAKER_TOKEN`]: super::STOP_WAKER_TOKEN
static NEXT_OBJECT_ID: AtomicUsize = AtomicUsize::new(1);

/// A waitable handle plus the callbacks to run when it becomes ready.
///
/// # Ownership
///
/// The object only *refers* to its fd. Whoever built the object keeps the resource
/// behind the fd alive until the object has been unregistered; closing the fd while
/// it is still registered leaves a stale registration behind.
///
/// Objects are shared as [`Arc<ReactorObject>`]. While registered, the [`Reactor`]
/// holds one clone so it can dispatch; [`Reactor::unregister()`] drops that clone.
///
/// # Callbacks
///
/// Callbacks run on the thread executing [`Reactor::start()`] and must not block,
/// since nothing else on that reactor runs until they return. They are [`Fn`], so
/// state they mutate lives behind an atomic or a lock.
///
/// [`Arc<ReactorObject>`]: std::sync::Arc
/// [`Reactor::start()`]: super::Reactor::start
/// [`Reactor::unregister()`]: super::Reactor::unregister
/// [`Reactor`]: super::Reactor
pub struct ReactorObject {
    id: ReactorObjectId,
    fd: RawFd,
    interest: ReactorInterest,
    read_ready: Option<ReadyCallback>,
    write_ready: Option<ReadyCallback>,
}

impl ReactorObject {
    /// An object interested in read readiness of `fd`.
    pub fn readable(
        fd: &impl AsFd,
        read_ready: impl Fn() + Send + Sync + 'static,
    ) -> Arc<Self> {
        Self::build(fd, ReactorInterest::Read, Some(Box::new(read_ready)), None)
    }

    /// An object interested in write readiness of `fd`.
    pub fn writable(
        fd: &impl AsFd,
        write_ready: impl Fn() + Send + Sync + 'static,
    ) -> Arc<Self> {
        Self::build(fd, ReactorInterest::Write, None, Some(Box::new(write_ready)))
    }

    /// An object interested in both read and write readiness of `fd`.
    pub fn read_write(
        fd: &impl AsFd,
        read_ready: impl Fn() + Send + Sync + 'static,
        write_ready: impl Fn() + Send + Sync + 'static,
    ) -> Arc<Self> {
        Self::build(
            fd,
            ReactorInterest::ReadWrite,
            Some(Box::new(read_ready)),
            Some(Box::new(write_ready)),
        )
    }

    fn build(
        fd: &impl AsFd,
        interest: ReactorInterest,
        read_ready: Option<ReadyCallback>,
        write_ready: Option<ReadyCallback>,
    ) -> Arc<Self> {
        Arc::new(Self {
            id: ReactorObjectId(NEXT_OBJECT_ID.fetch_add(1, Ordering::Relaxed)),
            fd: fd.as_fd().as_raw_fd(),
            interest,
            read_ready,
            write_ready,
        })
    }

    #[must_use]
    pub fn id(&self) -> ReactorObjectId { self.id }

    #[must_use]
    pub fn interest(&self) -> ReactorInterest { self.interest }

    pub(super) fn notify_read_ready(&self) {
        if let Some(callback) = &self.read_ready {
            callback();
        }
    }

    pub(super) fn notify_write_ready(&self) {
        if let Some(callback) = &self.write_ready {
            callback();
        }
    }
}

impl AsRawFd for ReactorObject {
    fn as_raw_fd(&self) -> RawFd { self.fd }
}

impl Debug for ReactorObject {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReactorObject")
            .field("id", &self.id)
            .field("fd", &self.fd)
            .field("interest", &self.interest)
            .finish_non_exhaustive()
    }
}
