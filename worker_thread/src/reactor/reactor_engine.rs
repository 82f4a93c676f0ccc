// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

// cspell:words EINTR epoll reregister

//! The event loop engine. See [`Reactor`] for details.

use super::{PollCreationError, ReactorCreationError, ReactorObject, ReactorStatus,
            STOP_WAKER_TOKEN, WakerCreationError};
use crate::DEBUG_WORKER_THREAD;
use mio::{Events, Poll, Registry, Token, Waker, event::Event, unix::SourceFd};
use std::{collections::{HashMap, hash_map::Entry},
          fmt::{Debug, Formatter},
          io::{self, ErrorKind},
          os::fd::AsRawFd,
          sync::{Arc, Mutex, MutexGuard, PoisonError,
                 atomic::{AtomicBool, Ordering}}};

/// Capacity for the [`mio::Events`] buffer.
const EVENTS_CAPACITY: usize = 64;

/// A readiness driven dispatcher: blocks in [`mio::Poll::poll()`] and invokes the
/// callbacks of registered [`ReactorObject`]s when their fds become ready.
///
/// # Thread Model
///
/// | Method                          | Callable from            |
/// | :------------------------------ | :----------------------- |
/// | [`start()`], [`run_once()`]     | the thread that owns it  |
/// | [`stop()`]                      | any thread               |
/// | [`register()`], [`unregister()`]| any thread (see below)   |
///
/// [`register()`] and [`unregister()`] are thread safe, but callers that need
/// "no callback fires after unregister" must call [`unregister()`] on the thread running
/// [`start()`]. [`WorkerThread`] guarantees this by funneling both through its work
/// queue.
///
/// # Stop
///
/// [`stop()`] sets a sticky flag and wakes the poll through a [`mio::Waker`]. The loop
/// finishes dispatching the current batch of events, then returns
/// [`ReactorStatus::Stop`]. A stop requested before [`start()`] makes the next
/// [`start()`] return immediately. The flag is cleared when it is observed, so the
/// reactor can be started again.
///
/// # Dispatch
///
/// See [Level-Triggered Dispatch] for how sources that stay ready keep getting
/// dispatched.
///
/// [Level-Triggered Dispatch]: super#level-triggered-dispatch
/// [`WorkerThread`]: crate::WorkerThread
/// [`register()`]: Self::register
/// [`run_once()`]: Self::run_once
/// [`start()`]: Self::start
/// [`stop()`]: Self::stop
/// [`unregister()`]: Self::unregister
pub struct Reactor {
    /// Locked for the duration of [`start()`](Self::start) / [`run_once()`](Self::run_once).
    poll: Mutex<Poll>,
    /// Cloned from the poll's registry so sources can be (un)registered while the poll
    /// is blocked.
    registry: Registry,
    stop_waker: Waker,
    is_stop_requested: AtomicBool,
    objects: Mutex<HashMap<Token, Arc<ReactorObject>>>,
}

impl Reactor {
    /// # Errors
    ///
    /// Returns [`ReactorCreationError`] if the epoll instance, its registry handle or
    /// the stop waker cannot be created.
    pub fn new() -> Result<Self, ReactorCreationError> {
        let poll = Poll::new().map_err(PollCreationError)?;
        let registry = poll.registry().try_clone().map_err(WakerCreationError)?;
        let stop_waker =
            Waker::new(poll.registry(), STOP_WAKER_TOKEN).map_err(WakerCreationError)?;
        Ok(Self {
            poll: Mutex::new(poll),
            registry,
            stop_waker,
            is_stop_requested: AtomicBool::new(false),
            objects: Mutex::new(HashMap::new()),
        })
    }

    /// Starts dispatching readiness for `object`.
    ///
    /// The object enters the dispatch table before its fd enters epoll. A poll running
    /// on another thread can report an fd that is already ready as soon as it is
    /// added, and sources are edge-triggered, so an event with no table entry would
    /// never be reported again.
    ///
    /// # Errors
    ///
    /// - [`ErrorKind::AlreadyExists`] if `object` is already registered.
    /// - The OS error if the fd can't be added to epoll, e.g. because it is closed.
    ///   The table entry is removed again.
    pub fn register(&self, object: &Arc<ReactorObject>) -> io::Result<()> {
        let token = object.id().to_token();
        match self.lock_objects().entry(token) {
            Entry::Occupied(_) => {
                return Err(io::Error::new(
                    ErrorKind::AlreadyExists,
                    "reactor object is already registered",
                ));
            }
            Entry::Vacant(slot) => {
                slot.insert(Arc::clone(object));
            }
        }

        if let Err(err) = self.registry.register(
            &mut SourceFd(&object.as_raw_fd()),
            token,
            object.interest().to_mio_interest(),
        ) {
            self.lock_objects().remove(&token);
            return Err(err);
        }

        DEBUG_WORKER_THREAD.then(|| {
            tracing::debug!(message = "reactor: registered object", object = ?object);
        });

        Ok(())
    }

    /// Stops dispatching readiness for `object`.
    ///
    /// The object is removed from the dispatch table before the fd is removed from
    /// epoll, so even if the OS call fails no further callback runs for it.
    ///
    /// # Errors
    ///
    /// Returns the OS error if the fd can't be removed from epoll (e.g. the caller
    /// already closed it).
    pub fn unregister(&self, object: &ReactorObject) -> io::Result<()> {
        let token = object.id().to_token();
        let removed = self.lock_objects().remove(&token);

        DEBUG_WORKER_THREAD.then(|| {
            tracing::debug!(
                message = "reactor: unregistered object",
                object = ?object,
                was_registered = removed.is_some()
            );
        });

        self.registry.deregister(&mut SourceFd(&object.as_raw_fd()))
    }

    #[must_use]
    pub fn is_registered(&self, object: &ReactorObject) -> bool {
        self.lock_objects().contains_key(&object.id().to_token())
    }

    #[must_use]
    pub fn registered_count(&self) -> usize { self.lock_objects().len() }

    /// Runs the event loop on the calling thread until [`stop()`](Self::stop).
    ///
    /// Returns [`ReactorStatus::Stop`] after a stop request, or [`ReactorStatus::Error`]
    /// if polling fails for a reason other than `EINTR`.
    pub fn start(&self) -> ReactorStatus {
        let mut poll = self.lock_poll();
        let mut events = Events::with_capacity(EVENTS_CAPACITY);
        loop {
            if let Some(status) = self.poll_and_dispatch(&mut poll, &mut events) {
                return status;
            }
        }
    }

    /// Waits for and dispatches a single batch of events.
    ///
    /// Returns [`ReactorStatus::Done`] after dispatching, [`ReactorStatus::Stop`] if a
    /// stop was requested, or [`ReactorStatus::Error`] if polling failed.
    pub fn run_once(&self) -> ReactorStatus {
        let mut poll = self.lock_poll();
        let mut events = Events::with_capacity(EVENTS_CAPACITY);
        self.poll_and_dispatch(&mut poll, &mut events)
            .unwrap_or(ReactorStatus::Done)
    }

    /// Asks the loop to return at its next opportunity. Never blocks. Idempotent.
    pub fn stop(&self) {
        self.is_stop_requested.store(true, Ordering::SeqCst);
        if let Err(err) = self.stop_waker.wake() {
            tracing::error!(message = "reactor: failed to wake poll for stop", error = ?err);
        }
    }

    /// One iteration. Returns [`Some`] when the loop should return.
    fn poll_and_dispatch(
        &self,
        poll: &mut Poll,
        events: &mut Events,
    ) -> Option<ReactorStatus> {
        if self.is_stop_requested.swap(false, Ordering::SeqCst) {
            return Some(ReactorStatus::Stop);
        }

        if let Err(err) = poll.poll(events, None) {
            // EINTR - retry (signal interrupted syscall).
            if err.kind() == ErrorKind::Interrupted {
                return None;
            }
            tracing::error!(message = "reactor: poll failed", error = ?err);
            return Some(ReactorStatus::Error);
        }

        for event in events.iter() {
            if event.token() != STOP_WAKER_TOKEN {
                self.dispatch(event);
            }
        }

        if self.is_stop_requested.swap(false, Ordering::SeqCst) {
            return Some(ReactorStatus::Stop);
        }
        None
    }

    fn dispatch(&self, event: &Event) {
        let token = event.token();

        // Looked up right before each callback: an object unregistered earlier in this
        // batch (or by its own read callback) must not be called.
        if event.is_readable() || event.is_read_closed() || event.is_error() {
            if let Some(object) = self.lookup(token) {
                object.notify_read_ready();
            }
        }
        if event.is_writable() || event.is_write_closed() {
            if let Some(object) = self.lookup(token) {
                object.notify_write_ready();
            }
        }

        // Re-armed under the table lock so a concurrent unregister (whose fd number may
        // already be reused by a newer registration) can't be re-added with a stale
        // token.
        let objects = self.lock_objects();
        if let Some(object) = objects.get(&token) {
            self.rearm(object);
        }
    }

    fn rearm(&self, object: &ReactorObject) {
        if let Err(err) = self.registry.reregister(
            &mut SourceFd(&object.as_raw_fd()),
            object.id().to_token(),
            object.interest().to_mio_interest(),
        ) {
            tracing::warn!(
                message = "reactor: failed to re-arm object",
                object = ?object,
                error = ?err
            );
        }
    }

    fn lookup(&self, token: Token) -> Option<Arc<ReactorObject>> {
        self.lock_objects().get(&token).cloned()
    }

    fn lock_objects(&self) -> MutexGuard<'_, HashMap<Token, Arc<ReactorObject>>> {
        // Callbacks never run under this lock; only the re-arm syscall does.
        self.objects.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_poll(&self) -> MutexGuard<'_, Poll> {
        // A callback that panicked poisons this lock; the poll itself is still usable.
        self.poll.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Debug for Reactor {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reactor")
            .field("registered_count", &self.registered_count())
            .field(
                "is_stop_requested",
                &self.is_stop_requested.load(Ordering::SeqCst),
            )
            .finish_non_exhaustive()
    }
}
