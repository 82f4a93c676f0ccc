// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! Value types shared by [`Reactor`] and [`ReactorObject`].
//!
//! [`Reactor`]: super::Reactor
//! [`ReactorObject`]: super::ReactorObject

use miette::Diagnostic;
use mio::{Interest, Token};

/// Why [`Reactor::start()`] or [`Reactor::run_once()`] returned.
///
/// [`Reactor::run_once()`]: super::Reactor::run_once
/// [`Reactor::start()`]: super::Reactor::start
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReactorStatus {
    /// [`Reactor::stop()`] was called.
    ///
    /// [`Reactor::stop()`]: super::Reactor::stop
    Stop,
    /// The underlying [`mio::Poll`] failed with a non-`EINTR` error.
    Error,
    /// [`Reactor::run_once()`] dispatched one batch of events.
    ///
    /// [`Reactor::run_once()`]: super::Reactor::run_once
    Done,
}

/// Which readiness a [`ReactorObject`] is interested in. Derived from the callbacks it
/// was built with.
///
/// [`ReactorObject`]: super::ReactorObject
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReactorInterest {
    Read,
    Write,
    ReadWrite,
}

impl ReactorInterest {
    #[must_use]
    pub const fn to_mio_interest(self) -> Interest {
        match self {
            Self::Read => Interest::READABLE,
            Self::Write => Interest::WRITABLE,
            Self::ReadWrite => Interest::READABLE.add(Interest::WRITABLE),
        }
    }
}

/// Process unique identity of a [`ReactorObject`]. Doubles as its [`mio::Token`].
///
/// Id `0` is never handed out; the reactor uses [`STOP_WAKER_TOKEN`] for its own
/// [`mio::Waker`].
///
/// [`ReactorObject`]: super::ReactorObject
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ReactorObjectId(pub usize);

impl ReactorObjectId {
    #[must_use]
    pub const fn to_token(self) -> Token { Token(self.0) }
}

/// Token of the reactor's internal stop [`mio::Waker`].
pub const STOP_WAKER_TOKEN: Token = Token(0);

/// Failed to create [`mio::Poll`] (epoll creation failed).
#[derive(Debug, thiserror::Error, Diagnostic)]
#[error("Failed to create mio::Poll")]
#[diagnostic(
    code(worker_thread::reactor::poll_creation),
    help("This usually means the process ran out of file descriptors")
)]
pub struct PollCreationError(#[source] pub std::io::Error);

/// Failed to create the reactor's stop [`mio::Waker`] or its registry handle.
#[derive(Debug, thiserror::Error, Diagnostic)]
#[error("Failed to create mio::Waker")]
#[diagnostic(
    code(worker_thread::reactor::waker_creation),
    help("This usually means the process ran out of file descriptors")
)]
pub struct WakerCreationError(#[source] pub std::io::Error);

/// Errors from [`Reactor::new()`].
///
/// [`Reactor::new()`]: super::Reactor::new
#[derive(Debug, thiserror::Error, Diagnostic)]
pub enum ReactorCreationError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Poll(#[from] PollCreationError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Waker(#[from] WakerCreationError),
}

impl ReactorCreationError {
    #[must_use]
    pub fn into_io_error(self) -> std::io::Error {
        match self {
            Self::Poll(PollCreationError(err)) | Self::Waker(WakerCreationError(err)) => {
                err
            }
        }
    }
}
