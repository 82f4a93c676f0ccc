// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

// cspell:words eventfd EAGAIN CLOEXEC

//! Counting readiness signal backed by an [`eventfd`]. See [`QueueSignal`].
//!
//! [`eventfd`]: https://man7.org/linux/man-pages/man2/eventfd.2.html

use miette::Diagnostic;
use rustix::{event::{EventfdFlags, eventfd},
             io::Errno};
use std::{io,
          os::fd::{AsFd, AsRawFd, BorrowedFd, OwnedFd, RawFd}};

/// A counting signal whose file descriptor is readable while the count is non-zero.
///
/// The [`eventfd`] is created in semaphore mode, so each [`try_take()`] decrements the
/// count by exactly one. [`FixedQueue`] keeps this count equal to the number of queued
/// items, which is what lets a reactor treat "queue has data" as plain fd readiness.
///
/// The fd is non-blocking. [`try_take()`] never blocks; it reports `false` when the
/// count is zero.
///
/// [`FixedQueue`]: super::FixedQueue
/// [`eventfd`]: https://man7.org/linux/man-pages/man2/eventfd.2.html
/// [`try_take()`]: Self::try_take
#[derive(Debug)]
pub struct QueueSignal {
    fd: OwnedFd,
}

/// Failed to create the [`eventfd`] backing a [`QueueSignal`].
///
/// [`eventfd`]: https://man7.org/linux/man-pages/man2/eventfd.2.html
#[derive(Debug, thiserror::Error, Diagnostic)]
#[error("Failed to create eventfd for queue signal")]
#[diagnostic(
    code(worker_thread::queue::eventfd_creation),
    help("This usually means the process ran out of file descriptors")
)]
pub struct EventFdCreationError(#[source] pub io::Error);

impl QueueSignal {
    /// # Errors
    ///
    /// Returns [`EventFdCreationError`] if the [`eventfd`] cannot be created.
    ///
    /// [`eventfd`]: https://man7.org/linux/man-pages/man2/eventfd.2.html
    pub fn new() -> Result<Self, EventFdCreationError> {
        let flags = EventfdFlags::CLOEXEC | EventfdFlags::NONBLOCK | EventfdFlags::SEMAPHORE;
        let fd = eventfd(0, flags).map_err(|errno| EventFdCreationError(errno.into()))?;
        Ok(Self { fd })
    }

    /// Increments the count by one, making the fd readable.
    ///
    /// # Errors
    ///
    /// Returns an error if the write to the [`eventfd`] fails. This only happens if the
    /// count would overflow `u64::MAX - 1`.
    ///
    /// [`eventfd`]: https://man7.org/linux/man-pages/man2/eventfd.2.html
    pub fn post(&self) -> io::Result<()> {
        rustix::io::write(&self.fd, &1_u64.to_ne_bytes())?;
        Ok(())
    }

    /// Decrements the count by one if it is non-zero.
    ///
    /// Returns `true` if a unit was taken, `false` if the count was already zero.
    ///
    /// # Errors
    ///
    /// Returns an error for any read failure other than `EAGAIN`.
    pub fn try_take(&self) -> io::Result<bool> {
        let mut buf = [0_u8; 8];
        match rustix::io::read(&self.fd, &mut buf[..]) {
            Ok(_) => Ok(true),
            Err(errno) if errno == Errno::AGAIN => Ok(false),
            Err(errno) => Err(errno.into()),
        }
    }
}

impl AsFd for QueueSignal {
    fn as_fd(&self) -> BorrowedFd<'_> { self.fd.as_fd() }
}

impl AsRawFd for QueueSignal {
    fn as_raw_fd(&self) -> RawFd { self.fd.as_raw_fd() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_take_on_fresh_signal_is_empty() {
        let signal = QueueSignal::new().unwrap();
        assert!(!signal.try_take().unwrap());
    }

    #[test]
    fn test_semaphore_mode_takes_one_unit_at_a_time() {
        let signal = QueueSignal::new().unwrap();
        signal.post().unwrap();
        signal.post().unwrap();
        signal.post().unwrap();

        assert!(signal.try_take().unwrap());
        assert!(signal.try_take().unwrap());
        assert!(signal.try_take().unwrap());
        assert!(!signal.try_take().unwrap());
    }
}
