// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

// cspell:words maxfiles taskthreads gettid prctl

//! Public API types for the worker thread. See [`WorkerThreadError`], [`ThreadName`]
//! and [`ThreadStartInfo`] for details.

use super::LivenessState;
use miette::Diagnostic;
use smallstr::SmallString;
use std::fmt::{Display, Formatter};

/// Maximum length of a [`ThreadName`] in bytes.
///
/// Linux keeps 15 bytes of a thread's name (plus the NUL terminator); the full name is
/// still used in logs and diagnostics.
pub const THREAD_NAME_MAX: usize = 16;

/// Stack allocated, bounded length name of a worker thread.
///
/// Longer names are truncated to [`THREAD_NAME_MAX`] bytes (on a `char` boundary).
/// Empty names and names containing NUL bytes are rejected, since the OS can't carry
/// them.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ThreadName(SmallString<[u8; THREAD_NAME_MAX]>);

impl ThreadName {
    /// # Errors
    ///
    /// Returns [`WorkerThreadError::InvalidName`] for an empty name or one that contains
    /// a NUL byte.
    pub fn try_new(name: &str) -> Result<Self, WorkerThreadError> {
        let reason = if name.is_empty() {
            Some("name is empty")
        } else if name.contains('\0') {
            Some("name contains a NUL byte")
        } else {
            None
        };
        if let Some(reason) = reason {
            return Err(WorkerThreadError::InvalidName {
                name: name.to_owned(),
                reason,
            });
        }

        let mut end = name.len().min(THREAD_NAME_MAX);
        while !name.is_char_boundary(end) {
            end -= 1;
        }
        Ok(Self(SmallString::from_str(&name[..end])))
    }

    #[must_use]
    pub fn as_str(&self) -> &str { &self.0 }
}

impl Display for ThreadName {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result { f.write_str(&self.0) }
}

/// Kernel thread id ([`gettid(2)`]) of a worker thread, as shown by `ps -L` and `top -H`.
///
/// [`gettid(2)`]: https://man7.org/linux/man-pages/man2/gettid.2.html
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OsThreadId(pub i32);

impl OsThreadId {
    /// Id of the calling thread.
    #[must_use]
    pub fn current() -> Self { Self(rustix::thread::gettid().as_raw_nonzero().get()) }
}

impl Display for OsThreadId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result { write!(f, "{}", self.0) }
}

/// What the spawned thread learned about itself during self-initialization. Passed to
/// [`ResourceFactory::on_thread_start()`] on the new thread; only the [`OsThreadId`]
/// travels back to the creator through the start handshake.
///
/// [`ResourceFactory::on_thread_start()`]: super::ResourceFactory::on_thread_start
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadStartInfo {
    pub name: ThreadName,
    pub tid: OsThreadId,
}

/// Which OS resource a [`WorkerThreadError::ResourceExhausted`] failed to create.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Reactor,
    WorkQueue,
    Thread,
}

impl Display for ResourceKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Reactor => f.write_str("reactor"),
            Self::WorkQueue => f.write_str("work queue"),
            Self::Thread => f.write_str("OS thread"),
        }
    }
}

/// Errors from [`WorkerThread`] operations.
///
/// | Variant                     | Raised by                             | Thread state after     |
/// | :-------------------------- | :------------------------------------ | :--------------------- |
/// | [`InvalidName`]             | [`new()`]                             | never created          |
/// | [`ResourceExhausted`]       | [`new()`], [`post()`]                 | never created / intact |
/// | [`InitializationFailed`]    | [`new()`]                             | spawned, then joined   |
/// | [`OperationIgnored`]        | [`post()`], [`register()`], ...       | terminated             |
/// | [`QueueFullOnOwningThread`] | [`post()`] from the worker itself     | intact                 |
/// | [`UnregisterAbandoned`]     | [`unregister()`]                      | terminated             |
///
/// [`InitializationFailed`]: Self::InitializationFailed
/// [`InvalidName`]: Self::InvalidName
/// [`OperationIgnored`]: Self::OperationIgnored
/// [`QueueFullOnOwningThread`]: Self::QueueFullOnOwningThread
/// [`ResourceExhausted`]: Self::ResourceExhausted
/// [`UnregisterAbandoned`]: Self::UnregisterAbandoned
/// [`WorkerThread`]: super::WorkerThread
/// [`new()`]: super::WorkerThread::new
/// [`post()`]: super::WorkerThread::post
/// [`register()`]: super::WorkerThread::register
/// [`unregister()`]: super::WorkerThread::unregister
#[derive(Debug, thiserror::Error, Diagnostic)]
pub enum WorkerThreadError {
    #[error("Invalid worker thread name {name:?}: {reason}")]
    #[diagnostic(
        code(worker_thread::invalid_name),
        help("Use a short, non-empty name without NUL bytes, e.g. \"hci_thread\"")
    )]
    InvalidName { name: String, reason: &'static str },

    #[error("Failed to create {resource} for worker thread")]
    #[diagnostic(code(worker_thread::resource_exhausted))]
    #[cfg_attr(
        target_os = "linux",
        diagnostic(help(
            "Check OS resource limits - \
             use `ulimit -n` for file descriptors, \
             `ulimit -u` and `cat /proc/sys/kernel/threads-max` for threads"
        ))
    )]
    #[cfg_attr(
        target_os = "macos",
        diagnostic(help(
            "Check OS resource limits - \
             use `ulimit -n` for file descriptors, \
             `sysctl kern.num_taskthreads` for threads"
        ))
    )]
    ResourceExhausted {
        resource: ResourceKind,
        #[source]
        source: std::io::Error,
    },

    #[error("Worker thread {name} failed to initialize: {report}")]
    #[diagnostic(
        code(worker_thread::initialization_failed),
        help("The thread was joined and all of its resources were released")
    )]
    InitializationFailed {
        name: ThreadName,
        report: miette::Report,
    },

    #[error("Worker thread {name} is {state:?} and no longer accepts work")]
    #[diagnostic(
        code(worker_thread::operation_ignored),
        help("The work was dropped without running")
    )]
    OperationIgnored {
        name: ThreadName,
        state: LivenessState,
    },

    #[error("Work queue of worker thread {name} is full and the post came from that thread")]
    #[diagnostic(
        code(worker_thread::queue_full_on_owning_thread),
        help(
            "Blocking here would deadlock, since the only consumer of the queue is the \
             posting thread. Post less from inside work items, raise `queue_capacity`, \
             or opt into `FullQueuePolicy::Block` if another thread is known to drain"
        )
    )]
    QueueFullOnOwningThread { name: ThreadName },

    #[error("Unregistration on worker thread {name} was abandoned")]
    #[diagnostic(
        code(worker_thread::unregister_abandoned),
        help(
            "The thread terminated before it ran the request, so the source may still be \
             registered with its reactor. Its callbacks can no longer fire"
        )
    )]
    UnregisterAbandoned { name: ThreadName },
}
