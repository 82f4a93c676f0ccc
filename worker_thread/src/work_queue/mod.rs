// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

// cspell:words eventfd

//! Bounded multi producer / single consumer queue with a pollable readable signal. See
//! [`FixedQueue`] and [`QueueSignal`].

// Attach sources.
pub mod fixed_queue;
pub mod queue_signal;

// Re-export.
pub use fixed_queue::*;
pub use queue_signal::*;
