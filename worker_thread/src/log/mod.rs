// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! Optional [`tracing`] setup for binaries and tests that use this crate.
//!
//! The library itself only emits events. Install a subscriber with
//! [`try_initialize_logging_global()`] to see them:
//!
//! ```no_run
//! use worker_thread::{DisplayPreference, TracingConfig, try_initialize_logging_global};
//!
//! # fn main() -> miette::Result<()> {
//! try_initialize_logging_global(TracingConfig::new_display(DisplayPreference::Stderr))?;
//! # Ok(())
//! # }
//! ```

// Attach sources.
pub mod tracing_config;
pub mod tracing_init;

// Re-export.
pub use tracing_config::*;
pub use tracing_init::*;
