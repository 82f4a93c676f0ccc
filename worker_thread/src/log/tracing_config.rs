// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

use std::path::PathBuf;
use tracing_core::LevelFilter;

/// Where [`try_initialize_logging_global()`] sends log output, and at what level.
///
/// Fields:
/// - `writer_config`: [`WriterConfig`] to choose where to write the logs.
/// - `level`: [`tracing::Level`] - the most verbose level that is kept.
///
/// [`try_initialize_logging_global()`]: super::try_initialize_logging_global
#[derive(Debug, Clone)]
pub struct TracingConfig {
    pub writer_config: WriterConfig,
    pub level: tracing::Level,
}

/// Output destination for log events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriterConfig {
    /// Only the level filter is installed; events are dropped.
    None,
    Display(DisplayPreference),
    /// A log file that is appended to and never rotated.
    File(PathBuf),
    DisplayAndFile(DisplayPreference, PathBuf),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayPreference {
    Stdout,
    Stderr,
}

impl TracingConfig {
    #[must_use]
    pub fn new_display(preferred_display: DisplayPreference) -> Self {
        Self {
            writer_config: WriterConfig::Display(preferred_display),
            level: tracing::Level::DEBUG,
        }
    }

    #[must_use]
    pub fn new_file(path: impl Into<PathBuf>) -> Self {
        Self {
            writer_config: WriterConfig::File(path.into()),
            level: tracing::Level::DEBUG,
        }
    }

    #[must_use]
    pub fn get_level_filter(&self) -> LevelFilter { LevelFilter::from_level(self.level) }
}

/// Warnings and errors (drain overflow, failed registrations, panicked threads) to
/// stderr.
impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            writer_config: WriterConfig::Display(DisplayPreference::Stderr),
            level: tracing::Level::WARN,
        }
    }
}
