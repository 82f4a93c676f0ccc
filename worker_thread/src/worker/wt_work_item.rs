// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! A unit of posted work. See [`WorkItem`].

use crate::FixedQueue;
use std::fmt::{Debug, Formatter};

/// The queue type every worker thread owns.
pub type WorkQueue = FixedQueue<WorkItem>;

/// A boxed closure that runs exactly once on the worker thread, or is dropped without
/// running if the queue is released first.
pub struct WorkItem(Box<dyn FnOnce() + Send + 'static>);

impl WorkItem {
    #[must_use]
    pub fn new(work: impl FnOnce() + Send + 'static) -> Self { Self(Box::new(work)) }

    pub fn run(self) { (self.0)() }
}

impl Debug for WorkItem {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result { f.write_str("WorkItem(..)") }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::{Arc,
                    atomic::{AtomicU32, Ordering}};

    #[test]
    fn test_run_consumes_item() {
        let runs = Arc::new(AtomicU32::new(0));
        let item = WorkItem::new({
            let runs = Arc::clone(&runs);
            move || {
                runs.fetch_add(1, Ordering::SeqCst);
            }
        });

        item.run();

        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_dropping_item_releases_captures_without_running() {
        let captured = Arc::new(AtomicU32::new(0));
        let item = WorkItem::new({
            let captured = Arc::clone(&captured);
            move || {
                captured.fetch_add(1, Ordering::SeqCst);
            }
        });
        assert_eq!(Arc::strong_count(&captured), 2);

        drop(item);

        assert_eq!(Arc::strong_count(&captured), 1);
        assert_eq!(captured.load(Ordering::SeqCst), 0);
    }
}
