// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

use super::{super::*, Gate, WAIT_TIMEOUT, wait_until};
use pretty_assertions::assert_eq;
use std::{sync::{Arc, Mutex,
                 atomic::{AtomicBool, AtomicU32, Ordering},
                 mpsc},
          thread,
          time::Duration};
use test_case::test_case;

fn counting_post(thread: &WorkerThread, count: &Arc<AtomicU32>) {
    let count = Arc::clone(count);
    thread
        .post(move || {
            count.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
}

/// Waits for every item posted so far to have run.
fn flush(thread: &WorkerThread) {
    let (done_tx, done_rx) = mpsc::channel::<()>();
    thread
        .post(move || {
            done_tx.send(()).ok();
        })
        .unwrap();
    done_rx.recv_timeout(WAIT_TIMEOUT).unwrap();
}

#[test]
fn test_posted_items_run_in_order_then_free() {
    let thread = WorkerThread::new("test").unwrap();
    let seen = Arc::new(Mutex::new(Vec::new()));

    for it in 1..=3 {
        let seen = Arc::clone(&seen);
        thread.post(move || seen.lock().unwrap().push(it)).unwrap();
    }
    thread.free();

    assert_eq!(*seen.lock().unwrap(), vec![1, 2, 3]);
}

#[test]
fn test_new_returns_running_thread_with_identity() {
    let thread = WorkerThread::new("test_identity").unwrap();
    assert_eq!(thread.liveness(), LivenessState::Running);
    assert_eq!(thread.name().as_str(), "test_identity");
    assert!(!thread.is_self());
    assert_ne!(thread.tid(), OsThreadId::current());

    let (seen_tx, seen_rx) = mpsc::channel();
    thread
        .post(move || {
            let current = thread::current();
            seen_tx
                .send((current.name().map(str::to_owned), OsThreadId::current()))
                .ok();
        })
        .unwrap();
    let (os_name, tid) = seen_rx.recv_timeout(WAIT_TIMEOUT).unwrap();

    assert_eq!(os_name.as_deref(), Some("test_identity"));
    assert_eq!(tid, thread.tid());
}

#[test]
fn test_concurrent_producers_each_keep_their_order() {
    const PRODUCERS: usize = 4;
    const ITEMS_PER_PRODUCER: usize = 50;

    let thread = Arc::new(WorkerThread::new("test_producers").unwrap());
    let seen = Arc::new(Mutex::new(Vec::new()));

    let producers: Vec<_> = (0..PRODUCERS)
        .map(|producer| {
            let thread = Arc::clone(&thread);
            let seen = Arc::clone(&seen);
            thread::spawn(move || {
                for it in 0..ITEMS_PER_PRODUCER {
                    let seen = Arc::clone(&seen);
                    thread
                        .post(move || seen.lock().unwrap().push((producer, it)))
                        .unwrap();
                }
            })
        })
        .collect();
    for producer in producers {
        producer.join().unwrap();
    }
    Arc::try_unwrap(thread).unwrap().free();

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), PRODUCERS * ITEMS_PER_PRODUCER);
    for producer in 0..PRODUCERS {
        let order: Vec<_> = seen
            .iter()
            .filter(|(from, _)| *from == producer)
            .map(|(_, it)| *it)
            .collect();
        assert_eq!(order, (0..ITEMS_PER_PRODUCER).collect::<Vec<_>>());
    }
}

#[test_case(0)]
#[test_case(1)]
#[test_case(64)]
#[test_case(128)]
fn test_free_drains_pending_items(pending: u32) {
    let thread = WorkerThread::new("test_drain").unwrap();
    let count = Arc::new(AtomicU32::new(0));

    let gate = Gate::close_on(&thread);
    for _ in 0..pending {
        counting_post(&thread, &count);
    }
    thread.stop();
    gate.open();
    thread.free();

    assert_eq!(count.load(Ordering::SeqCst), pending);
    assert_eq!(Arc::strong_count(&count), 1);
}

#[test]
fn test_items_past_drain_limit_are_discarded_unexecuted() {
    let config = WorkerThreadConfig {
        queue_capacity: 8,
        drain_limit: Some(2),
        ..Default::default()
    };
    let thread = WorkerThread::new_with_config::<OsResourceFactory>("test_limit", config)
        .unwrap();
    let count = Arc::new(AtomicU32::new(0));

    let gate = Gate::close_on(&thread);
    for _ in 0..5 {
        counting_post(&thread, &count);
    }
    thread.stop();
    gate.open();
    thread.free();

    assert_eq!(count.load(Ordering::SeqCst), 2);
    // The three discarded items released what they captured.
    assert_eq!(Arc::strong_count(&count), 1);
}

#[test]
fn test_freeing_absent_thread_is_noop() {
    let absent: Option<WorkerThread> = None;
    absent.into_iter().for_each(WorkerThread::free);
}

#[test]
fn test_stop_is_idempotent_and_thread_terminates() {
    let thread = WorkerThread::new("test_stop").unwrap();

    thread.stop();
    thread.stop();

    wait_until("termination", || thread.liveness() == LivenessState::Terminated);
    let result = thread.post(|| {});
    assert!(matches!(
        result,
        Err(WorkerThreadError::OperationIgnored {
            state: LivenessState::Terminated,
            ..
        })
    ));
    thread.free();
}

#[test]
fn test_post_after_panicking_item_is_ignored() {
    let thread = WorkerThread::new("test_panic").unwrap();
    let count = Arc::new(AtomicU32::new(0));

    thread.post(|| panic!("deliberate panic in work item")).unwrap();
    wait_until("termination", || thread.liveness() == LivenessState::Terminated);

    let count_clone = Arc::clone(&count);
    let result = thread.post(move || {
        count_clone.fetch_add(1, Ordering::SeqCst);
    });

    assert!(matches!(
        result,
        Err(WorkerThreadError::OperationIgnored { .. })
    ));
    // The rejected closure was dropped, not run.
    assert_eq!(count.load(Ordering::SeqCst), 0);
    assert_eq!(Arc::strong_count(&count), 1);

    // Joins the panicked thread without propagating the panic.
    thread.free();
}

#[test]
fn test_self_post_on_full_queue_fails_fast() {
    let config = WorkerThreadConfig {
        queue_capacity: 2,
        ..Default::default()
    };
    let thread = Arc::new(
        WorkerThread::new_with_config::<OsResourceFactory>("test_self_post", config)
            .unwrap(),
    );

    let (results_tx, results_rx) = mpsc::channel();
    thread
        .post({
            let thread = Arc::clone(&thread);
            move || {
                assert!(thread.is_self());
                // This item has been dequeued, so the queue is empty.
                let results: Vec<_> = (0..3).map(|_| thread.post(|| {})).collect();
                results_tx.send(results).ok();
            }
        })
        .unwrap();
    let results = results_rx.recv_timeout(WAIT_TIMEOUT).unwrap();

    assert!(results[0].is_ok());
    assert!(results[1].is_ok());
    assert!(matches!(
        results[2],
        Err(WorkerThreadError::QueueFullOnOwningThread { .. })
    ));

    // The self-posting item (and its handle clone) is gone once later work ran.
    flush(&thread);
    Arc::try_unwrap(thread).unwrap().free();
}

#[test]
fn test_invalid_name_is_rejected() {
    let result = WorkerThread::new("");
    assert!(matches!(result, Err(WorkerThreadError::InvalidName { .. })));
}

#[test]
fn test_long_name_is_truncated() {
    let thread = WorkerThread::new("bt_workqueue_0123456789").unwrap();
    assert_eq!(thread.name().as_str(), "bt_workqueue_012");
    thread.free();
}

#[test]
fn test_post_from_other_thread_blocks_until_space() {
    let config = WorkerThreadConfig {
        queue_capacity: 2,
        full_queue_on_owning_thread: FullQueuePolicy::Block,
        ..Default::default()
    };
    let thread = Arc::new(
        WorkerThread::new_with_config::<OsResourceFactory>("test_backpressure", config)
            .unwrap(),
    );
    let count = Arc::new(AtomicU32::new(0));

    let gate = Gate::close_on(&thread);
    counting_post(&thread, &count);
    counting_post(&thread, &count);
    assert_eq!(thread.pending_work(), 2);

    let is_posted = Arc::new(AtomicBool::new(false));
    let producer = thread::spawn({
        let thread = Arc::clone(&thread);
        let count = Arc::clone(&count);
        let is_posted = Arc::clone(&is_posted);
        move || {
            counting_post(&thread, &count);
            is_posted.store(true, Ordering::SeqCst);
        }
    });

    thread::sleep(Duration::from_millis(30));
    assert!(!is_posted.load(Ordering::SeqCst));
    assert_eq!(thread.pending_work(), 2);

    gate.open();
    producer.join().unwrap();
    assert!(is_posted.load(Ordering::SeqCst));
    flush(&thread);

    assert_eq!(count.load(Ordering::SeqCst), 3);
    Arc::try_unwrap(thread).unwrap().free();
}
