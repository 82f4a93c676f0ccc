// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

// cspell:words hci

//! A channel scheduler running on a [`WorkerThread`], the way a protocol stack layer
//! uses one: channels are attached and detached from arbitrary threads, outgoing
//! packets are handed to the scheduler, and inbound link data arrives through a
//! socket watched by the worker's reactor.

use pretty_assertions::assert_eq;
use std::{collections::HashMap,
          io::{Read, Write},
          os::unix::net::UnixStream,
          sync::{Arc, Mutex, mpsc},
          thread,
          time::{Duration, Instant}};
use worker_thread::{ReactorObject, WorkerThread, WorkerThreadError};

type ChannelId = u16;
type Packet = Vec<u8>;

/// The operations a link layer exposes to its channels.
trait Scheduler {
    fn attach_channel(&self, cid: ChannelId) -> Result<(), WorkerThreadError>;
    fn detach_channel(&self, cid: ChannelId) -> Result<(), WorkerThreadError>;
    fn notify_packets_ready(
        &self,
        cid: ChannelId,
        packets: Vec<Packet>,
    ) -> Result<(), WorkerThreadError>;
}

/// Everything the scheduler touches lives on its worker thread; the mutexes are only
/// there so the test can inspect the results.
#[derive(Debug, Default)]
struct LinkState {
    attached: HashMap<ChannelId, usize>,
    sent: Vec<(ChannelId, Packet)>,
    dropped: usize,
}

struct WorkerScheduler {
    thread: WorkerThread,
    link: Arc<Mutex<LinkState>>,
}

impl WorkerScheduler {
    fn new() -> Self {
        Self {
            thread: WorkerThread::new("l2cap_scheduler").unwrap(),
            link: Arc::default(),
        }
    }

    /// Waits for every request made so far to be processed.
    fn flush(&self) {
        let (done_tx, done_rx) = mpsc::channel::<()>();
        self.thread
            .post(move || {
                done_tx.send(()).ok();
            })
            .unwrap();
        done_rx.recv_timeout(Duration::from_secs(5)).unwrap();
    }
}

impl Scheduler for WorkerScheduler {
    fn attach_channel(&self, cid: ChannelId) -> Result<(), WorkerThreadError> {
        let link = Arc::clone(&self.link);
        self.thread.post(move || {
            link.lock().unwrap().attached.insert(cid, 0);
        })
    }

    fn detach_channel(&self, cid: ChannelId) -> Result<(), WorkerThreadError> {
        let link = Arc::clone(&self.link);
        self.thread.post(move || {
            link.lock().unwrap().attached.remove(&cid);
        })
    }

    fn notify_packets_ready(
        &self,
        cid: ChannelId,
        packets: Vec<Packet>,
    ) -> Result<(), WorkerThreadError> {
        let link = Arc::clone(&self.link);
        self.thread.post(move || {
            let mut link = link.lock().unwrap();
            let LinkState {
                attached,
                sent,
                dropped,
            } = &mut *link;
            match attached.get_mut(&cid) {
                Some(sent_count) => {
                    *sent_count += packets.len();
                    sent.extend(packets.into_iter().map(|packet| (cid, packet)));
                }
                None => *dropped += packets.len(),
            }
        })
    }
}

fn wait_until(condition: impl Fn() -> bool) {
    let start = Instant::now();
    while !condition() {
        assert!(start.elapsed() < Duration::from_secs(5), "timed out");
        thread::sleep(Duration::from_millis(2));
    }
}

#[test]
fn test_packets_go_out_in_order_for_attached_channels() {
    let scheduler = WorkerScheduler::new();

    scheduler.attach_channel(0x40).unwrap();
    scheduler.attach_channel(0x41).unwrap();
    scheduler
        .notify_packets_ready(0x40, vec![vec![1], vec![2]])
        .unwrap();
    scheduler.notify_packets_ready(0x41, vec![vec![3]]).unwrap();
    scheduler.notify_packets_ready(0x40, vec![vec![4]]).unwrap();
    scheduler.flush();

    let link = scheduler.link.lock().unwrap();
    assert_eq!(
        link.sent,
        vec![(0x40, vec![1]), (0x40, vec![2]), (0x41, vec![3]), (0x40, vec![4])]
    );
    assert_eq!(link.attached.get(&0x40), Some(&3));
    assert_eq!(link.dropped, 0);
}

#[test]
fn test_packets_for_detached_channel_are_dropped() {
    let scheduler = WorkerScheduler::new();

    scheduler.attach_channel(0x40).unwrap();
    scheduler.notify_packets_ready(0x40, vec![vec![1]]).unwrap();
    scheduler.detach_channel(0x40).unwrap();
    scheduler
        .notify_packets_ready(0x40, vec![vec![2], vec![3]])
        .unwrap();
    scheduler.flush();

    let link = scheduler.link.lock().unwrap();
    assert_eq!(link.sent, vec![(0x40, vec![1])]);
    assert_eq!(link.dropped, 2);
}

#[test]
fn test_requests_from_many_threads_are_serialized() {
    let scheduler = Arc::new(WorkerScheduler::new());

    let producers: Vec<_> = (0..4_u16)
        .map(|it| {
            let scheduler = Arc::clone(&scheduler);
            thread::spawn(move || {
                let cid = 0x40 + it;
                scheduler.attach_channel(cid).unwrap();
                for seq in 0..25_u8 {
                    scheduler.notify_packets_ready(cid, vec![vec![seq]]).unwrap();
                }
            })
        })
        .collect();
    for producer in producers {
        producer.join().unwrap();
    }
    scheduler.flush();

    let link = scheduler.link.lock().unwrap();
    assert_eq!(link.sent.len(), 100);
    assert_eq!(link.dropped, 0);
    for it in 0..4_u16 {
        let seqs: Vec<u8> = link
            .sent
            .iter()
            .filter(|(cid, _)| *cid == 0x40 + it)
            .map(|(_, packet)| packet[0])
            .collect();
        assert_eq!(seqs, (0..25).collect::<Vec<u8>>());
    }
}

#[test]
fn test_inbound_link_data_stops_after_unregister() {
    let scheduler = WorkerScheduler::new();
    let (hci_host, hci_controller) = UnixStream::pair().unwrap();
    hci_host.set_nonblocking(true).unwrap();
    let hci_host = Arc::new(hci_host);
    let inbound = Arc::new(Mutex::new(Vec::<u8>::new()));

    let object = ReactorObject::readable(&*hci_host, {
        let hci_host = Arc::clone(&hci_host);
        let inbound = Arc::clone(&inbound);
        move || {
            let mut buf = [0_u8; 64];
            if let Ok(len) = (&*hci_host).read(&mut buf) {
                inbound.lock().unwrap().extend_from_slice(&buf[..len]);
            }
        }
    });

    scheduler.thread.register(&object).unwrap();
    (&hci_controller).write_all(&[0x04, 0x0e]).unwrap();
    wait_until(|| inbound.lock().unwrap().len() == 2);

    scheduler.thread.unregister(&object).unwrap();
    (&hci_controller).write_all(&[0xff]).unwrap();
    scheduler.flush();
    thread::sleep(Duration::from_millis(30));

    assert_eq!(*inbound.lock().unwrap(), vec![0x04, 0x0e]);
}
