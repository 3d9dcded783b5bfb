// ==============================================
// TABLE CONCURRENCY TESTS (integration)
// ==============================================
//
// Exercises the blocking paths of the table from real threads: racing
// same-key inserts, cancellation by close, reset waking parked callers,
// and a many-thread smoke test. These require multi-threaded execution
// and cannot live inline.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Barrier};
use std::thread;
use std::time::Duration;

use bytes::Bytes;
use replaykit::builder::TableBuilder;
use replaykit::chunk::Chunk;
use replaykit::distribution::DistributionOptions;
use replaykit::item::{Item, SequenceRange};
use replaykit::limiter::RateLimiter;
use replaykit::table::{KeyWithPriority, Table};

const TIMEOUT: Duration = Duration::from_millis(250);

fn make_item(key: u64, priority: f64) -> Item {
    let range = SequenceRange::new(key, 0, 1);
    let chunk = Arc::new(Chunk::new(key * 100, range, Bytes::new()));
    Item::new(key, priority, range, vec![chunk])
}

/// Uniform sampler, FIFO remover, lock-step limiter: one insert right per
/// completed sample once the first insert has landed.
fn lock_step_table() -> Arc<Table> {
    Arc::new(
        TableBuilder::new("dist", 1000)
            .sampler(DistributionOptions::Uniform)
            .remover(DistributionOptions::Fifo)
            .rate_limiter(RateLimiter::new(1.0, 1, -1.0, 1.0).unwrap())
            .build()
            .unwrap(),
    )
}

// ==============================================
// Concurrent inserts of the same key
// ==============================================
//
// Ten threads race to insert one key while the insert gate is shut. Each
// completed sample releases exactly one insert right: the first right is
// consumed by a true insertion, the second is enough to flush everyone
// else through the assignment path without consuming more rights.

#[test]
fn concurrent_inserts_of_the_same_key() {
    let table = lock_step_table();

    // One item exhausts the insert budget (diff = 1.0).
    table.insert_or_assign(make_item(1, 123.0)).unwrap();

    let done = Arc::new(AtomicUsize::new(0));
    let start = Arc::new(Barrier::new(11));
    let threads: Vec<_> = (0..10)
        .map(|_| {
            let table = table.clone();
            let done = done.clone();
            let start = start.clone();
            thread::spawn(move || {
                start.wait();
                table.insert_or_assign(make_item(10, 123.0)).unwrap();
                done.fetch_add(1, Ordering::SeqCst);
            })
        })
        .collect();
    start.wait();

    thread::sleep(TIMEOUT);
    assert_eq!(done.load(Ordering::SeqCst), 0, "inserts did not block");

    // The first sample admits exactly one true insertion.
    table.sample().unwrap();
    wait_for(|| done.load(Ordering::SeqCst) == 1);
    thread::sleep(TIMEOUT);
    assert_eq!(done.load(Ordering::SeqCst), 1);

    // The second sample wakes the rest; they observe the key is present
    // and complete as assignments without consuming insert rights.
    table.sample().unwrap();
    for thread in threads {
        thread.join().unwrap();
    }

    assert_eq!(done.load(Ordering::SeqCst), 10);
    assert_eq!(table.size(), 2);
    assert_eq!(table.checkpoint().rate_limiter.insert_count, 2);
}

// ==============================================
// Cancellation
// ==============================================

#[test]
fn close_cancels_pending_insert() {
    let table = lock_step_table();
    table.insert_or_assign(make_item(1, 123.0)).unwrap();

    let (tx, rx) = mpsc::channel();
    let blocked = {
        let table = table.clone();
        thread::spawn(move || {
            let result = table.insert_or_assign(make_item(10, 123.0));
            tx.send(result).unwrap();
        })
    };
    assert!(rx.recv_timeout(TIMEOUT).is_err(), "insert did not block");

    table.close();

    let result = rx.recv_timeout(TIMEOUT).expect("insert did not unblock");
    assert!(result.unwrap_err().is_cancelled());
    blocked.join().unwrap();
}

#[test]
fn close_cancels_pending_sample() {
    let table = Arc::new(TableBuilder::new("dist", 10).build().unwrap());

    let (tx, rx) = mpsc::channel();
    let blocked = {
        let table = table.clone();
        thread::spawn(move || {
            tx.send(table.sample()).unwrap();
        })
    };
    assert!(rx.recv_timeout(TIMEOUT).is_err(), "sample did not block");

    table.close();

    let result = rx.recv_timeout(TIMEOUT).expect("sample did not unblock");
    assert!(result.unwrap_err().is_cancelled());
    blocked.join().unwrap();
}

// ==============================================
// Reset
// ==============================================

#[test]
fn reset_unblocks_pending_insert() {
    let table = lock_step_table();
    table.insert_or_assign(make_item(1, 123.0)).unwrap();

    let (tx, rx) = mpsc::channel();
    let blocked = {
        let table = table.clone();
        thread::spawn(move || {
            table.insert_or_assign(make_item(10, 123.0)).unwrap();
            tx.send(()).unwrap();
        })
    };
    assert!(rx.recv_timeout(TIMEOUT).is_err(), "insert did not block");

    // Reset zeroes the counters, reopening the insert gate.
    table.reset().unwrap();
    assert!(rx.recv_timeout(TIMEOUT).is_ok(), "insert did not unblock");
    blocked.join().unwrap();

    // Only the post-reset insert is visible.
    assert_eq!(table.size(), 1);
    assert!(table.get(10).is_some());
}

#[test]
fn reset_while_concurrent_calls() {
    let table = Arc::new(TableBuilder::new("dist", 1000).build().unwrap());
    let threads: Vec<_> = (0..100u64)
        .map(|i| {
            let table = table.clone();
            thread::spawn(move || {
                if i % 23 == 0 {
                    table.reset().unwrap();
                }
                table.insert_or_assign(make_item(i, 123.0)).unwrap();
                table
                    .mutate_items(&[KeyWithPriority { key: i, priority: 456.0 }], &[i])
                    .unwrap();
            })
        })
        .collect();
    for thread in threads {
        thread.join().unwrap();
    }
}

// ==============================================
// Many-thread smoke test
// ==============================================

#[test]
fn concurrent_insert_sample_mutate() {
    let table = Arc::new(TableBuilder::new("dist", 1000).build().unwrap());
    let count = Arc::new(AtomicUsize::new(0));
    let threads: Vec<_> = (0..200u64)
        .map(|i| {
            let table = table.clone();
            let count = count.clone();
            thread::spawn(move || {
                table.insert_or_assign(make_item(i, 123.0)).unwrap();
                table.sample().unwrap();
                table
                    .mutate_items(&[KeyWithPriority { key: i, priority: 456.0 }], &[i])
                    .unwrap();
                count.fetch_add(1, Ordering::SeqCst);
            })
        })
        .collect();
    for thread in threads {
        thread.join().unwrap();
    }
    assert_eq!(count.load(Ordering::SeqCst), 200);
}

/// Spins until `predicate` holds or a generous deadline passes.
fn wait_for(predicate: impl Fn() -> bool) {
    let deadline = std::time::Instant::now() + Duration::from_secs(5);
    while !predicate() {
        assert!(
            std::time::Instant::now() < deadline,
            "condition not reached in time"
        );
        thread::sleep(Duration::from_millis(5));
    }
}
