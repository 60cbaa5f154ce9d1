use crate::{Error, PoolConfig, WorkerId, WorkerPool};
use core::time::Duration;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::{Barrier, Semaphore};
use tokio::time::{sleep, timeout};

const SHUTDOWN_WAIT: Duration = Duration::from_secs(5);

/// Pool whose handler records every `(worker_id, item)` it processes.
fn recording_pool(
    num_workers: usize,
    queue_capacity: usize,
) -> (WorkerPool<u64>, Arc<Mutex<Vec<(WorkerId, u64)>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let pool = WorkerPool::new(
        PoolConfig::new(num_workers, queue_capacity),
        move |worker_id: WorkerId, item: u64| {
            let sink = Arc::clone(&sink);
            async move {
                sink.lock().push((worker_id, item));
            }
        },
    );
    (pool, seen)
}

/// Polls `cond` until it holds, panicking if it does not within 5 seconds.
async fn wait_until(cond: impl Fn() -> bool) {
    timeout(Duration::from_secs(5), async {
        while !cond() {
            sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn delivers_every_item_exactly_once() {
    const ITEMS: u64 = 100;
    let (pool, seen) = recording_pool(4, 8);

    for item in 0..ITEMS {
        pool.submit(item).await.unwrap();
    }
    wait_until(|| seen.lock().len() == ITEMS as usize).await;

    let mut items: Vec<u64> = seen.lock().iter().map(|(_, item)| *item).collect();
    items.sort_unstable();
    assert_eq!(items, (0..ITEMS).collect::<Vec<_>>());

    pool.shutdown(SHUTDOWN_WAIT).await.unwrap();
}

#[tokio::test]
async fn single_worker_preserves_submission_order() {
    const ITEMS: u64 = 50;
    let (pool, seen) = recording_pool(1, 4);

    for item in 0..ITEMS {
        pool.submit(item).await.unwrap();
    }
    wait_until(|| seen.lock().len() == ITEMS as usize).await;

    // With one worker there is never more than one in-flight hand-off, so
    // delivery order equals FIFO dequeue order equals submission order.
    let items: Vec<u64> = seen.lock().iter().map(|(_, item)| *item).collect();
    assert_eq!(items, (0..ITEMS).collect::<Vec<_>>());

    pool.shutdown(SHUTDOWN_WAIT).await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn burst_within_worker_count_reaches_distinct_workers() {
    const WORKERS: usize = 4;
    let seen = Arc::new(Mutex::new(Vec::new()));
    let barrier = Arc::new(Barrier::new(WORKERS));

    let sink = Arc::clone(&seen);
    let gate = Arc::clone(&barrier);
    let pool = WorkerPool::new(
        PoolConfig::new(WORKERS, WORKERS),
        move |worker_id: WorkerId, _item: u64| {
            let sink = Arc::clone(&sink);
            let gate = Arc::clone(&gate);
            async move {
                // Hold every worker until the whole burst has been assigned.
                // If any worker were handed two items, the barrier would
                // never release and the wait below would time out.
                gate.wait().await;
                sink.lock().push(worker_id);
            }
        },
    );

    for item in 0..WORKERS as u64 {
        pool.submit(item).await.unwrap();
    }
    wait_until(|| seen.lock().len() == WORKERS).await;

    let distinct: HashSet<WorkerId> = seen.lock().iter().copied().collect();
    assert_eq!(distinct.len(), WORKERS);

    pool.shutdown(SHUTDOWN_WAIT).await.unwrap();
}

#[tokio::test]
async fn stopped_worker_accepts_no_further_items() {
    let (pool, seen) = recording_pool(1, 4);

    pool.stop_worker(0).unwrap();
    // Double stop must not deadlock or error.
    pool.stop_worker(0).unwrap();

    // The exiting worker drops its handler clone, releasing the only other
    // reference to the sink; once the count reaches one, the stop has fully
    // taken effect and nothing can accept the item below.
    wait_until(|| Arc::strong_count(&seen) == 1).await;

    pool.submit(7).await.unwrap();
    sleep(Duration::from_millis(100)).await;
    assert!(seen.lock().is_empty());

    assert_eq!(
        pool.stop_worker(5),
        Err(Error::UnknownWorker { worker_id: 5 })
    );
}

#[tokio::test]
async fn full_queue_blocks_the_next_submission() {
    const CAPACITY: usize = 2;
    let (pool, _seen) = recording_pool(0, CAPACITY);

    for item in 0..CAPACITY as u64 {
        pool.submit(item).await.unwrap();
    }

    // With zero workers nothing drains the queue, so the next submission
    // must stay pending.
    let blocked = timeout(Duration::from_millis(100), pool.submit(99)).await;
    assert!(blocked.is_err());
}

#[tokio::test]
async fn zero_worker_pool_is_inert_but_alive() {
    let (pool, seen) = recording_pool(0, 4);
    assert_eq!(pool.num_workers(), 0);

    pool.submit(1).await.unwrap();
    pool.submit(2).await.unwrap();
    sleep(Duration::from_millis(100)).await;

    // No dispatch loop runs: items sit in the queue, unconsumed.
    assert!(seen.lock().is_empty());

    pool.shutdown(SHUTDOWN_WAIT).await.unwrap();
    assert_eq!(pool.submit(3).await, Err(Error::Shutdown));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn two_workers_tiny_queue_end_to_end() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let gate = Arc::new(Semaphore::new(0));

    let sink = Arc::clone(&seen);
    let permits = Arc::clone(&gate);
    let pool = WorkerPool::new(
        PoolConfig::new(2, 1),
        move |_worker_id: WorkerId, item: &'static str| {
            let sink = Arc::clone(&sink);
            let permits = Arc::clone(&permits);
            async move {
                // Completions release one at a time so the recorded order
                // is deterministic.
                permits.acquire().await.expect("gate closed").forget();
                sink.lock().push(item);
            }
        },
    );

    for item in ["a", "b", "c"] {
        pool.submit(item).await.unwrap();
    }

    // "a" and "b" occupy both workers immediately; "c" cannot be delivered
    // until one of them completes. The semaphore is fair, so "a"'s and "b"'s
    // gate waits (queued at delivery) are served before "c"'s.
    for expected in 1..=3 {
        gate.add_permits(1);
        wait_until(|| seen.lock().len() == expected).await;
    }

    let completed = seen.lock().clone();
    let mut items = completed.clone();
    items.sort_unstable();
    assert_eq!(items, vec!["a", "b", "c"]);
    // FIFO dequeue: "a" is delivered before "c" can reach a worker, so it
    // can never trail both "b" and "c" through the pool.
    assert_eq!(completed.last(), Some(&"c"));

    pool.shutdown(SHUTDOWN_WAIT).await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn shutdown_drains_already_enqueued_items() {
    const ITEMS: u64 = 20;
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let pool = WorkerPool::new(
        PoolConfig::new(2, ITEMS as usize),
        move |_worker_id: WorkerId, item: u64| {
            let sink = Arc::clone(&sink);
            async move {
                sleep(Duration::from_millis(5)).await;
                sink.lock().push(item);
            }
        },
    );

    for item in 0..ITEMS {
        pool.submit(item).await.unwrap();
    }
    pool.shutdown(SHUTDOWN_WAIT).await.unwrap();

    assert_eq!(seen.lock().len(), ITEMS as usize);
    assert_eq!(pool.submit(99).await, Err(Error::Shutdown));
}

#[tokio::test]
async fn detached_submissions_report_their_outcome() {
    let (pool, seen) = recording_pool(2, 1);

    let handles: Vec<_> = (0..5).map(|item| pool.submit_detached(item)).collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }
    wait_until(|| seen.lock().len() == 5).await;

    pool.shutdown(SHUTDOWN_WAIT).await.unwrap();
}

#[tokio::test]
async fn submit_timeout_reports_a_full_queue() {
    let (pool, _seen) = recording_pool(0, 1);

    pool.submit(1).await.unwrap();
    let res = pool.submit_timeout(2, Duration::from_millis(50)).await;
    assert_eq!(res, Err(Error::EnqueueTimeout));
}

#[tokio::test]
async fn panicking_handler_does_not_kill_the_worker() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let pool = WorkerPool::new(
        PoolConfig::new(1, 4),
        move |_worker_id: WorkerId, item: u64| {
            let sink = Arc::clone(&sink);
            async move {
                assert_ne!(item, 13, "poisoned item");
                sink.lock().push(item);
            }
        },
    );

    pool.submit(13).await.unwrap();
    pool.submit(1).await.unwrap();
    wait_until(|| seen.lock().len() == 1).await;

    assert_eq!(*seen.lock(), vec![1]);

    pool.shutdown(SHUTDOWN_WAIT).await.unwrap();
}

#[tokio::test]
async fn zero_queue_capacity_falls_back_to_default() {
    let config = PoolConfig::new(1, 0);
    assert_eq!(
        config.effective_queue_capacity(),
        crate::DEFAULT_QUEUE_CAPACITY
    );

    let (pool, seen) = recording_pool(1, 0);
    pool.submit(42).await.unwrap();
    wait_until(|| seen.lock().len() == 1).await;
    pool.shutdown(SHUTDOWN_WAIT).await.unwrap();
}
