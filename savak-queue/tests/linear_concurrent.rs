use savak_queue::LinearQueue;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

/// Four producers enqueue the same value range; four consumers drain.
/// Every value must be seen exactly four times, with no loss.
#[test]
#[cfg_attr(miri, ignore)]
fn test_concurrent_exactness() {
    let per_producer = 20_000usize;
    let producers = 4;
    let consumers = 4;

    let q = Arc::new(LinearQueue::new().unwrap());
    let done = Arc::new(AtomicBool::new(false));
    let seen: Arc<Vec<AtomicU8>> = Arc::new((0..=per_producer).map(|_| AtomicU8::new(0)).collect());
    let dequeued = Arc::new(AtomicUsize::new(0));

    let mut producer_handles = vec![];
    for _ in 0..producers {
        let q = Arc::clone(&q);
        producer_handles.push(thread::spawn(move || {
            for v in 1..=per_producer {
                q.enqueue(v as u64);
            }
        }));
    }

    let mut consumer_handles = vec![];
    for _ in 0..consumers {
        let q = Arc::clone(&q);
        let done = Arc::clone(&done);
        let seen = Arc::clone(&seen);
        let dequeued = Arc::clone(&dequeued);
        consumer_handles.push(thread::spawn(move || {
            let mut got = 0usize;
            loop {
                match q.dequeue() {
                    Some(v) => {
                        seen[v as usize].fetch_add(1, Ordering::Relaxed);
                        got += 1;
                    }
                    None => {
                        if done.load(Ordering::Acquire) {
                            // Producers are finished; sweep the remainder.
                            while let Some(v) = q.dequeue() {
                                seen[v as usize].fetch_add(1, Ordering::Relaxed);
                                got += 1;
                            }
                            break;
                        }
                        thread::yield_now();
                    }
                }
            }
            dequeued.fetch_add(got, Ordering::Relaxed);
        }));
    }

    for h in producer_handles {
        h.join().unwrap();
    }
    done.store(true, Ordering::Release);
    for h in consumer_handles {
        h.join().unwrap();
    }

    assert_eq!(dequeued.load(Ordering::Relaxed), producers * per_producer);
    for v in 1..=per_producer {
        assert_eq!(
            seen[v].load(Ordering::Relaxed),
            producers as u8,
            "value {} lost or duplicated",
            v
        );
    }
    assert_eq!(q.dequeue(), None);
}

/// One producer, one concurrent consumer: strict FIFO must survive the
/// head advancing under the consumer.
#[test]
#[cfg_attr(miri, ignore)]
fn test_spsc_strict_order() {
    let n = 50_000u64;
    let q = Arc::new(LinearQueue::new().unwrap());

    let producer = {
        let q = Arc::clone(&q);
        thread::spawn(move || {
            for v in 0..n {
                q.enqueue(v);
            }
        })
    };

    let mut expected = 0u64;
    while expected < n {
        if let Some(v) = q.dequeue() {
            assert_eq!(v, expected, "reordered under concurrent enqueue");
            expected += 1;
        } else {
            thread::yield_now();
        }
    }
    producer.join().unwrap();
    assert_eq!(q.dequeue(), None);
}

/// Sixteen threads randomly mix enqueues and dequeues, then the queue is
/// drained: dequeues plus the residue must equal the enqueues.
#[test]
#[cfg_attr(miri, ignore)]
fn test_random_mixed_stress() {
    use rand::Rng;

    let threads = 16;
    let ops_per_thread = 30_000;

    let q = Arc::new(LinearQueue::new().unwrap());
    let enqueued = Arc::new(AtomicUsize::new(0));
    let dequeued = Arc::new(AtomicUsize::new(0));

    let mut handles = vec![];
    for t in 0..threads {
        let q = Arc::clone(&q);
        let enqueued = Arc::clone(&enqueued);
        let dequeued = Arc::clone(&dequeued);
        handles.push(thread::spawn(move || {
            let mut rng = rand::thread_rng();
            for i in 0..ops_per_thread {
                if rng.gen_bool(0.5) {
                    q.enqueue((t * ops_per_thread + i) as u64);
                    enqueued.fetch_add(1, Ordering::Relaxed);
                } else if q.dequeue().is_some() {
                    dequeued.fetch_add(1, Ordering::Relaxed);
                }
            }
        }));
    }
    for h in handles {
        h.join().unwrap();
    }

    let mut residue = 0usize;
    while q.dequeue().is_some() {
        residue += 1;
    }
    assert_eq!(
        enqueued.load(Ordering::Relaxed),
        dequeued.load(Ordering::Relaxed) + residue
    );
}
