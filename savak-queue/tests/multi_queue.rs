use savak_queue::{LinearQueue, MpmcQueue, RelaxedQueue};
use std::sync::Arc;
use std::thread;

/// Two independent queues, each with its own producer/consumer pair: no
/// value may leak across, no value may be lost.
fn isolation<Q: MpmcQueue + 'static>(q1: Arc<Q>, q2: Arc<Q>) {
    let n = 1000u64;

    let mut handles = vec![];
    for (q, base) in [(Arc::clone(&q1), 0u64), (Arc::clone(&q2), 10_000u64)] {
        handles.push(thread::spawn(move || {
            for v in 1..=n {
                q.enqueue(base + v);
            }
        }));
    }
    for h in handles {
        h.join().unwrap();
    }

    let drain = |q: &Q, base: u64| {
        let mut count = 0u64;
        let mut sum = 0u64;
        while let Some(v) = q.dequeue() {
            assert!(v > base && v <= base + n, "value {} leaked across queues", v);
            count += 1;
            sum += v - base;
        }
        assert_eq!(count, n);
        assert_eq!(sum, n * (n + 1) / 2);
    };
    drain(&q1, 0);
    drain(&q2, 10_000);
}

#[test]
#[cfg_attr(miri, ignore)]
fn test_linear_queue_isolation() {
    isolation(
        Arc::new(LinearQueue::new().unwrap()),
        Arc::new(LinearQueue::new().unwrap()),
    );
}

#[test]
#[cfg_attr(miri, ignore)]
fn test_relaxed_queue_isolation() {
    isolation(
        Arc::new(RelaxedQueue::new().unwrap()),
        Arc::new(RelaxedQueue::new().unwrap()),
    );
}

/// Mixed engines share the id space but not state.
#[test]
fn test_mixed_engine_isolation() {
    let lq = LinearQueue::new().unwrap();
    let rq = RelaxedQueue::new().unwrap();

    lq.enqueue(1);
    rq.enqueue(2);
    assert_eq!(lq.dequeue(), Some(1));
    assert_eq!(rq.dequeue(), Some(2));
    assert_eq!(lq.dequeue(), None);
    assert_eq!(rq.dequeue(), None);
}
