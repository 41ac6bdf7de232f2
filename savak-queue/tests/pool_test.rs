use savak_queue::LinearQueue;
use std::sync::Arc;
use std::thread;

/// With a one-page pool saturated, enqueues must keep succeeding through
/// the allocator fallback and every item must still round-trip in order.
#[test]
#[cfg_attr(miri, ignore)]
fn test_pool_saturation_fallback() {
    let q = LinearQueue::new().unwrap();
    q.create_tls_node_pool_sized(1).unwrap();

    // Far more nodes than one 2 MiB page holds.
    let n = 100_000u64;
    for v in 0..n {
        q.enqueue(v);
    }
    for v in 0..n {
        assert_eq!(q.dequeue(), Some(v));
    }
    assert_eq!(q.dequeue(), None);

    q.destroy_tls_node_pool();
    drop(q);
}

/// Repeated fill/drain waves against a one-page pool walk all three
/// allocation paths: bump, heap fallback, and the recycled-page rewind.
#[test]
#[cfg_attr(miri, ignore)]
fn test_pool_recycling_waves() {
    let q = LinearQueue::new().unwrap();
    q.create_tls_node_pool_sized(1).unwrap();

    let wave = 60_000u64;
    for round in 0..3 {
        let base = round * wave;
        for v in 0..wave {
            q.enqueue(base + v);
        }
        for v in 0..wave {
            assert_eq!(q.dequeue(), Some(base + v));
        }
        assert_eq!(q.dequeue(), None);
    }

    q.destroy_tls_node_pool();
    drop(q);
}

/// An unused pool unmaps cleanly; create is idempotent per thread.
#[test]
fn test_pool_create_destroy_unused() {
    let q = LinearQueue::new().unwrap();
    q.create_tls_node_pool_sized(2).unwrap();
    q.create_tls_node_pool_sized(2).unwrap();
    q.destroy_tls_node_pool();
    // Destroy without a pool is a no-op.
    q.destroy_tls_node_pool();
}

/// Pooled and heap nodes mix freely in one queue: only the opted-in
/// thread allocates from its pool.
#[test]
#[cfg_attr(miri, ignore)]
fn test_pool_mixed_with_heap_producers() {
    let q = Arc::new(LinearQueue::new().unwrap());
    q.create_tls_node_pool_sized(1).unwrap();

    let n = 10_000u64;
    let other = {
        let q = Arc::clone(&q);
        thread::spawn(move || {
            // No pool on this thread: plain heap nodes.
            for v in n..2 * n {
                q.enqueue(v);
            }
        })
    };
    for v in 0..n {
        q.enqueue(v);
    }
    other.join().unwrap();

    let mut seen = vec![false; 2 * n as usize];
    for _ in 0..2 * n {
        let v = q.dequeue().expect("item lost") as usize;
        assert!(!seen[v], "item duplicated");
        seen[v] = true;
    }
    assert_eq!(q.dequeue(), None);

    q.destroy_tls_node_pool();
}
