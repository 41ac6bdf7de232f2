//! Simple example demonstrating both queue engines

use savak_queue::{LinearQueue, RelaxedQueue};
use std::sync::Arc;
use std::thread;

fn main() {
    // Strict FIFO: items come back in global insertion order.
    let q = LinearQueue::new().expect("queue id slot available");
    q.enqueue(10);
    q.enqueue(20);
    q.enqueue(30);
    while let Some(v) = q.dequeue() {
        println!("linear: {}", v);
    }

    // Relaxed: per-producer order only, but no shared tail to fight over.
    let q = Arc::new(RelaxedQueue::new().expect("queue id slot available"));
    let mut handles = vec![];
    for t in 0..4u64 {
        let q = Arc::clone(&q);
        handles.push(thread::spawn(move || {
            for i in 0..5 {
                q.enqueue(t * 100 + i);
            }
        }));
    }
    for h in handles {
        h.join().unwrap();
    }

    let mut received = 0;
    while let Some(v) = q.dequeue() {
        println!("relaxed: {}", v);
        received += 1;
    }
    assert_eq!(received, 20);
}
