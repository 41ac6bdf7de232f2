use savak_queue::{LinearQueue, QueueError, MAX_QUEUES};

/// Claims the whole id table, so it lives in its own test binary: test
/// binaries run sequentially, and nothing here runs in parallel with the
/// queues of the other suites.
#[test]
fn test_registry_exhaustion_and_reuse() {
    let mut queues = Vec::new();
    loop {
        match LinearQueue::new() {
            Ok(q) => queues.push(q),
            Err(QueueError::RegistryFull) => break,
            Err(e) => panic!("unexpected error: {}", e),
        }
        assert!(queues.len() <= MAX_QUEUES, "more ids than slots");
    }
    assert_eq!(queues.len(), MAX_QUEUES);

    // Queues stay functional at full occupancy.
    let q = queues.last().unwrap();
    q.enqueue(7);
    assert_eq!(q.dequeue(), Some(7));

    // Releasing one slot makes construction succeed again.
    queues.pop();
    let q = LinearQueue::new().unwrap();
    q.enqueue(9);
    assert_eq!(q.dequeue(), Some(9));
}
