//! End-to-end scenario 1: enqueue two records, dequeue them in order.

use std::sync::Arc;

use fleetbus::context::Context;
use fleetbus::logging::LogFacadeLogger;
use fleetbus::os_provider::{OsProvider, StdOsProvider};
use fleetbus::queue::PersistentQueue;

#[test]
fn enqueue_then_dequeue_preserves_order() {
    let dir = tempfile::tempdir().expect("tempdir");
    let os: Arc<dyn OsProvider> = Arc::new(StdOsProvider);
    let queue = PersistentQueue::open("q1", dir.path(), os, Arc::new(LogFacadeLogger))
        .expect("open queue");
    let ctx = Context::new();

    queue.enqueue("item1").unwrap();
    queue.enqueue("item2").unwrap();

    let first = queue.dequeue(&ctx, "r").unwrap();
    assert_eq!(first.entry, "item1");
    queue.ack("r").unwrap();

    let second = queue.dequeue(&ctx, "r").unwrap();
    assert_eq!(second.entry, "item2");
    queue.ack("r").unwrap();
}
