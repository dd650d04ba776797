//! End-to-end scenario 4: two independent readers each see the full
//! sequence, advancing on their own cursors.

use std::sync::Arc;

use fleetbus::context::Context;
use fleetbus::logging::LogFacadeLogger;
use fleetbus::os_provider::{OsProvider, StdOsProvider};
use fleetbus::queue::PersistentQueue;

#[test]
fn two_readers_each_see_every_record() {
    let dir = tempfile::tempdir().expect("tempdir");
    let os: Arc<dyn OsProvider> = Arc::new(StdOsProvider);
    let queue = PersistentQueue::open("q1", dir.path(), os, Arc::new(LogFacadeLogger))
        .expect("open queue");
    let ctx = Context::new();

    queue.enqueue("a").unwrap();
    queue.enqueue("b").unwrap();

    assert_eq!(queue.dequeue(&ctx, "r1").unwrap().entry, "a");
    assert_eq!(queue.dequeue(&ctx, "r2").unwrap().entry, "a");
    queue.ack("r1").unwrap();
    queue.ack("r2").unwrap();

    assert_eq!(queue.dequeue(&ctx, "r1").unwrap().entry, "b");
    assert_eq!(queue.dequeue(&ctx, "r2").unwrap().entry, "b");
    queue.ack("r1").unwrap();
    queue.ack("r2").unwrap();
}
