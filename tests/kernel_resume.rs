//! End-to-end scenario 6: a kernel resuming with a recently-saved
//! `last_check_<task>` sleeps out the remaining cadence instead of
//! stampeding, then runs and advances the saved timestamp.
//!
//! Real time is scaled down from the scenario's 60s/30s in spec.md to keep
//! the test fast; the property under test — sleep-to-cadence, then run,
//! then advance the stored timestamp — is timescale-independent.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use fleetbus::deps::Dependencies;
use fleetbus::kernel::{Kernel, TaskSpec};
use fleetbus::logging::LogFacadeLogger;
use fleetbus::messenger::Messenger;
use fleetbus::os_provider::{OsProvider, StdOsProvider};
use fleetbus::state_store::{JsonFileStateStore, StateStoreExt};

#[test]
fn resumes_cadence_then_runs_and_advances_timestamp() {
    let data_dir = tempfile::tempdir().expect("tempdir");
    let state_dir = tempfile::tempdir().expect("tempdir");
    let os: Arc<dyn OsProvider> = Arc::new(StdOsProvider);
    let logger: Arc<dyn fleetbus::logging::Logger> = Arc::new(LogFacadeLogger);

    let state_store = Arc::new(
        JsonFileStateStore::new(state_dir.path(), Arc::clone(&os)).expect("open state store"),
    );
    let interval = Duration::from_millis(600);
    let initial_last_run = Utc::now() - chrono::Duration::milliseconds(300);
    state_store
        .save("last_check_svc", &initial_last_run)
        .expect("seed last_check");

    let messenger = Arc::new(Messenger::new(data_dir.path(), Arc::clone(&os), Arc::clone(&logger)));
    let deps = Arc::new(Dependencies::new(
        logger,
        os,
        messenger,
        Arc::clone(&state_store) as Arc<dyn fleetbus::state_store::StateStore>,
    ));
    let kernel = Kernel::new(Arc::clone(&deps));

    let runs = Arc::new(AtomicUsize::new(0));
    let runs_clone = Arc::clone(&runs);
    let task = TaskSpec::new("svc", move |_ctx| {
        runs_clone.fetch_add(1, Ordering::SeqCst);
        Ok(())
    })
    .with_interval(interval);

    let deps_for_stop = Arc::clone(&deps);
    let handle = std::thread::spawn(move || kernel.start(vec![task]));

    std::thread::sleep(Duration::from_millis(150));
    assert_eq!(
        runs.load(Ordering::SeqCst),
        0,
        "task must not run before the resumed cadence elapses"
    );

    std::thread::sleep(Duration::from_millis(300));
    assert_eq!(
        runs.load(Ordering::SeqCst),
        1,
        "task must run once the resumed cadence elapses"
    );

    deps_for_stop.shutdown();
    handle.join().expect("kernel thread").unwrap();

    let stored: DateTime<Utc> = state_store
        .load("last_check_svc")
        .expect("load last_check")
        .expect("last_check present");
    assert!(stored > initial_last_run);
}
