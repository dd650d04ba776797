//! Wires a real `Dependencies` bundle (disk-backed queues and state,
//! `log`-facade logging) and runs a heartbeat + echo pair under the kernel
//! for a few seconds, so the whole stack can be exercised end to end
//! outside the test harness.

use std::sync::Arc;
use std::time::Duration;

use fleetbus::deps::Dependencies;
use fleetbus::kernel::{Kernel, TaskSpec};
use fleetbus::logging::LogFacadeLogger;
use fleetbus::messenger::{Messenger, SubscribeOptions};
use fleetbus::os_provider::StdOsProvider;
use fleetbus::service::Service;
use fleetbus::services::{EchoService, HeartbeatService};
use fleetbus::state_store::JsonFileStateStore;

fn main() -> fleetbus::Result<()> {
    env_logger::init();

    let data_dir = std::env::temp_dir().join(format!("fleetbus-demo-{}", std::process::id()));
    let state_dir = data_dir.join("state");

    let os: Arc<dyn fleetbus::os_provider::OsProvider> = Arc::new(StdOsProvider);
    let logger: Arc<dyn fleetbus::logging::Logger> = Arc::new(LogFacadeLogger);
    let messenger = Arc::new(Messenger::new(
        data_dir.clone(),
        Arc::clone(&os),
        Arc::clone(&logger),
    ));
    let state_store = Arc::new(JsonFileStateStore::new(state_dir, Arc::clone(&os))?);

    let deps = Arc::new(Dependencies::new(
        Arc::clone(&logger),
        Arc::clone(&os),
        Arc::clone(&messenger),
        state_store,
    ));

    let heartbeat = HeartbeatService::new(Arc::clone(&deps), "health");
    let echo = EchoService::new(Arc::clone(&deps), "health", "health-archive");
    echo.initialize()?;

    messenger.subscribe(
        deps.root_ctx.clone(),
        SubscribeOptions {
            source_name: "demo-printer".to_string(),
            channel_name: "health-archive".to_string(),
            ..Default::default()
        },
        |msg| {
            println!("health-archive: {:?} from {}", msg.status, msg.hostname);
            Ok(())
        },
    )?;

    let kernel = Kernel::new(Arc::clone(&deps));
    let tasks = vec![TaskSpec::new("heartbeat", move |_ctx| heartbeat.check())
        .with_interval(Duration::from_secs(1))
        .with_error_channel("errors")];

    let deps_for_stop = Arc::clone(&deps);
    let stopper = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_secs(5));
        deps_for_stop.shutdown();
    });

    kernel.start(tasks)?;
    stopper.join().expect("stopper thread");
    messenger.shutdown();

    println!("final stats: {:?}", messenger.get_stats());
    Ok(())
}
