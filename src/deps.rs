//! The Dependencies container (§2): a late-bound holder for the logger, OS
//! provider, messenger, state store, and the root context/cancel pair that
//! every task and subscriber worker ultimately derives from.

use std::sync::Arc;

use crate::context::{CancelFn, Context};
use crate::logging::Logger;
use crate::messenger::Messenger;
use crate::os_provider::OsProvider;
use crate::state_store::StateStore;

pub struct Dependencies {
    pub logger: Arc<dyn Logger>,
    pub os: Arc<dyn OsProvider>,
    pub messenger: Arc<Messenger>,
    pub state_store: Arc<dyn StateStore>,
    pub root_ctx: Context,
    pub root_cancel: CancelFn,
}

impl Dependencies {
    pub fn new(
        logger: Arc<dyn Logger>,
        os: Arc<dyn OsProvider>,
        messenger: Arc<Messenger>,
        state_store: Arc<dyn StateStore>,
    ) -> Self {
        let (root_ctx, root_cancel) = Context::with_cancel();
        Dependencies {
            logger,
            os,
            messenger,
            state_store,
            root_ctx,
            root_cancel,
        }
    }

    /// Cancels the root context, the single point from which every task
    /// worker, subscriber worker, and blocking dequeue observes shutdown.
    pub fn shutdown(&self) {
        self.root_cancel.call();
    }
}

impl Dependencies {
    /// A fully in-memory [`Dependencies`] wired from the fakes in
    /// [`crate::testing`], for service and kernel unit tests.
    pub fn for_testing() -> Self {
        use crate::testing::{FakeOsProvider, FakeStateStore, RecordingLogger};

        let os: Arc<dyn OsProvider> = Arc::new(FakeOsProvider::new());
        let logger: Arc<dyn Logger> = Arc::new(RecordingLogger::new());
        let messenger = Arc::new(Messenger::with_poll_interval(
            "/data",
            Arc::clone(&os),
            Arc::clone(&logger),
            std::time::Duration::from_millis(10),
        ));
        let state_store: Arc<dyn StateStore> = Arc::new(FakeStateStore::new());
        Dependencies::new(logger, os, messenger, state_store)
    }
}
