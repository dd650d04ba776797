//! The Kernel (§4.3): runs a set of periodic [`TaskSpec`]s concurrently,
//! one OS thread per task, joining all of them before `start` returns.

mod schedule;
mod task;

pub use task::TaskSpec;

use std::path::PathBuf;
use std::sync::Arc;

use crate::deps::Dependencies;
use crate::{Error, Result};

/// The supervisor that owns a [`Dependencies`] bundle and drives a set of
/// tasks against it.
pub struct Kernel {
    deps: Arc<Dependencies>,
}

impl Kernel {
    pub fn new(deps: Arc<Dependencies>) -> Self {
        Kernel { deps }
    }

    /// Spawns one worker per task and blocks until every worker has
    /// exited — the `WaitGroup` join from §4.3 step 3. Workers exit when
    /// the root context is cancelled (see [`Kernel::stop`]) or, for
    /// one-shot tasks, after their single run completes.
    pub fn start(&self, tasks: Vec<TaskSpec>) -> Result<()> {
        let mut handles = Vec::with_capacity(tasks.len());
        for spec in tasks {
            let deps = Arc::clone(&self.deps);
            let name = spec.name.clone();
            let handle = std::thread::Builder::new()
                .name(format!("task-{name}"))
                .spawn(move || schedule::run_task_worker(deps, spec))
                .map_err(|e| Error::io(PathBuf::new(), e))?;
            handles.push(handle);
        }
        for handle in handles {
            let _ = handle.join();
        }
        Ok(())
    }

    /// Cancels the root context shared with every task worker. Typically
    /// called from a different thread than the one blocked in `start`.
    pub fn stop(&self) {
        self.deps.shutdown();
    }

    pub fn dependencies(&self) -> &Arc<Dependencies> {
        &self.deps
    }
}
