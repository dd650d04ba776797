//! The Service contract and Registry (§4.4): the uniform lifecycle the
//! kernel drives, and the name-to-factory mapping used to instantiate
//! services by configuration.

use std::collections::HashMap;
use std::sync::Arc;

use crate::deps::Dependencies;
use crate::Result;

/// A unit of periodic work the kernel schedules. Concrete services
/// (heartbeat emitters, sensor pollers, HTTP posters, ...) are outside this
/// crate's scope; this trait is the only contract the kernel needs.
pub trait Service: Send + Sync {
    /// Static checks against declared subscriptions, publications, and
    /// configuration. Returns every violation found; never panics.
    fn validate_config(&self) -> Vec<String>;

    /// Idempotent setup, typically `Messenger::subscribe` calls for each
    /// declared input.
    fn initialize(&self) -> Result<()>;

    /// The unit of periodic work the kernel invokes on the configured
    /// interval. May be a no-op for purely subscription-driven services.
    fn check(&self) -> Result<()>;
}

/// Builds a [`Service`] from shared [`Dependencies`], used by the registry
/// to defer construction until the kernel actually needs an instance.
pub type ServiceFactory = Arc<dyn Fn(Arc<Dependencies>) -> Box<dyn Service> + Send + Sync>;

/// A name-to-factory mapping the kernel consults when instantiating
/// configured services.
#[derive(Clone, Default)]
pub struct Registry {
    factories: HashMap<String, ServiceFactory>,
}

impl Registry {
    pub fn new() -> Self {
        Registry::default()
    }

    pub fn register(&mut self, name: impl Into<String>, factory: ServiceFactory) {
        self.factories.insert(name.into(), factory);
    }

    pub fn build(&self, name: &str, deps: Arc<Dependencies>) -> Result<Box<dyn Service>> {
        match self.factories.get(name) {
            Some(factory) => Ok(factory(deps)),
            None => Err(crate::Error::UnknownServiceType(name.to_string())),
        }
    }
}
