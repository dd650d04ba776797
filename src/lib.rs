//! fleetbus: a durable local pub/sub message bus and the scheduling kernel
//! that drives a fleet of long-lived services on top of it.
//!
//! Three pieces compose the core:
//! - [`queue`] — a durable, append-only, date-rotated log per channel.
//! - [`messenger`] — one queue per channel, subscriber workers, enrichment,
//!   and routing-loop suppression.
//! - [`kernel`] — runs a set of periodic [`kernel::TaskSpec`]s concurrently,
//!   honoring cancellation and restart cadence.
//!
//! Everything else (`deps`, `service`, `os_provider`, `state_store`,
//! `logging`) is the ambient collaborator layer those three pieces are
//! built against.

pub mod context;
pub mod deps;
pub mod error;
pub mod kernel;
pub mod logging;
pub mod message;
pub mod messenger;
pub mod os_provider;
pub mod queue;
pub mod service;
pub mod services;
pub mod state_store;
pub mod testing;

pub use context::{CancelFn, Context};
pub use deps::Dependencies;
pub use error::{Error, Result};
pub use message::Message;
pub use messenger::Messenger;
pub use queue::PersistentQueue;
