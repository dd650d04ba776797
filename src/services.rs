//! Two minimal, illustrative [`Service`] implementations. Neither is a
//! product: they exist so the [`crate::service::Registry`] in tests and the
//! demo binary has something to register, the way a bare interface with no
//! implementation reads as unfinished.

use std::sync::Arc;
use std::time::Duration;

use crate::context::Context;
use crate::deps::Dependencies;
use crate::message::Message;
use crate::messenger::SubscribeOptions;
use crate::service::Service;
use crate::Result;

/// Publishes a liveness `Message` on every `Check`.
pub struct HeartbeatService {
    deps: Arc<Dependencies>,
    channel_name: String,
    service_name: String,
}

impl HeartbeatService {
    pub fn new(deps: Arc<Dependencies>, channel_name: impl Into<String>) -> Self {
        HeartbeatService {
            deps,
            channel_name: channel_name.into(),
            service_name: "heartbeat".to_string(),
        }
    }
}

impl Service for HeartbeatService {
    fn validate_config(&self) -> Vec<String> {
        if self.channel_name.is_empty() {
            vec!["heartbeat: channel_name must not be empty".to_string()]
        } else {
            Vec::new()
        }
    }

    fn initialize(&self) -> Result<()> {
        Ok(())
    }

    fn check(&self) -> Result<()> {
        self.deps.messenger.send(Message {
            channel_name: self.channel_name.clone(),
            service_name: Some(self.service_name.clone()),
            service_type: Some("heartbeat".to_string()),
            status: Some("alive".to_string()),
            ..Default::default()
        })
    }
}

/// Subscribes to `from_channel` and republishes every message, unmodified
/// apart from the bus's own enrichment, to `to_channel`.
pub struct EchoService {
    deps: Arc<Dependencies>,
    from_channel: String,
    to_channel: String,
}

impl EchoService {
    pub fn new(
        deps: Arc<Dependencies>,
        from_channel: impl Into<String>,
        to_channel: impl Into<String>,
    ) -> Self {
        EchoService {
            deps,
            from_channel: from_channel.into(),
            to_channel: to_channel.into(),
        }
    }
}

impl Service for EchoService {
    fn validate_config(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.from_channel.is_empty() {
            errors.push("echo: from_channel must not be empty".to_string());
        }
        if self.to_channel.is_empty() {
            errors.push("echo: to_channel must not be empty".to_string());
        }
        if self.from_channel == self.to_channel {
            errors.push("echo: from_channel and to_channel must differ".to_string());
        }
        errors
    }

    fn initialize(&self) -> Result<()> {
        let messenger = Arc::clone(&self.deps.messenger);
        let to_channel = self.to_channel.clone();
        messenger.subscribe(
            self.deps.root_ctx.clone(),
            SubscribeOptions {
                source_name: "echo".to_string(),
                channel_name: self.from_channel.clone(),
                service_name: Some("echo".to_string()),
                service_type: Some("echo".to_string()),
                max_age: Some(Duration::from_secs(3600)),
            },
            move |mut msg| {
                msg.channel_name = to_channel.clone();
                messenger.send(msg)
            },
        )
    }

    fn check(&self) -> Result<()> {
        Ok(())
    }
}
