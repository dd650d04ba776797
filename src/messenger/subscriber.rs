//! A single subscriber's durable reader name and background worker loop
//! (§4.2 Subscribe/SubscribeExtended).

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use crate::context::Context;
use crate::logging::Logger;
use crate::message::Message;
use crate::queue::PersistentQueue;
use crate::Error;

use super::stats::Stats;

/// Parameters identifying one subscription, mirroring `Subscribe`'s
/// positional arguments in §4.2.
#[derive(Debug, Clone, Default)]
pub struct SubscribeOptions {
    pub source_name: String,
    pub channel_name: String,
    pub service_type: Option<String>,
    pub service_name: Option<String>,
    pub max_age: Option<Duration>,
}

/// Derives the durable cursor name for a subscription: `serviceName:
/// serviceType:sourceName` when both identity fields are present, else the
/// bare `sourceName`.
pub fn reader_name(opts: &SubscribeOptions) -> String {
    match (&opts.service_name, &opts.service_type) {
        (Some(service_name), Some(service_type)) => {
            format!("{service_name}:{service_type}:{}", opts.source_name)
        }
        _ => opts.source_name.clone(),
    }
}

/// Backoff applied after a dequeue error that isn't cancellation, before
/// retrying (§4.2 step 3).
const DEQUEUE_ERROR_BACKOFF: Duration = Duration::from_millis(100);

pub fn run<H>(
    ctx: Context,
    queue: Arc<PersistentQueue>,
    reader_name: String,
    max_age: Option<Duration>,
    handler: H,
    stats: Arc<Stats>,
    logger: Arc<dyn Logger>,
) where
    H: Fn(Message, String, u64) -> crate::Result<()> + Send + 'static,
{
    loop {
        if ctx.is_cancelled() {
            return;
        }
        let record = match queue.dequeue(&ctx, &reader_name) {
            Ok(record) => record,
            Err(Error::Cancelled) => return,
            Err(e) => {
                logger.error(
                    "dequeue failed, backing off",
                    &[("queue", queue.name()), ("reader", &reader_name), ("error", &e.to_string())],
                );
                stats.record_failure();
                if ctx.wait_timeout(DEQUEUE_ERROR_BACKOFF) {
                    return;
                }
                continue;
            }
        };

        let msg = match serde_json::from_str::<Message>(&record.entry) {
            Ok(msg) => msg,
            Err(e) => {
                logger.error(
                    "poison record, dropping",
                    &[("queue", queue.name()), ("reader", &reader_name), ("error", &e.to_string())],
                );
                let _ = queue.ack(&reader_name);
                continue;
            }
        };

        if let Some(max_age) = max_age {
            if let Some(timestamp) = msg.timestamp {
                let age = Utc::now().signed_duration_since(timestamp);
                if age.to_std().map(|age| age > max_age).unwrap_or(false) {
                    let _ = queue.ack(&reader_name);
                    continue;
                }
            }
        }

        if let Err(e) = handler(msg, record.file_name, record.offset) {
            logger.error(
                "subscriber handler failed",
                &[("queue", queue.name()), ("reader", &reader_name), ("error", &e.to_string())],
            );
            stats.record_failure();
        }
        if let Err(e) = queue.ack(&reader_name) {
            logger.error(
                "failed to ack after handler",
                &[("queue", queue.name()), ("reader", &reader_name), ("error", &e.to_string())],
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reader_name_prefers_full_identity() {
        let opts = SubscribeOptions {
            source_name: "poller-1".into(),
            channel_name: "telemetry".into(),
            service_type: Some("http-poller".into()),
            service_name: Some("weather".into()),
            max_age: None,
        };
        assert_eq!(reader_name(&opts), "weather:http-poller:poller-1");
    }

    #[test]
    fn reader_name_falls_back_to_source_name() {
        let opts = SubscribeOptions {
            source_name: "dashboard".into(),
            channel_name: "telemetry".into(),
            service_type: None,
            service_name: None,
            max_age: None,
        };
        assert_eq!(reader_name(&opts), "dashboard");
    }
}
