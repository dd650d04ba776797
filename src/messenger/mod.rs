//! The Messenger (§4.2): one Persistent Queue per channel, durable
//! subscriber cursors, message enrichment, and routing-loop suppression.

mod stats;
mod subscriber;

pub use stats::StatsSnapshot;
pub use subscriber::SubscribeOptions;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use chrono::Utc;

use crate::context::Context;
use crate::logging::Logger;
use crate::message::Message;
use crate::os_provider::OsProvider;
use crate::queue::{PersistentQueue, DEFAULT_POLL_INTERVAL};
use crate::{Error, Result};

use stats::Stats;

/// Manages one [`PersistentQueue`] per channel and the subscriber workers
/// reading from them.
pub struct Messenger {
    data_dir: Mutex<PathBuf>,
    hostname: Mutex<String>,
    os: Arc<dyn OsProvider>,
    logger: Arc<dyn Logger>,
    queues: Mutex<HashMap<String, Arc<PersistentQueue>>>,
    stats: Arc<Stats>,
    subscribers: Mutex<Vec<JoinHandle<()>>>,
    poll_interval: Duration,
}

impl Messenger {
    pub fn new(
        data_dir: impl Into<PathBuf>,
        os: Arc<dyn OsProvider>,
        logger: Arc<dyn Logger>,
    ) -> Self {
        Self::with_poll_interval(data_dir, os, logger, DEFAULT_POLL_INTERVAL)
    }

    pub fn with_poll_interval(
        data_dir: impl Into<PathBuf>,
        os: Arc<dyn OsProvider>,
        logger: Arc<dyn Logger>,
        poll_interval: Duration,
    ) -> Self {
        let hostname = match os.hostname() {
            Ok(name) => name,
            Err(e) => {
                logger.warn("failed to resolve hostname", &[("error", &e.to_string())]);
                String::new()
            }
        };
        Messenger {
            data_dir: Mutex::new(data_dir.into()),
            hostname: Mutex::new(hostname),
            os,
            logger,
            queues: Mutex::new(HashMap::new()),
            stats: Arc::new(Stats::default()),
            subscribers: Mutex::new(Vec::new()),
            poll_interval,
        }
    }

    pub fn set_data_dir(&self, dir: impl Into<PathBuf>) {
        *self.data_dir.lock().expect("messenger mutex poisoned") = dir.into();
    }

    pub fn set_hostname(&self, hostname: impl Into<String>) {
        *self.hostname.lock().expect("messenger mutex poisoned") = hostname.into();
    }

    pub fn get_stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Exposed for services that re-enqueue on handler failure and want to
    /// account for it (§9: "the retry counter is incremented by services
    /// that choose to re-enqueue").
    pub fn record_retry(&self) {
        self.stats.record_retry();
    }

    /// Enriches and appends `msg` to its channel, unless it has already
    /// looped back through this host (§4.2).
    pub fn send(&self, mut msg: Message) -> Result<()> {
        if msg.channel_name.is_empty() {
            return Err(Error::EmptyField {
                field: "channel name",
            });
        }
        let queue = self.queue_for(&msg.channel_name)?;
        let hostname = self.hostname.lock().expect("messenger mutex poisoned").clone();

        msg.timestamp = Some(Utc::now());
        msg.hostname = hostname.clone();
        let token = Message::route_token(&hostname, &msg.channel_name);
        if msg.has_visited(&token) {
            return Ok(());
        }
        msg.route.push(token);

        let encoded = serde_json::to_string(&msg)?;
        match queue.enqueue(&encoded) {
            Ok(()) => {
                self.stats.record_message();
                Ok(())
            }
            Err(e) => {
                self.stats.record_failure();
                Err(e)
            }
        }
    }

    /// Subscribes `handler` to `opts.channel_name`, delivering decoded
    /// messages only.
    pub fn subscribe<H>(&self, ctx: Context, opts: SubscribeOptions, handler: H) -> Result<()>
    where
        H: Fn(Message) -> Result<()> + Send + 'static,
    {
        self.subscribe_extended(ctx, opts, move |msg, _file_name, _offset| handler(msg))
    }

    /// Like [`Messenger::subscribe`], but the handler also receives the
    /// originating `(file_name, offset)` for flow-control purposes.
    pub fn subscribe_extended<H>(&self, ctx: Context, opts: SubscribeOptions, handler: H) -> Result<()>
    where
        H: Fn(Message, String, u64) -> Result<()> + Send + 'static,
    {
        if opts.channel_name.is_empty() {
            return Err(Error::EmptyField {
                field: "channel name",
            });
        }
        let queue = self.queue_for(&opts.channel_name)?;
        let name = subscriber::reader_name(&opts);
        let stats = Arc::clone(&self.stats);
        let logger = Arc::clone(&self.logger);
        let max_age = opts.max_age;

        let handle = std::thread::Builder::new()
            .name(format!("subscriber-{name}"))
            .spawn(move || subscriber::run(ctx, queue, name, max_age, handler, stats, logger))
            .map_err(|e| Error::io(PathBuf::new(), e))?;

        self.subscribers
            .lock()
            .expect("messenger mutex poisoned")
            .push(handle);
        Ok(())
    }

    pub fn set_reader_state(
        &self,
        channel_name: &str,
        reader_name: &str,
        file_name: impl Into<String>,
        offset: u64,
    ) -> Result<()> {
        self.queue_for(channel_name)?
            .set_state(reader_name, file_name, offset)
    }

    pub fn seek_to_end(&self, channel_name: &str, reader_name: &str) -> Result<()> {
        self.queue_for(channel_name)?.seek_to_end(reader_name)
    }

    /// Joins every subscriber worker spawned so far. Callers must cancel
    /// the contexts they subscribed with before calling this, or it blocks
    /// forever waiting on workers that never exit.
    pub fn shutdown(&self) {
        let handles = std::mem::take(&mut *self.subscribers.lock().expect("messenger mutex poisoned"));
        for handle in handles {
            let _ = handle.join();
        }
    }

    fn queue_for(&self, channel_name: &str) -> Result<Arc<PersistentQueue>> {
        let mut queues = self.queues.lock().expect("messenger mutex poisoned");
        if let Some(queue) = queues.get(channel_name) {
            return Ok(Arc::clone(queue));
        }
        let dir = self
            .data_dir
            .lock()
            .expect("messenger mutex poisoned")
            .join(channel_name);
        let queue = Arc::new(PersistentQueue::open_with_poll_interval(
            channel_name,
            dir,
            Arc::clone(&self.os),
            Arc::clone(&self.logger),
            self.poll_interval,
        )?);
        queues.insert(channel_name.to_string(), Arc::clone(&queue));
        Ok(queue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeOsProvider, RecordingLogger};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;

    fn messenger() -> Messenger {
        let os: Arc<dyn OsProvider> = Arc::new(FakeOsProvider::new());
        let logger: Arc<dyn Logger> = Arc::new(RecordingLogger::new());
        Messenger::with_poll_interval("/data", os, logger, Duration::from_millis(5))
    }

    #[test]
    fn send_rejects_empty_channel() {
        let m = messenger();
        let err = m.send(Message::default()).unwrap_err();
        assert!(matches!(err, Error::EmptyField { .. }));
    }

    #[test]
    fn send_enriches_timestamp_and_hostname() {
        let m = messenger();
        m.set_hostname("box1");
        m.send(Message {
            channel_name: "alerts".into(),
            text: Some("hi".into()),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(m.get_stats().total_messages, 1);
    }

    #[test]
    fn send_suppresses_routing_loop() {
        let m = messenger();
        m.set_hostname("box1");
        let looped = Message {
            channel_name: "alerts".into(),
            route: vec!["box1:alerts".into()],
            ..Default::default()
        };
        m.send(looped).unwrap();
        assert_eq!(m.get_stats().total_messages, 0);
    }

    #[test]
    fn subscriber_receives_sent_message_in_order() {
        let m = Arc::new(messenger());
        let received: Arc<StdMutex<Vec<String>>> = Arc::new(StdMutex::new(Vec::new()));
        let received_clone = Arc::clone(&received);
        let ctx = Context::new();

        m.subscribe(
            ctx.clone(),
            SubscribeOptions {
                source_name: "r1".into(),
                channel_name: "alerts".into(),
                ..Default::default()
            },
            move |msg| {
                received_clone
                    .lock()
                    .unwrap()
                    .push(msg.text.unwrap_or_default());
                Ok(())
            },
        )
        .unwrap();

        m.send(Message {
            channel_name: "alerts".into(),
            text: Some("item1".into()),
            ..Default::default()
        })
        .unwrap();
        m.send(Message {
            channel_name: "alerts".into(),
            text: Some("item2".into()),
            ..Default::default()
        })
        .unwrap();

        let deadline = std::time::Instant::now() + Duration::from_secs(2);
        while received.lock().unwrap().len() < 2 && std::time::Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        ctx.cancel();
        m.shutdown();

        assert_eq!(*received.lock().unwrap(), vec!["item1", "item2"]);
    }

    #[test]
    fn handler_failure_still_acks() {
        let m = Arc::new(messenger());
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = Arc::clone(&calls);
        let ctx = Context::new();

        m.subscribe(
            ctx.clone(),
            SubscribeOptions {
                source_name: "r1".into(),
                channel_name: "alerts".into(),
                ..Default::default()
            },
            move |_msg| {
                calls_clone.fetch_add(1, Ordering::SeqCst);
                Err(Error::Programming("boom"))
            },
        )
        .unwrap();

        m.send(Message {
            channel_name: "alerts".into(),
            text: Some("x".into()),
            ..Default::default()
        })
        .unwrap();

        let deadline = std::time::Instant::now() + Duration::from_secs(2);
        while calls.load(Ordering::SeqCst) < 1 && std::time::Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        ctx.cancel();
        m.shutdown();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(m.get_stats().total_failures, 1);
    }
}
