//! The Persistent Queue (§3, §4.1): a durable, single-writer /
//! multi-reader, append-only log per channel with per-reader checkpoints,
//! date-based file rotation, and blocking dequeue.
//!
//! Two [`PersistentQueue`] instances opened on the same `(name, dir)` do
//! not share state — callers (the messenger) are responsible for keeping
//! exactly one instance per channel, per §4.1's "MUST share state" clause.

mod notifier;
mod rotation;
mod state;

pub use notifier::{NotifyOutcome, Notifier};
pub use rotation::{date_suffix_of, list_queue_files, log_file_name, today_suffix};
pub use state::{is_ephemeral, reader_state_file_name, ReaderState};

use std::collections::HashMap;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::context::Context;
use crate::logging::Logger;
use crate::os_provider::{read_line_at, OpenFlags, OsProvider};
use crate::{Error, Result};

/// Production poll interval for blocking dequeue (§4.1: "SHOULD choose
/// ≤100 ms in production").
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// A record returned by [`PersistentQueue::dequeue`]: the decoded line plus
/// the pre-read `(file_name, offset)` the caller can use for its own
/// bookkeeping (e.g. [`crate::messenger::Messenger`]'s extended callback).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DequeueRecord {
    pub entry: String,
    pub file_name: String,
    pub offset: u64,
}

#[derive(Debug, Default)]
struct Guts {
    /// Advance position staged by a successful dequeue, not yet committed
    /// by `ack`. Consulted first on the next dequeue so repeated dequeues
    /// without an intervening ack still advance.
    pending: HashMap<String, ReaderState>,
    /// Committed cursor for ephemeral (`ws_`) readers; never touches disk.
    ephemeral: HashMap<String, ReaderState>,
}

pub struct PersistentQueue {
    name: String,
    dir: PathBuf,
    os: Arc<dyn OsProvider>,
    logger: Arc<dyn Logger>,
    guts: Mutex<Guts>,
    notifier: Notifier,
    poll_interval: Duration,
}

impl PersistentQueue {
    pub fn open(
        name: impl Into<String>,
        dir: impl Into<PathBuf>,
        os: Arc<dyn OsProvider>,
        logger: Arc<dyn Logger>,
    ) -> Result<Self> {
        Self::open_with_poll_interval(name, dir, os, logger, DEFAULT_POLL_INTERVAL)
    }

    pub fn open_with_poll_interval(
        name: impl Into<String>,
        dir: impl Into<PathBuf>,
        os: Arc<dyn OsProvider>,
        logger: Arc<dyn Logger>,
        poll_interval: Duration,
    ) -> Result<Self> {
        let name = name.into();
        let dir = dir.into();
        if name.is_empty() {
            return Err(Error::EmptyField { field: "queue name" });
        }
        if dir.as_os_str().is_empty() {
            return Err(Error::EmptyField {
                field: "queue directory",
            });
        }
        os.mkdir_all(&dir).map_err(|e| Error::io(&dir, e))?;
        Ok(PersistentQueue {
            name,
            dir,
            os,
            logger,
            guts: Mutex::new(Guts::default()),
            notifier: Notifier::new(),
            poll_interval,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dir(&self) -> &std::path::Path {
        &self.dir
    }

    /// Appends `entry` plus a trailing newline to today's log file,
    /// creating it if needed, then wakes any blocked dequeuers.
    pub fn enqueue(&self, entry: &str) -> Result<()> {
        let _guard = self.guts.lock().expect("queue mutex poisoned");
        let date = today_suffix();
        let file_name = log_file_name(&self.name, &date);
        let path = self.dir.join(&file_name);
        let mut handle = self
            .os
            .open_file(&path, OpenFlags::append_create())
            .map_err(|e| Error::io(&path, e))?;
        let mut bytes = entry.as_bytes().to_vec();
        bytes.push(b'\n');
        handle.write_all(&bytes).map_err(|e| Error::io(&path, e))?;
        handle.sync_all().map_err(|e| Error::io(&path, e))?;
        drop(_guard);
        self.notifier.notify_all();
        Ok(())
    }

    /// Blocks until a record is available for `reader_name`, `ctx` is
    /// cancelled, or an unrecoverable I/O error occurs.
    pub fn dequeue(&self, ctx: &Context, reader_name: &str) -> Result<DequeueRecord> {
        loop {
            let mut guard = self.guts.lock().expect("queue mutex poisoned");
            let mut cursor = self.load_reader_state(&guard, reader_name)?;

            if cursor.file_name.is_empty() {
                let files = list_queue_files(&*self.os, &self.dir, &self.name)?;
                if let Some(first) = files.into_iter().next() {
                    cursor.file_name = first;
                    cursor.offset = 0;
                }
            }

            if !cursor.file_name.is_empty() {
                let path = self.dir.join(&cursor.file_name);
                match self.os.open_file(&path, OpenFlags::read_only()) {
                    Ok(mut handle) => {
                        match read_line_at(&mut *handle, cursor.offset) {
                            Ok(Some((line, next_offset))) => {
                                let pre_offset = cursor.offset;
                                let file_name = cursor.file_name.clone();
                                let advanced = ReaderState {
                                    file_name: file_name.clone(),
                                    offset: next_offset,
                                };
                                guard.pending.insert(reader_name.to_string(), advanced);
                                return Ok(DequeueRecord {
                                    entry: line,
                                    file_name,
                                    offset: pre_offset,
                                });
                            }
                            Ok(None) => {
                                if let Some(next) = self.next_file_after(&cursor.file_name)? {
                                    let advanced = ReaderState {
                                        file_name: next,
                                        offset: 0,
                                    };
                                    self.commit_reader_state(&mut guard, reader_name, advanced)?;
                                    continue;
                                }
                                // No newer file; fall through to wait.
                            }
                            Err(e) => return Err(Error::io(&path, e)),
                        }
                    }
                    Err(e) if e.kind() == io::ErrorKind::NotFound => {
                        self.logger.warn(
                            "queue file missing, resetting reader cursor",
                            &[
                                ("queue", self.name.as_str()),
                                ("reader", reader_name),
                                ("file", cursor.file_name.as_str()),
                            ],
                        );
                        self.commit_reader_state(
                            &mut guard,
                            reader_name,
                            ReaderState::default(),
                        )?;
                        continue;
                    }
                    Err(e) => return Err(Error::io(&path, e)),
                }
            }

            let since = self.notifier.generation();
            drop(guard);
            if ctx.is_cancelled() {
                return Err(Error::Cancelled);
            }
            if self.notifier.wait(since, self.poll_interval, ctx) == NotifyOutcome::Cancelled {
                return Err(Error::Cancelled);
            }
        }
    }

    /// Commits the reader's pending advance (if any) as its persisted
    /// cursor. A no-op, and not an error, when nothing is pending.
    pub fn ack(&self, reader_name: &str) -> Result<()> {
        let mut guard = self.guts.lock().expect("queue mutex poisoned");
        if let Some(pending) = guard.pending.get(reader_name).cloned() {
            self.commit_reader_state(&mut guard, reader_name, pending)?;
        }
        Ok(())
    }

    /// Forcibly replaces the persisted cursor, bypassing pending state.
    pub fn set_state(
        &self,
        reader_name: &str,
        file_name: impl Into<String>,
        offset: u64,
    ) -> Result<()> {
        let mut guard = self.guts.lock().expect("queue mutex poisoned");
        let state = ReaderState {
            file_name: file_name.into(),
            offset,
        };
        self.commit_reader_state(&mut guard, reader_name, state)
    }

    /// Positions `reader_name` at the end of the newest log file, skipping
    /// historical records.
    pub fn seek_to_end(&self, reader_name: &str) -> Result<()> {
        let mut guard = self.guts.lock().expect("queue mutex poisoned");
        let files = list_queue_files(&*self.os, &self.dir, &self.name)?;
        let state = match files.last() {
            Some(latest) => {
                let path = self.dir.join(latest);
                let meta = self.os.stat(&path).map_err(|e| Error::io(&path, e))?;
                ReaderState {
                    file_name: latest.clone(),
                    offset: meta.len,
                }
            }
            None => ReaderState::default(),
        };
        self.commit_reader_state(&mut guard, reader_name, state)
    }

    fn next_file_after(&self, file_name: &str) -> Result<Option<String>> {
        let today = today_suffix();
        let is_before_today = date_suffix_of(&self.name, file_name)
            .map(|d| d.as_str() < today.as_str())
            .unwrap_or(false);
        if !is_before_today {
            return Ok(None);
        }
        let files = list_queue_files(&*self.os, &self.dir, &self.name)?;
        Ok(files.into_iter().find(|f| f.as_str() > file_name))
    }

    fn load_reader_state(&self, guard: &Guts, reader_name: &str) -> Result<ReaderState> {
        if let Some(pending) = guard.pending.get(reader_name) {
            return Ok(pending.clone());
        }
        if is_ephemeral(reader_name) {
            Ok(guard.ephemeral.get(reader_name).cloned().unwrap_or_default())
        } else {
            self.read_persisted_state(reader_name)
        }
    }

    fn commit_reader_state(
        &self,
        guard: &mut Guts,
        reader_name: &str,
        state: ReaderState,
    ) -> Result<()> {
        guard.pending.remove(reader_name);
        if is_ephemeral(reader_name) {
            guard.ephemeral.insert(reader_name.to_string(), state);
            Ok(())
        } else {
            self.write_persisted_state(reader_name, &state)
        }
    }

    fn reader_state_path(&self, reader_name: &str) -> PathBuf {
        self.dir
            .join(reader_state_file_name(&self.name, reader_name))
    }

    fn write_persisted_state(&self, reader_name: &str, state: &ReaderState) -> Result<()> {
        let path = self.reader_state_path(reader_name);
        let bytes = serde_json::to_vec(state)?;
        let mut handle = self
            .os
            .open_file(&path, OpenFlags::create_truncate_write())
            .map_err(|e| Error::io(&path, e))?;
        handle.write_all(&bytes).map_err(|e| Error::io(&path, e))?;
        handle.sync_all().map_err(|e| Error::io(&path, e))?;
        Ok(())
    }

    /// Missing file or corrupt JSON both resolve to zero state (§4.1); a
    /// corrupt file is logged via [`Error::Corrupt`] rather than silently
    /// discarded, so the condition is at least observable.
    fn read_persisted_state(&self, reader_name: &str) -> Result<ReaderState> {
        let path = self.reader_state_path(reader_name);
        match self.os.read_file(&path) {
            Ok(bytes) if bytes.is_empty() => Ok(ReaderState::default()),
            Ok(bytes) => match serde_json::from_slice(&bytes) {
                Ok(state) => Ok(state),
                Err(_) => {
                    let corrupt = Error::Corrupt("reader state json");
                    self.logger.warn(
                        "corrupt reader state, resetting cursor",
                        &[
                            ("queue", self.name.as_str()),
                            ("reader", reader_name),
                            ("error", &corrupt.to_string()),
                        ],
                    );
                    Ok(ReaderState::default())
                }
            },
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(ReaderState::default()),
            Err(e) => Err(Error::io(&path, e)),
        }
    }
}
