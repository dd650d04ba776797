//! In-memory stand-ins for the injected collaborators (§6), used by this
//! crate's own test suite and exported for downstream service tests.
//!
//! [`FakeOsProvider`] is a single in-memory filesystem shared by clone —
//! every [`PersistentQueue`](crate::queue::PersistentQueue) opened against
//! it in a test sees the same files, the same way two processes share a
//! real directory.

use std::collections::HashMap;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

use crate::os_provider::{CommandOutput, DirEntry, FileHandle, Metadata, OpenFlags, OsProvider};

#[derive(Debug, Clone)]
struct FakeFile {
    data: Vec<u8>,
    modified: SystemTime,
}

#[derive(Debug, Default)]
struct Inner {
    files: HashMap<PathBuf, FakeFile>,
    dirs: std::collections::HashSet<PathBuf>,
}

/// An in-memory filesystem plus a fixed hostname, standing in for
/// [`crate::os_provider::StdOsProvider`] in tests.
#[derive(Clone)]
pub struct FakeOsProvider {
    inner: Arc<Mutex<Inner>>,
    hostname: String,
}

impl Default for FakeOsProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeOsProvider {
    pub fn new() -> Self {
        FakeOsProvider {
            inner: Arc::new(Mutex::new(Inner::default())),
            hostname: "test-host".to_string(),
        }
    }

    pub fn with_hostname(hostname: impl Into<String>) -> Self {
        FakeOsProvider {
            inner: Arc::new(Mutex::new(Inner::default())),
            hostname: hostname.into(),
        }
    }

    /// Seeds a file directly, as if it existed before the test started —
    /// used to set up pre-rotation fixtures.
    pub fn seed_file(&self, path: impl Into<PathBuf>, contents: impl Into<Vec<u8>>) {
        let mut inner = self.inner.lock().expect("fake os mutex poisoned");
        let path = path.into();
        if let Some(parent) = path.parent() {
            inner.dirs.insert(parent.to_path_buf());
        }
        inner.files.insert(
            path,
            FakeFile {
                data: contents.into(),
                modified: SystemTime::now(),
            },
        );
    }

    pub fn file_exists(&self, path: &Path) -> bool {
        self.inner
            .lock()
            .expect("fake os mutex poisoned")
            .files
            .contains_key(path)
    }
}

struct FakeHandle {
    inner: Arc<Mutex<Inner>>,
    path: PathBuf,
    cursor: u64,
    append: bool,
}

impl Read for FakeHandle {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let inner = self.inner.lock().expect("fake os mutex poisoned");
        let file = inner
            .files
            .get(&self.path)
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "file not found"))?;
        let start = self.cursor as usize;
        if start >= file.data.len() {
            return Ok(0);
        }
        let end = (start + buf.len()).min(file.data.len());
        let n = end - start;
        buf[..n].copy_from_slice(&file.data[start..end]);
        self.cursor += n as u64;
        Ok(n)
    }
}

impl Write for FakeHandle {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut inner = self.inner.lock().expect("fake os mutex poisoned");
        let file = inner.files.entry(self.path.clone()).or_insert(FakeFile {
            data: Vec::new(),
            modified: SystemTime::now(),
        });
        if self.append {
            file.data.extend_from_slice(buf);
            self.cursor = file.data.len() as u64;
        } else {
            let start = self.cursor as usize;
            if file.data.len() < start {
                file.data.resize(start, 0);
            }
            let end = start + buf.len();
            if file.data.len() < end {
                file.data.resize(end, 0);
            }
            file.data[start..end].copy_from_slice(buf);
            self.cursor = end as u64;
        }
        file.modified = SystemTime::now();
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Seek for FakeHandle {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let len = {
            let inner = self.inner.lock().expect("fake os mutex poisoned");
            inner.files.get(&self.path).map(|f| f.data.len() as u64).unwrap_or(0)
        };
        let new_cursor = match pos {
            SeekFrom::Start(off) => off,
            SeekFrom::End(delta) => (len as i64 + delta).max(0) as u64,
            SeekFrom::Current(delta) => (self.cursor as i64 + delta).max(0) as u64,
        };
        self.cursor = new_cursor;
        Ok(self.cursor)
    }
}

impl FileHandle for FakeHandle {
    fn sync_all(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl OsProvider for FakeOsProvider {
    fn hostname(&self) -> io::Result<String> {
        Ok(self.hostname.clone())
    }

    fn user_home_dir(&self) -> io::Result<PathBuf> {
        Ok(PathBuf::from("/home/test"))
    }

    fn read_file(&self, path: &Path) -> io::Result<Vec<u8>> {
        let inner = self.inner.lock().expect("fake os mutex poisoned");
        inner
            .files
            .get(path)
            .map(|f| f.data.clone())
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "file not found"))
    }

    fn open_file(&self, path: &Path, flags: OpenFlags) -> io::Result<Box<dyn FileHandle>> {
        let mut inner = self.inner.lock().expect("fake os mutex poisoned");
        let exists = inner.files.contains_key(path);
        if !exists && !flags.create {
            return Err(io::Error::new(io::ErrorKind::NotFound, "file not found"));
        }
        if !exists && flags.create {
            inner.files.insert(
                path.to_path_buf(),
                FakeFile {
                    data: Vec::new(),
                    modified: SystemTime::now(),
                },
            );
        } else if flags.truncate {
            if let Some(file) = inner.files.get_mut(path) {
                file.data.clear();
            }
        }
        drop(inner);
        let cursor = if flags.append {
            self.inner
                .lock()
                .expect("fake os mutex poisoned")
                .files
                .get(path)
                .map(|f| f.data.len() as u64)
                .unwrap_or(0)
        } else {
            0
        };
        Ok(Box::new(FakeHandle {
            inner: Arc::clone(&self.inner),
            path: path.to_path_buf(),
            cursor,
            append: flags.append,
        }))
    }

    fn mkdir_all(&self, path: &Path) -> io::Result<()> {
        let mut inner = self.inner.lock().expect("fake os mutex poisoned");
        let mut cur = PathBuf::new();
        for component in path.components() {
            cur.push(component);
            inner.dirs.insert(cur.clone());
        }
        Ok(())
    }

    fn read_dir(&self, path: &Path) -> io::Result<Vec<DirEntry>> {
        let inner = self.inner.lock().expect("fake os mutex poisoned");
        if !inner.dirs.contains(path) && !inner.files.keys().any(|p| p.parent() == Some(path)) {
            return Err(io::Error::new(io::ErrorKind::NotFound, "directory not found"));
        }
        let mut out = Vec::new();
        for file_path in inner.files.keys() {
            if file_path.parent() == Some(path) {
                out.push(DirEntry {
                    file_name: file_path
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_default(),
                    path: file_path.clone(),
                });
            }
        }
        Ok(out)
    }

    fn stat(&self, path: &Path) -> io::Result<Metadata> {
        let inner = self.inner.lock().expect("fake os mutex poisoned");
        inner
            .files
            .get(path)
            .map(|f| Metadata {
                len: f.data.len() as u64,
                modified: f.modified,
            })
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "file not found"))
    }

    fn chtimes(&self, path: &Path, modified: SystemTime) -> io::Result<()> {
        let mut inner = self.inner.lock().expect("fake os mutex poisoned");
        match inner.files.get_mut(path) {
            Some(file) => {
                file.modified = modified;
                Ok(())
            }
            None => Err(io::Error::new(io::ErrorKind::NotFound, "file not found")),
        }
    }

    fn remove(&self, path: &Path) -> io::Result<()> {
        let mut inner = self.inner.lock().expect("fake os mutex poisoned");
        inner
            .files
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "file not found"))
    }

    fn command(&self, _name: &str, _args: &[&str]) -> io::Result<CommandOutput> {
        Ok(CommandOutput {
            status_code: 0,
            stdout: Vec::new(),
            stderr: Vec::new(),
        })
    }
}

/// An in-memory [`crate::state_store::StateStore`] for kernel tests.
#[derive(Clone, Default)]
pub struct FakeStateStore {
    values: Arc<Mutex<HashMap<String, serde_json::Value>>>,
}

impl FakeStateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl crate::state_store::StateStore for FakeStateStore {
    fn save_json(&self, key: &str, value: &serde_json::Value) -> crate::Result<()> {
        self.values
            .lock()
            .expect("fake state store mutex poisoned")
            .insert(key.to_string(), value.clone());
        Ok(())
    }

    fn load_json(&self, key: &str) -> crate::Result<Option<serde_json::Value>> {
        Ok(self
            .values
            .lock()
            .expect("fake state store mutex poisoned")
            .get(key)
            .cloned())
    }
}

/// A [`crate::logging::Logger`] that records every call for assertions
/// instead of printing.
#[derive(Clone, Default)]
pub struct RecordingLogger {
    lines: Arc<Mutex<Vec<String>>>,
}

impl RecordingLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().expect("recording logger poisoned").clone()
    }

    fn record(&self, level: &str, msg: &str, kv: &[(&str, &str)]) {
        let mut line = format!("[{level}] {msg}");
        for (k, v) in kv {
            line.push_str(&format!(" {k}={v}"));
        }
        self.lines.lock().expect("recording logger poisoned").push(line);
    }
}

impl crate::logging::Logger for RecordingLogger {
    fn debug(&self, msg: &str, kv: &[(&str, &str)]) {
        self.record("debug", msg, kv);
    }

    fn info(&self, msg: &str, kv: &[(&str, &str)]) {
        self.record("info", msg, kv);
    }

    fn warn(&self, msg: &str, kv: &[(&str, &str)]) {
        self.record("warn", msg, kv);
    }

    fn error(&self, msg: &str, kv: &[(&str, &str)]) {
        self.record("error", msg, kv);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_read_round_trips() {
        let os = FakeOsProvider::new();
        let path = Path::new("/data/q/file.log");
        let mut handle = os.open_file(path, OpenFlags::append_create()).unwrap();
        handle.write_all(b"line1\n").unwrap();
        drop(handle);
        let bytes = os.read_file(path).unwrap();
        assert_eq!(bytes, b"line1\n");
    }

    #[test]
    fn read_dir_lists_seeded_files() {
        let os = FakeOsProvider::new();
        os.seed_file("/data/q/a_queue_20200101.log", b"old\n".to_vec());
        let entries = os.read_dir(Path::new("/data/q")).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].file_name, "a_queue_20200101.log");
    }

    #[test]
    fn missing_file_is_not_found() {
        let os = FakeOsProvider::new();
        let err = os.read_file(Path::new("/nope")).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}
