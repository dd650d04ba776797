//! The OS Provider collaborator contract (§6).
//!
//! The core never touches `std::fs` or `std::process` directly; every path
//! goes through an injected `OsProvider` so the test suite can substitute a
//! fake filesystem instead of touching disk. [`StdOsProvider`] is the one
//! production implementation the crate ships; [`crate::testing::FakeOsProvider`]
//! is the one the test suite drives.

use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Minimal stat result — just enough for rotation/listing decisions.
#[derive(Debug, Clone, Copy)]
pub struct Metadata {
    pub len: u64,
    pub modified: SystemTime,
}

/// A single entry returned by [`OsProvider::read_dir`].
#[derive(Debug, Clone)]
pub struct DirEntry {
    pub file_name: String,
    pub path: PathBuf,
}

/// The result of running an external command via [`OsProvider::command`].
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub status_code: i32,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

/// A handle to an open file. Queue appenders seek-and-write; readers
/// seek-and-read. Both are modeled through this one trait.
pub trait FileHandle: Read + Write + Seek + Send {
    fn sync_all(&mut self) -> io::Result<()>;
}

impl FileHandle for std::fs::File {
    fn sync_all(&mut self) -> io::Result<()> {
        std::fs::File::sync_all(self)
    }
}

/// Open-mode flags, mirroring the subset of `OpenOptions` the core needs.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenFlags {
    pub create: bool,
    pub append: bool,
    pub read: bool,
    pub write: bool,
    pub truncate: bool,
}

impl OpenFlags {
    pub fn append_create() -> Self {
        OpenFlags {
            create: true,
            append: true,
            write: true,
            ..Default::default()
        }
    }

    pub fn read_only() -> Self {
        OpenFlags {
            read: true,
            ..Default::default()
        }
    }

    pub fn create_truncate_write() -> Self {
        OpenFlags {
            create: true,
            write: true,
            truncate: true,
            ..Default::default()
        }
    }
}

/// The filesystem/process/hostname surface the core consumes.
///
/// Every method mirrors a Go `os`/`ioutil` call in the original design: file
/// I/O, `stat`, `mkdirAll`, directory listing, process exec, and hostname
/// resolution.
pub trait OsProvider: Send + Sync {
    fn hostname(&self) -> io::Result<String>;
    fn user_home_dir(&self) -> io::Result<PathBuf>;
    fn read_file(&self, path: &Path) -> io::Result<Vec<u8>>;
    fn open_file(&self, path: &Path, flags: OpenFlags) -> io::Result<Box<dyn FileHandle>>;
    fn mkdir_all(&self, path: &Path) -> io::Result<()>;
    fn read_dir(&self, path: &Path) -> io::Result<Vec<DirEntry>>;
    fn stat(&self, path: &Path) -> io::Result<Metadata>;
    fn chtimes(&self, path: &Path, modified: SystemTime) -> io::Result<()>;
    fn remove(&self, path: &Path) -> io::Result<()>;
    fn command(&self, name: &str, args: &[&str]) -> io::Result<CommandOutput>;
}

/// Reads one newline-terminated record at `offset`, returning the line
/// (without the trailing `\n`) and the offset just past it. A thin helper
/// shared by the queue reader; not part of the provider contract itself.
pub fn read_line_at(
    handle: &mut dyn FileHandle,
    offset: u64,
) -> io::Result<Option<(String, u64)>> {
    handle.seek(SeekFrom::Start(offset))?;
    let mut buf = Vec::new();
    let mut byte = [0u8; 1];
    loop {
        let n = handle.read(&mut byte)?;
        if n == 0 {
            if buf.is_empty() {
                return Ok(None);
            }
            // A trailing partial line (no newline yet) is not a complete
            // record; the writer guarantees records never end without one.
            return Ok(None);
        }
        if byte[0] == b'\n' {
            let next_offset = offset + buf.len() as u64 + 1;
            let line = String::from_utf8(buf)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
            return Ok(Some((line, next_offset)));
        }
        buf.push(byte[0]);
    }
}

/// The one production [`OsProvider`]: thin wrappers over `std::fs` /
/// `std::process` / `hostname` resolution via `std::env`.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdOsProvider;

impl OsProvider for StdOsProvider {
    fn hostname(&self) -> io::Result<String> {
        // `std` has no portable hostname() call; shell out the same way
        // the Go original resolves it, but fall back gracefully.
        if let Ok(name) = std::env::var("HOSTNAME") {
            if !name.is_empty() {
                return Ok(name);
            }
        }
        let output = std::process::Command::new("hostname").output();
        match output {
            Ok(out) if out.status.success() => {
                Ok(String::from_utf8_lossy(&out.stdout).trim().to_string())
            }
            _ => Ok(String::new()),
        }
    }

    fn user_home_dir(&self) -> io::Result<PathBuf> {
        std::env::var_os("HOME")
            .map(PathBuf::from)
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "HOME not set"))
    }

    fn read_file(&self, path: &Path) -> io::Result<Vec<u8>> {
        std::fs::read(path)
    }

    fn open_file(&self, path: &Path, flags: OpenFlags) -> io::Result<Box<dyn FileHandle>> {
        let file = std::fs::OpenOptions::new()
            .create(flags.create)
            .append(flags.append)
            .read(flags.read)
            .write(flags.write || flags.append)
            .truncate(flags.truncate)
            .open(path)?;
        Ok(Box::new(file))
    }

    fn mkdir_all(&self, path: &Path) -> io::Result<()> {
        std::fs::create_dir_all(path)
    }

    fn read_dir(&self, path: &Path) -> io::Result<Vec<DirEntry>> {
        let mut out = Vec::new();
        for entry in std::fs::read_dir(path)? {
            let entry = entry?;
            out.push(DirEntry {
                file_name: entry.file_name().to_string_lossy().into_owned(),
                path: entry.path(),
            });
        }
        Ok(out)
    }

    fn stat(&self, path: &Path) -> io::Result<Metadata> {
        let meta = std::fs::metadata(path)?;
        Ok(Metadata {
            len: meta.len(),
            modified: meta.modified()?,
        })
    }

    fn chtimes(&self, path: &Path, modified: SystemTime) -> io::Result<()> {
        let ft = filetime::FileTime::from_system_time(modified);
        filetime::set_file_mtime(path, ft)
    }

    fn remove(&self, path: &Path) -> io::Result<()> {
        std::fs::remove_file(path)
    }

    fn command(&self, name: &str, args: &[&str]) -> io::Result<CommandOutput> {
        let output = std::process::Command::new(name).args(args).output()?;
        Ok(CommandOutput {
            status_code: output.status.code().unwrap_or(-1),
            stdout: output.stdout,
            stderr: output.stderr,
        })
    }
}
