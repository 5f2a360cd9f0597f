//! Named storage slots holding the serialized queue.

use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tempfile::NamedTempFile;

use crate::error::QueueError;

/// Slot name used by the client for pending scans.
pub const QUEUE_SLOT: &str = "offline_scans";

/// Exclusive write access to a slot. Released on drop.
pub struct SlotGuard {
    _held: Box<dyn Send + Sync>,
}

impl SlotGuard {
    pub fn new(held: impl Send + Sync + 'static) -> Self {
        Self {
            _held: Box::new(held),
        }
    }
}

impl fmt::Debug for SlotGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SlotGuard")
    }
}

/// One durable string-valued slot.
///
/// An absent slot reads as `None`; callers treat that as an empty queue.
/// A read-modify-write must hold [`StorageSlot::lock`] from the read to the
/// store, since other handles (possibly in other processes) share the slot.
#[async_trait]
pub trait StorageSlot: Send + Sync + fmt::Debug {
    async fn load(&self) -> Result<Option<String>, QueueError>;

    async fn store(&self, contents: &str) -> Result<(), QueueError>;

    /// Wait for exclusive write access.
    async fn lock(&self) -> Result<SlotGuard, QueueError>;

    /// Human-readable location for logs.
    fn describe(&self) -> String;
}

/// Slot persisted as `<dir>/<name>.json`, with writers serialized through an
/// advisory lock on `<dir>/<name>.lock`.
#[derive(Debug, Clone)]
pub struct FileSlot {
    path: PathBuf,
    lock_path: PathBuf,
}

impl FileSlot {
    pub fn new(dir: impl AsRef<Path>, name: &str) -> Self {
        let dir = dir.as_ref();
        Self {
            path: dir.join(format!("{name}.json")),
            lock_path: dir.join(format!("{name}.lock")),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn lock_path(&self) -> &Path {
        &self.lock_path
    }
}

fn io_error(path: &Path, source: std::io::Error) -> QueueError {
    QueueError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn ensure_parent(path: &Path) -> std::io::Result<&Path> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent)?;
    Ok(parent)
}

/// Stage `contents` in a uniquely named file beside `path`, then rename it
/// over `path`. Readers see either the old or the new contents.
fn write_atomically(path: &Path, contents: &str) -> std::io::Result<()> {
    let dir = ensure_parent(path)?;
    let mut staging = NamedTempFile::new_in(dir)?;
    staging.write_all(contents.as_bytes())?;
    staging.as_file().sync_all()?;
    staging.persist(path).map_err(|err| err.error)?;
    Ok(())
}

fn lock_exclusive(path: &Path) -> std::io::Result<File> {
    ensure_parent(path)?;
    let file = OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(path)?;
    file.lock()?;
    Ok(file)
}

#[async_trait]
impl StorageSlot for FileSlot {
    async fn load(&self) -> Result<Option<String>, QueueError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => Ok(Some(contents)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(io_error(&self.path, err)),
        }
    }

    async fn store(&self, contents: &str) -> Result<(), QueueError> {
        let path = self.path.clone();
        let contents = contents.to_owned();
        tokio::task::spawn_blocking(move || write_atomically(&path, &contents))
            .await
            .map_err(|err| QueueError::Unavailable(err.to_string()))?
            .map_err(|err| io_error(&self.path, err))
    }

    async fn lock(&self) -> Result<SlotGuard, QueueError> {
        let lock_path = self.lock_path.clone();
        let file = tokio::task::spawn_blocking(move || lock_exclusive(&lock_path))
            .await
            .map_err(|err| QueueError::Unavailable(err.to_string()))?
            .map_err(|err| io_error(&self.lock_path, err))?;
        // Closing the handle releases the lock.
        Ok(SlotGuard::new(file))
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// In-process slot for tests and ephemeral runs.
///
/// Clones share the same contents, so a test can keep a handle and inspect
/// what the queue persisted.
#[derive(Debug, Clone, Default)]
pub struct MemorySlot {
    contents: Arc<Mutex<Option<String>>>,
    writer: Arc<tokio::sync::Mutex<()>>,
    fail_writes: Arc<AtomicBool>,
    writes: Arc<AtomicUsize>,
}

impl MemorySlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_contents(contents: impl Into<String>) -> Self {
        let slot = Self::default();
        slot.set_contents(Some(contents.into()));
        slot
    }

    pub fn contents(&self) -> Option<String> {
        self.contents
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn set_contents(&self, contents: Option<String>) {
        *self
            .contents
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = contents;
    }

    /// Make subsequent writes fail, simulating a full or read-only disk.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of successful writes so far.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StorageSlot for MemorySlot {
    async fn load(&self) -> Result<Option<String>, QueueError> {
        Ok(self.contents())
    }

    async fn store(&self, contents: &str) -> Result<(), QueueError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(QueueError::Unavailable("memory slot is read-only".into()));
        }
        self.set_contents(Some(contents.to_string()));
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn lock(&self) -> Result<SlotGuard, QueueError> {
        Ok(SlotGuard::new(self.writer.clone().lock_owned().await))
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}
