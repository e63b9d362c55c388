//! Persistence strategies for the serialized database document.
//!
//! The store walks its backends in order: the first one that returns a
//! document wins a load, the first one that accepts the document wins a save.
//! Every backend sees the store's durable handle (the path of the last
//! location that worked) and may read or replace it.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use async_trait::async_trait;
use thiserror::Error;
use tokio::{fs, sync::Mutex};
use tracing::debug;

pub type Handle = Option<PathBuf>;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("location selection cancelled")]
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    RememberedHandle,
    DefaultLocation,
    Picker,
    LocalCache,
    Memory,
}

#[async_trait]
pub trait Backend: Send + Sync {
    fn kind(&self) -> BackendKind;

    /// `Ok(None)` when this backend has nothing to offer.
    async fn load(&self, handle: &mut Handle) -> Result<Option<String>, BackendError>;

    /// `Ok(false)` when this backend does not apply and the next one should be tried.
    async fn save(&self, document: &str, handle: &mut Handle) -> Result<bool, BackendError>;
}

async fn read_if_exists(path: &Path) -> Result<Option<String>, BackendError> {
    match fs::read_to_string(path).await {
        Ok(text) => Ok(Some(text)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

async fn write_creating_dirs(path: &Path, document: &str) -> Result<(), BackendError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await?;
    }
    fs::write(path, document).await?;
    Ok(())
}

/// Reads and writes through whatever location the store last used.
#[derive(Debug, Default)]
pub struct RememberedHandle;

#[async_trait]
impl Backend for RememberedHandle {
    fn kind(&self) -> BackendKind {
        BackendKind::RememberedHandle
    }

    async fn load(&self, handle: &mut Handle) -> Result<Option<String>, BackendError> {
        match handle.as_deref() {
            Some(path) => read_if_exists(path).await,
            None => Ok(None),
        }
    }

    async fn save(&self, document: &str, handle: &mut Handle) -> Result<bool, BackendError> {
        let Some(path) = handle.as_deref() else {
            return Ok(false);
        };
        fs::write(path, document).await?;
        debug!(path = %path.display(), "saved through remembered handle");
        Ok(true)
    }
}

/// The well-known `<data-dir>/<db-name>.json` file.
#[derive(Debug)]
pub struct DefaultLocation {
    path: PathBuf,
}

impl DefaultLocation {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl Backend for DefaultLocation {
    fn kind(&self) -> BackendKind {
        BackendKind::DefaultLocation
    }

    async fn load(&self, handle: &mut Handle) -> Result<Option<String>, BackendError> {
        let text = read_if_exists(&self.path).await?;
        if text.is_some() {
            *handle = Some(self.path.clone());
        }
        Ok(text)
    }

    async fn save(&self, document: &str, handle: &mut Handle) -> Result<bool, BackendError> {
        write_creating_dirs(&self.path, document).await?;
        *handle = Some(self.path.clone());
        debug!(path = %self.path.display(), "saved to default location");
        Ok(true)
    }
}

/// Asks someone where the database lives.
#[async_trait]
pub trait LocationPicker: Send + Sync {
    async fn pick_open(&self) -> Option<PathBuf>;
    async fn pick_save(&self, suggested_name: &str) -> Option<PathBuf>;
}

#[async_trait]
impl<P: LocationPicker + ?Sized> LocationPicker for Box<P> {
    async fn pick_open(&self) -> Option<PathBuf> {
        (**self).pick_open().await
    }

    async fn pick_save(&self, suggested_name: &str) -> Option<PathBuf> {
        (**self).pick_save(suggested_name).await
    }
}

/// Answers every prompt with a path chosen up front.
#[derive(Debug, Clone)]
pub struct PresetPicker {
    path: PathBuf,
}

impl PresetPicker {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl LocationPicker for PresetPicker {
    async fn pick_open(&self) -> Option<PathBuf> {
        Some(self.path.clone())
    }

    async fn pick_save(&self, _suggested_name: &str) -> Option<PathBuf> {
        Some(self.path.clone())
    }
}

pub struct PickerBackend<P> {
    picker: P,
    suggested_name: String,
}

impl<P: LocationPicker> PickerBackend<P> {
    pub fn new(picker: P, suggested_name: impl Into<String>) -> Self {
        Self {
            picker,
            suggested_name: suggested_name.into(),
        }
    }
}

#[async_trait]
impl<P: LocationPicker + 'static> Backend for PickerBackend<P> {
    fn kind(&self) -> BackendKind {
        BackendKind::Picker
    }

    async fn load(&self, handle: &mut Handle) -> Result<Option<String>, BackendError> {
        let path = self.picker.pick_open().await.ok_or(BackendError::Cancelled)?;
        let text = read_if_exists(&path).await?;
        if text.is_some() {
            *handle = Some(path);
        }
        Ok(text)
    }

    async fn save(&self, document: &str, handle: &mut Handle) -> Result<bool, BackendError> {
        let path = self
            .picker
            .pick_save(&self.suggested_name)
            .await
            .ok_or(BackendError::Cancelled)?;
        write_creating_dirs(&path, document).await?;
        debug!(path = %path.display(), "saved to picked location");
        *handle = Some(path);
        Ok(true)
    }
}

/// Same-device fallback copy. Never becomes the durable handle.
#[derive(Debug)]
pub struct LocalCache {
    path: PathBuf,
}

impl LocalCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl Backend for LocalCache {
    fn kind(&self) -> BackendKind {
        BackendKind::LocalCache
    }

    async fn load(&self, _handle: &mut Handle) -> Result<Option<String>, BackendError> {
        read_if_exists(&self.path).await
    }

    async fn save(&self, document: &str, _handle: &mut Handle) -> Result<bool, BackendError> {
        write_creating_dirs(&self.path, document).await?;
        debug!(path = %self.path.display(), "saved to local cache");
        Ok(true)
    }
}

/// Keeps the document in memory. Clones share the same slot.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    inner: Arc<Mutex<MemorySlot>>,
}

#[derive(Debug, Default)]
struct MemorySlot {
    document: Option<String>,
    fail: bool,
    saves: usize,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(document: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(MemorySlot {
                document: Some(document.into()),
                ..MemorySlot::default()
            })),
        }
    }

    /// Make every later load and save fail with an I/O error.
    pub async fn set_failing(&self, fail: bool) {
        self.inner.lock().await.fail = fail;
    }

    pub async fn document(&self) -> Option<String> {
        self.inner.lock().await.document.clone()
    }

    pub async fn saves(&self) -> usize {
        self.inner.lock().await.saves
    }
}

fn simulated_failure() -> BackendError {
    BackendError::Io(std::io::Error::other("simulated backend failure"))
}

#[async_trait]
impl Backend for MemoryBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Memory
    }

    async fn load(&self, _handle: &mut Handle) -> Result<Option<String>, BackendError> {
        let slot = self.inner.lock().await;
        if slot.fail {
            return Err(simulated_failure());
        }
        Ok(slot.document.clone())
    }

    async fn save(&self, document: &str, _handle: &mut Handle) -> Result<bool, BackendError> {
        let mut slot = self.inner.lock().await;
        if slot.fail {
            return Err(simulated_failure());
        }
        slot.document = Some(document.to_string());
        slot.saves += 1;
        Ok(true)
    }
}

/// Remembers the durable handle between runs: a one-line file holding the path.
#[derive(Debug, Clone)]
pub struct HandleFile {
    path: PathBuf,
}

impl HandleFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub async fn read(&self) -> Handle {
        let text = fs::read_to_string(&self.path).await.ok()?;
        let line = text.lines().next()?.trim();
        (!line.is_empty()).then(|| PathBuf::from(line))
    }

    pub async fn write(&self, handle: &Path) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&self.path, format!("{}\n", handle.display())).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn default_location_remembers_its_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data").join("db.json");
        let backend = DefaultLocation::new(&path);
        let mut handle = None;

        assert!(backend.load(&mut handle).await.unwrap().is_none());
        assert!(handle.is_none());

        assert!(backend.save("{}", &mut handle).await.unwrap());
        assert_eq!(handle.as_deref(), Some(path.as_path()));
        assert_eq!(backend.load(&mut None).await.unwrap().as_deref(), Some("{}"));
    }

    #[tokio::test]
    async fn remembered_handle_needs_a_handle() {
        let mut handle = None;
        assert!(!RememberedHandle.save("{}", &mut handle).await.unwrap());
        assert!(RememberedHandle.load(&mut handle).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn local_cache_leaves_the_handle_alone() {
        let dir = tempfile::tempdir().unwrap();
        let cache = LocalCache::new(dir.path().join("cache.json"));
        let mut handle = None;
        assert!(cache.save("[]", &mut handle).await.unwrap());
        assert!(handle.is_none());
        assert_eq!(cache.load(&mut handle).await.unwrap().as_deref(), Some("[]"));
    }

    #[tokio::test]
    async fn handle_file_round_trips_a_path() {
        let dir = tempfile::tempdir().unwrap();
        let file = HandleFile::new(dir.path().join("nested").join("handle"));
        assert!(file.read().await.is_none());
        file.write(Path::new("/tmp/some db.json")).await.unwrap();
        assert_eq!(file.read().await, Some(PathBuf::from("/tmp/some db.json")));
    }

    #[tokio::test]
    async fn failing_memory_backend_reports_io_errors() {
        let mem = MemoryBackend::with_document("{}");
        mem.set_failing(true).await;
        assert!(matches!(mem.load(&mut None).await, Err(BackendError::Io(_))));
        assert!(mem.save("x", &mut None).await.is_err());
        mem.set_failing(false).await;
        assert!(mem.save("x", &mut None).await.unwrap());
        assert_eq!(mem.document().await.as_deref(), Some("x"));
        assert_eq!(mem.saves().await, 1);
    }
}
