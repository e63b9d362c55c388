//! The record store: owns every collection and mirrors it to storage.

use std::{path::PathBuf, sync::Arc};

use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info, warn};

use crate::backend::{
    Backend, BackendKind, DefaultLocation, Handle, LocalCache, LocationPicker, PickerBackend,
    RememberedHandle,
};
use crate::collection::{Collection, Record, Snapshot};
use crate::config::TrackerConfig;
use crate::error::{Result, StoreError};
use crate::i18n::Translator;
use crate::ids::{IdGenerator, TimestampIds};
use crate::model::{most_recent, Entity};
use crate::notify::{Notifier, Severity, TracingNotifier};
use crate::transfer::{export_file_name, read_text_auto, DirectorySink, ExportSink};

/// Generated ids that collide are drawn again, this many times at most.
const MAX_ID_ATTEMPTS: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Uninitialized,
    Loading,
    Ready,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Export {
    pub document: String,
    pub location: PathBuf,
}

struct State {
    phase: Phase,
    snapshot: Option<Snapshot>,
}

pub struct RecordStore {
    db_name: String,
    backends: Vec<Box<dyn Backend>>,
    ids: Box<dyn IdGenerator>,
    notifier: Arc<dyn Notifier>,
    translator: Arc<Translator>,
    exporter: Box<dyn ExportSink>,
    state: RwLock<State>,
    handle: Mutex<Handle>,
    init_lock: Mutex<()>,
}

pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

impl RecordStore {
    pub fn builder(db_name: impl Into<String>) -> RecordStoreBuilder {
        RecordStoreBuilder::new(db_name)
    }

    /// The standard chain for a config: remembered handle, default location,
    /// the picker if there is one, then the local cache.
    pub fn from_config(
        config: &TrackerConfig,
        picker: Option<Box<dyn LocationPicker>>,
    ) -> RecordStoreBuilder {
        let mut builder = RecordStore::builder(&config.db_name)
            .backend(RememberedHandle)
            .backend(DefaultLocation::new(config.default_db_path()));
        if let Some(picker) = picker {
            builder = builder.backend(PickerBackend::new(picker, config.file_name()));
        }
        builder
            .backend(LocalCache::new(config.cache_path()))
            .exporter(DirectorySink::new(&config.export_dir))
    }

    pub fn db_name(&self) -> &str {
        &self.db_name
    }

    pub fn translator(&self) -> &Arc<Translator> {
        &self.translator
    }

    pub async fn phase(&self) -> Phase {
        self.state.read().await.phase
    }

    /// The location the last successful load or save went through.
    pub async fn handle(&self) -> Handle {
        self.handle.lock().await.clone()
    }

    /// Raise the translation of `key` through the notifier.
    pub fn notify_key(&self, key: &str, severity: Severity) {
        self.notifier.notify(&self.translator.t(key), severity);
    }

    async fn ready_snapshot(&self) -> Option<Snapshot> {
        let state = self.state.read().await;
        match state.phase {
            Phase::Ready => state.snapshot.clone(),
            _ => None,
        }
    }

    /// Load the database, or create an empty one. Never fails; calling it again
    /// returns the state already in memory.
    pub async fn init(&self) -> Snapshot {
        if let Some(snapshot) = self.ready_snapshot().await {
            return snapshot;
        }
        let _guard = self.init_lock.lock().await;
        if let Some(snapshot) = self.ready_snapshot().await {
            return snapshot;
        }

        self.state.write().await.phase = Phase::Loading;
        let loaded = self.load_from_backends().await;
        let created = loaded.is_none();

        let snapshot = {
            let mut state = self.state.write().await;
            // An import may have landed while we were loading.
            let snapshot = state
                .snapshot
                .get_or_insert_with(|| loaded.unwrap_or_default())
                .clone();
            state.phase = Phase::Ready;
            snapshot
        };

        if created {
            info!(db = %self.db_name, "empty database created");
            self.notify_key("db_created", Severity::Info);
            self.persist().await;
        } else {
            self.notify_key("db_loaded", Severity::Success);
        }
        snapshot
    }

    async fn load_from_backends(&self) -> Option<Snapshot> {
        let mut handle = self.handle.lock().await;
        for backend in &self.backends {
            let kind = backend.kind();
            let previous = handle.clone();
            match backend.load(&mut handle).await {
                Ok(Some(text)) => match Snapshot::parse_stored(&text) {
                    Ok(snapshot) => {
                        info!(?kind, db = %self.db_name, "database loaded");
                        return Some(snapshot);
                    }
                    Err(e) => {
                        warn!(?kind, error = %e, "stored database is unreadable, skipping");
                        *handle = previous;
                    }
                },
                Ok(None) => debug!(?kind, "no database found"),
                Err(e) => warn!(?kind, error = %e, "failed to load database"),
            }
        }
        None
    }

    async fn persist(&self) {
        let document = {
            let state = self.state.read().await;
            match state.snapshot.as_ref().map(Snapshot::to_json_pretty) {
                Some(Ok(document)) => document,
                Some(Err(e)) => {
                    error!(error = %e, "failed to serialize database");
                    self.notify_key("storage_error", Severity::Error);
                    return;
                }
                None => return,
            }
        };
        self.save_document(&document).await;
    }

    async fn save_document(&self, document: &str) {
        {
            let mut handle = self.handle.lock().await;
            for backend in &self.backends {
                let kind = backend.kind();
                match backend.save(document, &mut handle).await {
                    Ok(true) => {
                        debug!(?kind, bytes = document.len(), "database saved");
                        if kind == BackendKind::LocalCache {
                            self.notify_key("saved_locally", Severity::Info);
                        }
                        return;
                    }
                    Ok(false) => {}
                    Err(e) => warn!(?kind, error = %e, "failed to save database"),
                }
            }
        }

        error!(db = %self.db_name, "every storage backend failed");
        match self.deliver_export(document).await {
            Ok(path) => info!(path = %path.display(), "exported database as a backup"),
            Err(e) => error!(error = %e, "backup export failed"),
        }
        self.notify_key("storage_error", Severity::Error);
    }

    async fn deliver_export(&self, document: &str) -> std::io::Result<PathBuf> {
        let name = export_file_name(&self.db_name, chrono::Local::now().date_naive());
        self.exporter.deliver(&name, document).await
    }

    async fn with_records<T>(
        &self,
        collection: &str,
        f: impl FnOnce(&[Record]) -> T,
    ) -> Result<T> {
        let state = self.state.read().await;
        let snapshot = state.snapshot.as_ref().ok_or(StoreError::NotInitialized)?;
        let collection: Collection = collection.parse()?;
        Ok(f(snapshot.records(collection)))
    }

    fn fresh_id(&self, records: &[Record]) -> Result<String> {
        let mut last = String::new();
        for _ in 0..MAX_ID_ATTEMPTS {
            let id = self.ids.next_id();
            if !id.is_empty() && !records.iter().any(|r| r.id() == Some(id.as_str())) {
                return Ok(id);
            }
            last = id;
        }
        Err(StoreError::DuplicateId(last))
    }

    /// Append a record, generating its id when it has none. Returns the id.
    pub async fn add(&self, collection: &str, mut record: Record) -> Result<String> {
        let id = {
            let mut state = self.state.write().await;
            let snapshot = state.snapshot.as_mut().ok_or(StoreError::NotInitialized)?;
            let records = snapshot.records_mut(collection.parse()?);
            let id = match record.supplied_id()?.map(str::to_string) {
                Some(id) => {
                    if records.iter().any(|r| r.id() == Some(id.as_str())) {
                        return Err(StoreError::DuplicateId(id));
                    }
                    id
                }
                None => {
                    let id = self.fresh_id(records)?;
                    record.set_id(id.clone());
                    id
                }
            };
            records.push(record);
            id
        };
        debug!(collection, id = %id, "record added");
        self.persist().await;
        Ok(id)
    }

    pub async fn get(&self, collection: &str, id: &str) -> Result<Option<Record>> {
        self.with_records(collection, |records| {
            records.iter().find(|r| r.id() == Some(id)).cloned()
        })
        .await
    }

    /// A copy of the whole collection in insertion order.
    pub async fn get_all(&self, collection: &str) -> Result<Vec<Record>> {
        self.with_records(collection, <[Record]>::to_vec).await
    }

    /// Replace the record with the same id, keeping its position.
    pub async fn update(&self, collection: &str, record: Record) -> Result<()> {
        {
            let mut state = self.state.write().await;
            let snapshot = state.snapshot.as_mut().ok_or(StoreError::NotInitialized)?;
            let records = snapshot.records_mut(collection.parse()?);
            let id = record.supplied_id()?.ok_or(StoreError::MissingId)?;
            let slot = records
                .iter_mut()
                .find(|r| r.id() == Some(id))
                .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
            *slot = record;
        }
        self.persist().await;
        Ok(())
    }

    pub async fn delete(&self, collection: &str, id: &str) -> Result<()> {
        {
            let mut state = self.state.write().await;
            let snapshot = state.snapshot.as_mut().ok_or(StoreError::NotInitialized)?;
            let records = snapshot.records_mut(collection.parse()?);
            let index = records
                .iter()
                .position(|r| r.id() == Some(id))
                .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
            records.remove(index);
        }
        debug!(collection, id, "record deleted");
        self.persist().await;
        Ok(())
    }

    /// Serialize everything and hand it to the export sink.
    pub async fn export(&self) -> Result<Export> {
        let document = {
            let state = self.state.read().await;
            state
                .snapshot
                .as_ref()
                .ok_or(StoreError::NotInitialized)?
                .to_json_pretty()?
        };
        let location = self
            .deliver_export(&document)
            .await
            .map_err(|e| StoreError::Storage(e.to_string()))?;
        info!(path = %location.display(), "database exported");
        Ok(Export { document, location })
    }

    pub async fn export_snapshot(&self) -> Result<String> {
        Ok(self.export().await?.document)
    }

    /// Replace the whole state with an external document.
    ///
    /// Nothing changes unless the document is valid.
    pub async fn import_snapshot(&self, data: &str) -> Result<()> {
        let snapshot = Snapshot::parse(data)?;
        {
            let mut state = self.state.write().await;
            state.snapshot = Some(snapshot);
            state.phase = Phase::Ready;
        }
        info!(db = %self.db_name, "database imported");
        self.persist().await;
        Ok(())
    }

    pub async fn import_file(&self, path: &std::path::Path) -> Result<()> {
        let text = read_text_auto(path)
            .await
            .map_err(|e| StoreError::Storage(format!("{}: {e:#}", path.display())))?;
        self.import_snapshot(&text).await
    }

    /// Add a typed record, stamping its creation and update times.
    pub async fn insert<E: Entity>(&self, mut entity: E) -> Result<String> {
        let now = now_millis();
        if entity.created_at().is_none() {
            entity.set_created_at(now);
        }
        entity.set_updated_at(now);
        self.add(E::COLLECTION.as_str(), entity.to_record()?).await
    }

    pub async fn fetch<E: Entity>(&self, id: &str) -> Result<Option<E>> {
        self.get(E::COLLECTION.as_str(), id)
            .await?
            .map(E::from_record)
            .transpose()
    }

    pub async fn fetch_all<E: Entity>(&self) -> Result<Vec<E>> {
        self.get_all(E::COLLECTION.as_str())
            .await?
            .into_iter()
            .map(E::from_record)
            .collect()
    }

    /// Update a typed record, refreshing its update time.
    pub async fn replace<E: Entity>(&self, mut entity: E) -> Result<()> {
        entity.set_updated_at(now_millis());
        self.update(E::COLLECTION.as_str(), entity.to_record()?).await
    }

    /// The `limit` most recently created records, newest first.
    pub async fn recent<E: Entity>(&self, limit: usize) -> Result<Vec<E>> {
        let all = self.fetch_all::<E>().await?;
        Ok(most_recent(all, limit, |e: &E| e.created_at()))
    }
}

pub struct RecordStoreBuilder {
    db_name: String,
    backends: Vec<Box<dyn Backend>>,
    ids: Option<Box<dyn IdGenerator>>,
    notifier: Option<Arc<dyn Notifier>>,
    translator: Option<Arc<Translator>>,
    exporter: Option<Box<dyn ExportSink>>,
    handle: Handle,
}

impl RecordStoreBuilder {
    pub fn new(db_name: impl Into<String>) -> Self {
        Self {
            db_name: db_name.into(),
            backends: Vec::new(),
            ids: None,
            notifier: None,
            translator: None,
            exporter: None,
            handle: None,
        }
    }

    /// Append a backend to the chain.
    pub fn backend(mut self, backend: impl Backend + 'static) -> Self {
        self.backends.push(Box::new(backend));
        self
    }

    pub fn ids(mut self, ids: impl IdGenerator + 'static) -> Self {
        self.ids = Some(Box::new(ids));
        self
    }

    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn translator(mut self, translator: Arc<Translator>) -> Self {
        self.translator = Some(translator);
        self
    }

    pub fn exporter(mut self, exporter: impl ExportSink + 'static) -> Self {
        self.exporter = Some(Box::new(exporter));
        self
    }

    /// Start with a durable handle remembered from an earlier run.
    pub fn handle(mut self, handle: Handle) -> Self {
        self.handle = handle;
        self
    }

    pub fn build(self) -> RecordStore {
        RecordStore {
            db_name: self.db_name,
            backends: self.backends,
            ids: self.ids.unwrap_or_else(|| Box::new(TimestampIds)),
            notifier: self.notifier.unwrap_or_else(|| Arc::new(TracingNotifier)),
            translator: self
                .translator
                .unwrap_or_else(|| Arc::new(Translator::builtin())),
            exporter: self
                .exporter
                .unwrap_or_else(|| Box::new(DirectorySink::new("exports"))),
            state: RwLock::new(State {
                phase: Phase::Uninitialized,
                snapshot: None,
            }),
            handle: Mutex::new(self.handle),
            init_lock: Mutex::new(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use crate::transfer::MemorySink;

    fn store_with(backend: MemoryBackend) -> RecordStore {
        RecordStore::builder("testDB")
            .backend(backend)
            .exporter(MemorySink::new())
            .build()
    }

    #[tokio::test]
    async fn init_moves_to_ready_once() {
        let backend = MemoryBackend::new();
        let store = store_with(backend.clone());
        assert_eq!(store.phase().await, Phase::Uninitialized);

        let first = store.init().await;
        assert_eq!(store.phase().await, Phase::Ready);
        assert_eq!(first, Snapshot::empty());
        assert_eq!(backend.saves().await, 1);

        store.init().await;
        assert_eq!(backend.saves().await, 1);
    }

    #[tokio::test]
    async fn colliding_ids_are_drawn_again() {
        let calls = std::sync::atomic::AtomicUsize::new(0);
        let store = RecordStore::builder("testDB")
            .backend(MemoryBackend::new())
            .ids(move || {
                let n = calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                if n < 3 { "same".to_string() } else { format!("id{n}") }
            })
            .build();
        store.init().await;

        assert_eq!(store.add("npcs", Record::new()).await.unwrap(), "same");
        assert_eq!(store.add("npcs", Record::new()).await.unwrap(), "id3");
    }

    #[tokio::test]
    async fn a_generator_stuck_on_one_id_gives_up() {
        let store = RecordStore::builder("testDB")
            .backend(MemoryBackend::new())
            .ids(|| "fixed".to_string())
            .build();
        store.init().await;
        store.add("combats", Record::new()).await.unwrap();
        assert!(matches!(
            store.add("combats", Record::new()).await,
            Err(StoreError::DuplicateId(id)) if id == "fixed"
        ));
        assert_eq!(store.get_all("combats").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn unreadable_default_file_is_replaced_by_an_empty_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db.json");
        std::fs::write(&path, "not json").unwrap();

        let store = RecordStore::builder("testDB")
            .backend(crate::backend::DefaultLocation::new(&path))
            .build();
        assert_eq!(store.init().await, Snapshot::empty());
        // The empty database was then written back to the default location.
        assert_eq!(store.handle().await, Some(path.clone()));
        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(Snapshot::parse(&written).unwrap(), Snapshot::empty());
    }
}
