use loan_docs::collection::{
    CollectionEvent, EventError, EventPublisher, FileStore, InMemoryFileStore, StorageError,
};
use loan_docs::config::{StorageKind, UploadConfig};
use metrics_exporter_prometheus::PrometheusHandle;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use tracing::info;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// File bodies written below a root directory, one file per storage key.
#[derive(Debug, Clone)]
pub(crate) struct LocalFileStore {
    root: PathBuf,
}

impl LocalFileStore {
    pub(crate) fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(key);
        let contained = relative
            .components()
            .all(|component| matches!(component, Component::Normal(_)));
        if key.is_empty() || !contained {
            return Err(StorageError::Backend(format!("invalid storage key '{key}'")));
        }
        Ok(self.root.join(relative))
    }
}

fn storage_error(key: &str, err: std::io::Error) -> StorageError {
    if err.kind() == ErrorKind::NotFound {
        StorageError::Missing(key.to_string())
    } else {
        StorageError::Backend(format!("{key}: {err}"))
    }
}

impl FileStore for LocalFileStore {
    fn put(&self, key: &str, body: &[u8]) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|err| storage_error(key, err))?;
        }
        std::fs::write(&path, body).map_err(|err| storage_error(key, err))
    }

    fn get(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.path_for(key)?;
        std::fs::read(path).map_err(|err| storage_error(key, err))
    }

    fn delete(&self, key: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        std::fs::remove_file(path).map_err(|err| storage_error(key, err))
    }
}

/// File store selected by `APP_STORAGE`.
#[derive(Debug, Clone)]
pub(crate) enum ConfiguredFileStore {
    Memory(InMemoryFileStore),
    Local(LocalFileStore),
}

impl ConfiguredFileStore {
    pub(crate) fn from_config(config: &UploadConfig) -> Self {
        match config.storage {
            StorageKind::Memory => Self::Memory(InMemoryFileStore::default()),
            StorageKind::Local => Self::Local(LocalFileStore::new(config.upload_dir.clone())),
        }
    }
}

impl FileStore for ConfiguredFileStore {
    fn put(&self, key: &str, body: &[u8]) -> Result<(), StorageError> {
        match self {
            Self::Memory(store) => store.put(key, body),
            Self::Local(store) => store.put(key, body),
        }
    }

    fn get(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        match self {
            Self::Memory(store) => store.get(key),
            Self::Local(store) => store.get(key),
        }
    }

    fn delete(&self, key: &str) -> Result<(), StorageError> {
        match self {
            Self::Memory(store) => store.delete(key),
            Self::Local(store) => store.delete(key),
        }
    }
}

/// Writes every collection event to the log stream.
#[derive(Debug, Default, Clone)]
pub(crate) struct LogEventPublisher;

impl EventPublisher for LogEventPublisher {
    fn publish(&self, event: CollectionEvent) -> Result<(), EventError> {
        let details = serde_json::to_string(&event.details)
            .map_err(|err| EventError::Transport(err.to_string()))?;
        info!(
            event = event.kind.label(),
            subject = %event.subject_id,
            %details,
            "collection event"
        );
        Ok(())
    }
}

#[derive(Default, Clone)]
pub(crate) struct RecordingEventPublisher {
    events: Arc<Mutex<Vec<CollectionEvent>>>,
}

impl EventPublisher for RecordingEventPublisher {
    fn publish(&self, event: CollectionEvent) -> Result<(), EventError> {
        let mut guard = self
            .events
            .lock()
            .map_err(|_| EventError::Transport("event log mutex poisoned".to_string()))?;
        guard.push(event);
        Ok(())
    }
}

impl RecordingEventPublisher {
    pub(crate) fn events(&self) -> Vec<CollectionEvent> {
        self.events
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}
