use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use anyhow::Result;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::persistence::{load_registry_file, save_registry_file};
use crate::record::{ExtensionQueryKind, ExtensionRecord};

/// Installed extensions keyed by id.
///
/// Reads take a shared lock and never wait on in-flight mutations of other
/// ids. Callers that need read-then-write consistency for one id hold an
/// [`ExtensionMutationGuard`] from [`ExtensionRegistry::lock_extension`].
///
/// Writers persist a snapshot while holding only `write_lock`, then publish
/// the change in memory, so readers never wait on disk I/O and never observe
/// a change that failed to persist.
#[derive(Debug, Default)]
pub struct ExtensionRegistry {
    records: RwLock<BTreeMap<String, ExtensionRecord>>,
    write_lock: Mutex<()>,
    mutation_locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
    store_path: Option<PathBuf>,
}

/// Held while a caller mutates one extension id.
#[derive(Debug)]
pub struct ExtensionMutationGuard {
    extension_id: String,
    _guard: OwnedMutexGuard<()>,
}

impl ExtensionMutationGuard {
    pub fn extension_id(&self) -> &str {
        &self.extension_id
    }
}

impl ExtensionRegistry {
    pub fn in_memory() -> Self {
        Self::default()
    }

    pub fn with_records(records: impl IntoIterator<Item = ExtensionRecord>) -> Self {
        let records = records
            .into_iter()
            .map(|record| (record.id.clone(), record))
            .collect();
        Self {
            records: RwLock::new(records),
            ..Self::default()
        }
    }

    /// Opens a file-backed registry, loading any records already on disk.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let records = load_registry_file(&path)?;
        tracing::debug!(
            path = %path.display(),
            extensions = records.len(),
            "loaded extension registry"
        );
        Ok(Self {
            store_path: Some(path),
            ..Self::with_records(records)
        })
    }

    pub fn store_path(&self) -> Option<&Path> {
        self.store_path.as_deref()
    }

    pub fn len(&self) -> usize {
        self.read_records().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read_records().is_empty()
    }

    pub fn is_installed(&self, extension_id: &str) -> bool {
        self.read_records().contains_key(extension_id)
    }

    pub fn get_all(&self, kind: ExtensionQueryKind) -> Vec<ExtensionRecord> {
        self.read_records()
            .values()
            .filter(|record| kind.matches(record))
            .cloned()
            .collect()
    }

    pub fn get_extension(
        &self,
        extension_id: &str,
        kind: ExtensionQueryKind,
    ) -> Option<ExtensionRecord> {
        self.read_records()
            .get(extension_id)
            .filter(|record| kind.matches(record))
            .cloned()
    }

    /// Inserts or replaces a record, returning the previous one.
    ///
    /// Blocks on file I/O for file-backed registries.
    pub fn insert_extension(&self, record: ExtensionRecord) -> Result<Option<ExtensionRecord>> {
        let _writer = self.writer();
        if let Some(path) = self.store_path.as_deref() {
            let mut snapshot = self.read_records().clone();
            snapshot.insert(record.id.clone(), record.clone());
            save_registry_file(path, &snapshot.into_values().collect::<Vec<_>>())?;
        }
        Ok(self.write_records().insert(record.id.clone(), record))
    }

    /// Removes a record, returning it when it existed.
    ///
    /// Blocks on file I/O for file-backed registries.
    pub fn remove_extension(&self, extension_id: &str) -> Result<Option<ExtensionRecord>> {
        let _writer = self.writer();
        if !self.is_installed(extension_id) {
            return Ok(None);
        }
        if let Some(path) = self.store_path.as_deref() {
            let mut snapshot = self.read_records().clone();
            snapshot.remove(extension_id);
            save_registry_file(path, &snapshot.into_values().collect::<Vec<_>>())?;
        }
        Ok(self.write_records().remove(extension_id))
    }

    /// Waits for exclusive mutation rights over one extension id.
    pub async fn lock_extension(&self, extension_id: &str) -> ExtensionMutationGuard {
        let lock = {
            let mut locks = self
                .mutation_locks
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            Arc::clone(
                locks
                    .entry(extension_id.to_string())
                    .or_insert_with(|| Arc::new(AsyncMutex::new(()))),
            )
        };
        ExtensionMutationGuard {
            extension_id: extension_id.to_string(),
            _guard: lock.lock_owned().await,
        }
    }

    fn writer(&self) -> MutexGuard<'_, ()> {
        self.write_lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn read_records(&self) -> std::sync::RwLockReadGuard<'_, BTreeMap<String, ExtensionRecord>> {
        self.records.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_records(&self) -> std::sync::RwLockWriteGuard<'_, BTreeMap<String, ExtensionRecord>> {
        self.records.write().unwrap_or_else(PoisonError::into_inner)
    }
}
