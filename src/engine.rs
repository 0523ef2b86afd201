use crate::collection::Collection;
use crate::errors::DbError;
use crate::query::Filter;
use crate::storage::{MemoryStorage, StorageEngine};
use crate::types::{CollectionName, Operation};
use crate::wal::Wal;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

/// The embedded document store: named collections over one shared storage engine.
pub struct Engine {
    collections: RwLock<HashMap<CollectionName, Arc<Collection>>>,
    storage: Arc<RwLock<Box<dyn StorageEngine>>>,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine").field("collections", &self.list_collection_names()).finish()
    }
}

impl Engine {
    /// Opens (or creates) a file-backed store and replays its log.
    ///
    /// # Errors
    /// Returns an error if the log cannot be opened or replayed.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, DbError> {
        let wal = Wal::open(path.as_ref())?;
        log::info!("opening store at {}", wal.path().display());
        Self::with_storage(Box::new(wal))
    }

    /// A store that keeps everything in memory only.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
            storage: Arc::new(RwLock::new(Box::new(MemoryStorage::new()))),
        }
    }

    /// Builds an engine over `storage`, replaying every recorded operation.
    ///
    /// # Errors
    /// Returns an error if the storage cannot be read.
    pub fn with_storage(storage: Box<dyn StorageEngine>) -> Result<Self, DbError> {
        let operations = storage.read_all()?;
        let engine = Self {
            collections: RwLock::new(HashMap::new()),
            storage: Arc::new(RwLock::new(storage)),
        };
        let replayed = operations.len();
        for op in operations {
            engine.replay(op);
        }
        if replayed > 0 {
            log::info!(
                "replayed {replayed} operations into {} collections",
                engine.collections.read().len()
            );
        }
        Ok(engine)
    }

    fn replay(&self, op: Operation) {
        let col = self.get_or_create_collection(op.collection());
        match op {
            Operation::Insert { document, .. } | Operation::Update { document, .. } => col.restore(document),
            Operation::Delete { document_id, .. } => col.restore_delete(&document_id),
        }
    }

    /// Creates a collection with the given name, or returns the existing one.
    pub fn create_collection(&self, name: &str) -> Arc<Collection> {
        self.get_or_create_collection(name)
    }

    pub fn get_collection(&self, name: &str) -> Option<Arc<Collection>> {
        self.collections.read().get(name).cloned()
    }

    /// Collections come into existence on first access.
    pub fn get_or_create_collection(&self, name: &str) -> Arc<Collection> {
        if let Some(col) = self.get_collection(name) {
            return col;
        }
        let mut map = self.collections.write();
        map.entry(name.to_string())
            .or_insert_with(|| {
                log::debug!("creating collection {name}");
                Arc::new(Collection::new(name.to_string(), Arc::clone(&self.storage)))
            })
            .clone()
    }

    /// Drops a collection. Its records are deleted through storage first so a reopened
    /// store does not bring them back.
    ///
    /// # Errors
    /// Returns an error if a storage append fails; the collection stays registered.
    pub fn delete_collection(&self, name: &str) -> Result<bool, DbError> {
        let Some(col) = self.get_collection(name) else { return Ok(false) };
        {
            let mut w = col.write();
            for id in w.matching_ids(&Filter::True) {
                w.remove(&id)?;
            }
        }
        self.collections.write().remove(name);
        log::info!("dropped collection {name}");
        Ok(true)
    }

    pub fn list_collection_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.collections.read().keys().cloned().collect();
        names.sort();
        names
    }
}
