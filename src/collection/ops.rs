use super::core::{Collection, Slots};
use crate::document::Document;
use crate::errors::DbError;
use crate::query::{Filter, eval_filter};
use crate::telemetry;
use crate::types::{DocumentId, Operation};
use parking_lot::RwLockWriteGuard;

/// Exclusive access to a collection. Find-then-write sequences run under one guard, so
/// they are atomic with respect to other writers in this process.
pub struct CollectionWriter<'a> {
    col: &'a Collection,
    slots: RwLockWriteGuard<'a, Slots>,
}

impl Collection {
    pub fn write(&self) -> CollectionWriter<'_> {
        CollectionWriter { col: self, slots: self.slots.write() }
    }

    /// # Errors
    /// Returns an error if the id is already taken or the storage append fails.
    pub fn insert_document(&self, document: Document) -> Result<DocumentId, DbError> {
        self.write().insert(document)
    }

    pub fn find_document(&self, id: &DocumentId) -> Option<Document> {
        self.slots.read().get(id).cloned()
    }

    /// Replaces the stored document with `id`, keeping `id` as its `_id`. Returns `false` when
    /// no such document exists.
    ///
    /// # Errors
    /// Returns an error if the storage append fails.
    pub fn update_document(&self, id: &DocumentId, new_document: Document) -> Result<bool, DbError> {
        self.write().replace(Document::with_id(id.clone(), new_document.data.0))
    }

    /// # Errors
    /// Returns an error if the storage append fails.
    pub fn delete_document(&self, id: &DocumentId) -> Result<bool, DbError> {
        Ok(self.write().remove(id)?.is_some())
    }

    pub fn get_all_documents(&self) -> Vec<Document> {
        self.slots.read().iter().cloned().collect()
    }

    /// Return only the IDs of all documents without cloning each document.
    pub fn list_ids(&self) -> Vec<DocumentId> {
        self.slots.read().ids()
    }

    /// Visits every document in insertion order under a shared lock.
    pub fn scan<F: FnMut(&Document)>(&self, mut f: F) {
        for doc in self.slots.read().iter() {
            f(doc);
        }
    }
}

impl CollectionWriter<'_> {
    #[must_use]
    pub fn find_first(&self, filter: &Filter) -> Option<Document> {
        self.slots.iter().find(|d| eval_filter(d.record(), filter)).cloned()
    }

    #[must_use]
    pub fn matching_ids(&self, filter: &Filter) -> Vec<DocumentId> {
        self.slots.iter().filter(|d| eval_filter(d.record(), filter)).map(|d| d.id.clone()).collect()
    }

    /// # Errors
    /// Returns an error if the id is already taken or the storage append fails.
    pub fn insert(&mut self, document: Document) -> Result<DocumentId, DbError> {
        if self.slots.contains(&document.id) {
            return Err(DbError::InvalidDocument(format!("duplicate _id {}", document.id)));
        }
        let doc_id = document.id.clone();
        // Persist first, then apply
        self.persist(Operation::Insert { collection: self.col.name.clone(), document: document.clone() })?;
        self.slots.put(document);
        telemetry::log_audit("insert", &self.col.name, &doc_id.to_string());
        Ok(doc_id)
    }

    /// # Errors
    /// Returns an error if the storage append fails.
    pub fn replace(&mut self, document: Document) -> Result<bool, DbError> {
        if !self.slots.contains(&document.id) {
            return Ok(false);
        }
        let doc_id = document.id.clone();
        self.persist(Operation::Update { collection: self.col.name.clone(), document: document.clone() })?;
        self.slots.put(document);
        telemetry::log_audit("update", &self.col.name, &doc_id.to_string());
        Ok(true)
    }

    /// # Errors
    /// Returns an error if the storage append fails.
    pub fn remove(&mut self, id: &DocumentId) -> Result<Option<Document>, DbError> {
        if !self.slots.contains(id) {
            return Ok(None);
        }
        self.persist(Operation::Delete { collection: self.col.name.clone(), document_id: id.clone() })?;
        let removed = self.slots.take(id);
        telemetry::log_audit("delete", &self.col.name, &id.to_string());
        Ok(removed)
    }

    fn persist(&self, operation: Operation) -> Result<(), DbError> {
        self.col.storage.write().append(&operation).map_err(|e| {
            log::error!("storage append failed for {}: {e}", self.col.name);
            e
        })
    }
}
