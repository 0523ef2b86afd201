use crate::document::Document;
use crate::storage::StorageEngine;
use crate::types::DocumentId;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Documents in insertion order with id lookup. Each document keeps the sequence number
/// it was first inserted under, so removal does not shift the order.
#[derive(Debug, Default)]
pub(crate) struct Slots {
    next_seq: u64,
    order: BTreeMap<u64, DocumentId>,
    by_id: HashMap<DocumentId, (u64, Document)>,
}

impl Slots {
    pub(crate) fn put(&mut self, document: Document) {
        if let Some((_, slot)) = self.by_id.get_mut(&document.id) {
            *slot = document;
            return;
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        self.order.insert(seq, document.id.clone());
        self.by_id.insert(document.id.clone(), (seq, document));
    }

    pub(crate) fn take(&mut self, id: &DocumentId) -> Option<Document> {
        let (seq, removed) = self.by_id.remove(id)?;
        self.order.remove(&seq);
        Some(removed)
    }

    pub(crate) fn get(&self, id: &DocumentId) -> Option<&Document> {
        self.by_id.get(id).map(|(_, d)| d)
    }

    pub(crate) fn contains(&self, id: &DocumentId) -> bool {
        self.by_id.contains_key(id)
    }

    pub(crate) fn len(&self) -> usize {
        self.by_id.len()
    }

    pub(crate) fn ids(&self) -> Vec<DocumentId> {
        self.order.values().cloned().collect()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &Document> {
        self.order.values().filter_map(|id| self.get(id))
    }
}

pub struct Collection {
    pub(crate) name: String,
    pub(crate) slots: RwLock<Slots>,
    pub(crate) storage: Arc<RwLock<Box<dyn StorageEngine>>>,
}

impl Collection {
    pub fn new(name: String, storage: Arc<RwLock<Box<dyn StorageEngine>>>) -> Self {
        Self { name, slots: RwLock::new(Slots::default()), storage }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Applies a replayed document without writing to storage.
    pub(crate) fn restore(&self, document: Document) {
        self.slots.write().put(document);
    }

    pub(crate) fn restore_delete(&self, id: &DocumentId) {
        let _ = self.slots.write().take(id);
    }
}
