use bson::Document as BsonDocument;
use std::sync::Arc;

use super::error::ApiError;
use crate::collection::Collection;
use crate::engine::Engine;
use crate::registry::TableRegistry;

#[derive(Debug, Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
    pub registry: Arc<TableRegistry>,
}

impl AppState {
    #[must_use]
    pub fn new(engine: Arc<Engine>, registry: TableRegistry) -> Self {
        Self { engine, registry: Arc::new(registry) }
    }

    /// Resolves a table name from the URL to its collection and insert defaults.
    ///
    /// # Errors
    /// Unknown or malformed names are rejected before any collection is created.
    pub fn table(&self, name: &str) -> Result<(Arc<Collection>, BsonDocument), ApiError> {
        let defaults = self.registry.resolve(name)?;
        Ok((self.engine.get_or_create_collection(name), defaults))
    }
}
