use crate::{
    backend::{Document, DocumentStore, Fields, StoreError},
    query::Query,
};
use tracing::debug;

/// Stand-in used when no database is configured. Writes are discarded and
/// every read comes back empty.
#[derive(Debug, Clone, Copy, Default)]
pub struct MockStore;

impl DocumentStore for MockStore {
    fn backend_name(&self) -> &'static str {
        "mock"
    }

    fn get_document(&self, collection: &str, id: &str) -> Result<Document, StoreError> {
        debug!(collection, id, "mock store get");
        Ok(Document::missing(id))
    }

    fn set_document(&self, collection: &str, id: &str, _fields: Fields) -> Result<(), StoreError> {
        debug!(collection, id, "mock store set discarded");
        Ok(())
    }

    fn update_document(
        &self,
        collection: &str,
        id: &str,
        _fields: Fields,
    ) -> Result<(), StoreError> {
        debug!(collection, id, "mock store update of missing document");
        Err(StoreError::MissingDocument {
            collection: collection.into(),
            id: id.into(),
        })
    }

    fn run_query(&self, query: &Query) -> Result<Vec<Document>, StoreError> {
        debug!(collection = query.collection(), "mock store query");
        Ok(vec![])
    }
}
