use crate::query::{Collection, Query};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Field map of a single document.
pub type Fields = Map<String, Value>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store connection failed: {0}")]
    Connection(String),

    #[error("database operation failed: {0}")]
    Database(#[from] diesel::result::Error),

    #[error("document {collection}/{id} does not exist")]
    MissingDocument { collection: String, id: String },

    #[error("document {id} is malformed: {reason}")]
    Malformed { id: String, reason: String },

    #[error("record could not be serialized: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("store connection lock poisoned")]
    Poisoned,
}

/// A document as returned by a store. A document that does not exist carries no data.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    id: String,
    data: Option<Fields>,
}

impl Document {
    pub fn new(id: impl Into<String>, data: Fields) -> Self {
        Self {
            id: id.into(),
            data: Some(data),
        }
    }

    pub fn missing(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            data: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn exists(&self) -> bool {
        self.data.is_some()
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.data.as_ref().and_then(|data| data.get(name))
    }

    pub fn to_record<T: DeserializeOwned>(&self) -> Result<T, StoreError> {
        let data = self.data.clone().ok_or_else(|| StoreError::Malformed {
            id: self.id.clone(),
            reason: "document has no data".into(),
        })?;
        serde_json::from_value(Value::Object(data)).map_err(|err| StoreError::Malformed {
            id: self.id.clone(),
            reason: err.to_string(),
        })
    }
}

/// Serializes a record into the field map stored for it.
pub fn to_fields<T: Serialize>(record: &T) -> Result<Fields, StoreError> {
    match serde_json::to_value(record)? {
        Value::Object(fields) => Ok(fields),
        other => Err(StoreError::Malformed {
            id: String::new(),
            reason: format!("expected an object, got {other}"),
        }),
    }
}

/// Collection-oriented document store the services are written against.
///
/// Exactly one implementation is chosen at startup and shared through an `Arc`.
pub trait DocumentStore: Send + Sync + 'static {
    fn backend_name(&self) -> &'static str;

    fn get_document(&self, collection: &str, id: &str) -> Result<Document, StoreError>;

    /// Overwrites the full document, creating it if needed.
    fn set_document(&self, collection: &str, id: &str, fields: Fields) -> Result<(), StoreError>;

    /// Merges `fields` into an existing document. Fails with
    /// [`StoreError::MissingDocument`] when the document does not exist.
    fn update_document(&self, collection: &str, id: &str, fields: Fields)
        -> Result<(), StoreError>;

    fn run_query(&self, query: &Query) -> Result<Vec<Document>, StoreError>;
}

pub trait CollectionExt: DocumentStore + Sized {
    fn collection(&self, name: &str) -> Collection<'_, Self> {
        Collection::new(self, name)
    }
}

impl<S: DocumentStore> CollectionExt for S {}
