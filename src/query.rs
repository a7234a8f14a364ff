//! Builder types on top of [`DocumentStore`].
//!
//! Every builder method consumes the value and returns a new one, so a
//! partially built query can be cloned and extended independently.

use crate::backend::{Document, DocumentStore, Fields, StoreError};
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Equal,
    In,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub field: String,
    pub operator: Operator,
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Ordering {
    pub field: String,
    pub direction: Direction,
}

/// Backend-independent description of a collection query.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    collection: String,
    filters: Vec<Filter>,
    ordering: Option<Ordering>,
    limit: Option<usize>,
}

impl Query {
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            filters: Vec::new(),
            ordering: None,
            limit: None,
        }
    }

    pub fn filter(mut self, field: &str, operator: Operator, value: impl Into<Value>) -> Self {
        self.filters.push(Filter {
            field: field.into(),
            operator,
            value: value.into(),
        });
        self
    }

    pub fn order_by(mut self, field: &str, direction: Direction) -> Self {
        self.ordering = Some(Ordering {
            field: field.into(),
            direction,
        });
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    pub fn ordering(&self) -> Option<&Ordering> {
        self.ordering.as_ref()
    }

    pub fn max_results(&self) -> Option<usize> {
        self.limit
    }
}

pub struct Collection<'a, S> {
    store: &'a S,
    name: String,
}

impl<'a, S: DocumentStore> Collection<'a, S> {
    pub fn new(store: &'a S, name: &str) -> Self {
        Self {
            store,
            name: name.into(),
        }
    }

    pub fn document(&self, id: &str) -> DocumentRef<'a, S> {
        DocumentRef {
            store: self.store,
            collection: self.name.clone(),
            id: id.into(),
        }
    }

    /// Reference to a document under a freshly generated id.
    pub fn new_document(&self) -> DocumentRef<'a, S> {
        self.document(&Uuid::new_v4().to_string())
    }

    pub fn filter(&self, field: &str, operator: Operator, value: impl Into<Value>) -> BoundQuery<'a, S> {
        self.query().filter(field, operator, value)
    }

    pub fn order_by(&self, field: &str, direction: Direction) -> BoundQuery<'a, S> {
        self.query().order_by(field, direction)
    }

    pub fn limit(&self, limit: usize) -> BoundQuery<'a, S> {
        self.query().limit(limit)
    }

    fn query(&self) -> BoundQuery<'a, S> {
        BoundQuery {
            store: self.store,
            query: Query::new(self.name.as_str()),
        }
    }
}

pub struct DocumentRef<'a, S> {
    store: &'a S,
    collection: String,
    id: String,
}

impl<S: DocumentStore> DocumentRef<'_, S> {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn get(&self) -> Result<Document, StoreError> {
        self.store.get_document(&self.collection, &self.id)
    }

    pub fn set(&self, fields: Fields) -> Result<(), StoreError> {
        self.store.set_document(&self.collection, &self.id, fields)
    }

    pub fn update(&self, fields: Fields) -> Result<(), StoreError> {
        self.store.update_document(&self.collection, &self.id, fields)
    }
}

/// A [`Query`] tied to the store it will run against.
pub struct BoundQuery<'a, S> {
    store: &'a S,
    query: Query,
}

impl<S> Clone for BoundQuery<'_, S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store,
            query: self.query.clone(),
        }
    }
}

impl<'a, S: DocumentStore> BoundQuery<'a, S> {
    pub fn filter(self, field: &str, operator: Operator, value: impl Into<Value>) -> Self {
        Self {
            store: self.store,
            query: self.query.filter(field, operator, value),
        }
    }

    pub fn order_by(self, field: &str, direction: Direction) -> Self {
        Self {
            store: self.store,
            query: self.query.order_by(field, direction),
        }
    }

    pub fn limit(self, limit: usize) -> Self {
        Self {
            store: self.store,
            query: self.query.limit(limit),
        }
    }

    #[cfg(test)]
    pub fn query(&self) -> &Query {
        &self.query
    }

    pub fn get(&self) -> Result<Vec<Document>, StoreError> {
        self.store.run_query(&self.query)
    }
}
