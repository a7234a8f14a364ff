use std::{
    cmp::Ordering as CmpOrdering,
    collections::{BTreeMap, HashMap},
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc, Mutex,
    },
};

use mockall::mock;
use serde_json::Value;

use crate::{
    backend::{Document, DocumentStore, Fields, StoreError},
    query::{Direction, Filter, Operator, Query},
};

mock! {
    pub DocStore {}

    impl DocumentStore for DocStore {
        fn backend_name(&self) -> &'static str;
        fn get_document(&self, collection: &str, id: &str) -> Result<Document, StoreError>;
        fn set_document(&self, collection: &str, id: &str, fields: Fields) -> Result<(), StoreError>;
        fn update_document(&self, collection: &str, id: &str, fields: Fields) -> Result<(), StoreError>;
        fn run_query(&self, query: &Query) -> Result<Vec<Document>, StoreError>;
    }
}

pub struct InMemoryStoreInner {
    pub success: AtomicBool,
    pub calls_to_get_document: AtomicU64,
    pub calls_to_set_document: AtomicU64,
    pub calls_to_update_document: AtomicU64,
    pub calls_to_run_query: AtomicU64,
    pub collections: Mutex<HashMap<String, BTreeMap<String, Fields>>>,
}

/// Working in-memory store that records how often each operation was called.
#[derive(Clone)]
pub struct InMemoryStore(pub Arc<InMemoryStoreInner>);

impl InMemoryStoreInner {
    fn new() -> Self {
        Self {
            success: AtomicBool::new(true),
            calls_to_get_document: AtomicU64::default(),
            calls_to_set_document: AtomicU64::default(),
            calls_to_update_document: AtomicU64::default(),
            calls_to_run_query: AtomicU64::default(),
            collections: Mutex::default(),
        }
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self(Arc::new(InMemoryStoreInner::new()))
    }

    pub fn fail(&self) {
        self.0.success.store(false, Ordering::SeqCst);
    }

    pub fn writes(&self) -> u64 {
        self.0.calls_to_set_document.load(Ordering::SeqCst)
            + self.0.calls_to_update_document.load(Ordering::SeqCst)
    }

    pub fn len(&self, collection: &str) -> usize {
        self.0
            .collections
            .lock()
            .unwrap()
            .get(collection)
            .map_or(0, BTreeMap::len)
    }

    fn result(&self) -> Result<(), StoreError> {
        match self.0.success.load(Ordering::SeqCst) {
            true => Ok(()),
            false => Err(StoreError::Connection("Supposed to fail".into())),
        }
    }
}

pub fn filter_accepts(filter: &Filter, candidate: Option<&Value>) -> bool {
    let Some(candidate) = candidate else {
        return false;
    };
    match filter.operator {
        Operator::Equal => candidate == &filter.value,
        Operator::In => filter
            .value
            .as_array()
            .is_some_and(|values| values.contains(candidate)),
    }
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> CmpOrdering {
    match (a, b) {
        (Some(Value::String(a)), Some(Value::String(b))) => a.cmp(b),
        (Some(Value::Number(a)), Some(Value::Number(b))) => a
            .as_f64()
            .partial_cmp(&b.as_f64())
            .unwrap_or(CmpOrdering::Equal),
        (Some(_), None) => CmpOrdering::Greater,
        (None, Some(_)) => CmpOrdering::Less,
        _ => CmpOrdering::Equal,
    }
}

impl DocumentStore for InMemoryStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    fn get_document(&self, collection: &str, id: &str) -> Result<Document, StoreError> {
        self.0.calls_to_get_document.fetch_add(1, Ordering::SeqCst);
        self.result()?;
        let collections = self.0.collections.lock().unwrap();
        Ok(collections
            .get(collection)
            .and_then(|documents| documents.get(id))
            .map(|fields| Document::new(id, fields.clone()))
            .unwrap_or_else(|| Document::missing(id)))
    }

    fn set_document(&self, collection: &str, id: &str, fields: Fields) -> Result<(), StoreError> {
        self.0.calls_to_set_document.fetch_add(1, Ordering::SeqCst);
        self.result()?;
        let mut collections = self.0.collections.lock().unwrap();
        collections
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), fields);
        Ok(())
    }

    fn update_document(
        &self,
        collection: &str,
        id: &str,
        fields: Fields,
    ) -> Result<(), StoreError> {
        self.0
            .calls_to_update_document
            .fetch_add(1, Ordering::SeqCst);
        self.result()?;
        let mut collections = self.0.collections.lock().unwrap();
        match collections
            .get_mut(collection)
            .and_then(|documents| documents.get_mut(id))
        {
            Some(existing) => {
                existing.extend(fields);
                Ok(())
            }
            None => Err(StoreError::MissingDocument {
                collection: collection.into(),
                id: id.into(),
            }),
        }
    }

    fn run_query(&self, query: &Query) -> Result<Vec<Document>, StoreError> {
        self.0.calls_to_run_query.fetch_add(1, Ordering::SeqCst);
        self.result()?;
        let collections = self.0.collections.lock().unwrap();
        let Some(documents) = collections.get(query.collection()) else {
            return Ok(vec![]);
        };

        let mut matches: Vec<Document> = documents
            .iter()
            .filter(|(_, fields)| {
                query
                    .filters()
                    .iter()
                    .all(|filter| filter_accepts(filter, fields.get(&filter.field)))
            })
            .map(|(id, fields)| Document::new(id.as_str(), fields.clone()))
            .collect();

        if let Some(ordering) = query.ordering() {
            matches.sort_by(|a, b| {
                let order = compare_values(a.field(&ordering.field), b.field(&ordering.field));
                match ordering.direction {
                    Direction::Ascending => order,
                    Direction::Descending => order.reverse(),
                }
            });
        }
        if let Some(limit) = query.max_results() {
            matches.truncate(limit);
        }
        Ok(matches)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    fn fields(value: Value) -> Fields {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn test_filter_accepts() {
        let equal = Filter {
            field: "status".into(),
            operator: Operator::Equal,
            value: json!("pending"),
        };
        assert!(filter_accepts(&equal, Some(&json!("pending"))));
        assert!(!filter_accepts(&equal, Some(&json!("cancelled"))));
        assert!(!filter_accepts(&equal, None));

        let member = Filter {
            field: "status".into(),
            operator: Operator::In,
            value: json!(["pending", "confirmed"]),
        };
        assert!(filter_accepts(&member, Some(&json!("confirmed"))));
        assert!(!filter_accepts(&member, Some(&json!("completed"))));
    }

    #[test]
    fn test_query_filters_orders_and_limits() {
        let store = InMemoryStore::new();
        for (id, created_at, status) in [
            ("a", "2024-01-01", "pending"),
            ("b", "2024-01-03", "pending"),
            ("c", "2024-01-02", "cancelled"),
            ("d", "2024-01-04", "pending"),
        ] {
            store
                .set_document(
                    "appointments",
                    id,
                    fields(json!({ "created_at": created_at, "status": status })),
                )
                .unwrap();
        }

        let query = Query::new("appointments")
            .filter("status", Operator::Equal, "pending")
            .order_by("created_at", Direction::Descending)
            .limit(2);
        let ids: Vec<String> = store
            .run_query(&query)
            .unwrap()
            .iter()
            .map(|document| document.id().to_string())
            .collect();
        assert_eq!(ids, vec!["d", "b"]);
    }

    #[test]
    fn test_update_merges_and_requires_existing_document() {
        let store = InMemoryStore::new();
        store
            .set_document("appointments", "a", fields(json!({ "name": "A", "status": "pending" })))
            .unwrap();
        store
            .update_document("appointments", "a", fields(json!({ "status": "confirmed" })))
            .unwrap();

        let document = store.get_document("appointments", "a").unwrap();
        assert_eq!(document.field("name"), Some(&json!("A")));
        assert_eq!(document.field("status"), Some(&json!("confirmed")));

        let missing = store.update_document("appointments", "b", Fields::new());
        assert!(matches!(missing, Err(StoreError::MissingDocument { .. })));
    }

    #[test]
    fn test_forced_failure() {
        let store = InMemoryStore::new();
        store.fail();
        assert!(store.run_query(&Query::new("status_checks")).is_err());
        assert_eq!(store.0.calls_to_run_query.load(Ordering::SeqCst), 1);
    }
}
