use crate::backend::{Document, DocumentStore, Fields, StoreError};
use crate::query::{Direction, Operator, Query};
use crate::schema::documents::{self, dsl};
use diesel::{
    dsl::sql,
    pg::Pg,
    sql_types::{Bool, Jsonb, Text},
    upsert::excluded,
    Connection, ExpressionMethods, Insertable, OptionalExtension, PgConnection, QueryDsl,
    RunQueryDsl,
};
use serde_json::Value;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

#[derive(Insertable)]
#[diesel(table_name = documents)]
struct NewDocument<'a> {
    project: &'a str,
    collection: &'a str,
    id: &'a str,
    data: Value,
}

/// PostgreSQL-backed document store. Every document lives in one jsonb table,
/// namespaced by project and collection.
#[derive(Clone)]
pub struct DatabaseInterface {
    connection: Arc<Mutex<PgConnection>>,
    project: String,
}

impl DatabaseInterface {
    pub fn new(database_url: &str, project: &str) -> Result<Self, StoreError> {
        let connection = Self::establish_connection(database_url)?;
        Ok(Self {
            connection: Arc::new(Mutex::new(connection)),
            project: project.into(),
        })
    }

    fn establish_connection(database_url: &str) -> Result<PgConnection, StoreError> {
        PgConnection::establish(database_url).map_err(|err| StoreError::Connection(err.to_string()))
    }

    fn connection(&self) -> Result<MutexGuard<'_, PgConnection>, StoreError> {
        self.connection.lock().map_err(|_| StoreError::Poisoned)
    }

    fn into_document(id: &str, data: Value) -> Result<Document, StoreError> {
        match data {
            Value::Object(fields) => Ok(Document::new(id, fields)),
            other => Err(StoreError::Malformed {
                id: id.into(),
                reason: format!("stored data is not an object: {other}"),
            }),
        }
    }

    #[cfg(test)]
    fn remove_all_documents(&self) {
        let mut connection = self.connection().unwrap();
        diesel::delete(dsl::documents.filter(dsl::project.eq(self.project.as_str())))
            .execute(&mut *connection)
            .unwrap();
    }
}

impl DocumentStore for DatabaseInterface {
    fn backend_name(&self) -> &'static str {
        "postgres"
    }

    fn get_document(&self, collection: &str, id: &str) -> Result<Document, StoreError> {
        let mut connection = self.connection()?;
        let data = documents::table
            .find((self.project.as_str(), collection, id))
            .select(dsl::data)
            .first::<Value>(&mut *connection)
            .optional()?;

        match data {
            Some(data) => Self::into_document(id, data),
            None => Ok(Document::missing(id)),
        }
    }

    fn set_document(&self, collection: &str, id: &str, fields: Fields) -> Result<(), StoreError> {
        let mut connection = self.connection()?;
        let document = NewDocument {
            project: &self.project,
            collection,
            id,
            data: Value::Object(fields),
        };

        diesel::insert_into(documents::table)
            .values(&document)
            .on_conflict((dsl::project, dsl::collection, dsl::id))
            .do_update()
            .set(dsl::data.eq(excluded(dsl::data)))
            .execute(&mut *connection)?;
        Ok(())
    }

    fn update_document(
        &self,
        collection: &str,
        id: &str,
        fields: Fields,
    ) -> Result<(), StoreError> {
        let mut connection = self.connection()?;
        let key = (self.project.as_str(), collection, id);

        connection.transaction::<_, StoreError, _>(|connection| {
            let current = documents::table
                .find(key)
                .select(dsl::data)
                .for_update()
                .first::<Value>(connection)
                .optional()?;

            let Some(Value::Object(mut data)) = current else {
                return Err(StoreError::MissingDocument {
                    collection: collection.into(),
                    id: id.into(),
                });
            };
            data.extend(fields);

            diesel::update(documents::table.find(key))
                .set(dsl::data.eq(Value::Object(data)))
                .execute(connection)?;
            Ok(())
        })
    }

    fn run_query(&self, query: &Query) -> Result<Vec<Document>, StoreError> {
        let mut statement: documents::BoxedQuery<'static, Pg, (Text, Jsonb)> = dsl::documents
            .filter(dsl::project.eq(self.project.clone()))
            .filter(dsl::collection.eq(query.collection().to_string()))
            .select((dsl::id, dsl::data))
            .into_boxed();

        for filter in query.filters() {
            statement = match filter.operator {
                Operator::Equal => statement.filter(
                    sql::<Bool>("data -> ")
                        .bind::<Text, _>(filter.field.clone())
                        .sql(" = ")
                        .bind::<Jsonb, _>(filter.value.clone()),
                ),
                Operator::In => statement.filter(
                    sql::<Bool>("data -> ")
                        .bind::<Text, _>(filter.field.clone())
                        .sql(" IN (SELECT jsonb_array_elements(")
                        .bind::<Jsonb, _>(filter.value.clone())
                        .sql("))"),
                ),
            };
        }

        if let Some(ordering) = query.ordering() {
            let key = sql::<Text>("data ->> ")
                .bind::<Text, _>(ordering.field.clone())
                .sql(" COLLATE \"C\"");
            statement = match ordering.direction {
                Direction::Ascending => statement.order(key.asc()),
                Direction::Descending => statement.order(key.desc()),
            };
        }

        if let Some(limit) = query.max_results() {
            statement = statement.limit(i64::try_from(limit).unwrap_or(i64::MAX));
        }

        let mut connection = self.connection()?;
        let rows = statement.load::<(String, Value)>(&mut *connection)?;
        debug!(collection = query.collection(), rows = rows.len(), "query executed");

        rows.into_iter()
            .map(|(id, data)| Self::into_document(&id, data))
            .collect()
    }
}
