//! Document store over the Firestore REST API.
//!
//! Live queries are implemented by polling `:runQuery` and emitting a
//! snapshot whenever the result set differs from the previous one.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::time::MissedTickBehavior;

use super::client::RestClient;
use super::value::{decode_fields, encode, encode_fields, expand_paths, field_path};
use super::{
    new_document_id, Direction, Document, DocumentStore, Fields, Filter, Query, Subscription, Write,
};
use crate::error::{ServiceError, ServiceResult};

const FIRESTORE_BASE: &str = "https://firestore.googleapis.com/v1";

#[derive(Debug, Deserialize)]
struct RestDocument {
    name: String,
    #[serde(default)]
    fields: Option<Value>,
}

impl RestDocument {
    fn into_document(self) -> ServiceResult<Document> {
        let id = self
            .name
            .rsplit('/')
            .next()
            .unwrap_or_default()
            .to_string();
        Ok(Document {
            id,
            fields: decode_fields(self.fields.as_ref())?,
        })
    }
}

/// One element of the `:runQuery` response stream. Elements without a
/// document only carry read metadata.
#[derive(Debug, Deserialize)]
struct RunQueryItem {
    #[serde(default)]
    document: Option<RestDocument>,
}

struct Inner {
    http: RestClient,
    project_id: String,
    poll_interval: Duration,
}

/// Firestore-backed store. Cheap to clone.
#[derive(Clone)]
pub struct FirestoreStore {
    inner: Arc<Inner>,
}

impl FirestoreStore {
    pub fn new(http: RestClient, project_id: impl Into<String>, poll_interval: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                http,
                project_id: project_id.into(),
                poll_interval,
            }),
        }
    }

    fn database_name(&self) -> String {
        format!("projects/{}/databases/(default)", self.inner.project_id)
    }

    /// URL of the documents root.
    fn documents_url(&self) -> String {
        format!("{}/{}/documents", FIRESTORE_BASE, self.database_name())
    }

    fn document_url(&self, collection: &str, id: &str) -> String {
        format!("{}/{}/{}", self.documents_url(), collection, id)
    }

    /// Resource name used inside request bodies.
    fn document_name(&self, collection: &str, id: &str) -> String {
        format!("{}/documents/{}/{}", self.database_name(), collection, id)
    }

    /// One element of a `:commit` request.
    fn write_json(&self, write: &Write) -> Value {
        let (collection, id) = write.target();
        let name = self.document_name(collection, id);
        match write {
            Write::Create { fields, .. } => json!({
                "update": { "name": name, "fields": encode_fields(fields) },
                "currentDocument": { "exists": false },
            }),
            Write::Update { fields, .. } => json!({
                "update": { "name": name, "fields": encode_fields(&expand_paths(fields)) },
                "updateMask": {
                    "fieldPaths": fields.keys().map(|k| field_path(k)).collect::<Vec<_>>()
                },
                "currentDocument": { "exists": true },
            }),
            Write::Increment { deltas, .. } => json!({
                "transform": {
                    "document": name,
                    "fieldTransforms": deltas
                        .iter()
                        .map(|(path, delta)| json!({
                            "fieldPath": field_path(path),
                            "increment": { "integerValue": delta.to_string() },
                        }))
                        .collect::<Vec<_>>(),
                },
                "currentDocument": { "exists": true },
            }),
        }
    }

    /// `:runQuery` URL and collection id for a (possibly nested) collection.
    fn run_query_target(&self, collection: &str) -> (String, String) {
        match collection.rsplit_once('/') {
            Some((parent, collection_id)) => (
                format!("{}/{}:runQuery", self.documents_url(), parent),
                collection_id.to_string(),
            ),
            None => (
                format!("{}:runQuery", self.documents_url()),
                collection.to_string(),
            ),
        }
    }
}

fn filter_json(filter: &Filter) -> Value {
    let (field, op, value) = match filter {
        Filter::Equal { field, value } => (field, "EQUAL", value),
        Filter::ArrayContains { field, value } => (field, "ARRAY_CONTAINS", value),
    };
    json!({
        "fieldFilter": {
            "field": { "fieldPath": field_path(field) },
            "op": op,
            "value": encode(value),
        }
    })
}

fn structured_query(query: &Query, collection_id: &str) -> Value {
    let mut sq = json!({ "from": [{ "collectionId": collection_id }] });

    let mut filters: Vec<Value> = query.filters.iter().map(filter_json).collect();
    match filters.len() {
        0 => {}
        1 => sq["where"] = filters.remove(0),
        _ => {
            sq["where"] = json!({
                "compositeFilter": { "op": "AND", "filters": filters }
            })
        }
    }

    if let Some((ref field, direction)) = query.order_by {
        let direction = match direction {
            Direction::Ascending => "ASCENDING",
            Direction::Descending => "DESCENDING",
        };
        sq["orderBy"] = json!([{ "field": { "fieldPath": field_path(field) }, "direction": direction }]);
    }
    if let Some(limit) = query.limit {
        sq["limit"] = json!(limit);
    }
    json!({ "structuredQuery": sq })
}

#[async_trait]
impl DocumentStore for FirestoreStore {
    async fn add(&self, collection: &str, fields: Fields) -> ServiceResult<String> {
        // Ids are generated client-side, as the mobile SDKs do.
        let id = new_document_id();
        let body = json!({ "fields": encode_fields(&fields) });
        self.inner
            .http
            .patch_json(
                &self.document_url(collection, &id),
                &[("currentDocument.exists", "false".to_string())],
                &body,
            )
            .await?;
        tracing::debug!(collection, doc_id = %id, "Document created");
        Ok(id)
    }

    async fn set(&self, collection: &str, id: &str, fields: Fields) -> ServiceResult<()> {
        let body = json!({ "fields": encode_fields(&fields) });
        self.inner
            .http
            .patch_json(&self.document_url(collection, id), &[], &body)
            .await?;
        Ok(())
    }

    async fn update(&self, collection: &str, id: &str, fields: Fields) -> ServiceResult<()> {
        let mut params: Vec<(&str, String)> = fields
            .keys()
            .map(|k| ("updateMask.fieldPaths", field_path(k)))
            .collect();
        params.push(("currentDocument.exists", "true".to_string()));

        let body = json!({ "fields": encode_fields(&expand_paths(&fields)) });
        let result = self
            .inner
            .http
            .patch_json(&self.document_url(collection, id), &params, &body)
            .await;
        match result {
            Ok(_) => Ok(()),
            Err(ServiceError::Backend { status: 404, .. }) => {
                Err(ServiceError::not_found("document", format!("{}/{}", collection, id)))
            }
            Err(e) => Err(e),
        }
    }

    async fn commit(&self, writes: Vec<Write>) -> ServiceResult<()> {
        if writes.is_empty() {
            return Ok(());
        }
        let body = json!({
            "writes": writes.iter().map(|w| self.write_json(w)).collect::<Vec<_>>()
        });
        let url = format!("{}/{}/documents:commit", FIRESTORE_BASE, self.database_name());
        self.inner.http.post_json(&url, &body).await?;
        tracing::debug!(writes = writes.len(), "Batch committed");
        Ok(())
    }

    async fn get(&self, collection: &str, id: &str) -> ServiceResult<Option<Document>> {
        match self.inner.http.get(&self.document_url(collection, id)).await {
            Ok(resp) => {
                let doc: RestDocument = resp.json().await?;
                Ok(Some(doc.into_document()?))
            }
            Err(ServiceError::Backend { status: 404, .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn delete(&self, collection: &str, id: &str) -> ServiceResult<()> {
        self.inner
            .http
            .delete(&self.document_url(collection, id))
            .await?;
        Ok(())
    }

    async fn query(&self, query: &Query) -> ServiceResult<Vec<Document>> {
        let (url, collection_id) = self.run_query_target(&query.collection);
        let body = structured_query(query, &collection_id);
        let resp = self.inner.http.post_json(&url, &body).await?;
        let items: Vec<RunQueryItem> = resp.json().await?;

        items
            .into_iter()
            .filter_map(|item| item.document)
            .map(RestDocument::into_document)
            .collect()
    }

    fn listen(&self, query: Query) -> Subscription<Vec<Document>> {
        let store = self.clone();
        Subscription::spawn(move |tx| async move {
            let mut ticker = tokio::time::interval(store.inner.poll_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut last: Option<Vec<Document>> = None;
            let mut failing = false;

            loop {
                ticker.tick().await;
                let item = match store.query(&query).await {
                    Ok(docs) => {
                        failing = false;
                        if last.as_ref() == Some(&docs) {
                            continue;
                        }
                        last = Some(docs.clone());
                        Ok(docs)
                    }
                    Err(e) => {
                        tracing::warn!(collection = %query.collection, "Live query failed: {}", e);
                        // Report once per failure streak.
                        if failing {
                            continue;
                        }
                        failing = true;
                        Err(e)
                    }
                };
                if tx.send(item).is_err() {
                    break;
                }
            }
        })
    }
}
