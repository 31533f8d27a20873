//! In-memory document store for tests.
//!
//! Listeners are push-based: every write wakes all subscriptions, which
//! re-run their query and emit if the result changed.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;

use super::value::expand_paths;
use super::{Direction, Document, DocumentStore, Fields, Query, Subscription, Write};
use crate::error::{ServiceError, ServiceResult};

#[derive(Default)]
struct State {
    /// collection path -> id -> fields
    collections: BTreeMap<String, BTreeMap<String, Fields>>,
    next_id: u64,
}

#[derive(Clone)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
    changes: broadcast::Sender<()>,
    adds: Arc<AtomicUsize>,
    fail_queries: Arc<AtomicBool>,
    commit_delay: Arc<Mutex<Option<Duration>>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Deep-merge `src` into `dst`; nested objects merge, everything else replaces.
fn merge(dst: &mut Fields, src: Fields) {
    for (key, value) in src {
        match value {
            Value::Object(incoming) if dst.get(&key).is_some_and(Value::is_object) => {
                if let Some(Value::Object(existing)) = dst.get_mut(&key) {
                    merge(existing, incoming);
                }
            }
            value => {
                dst.insert(key, value);
            }
        }
    }
}

/// Resolve a dotted path to a mutable slot, creating intermediate maps.
fn slot<'a>(fields: &'a mut Fields, path: &str) -> &'a mut Value {
    let mut segments: Vec<&str> = path.split('.').collect();
    let last = segments.pop().unwrap_or(path);
    let mut cursor = fields;
    for segment in segments {
        let entry = cursor
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Fields::new()));
        if !entry.is_object() {
            *entry = Value::Object(Fields::new());
        }
        cursor = entry.as_object_mut().expect("just made an object");
    }
    cursor.entry(last.to_string()).or_insert(Value::Null)
}

impl MemoryStore {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(64);
        Self {
            state: Arc::new(Mutex::new(State::default())),
            changes,
            adds: Arc::new(AtomicUsize::new(0)),
            fail_queries: Arc::new(AtomicBool::new(false)),
            commit_delay: Arc::new(Mutex::new(None)),
        }
    }

    /// Number of documents created so far, by `add` or a batch.
    pub fn add_count(&self) -> usize {
        self.adds.load(Ordering::SeqCst)
    }

    /// Make every subsequent `query` fail.
    pub fn fail_queries(&self, fail: bool) {
        self.fail_queries.store(fail, Ordering::SeqCst);
    }

    /// Hold every batch for `delay` before it is applied, like a slow network.
    pub fn delay_commits(&self, delay: Duration) {
        *self.commit_delay.lock().unwrap() = Some(delay);
    }

    /// All documents in a collection, by id.
    pub fn documents(&self, collection: &str) -> Vec<Document> {
        let state = self.state.lock().unwrap();
        state
            .collections
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .map(|(id, fields)| Document {
                        id: id.clone(),
                        fields: fields.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    fn notify(&self) {
        let _ = self.changes.send(());
    }

    fn run_query(&self, query: &Query) -> Vec<Document> {
        let mut docs: Vec<Document> = self
            .documents(&query.collection)
            .into_iter()
            .filter(|doc| query.filters.iter().all(|f| f.matches(&doc.fields)))
            .collect();

        if let Some((ref field, direction)) = query.order_by {
            docs.sort_by(|a, b| {
                let key = |d: &Document| d.fields.get(field).and_then(Value::as_i64);
                let ord = key(a).cmp(&key(b));
                match direction {
                    Direction::Ascending => ord,
                    Direction::Descending => ord.reverse(),
                }
            });
        }
        if let Some(limit) = query.limit {
            docs.truncate(limit);
        }
        docs
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn add(&self, collection: &str, fields: Fields) -> ServiceResult<String> {
        self.adds.fetch_add(1, Ordering::SeqCst);
        let id = {
            let mut state = self.state.lock().unwrap();
            state.next_id += 1;
            let id = format!("doc{}", state.next_id);
            state
                .collections
                .entry(collection.to_string())
                .or_default()
                .insert(id.clone(), fields);
            id
        };
        self.notify();
        Ok(id)
    }

    async fn set(&self, collection: &str, id: &str, fields: Fields) -> ServiceResult<()> {
        self.state
            .lock()
            .unwrap()
            .collections
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), fields);
        self.notify();
        Ok(())
    }

    async fn update(&self, collection: &str, id: &str, fields: Fields) -> ServiceResult<()> {
        {
            let mut state = self.state.lock().unwrap();
            let doc = state
                .collections
                .get_mut(collection)
                .and_then(|docs| docs.get_mut(id))
                .ok_or_else(|| ServiceError::not_found("document", format!("{}/{}", collection, id)))?;
            merge(doc, expand_paths(&fields));
        }
        self.notify();
        Ok(())
    }

    async fn commit(&self, writes: Vec<Write>) -> ServiceResult<()> {
        let delay = *self.commit_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        {
            let mut state = self.state.lock().unwrap();
            // Check every precondition before touching anything.
            for write in &writes {
                let (collection, id) = write.target();
                let exists = state
                    .collections
                    .get(collection)
                    .is_some_and(|docs| docs.contains_key(id));
                match write {
                    Write::Create { .. } if exists => {
                        return Err(ServiceError::Backend {
                            status: 409,
                            code: "ALREADY_EXISTS".to_string(),
                            message: format!("{}/{}", collection, id),
                        });
                    }
                    Write::Update { .. } | Write::Increment { .. } if !exists => {
                        return Err(ServiceError::not_found(
                            "document",
                            format!("{}/{}", collection, id),
                        ));
                    }
                    _ => {}
                }
            }
            for write in writes {
                match write {
                    Write::Create {
                        collection,
                        id,
                        fields,
                    } => {
                        self.adds.fetch_add(1, Ordering::SeqCst);
                        state.collections.entry(collection).or_default().insert(id, fields);
                    }
                    Write::Update {
                        collection,
                        id,
                        fields,
                    } => {
                        if let Some(doc) = state
                            .collections
                            .get_mut(&collection)
                            .and_then(|docs| docs.get_mut(&id))
                        {
                            merge(doc, expand_paths(&fields));
                        }
                    }
                    Write::Increment {
                        collection,
                        id,
                        deltas,
                    } => {
                        if let Some(doc) = state
                            .collections
                            .get_mut(&collection)
                            .and_then(|docs| docs.get_mut(&id))
                        {
                            for (path, delta) in deltas {
                                let value = slot(doc, &path);
                                let current = value.as_i64().unwrap_or(0);
                                *value = Value::from(current + delta);
                            }
                        }
                    }
                }
            }
        }
        self.notify();
        Ok(())
    }

    async fn get(&self, collection: &str, id: &str) -> ServiceResult<Option<Document>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .collections
            .get(collection)
            .and_then(|docs| docs.get(id))
            .map(|fields| Document {
                id: id.to_string(),
                fields: fields.clone(),
            }))
    }

    async fn delete(&self, collection: &str, id: &str) -> ServiceResult<()> {
        if let Some(docs) = self.state.lock().unwrap().collections.get_mut(collection) {
            docs.remove(id);
        }
        self.notify();
        Ok(())
    }

    async fn query(&self, query: &Query) -> ServiceResult<Vec<Document>> {
        if self.fail_queries.load(Ordering::SeqCst) {
            return Err(ServiceError::Backend {
                status: 503,
                code: "UNAVAILABLE".to_string(),
                message: "injected failure".to_string(),
            });
        }
        Ok(self.run_query(query))
    }

    fn listen(&self, query: Query) -> Subscription<Vec<Document>> {
        let store = self.clone();
        let mut changes = self.changes.subscribe();
        Subscription::spawn(move |tx| async move {
            let mut last = store.run_query(&query);
            if tx.send(Ok(last.clone())).is_err() {
                return;
            }
            loop {
                match changes.recv().await {
                    Ok(()) | Err(RecvError::Lagged(_)) => {}
                    Err(RecvError::Closed) => break,
                }
                let docs = store.run_query(&query);
                if docs == last {
                    continue;
                }
                last = docs.clone();
                if tx.send(Ok(docs)).is_err() {
                    break;
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(v: Value) -> Fields {
        v.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_update_dotted_path_and_increment() {
        let store = MemoryStore::new();
        let id = store
            .add("chats", fields(json!({"unreadCount": {"a": 2, "b": 0}})))
            .await
            .unwrap();

        store
            .update("chats", &id, fields(json!({"unreadCount.a": 0})))
            .await
            .unwrap();
        store
            .commit(vec![Write::Increment {
                collection: "chats".to_string(),
                id: id.clone(),
                deltas: vec![("unreadCount.b".to_string(), 1)],
            }])
            .await
            .unwrap();

        let doc = store.get("chats", &id).await.unwrap().unwrap();
        assert_eq!(doc.fields["unreadCount"], json!({"a": 0, "b": 1}));
    }

    #[tokio::test]
    async fn test_update_missing_document_fails() {
        let store = MemoryStore::new();
        let err = store
            .update("users", "nobody", fields(json!({"displayName": "x"})))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "not-found");
    }

    #[tokio::test]
    async fn test_commit_is_all_or_nothing() {
        let store = MemoryStore::new();
        let id = store
            .add("chats", fields(json!({"unreadCount": {"b": 0}})))
            .await
            .unwrap();

        let err = store
            .commit(vec![
                Write::Create {
                    collection: "chats/c/messages".to_string(),
                    id: "m1".to_string(),
                    fields: fields(json!({"text": "hi"})),
                },
                Write::Increment {
                    collection: "chats".to_string(),
                    id: "missing".to_string(),
                    deltas: vec![("unreadCount.b".to_string(), 1)],
                },
            ])
            .await
            .unwrap_err();
        assert_eq!(err.code(), "not-found");
        assert!(store.documents("chats/c/messages").is_empty());

        store
            .commit(vec![
                Write::Create {
                    collection: "chats/c/messages".to_string(),
                    id: "m1".to_string(),
                    fields: fields(json!({"text": "hi"})),
                },
                Write::Update {
                    collection: "chats".to_string(),
                    id: id.clone(),
                    fields: fields(json!({"lastMessage": "hi"})),
                },
                Write::Increment {
                    collection: "chats".to_string(),
                    id: id.clone(),
                    deltas: vec![("unreadCount.b".to_string(), 1)],
                },
            ])
            .await
            .unwrap();
        let doc = store.get("chats", &id).await.unwrap().unwrap();
        assert_eq!(doc.fields["lastMessage"], "hi");
        assert_eq!(doc.fields["unreadCount"]["b"], 1);
        assert_eq!(store.documents("chats/c/messages").len(), 1);
        assert_eq!(store.add_count(), 2);
    }

    #[tokio::test]
    async fn test_listen_pushes_changes() {
        let store = MemoryStore::new();
        let mut sub = store.listen(Query::collection("users"));
        assert!(sub.next().await.unwrap().unwrap().is_empty());

        store
            .set("users", "u1", fields(json!({"email": "a@b.c"})))
            .await
            .unwrap();
        let snapshot = sub.next().await.unwrap().unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].id, "u1");
    }
}
