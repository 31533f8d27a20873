//! Document store seam
//!
//! A collection/document database with equality and array-contains queries
//! and live result sets. Collections are slash-separated paths, so
//! subcollections look like `chats/{id}/messages`.

pub mod client;
pub mod firestore;
#[cfg(test)]
pub mod memory;
mod subscription;
pub mod value;

use async_trait::async_trait;

use crate::error::ServiceResult;

pub use firestore::FirestoreStore;
pub use subscription::Subscription;

/// Document fields as JSON.
pub type Fields = serde_json::Map<String, serde_json::Value>;

/// A document: its id plus field map.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub fields: Fields,
}

/// Query filter on a single field.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Equal {
        field: String,
        value: serde_json::Value,
    },
    ArrayContains {
        field: String,
        value: serde_json::Value,
    },
}

impl Filter {
    /// Whether a document's fields satisfy this filter.
    pub fn matches(&self, fields: &Fields) -> bool {
        match self {
            Filter::Equal { field, value } => fields.get(field) == Some(value),
            Filter::ArrayContains { field, value } => fields
                .get(field)
                .and_then(|v| v.as_array())
                .is_some_and(|items| items.contains(value)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

/// Structured query against one collection.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub collection: String,
    pub filters: Vec<Filter>,
    pub order_by: Option<(String, Direction)>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn collection(path: impl Into<String>) -> Self {
        Self {
            collection: path.into(),
            filters: Vec::new(),
            order_by: None,
            limit: None,
        }
    }

    pub fn where_eq(mut self, field: &str, value: impl Into<serde_json::Value>) -> Self {
        self.filters.push(Filter::Equal {
            field: field.to_string(),
            value: value.into(),
        });
        self
    }

    pub fn array_contains(mut self, field: &str, value: impl Into<serde_json::Value>) -> Self {
        self.filters.push(Filter::ArrayContains {
            field: field.to_string(),
            value: value.into(),
        });
        self
    }

    pub fn order_by(mut self, field: &str, direction: Direction) -> Self {
        self.order_by = Some((field.to_string(), direction));
        self
    }

    pub fn limit(mut self, n: usize) -> Self {
        self.limit = Some(n);
        self
    }
}

/// One write of an atomic batch.
#[derive(Debug, Clone, PartialEq)]
pub enum Write {
    /// Create a document; fails if the id is taken.
    Create {
        collection: String,
        id: String,
        fields: Fields,
    },
    /// Merge fields into an existing document.
    Update {
        collection: String,
        id: String,
        fields: Fields,
    },
    /// Add integer deltas to numeric fields of an existing document,
    /// treating missing fields as 0.
    Increment {
        collection: String,
        id: String,
        deltas: Vec<(String, i64)>,
    },
}

impl Write {
    pub fn target(&self) -> (&str, &str) {
        match self {
            Write::Create { collection, id, .. }
            | Write::Update { collection, id, .. }
            | Write::Increment { collection, id, .. } => (collection, id),
        }
    }
}

/// Fresh client-side document id.
pub fn new_document_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Document database operations.
///
/// `update` keys may be dotted field paths (`unreadCount.{uid}`) that address
/// a single entry of a nested map.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Create a document with a generated id; returns the id.
    async fn add(&self, collection: &str, fields: Fields) -> ServiceResult<String>;

    /// Create or overwrite a document.
    async fn set(&self, collection: &str, id: &str, fields: Fields) -> ServiceResult<()>;

    /// Merge fields into an existing document. Fails if it does not exist.
    async fn update(&self, collection: &str, id: &str, fields: Fields) -> ServiceResult<()>;

    /// Apply every write or none of them. Listeners never observe a
    /// partially applied batch.
    async fn commit(&self, writes: Vec<Write>) -> ServiceResult<()>;

    async fn get(&self, collection: &str, id: &str) -> ServiceResult<Option<Document>>;

    async fn delete(&self, collection: &str, id: &str) -> ServiceResult<()>;

    async fn query(&self, query: &Query) -> ServiceResult<Vec<Document>>;

    /// Live result set: every change delivers the full current snapshot.
    /// Dropping the returned handle unsubscribes.
    fn listen(&self, query: Query) -> Subscription<Vec<Document>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(v: serde_json::Value) -> Fields {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn test_filter_matches() {
        let doc = fields(json!({"participants": ["a", "b"], "isGroup": false}));
        assert!(Filter::ArrayContains {
            field: "participants".into(),
            value: json!("a")
        }
        .matches(&doc));
        assert!(!Filter::ArrayContains {
            field: "participants".into(),
            value: json!("c")
        }
        .matches(&doc));
        assert!(Filter::Equal {
            field: "isGroup".into(),
            value: json!(false)
        }
        .matches(&doc));
        assert!(!Filter::Equal {
            field: "missing".into(),
            value: json!(null)
        }
        .matches(&doc));
    }

    #[test]
    fn test_query_builder() {
        let q = Query::collection("chats/c1/messages")
            .order_by("timestamp", Direction::Descending)
            .limit(50);
        assert_eq!(q.collection, "chats/c1/messages");
        assert_eq!(q.limit, Some(50));
        assert_eq!(
            q.order_by,
            Some(("timestamp".to_string(), Direction::Descending))
        );
    }

    #[test]
    fn test_write_target() {
        let write = Write::Increment {
            collection: "chats".to_string(),
            id: "c1".to_string(),
            deltas: vec![("unreadCount.b".to_string(), 1)],
        };
        assert_eq!(write.target(), ("chats", "c1"));
        assert_ne!(new_document_id(), new_document_id());
    }
}
