//! Data models for chat entities

mod chat;
mod message;
mod user;

pub use chat::*;
pub use message::*;
pub use user::*;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::ServiceResult;
use crate::store::{Document, Fields};

/// A model stored as a document. The document id lives outside the field map.
pub trait Record: Serialize + DeserializeOwned {
    fn set_id(&mut self, id: String);

    fn from_document(doc: Document) -> ServiceResult<Self> {
        let mut record: Self = serde_json::from_value(serde_json::Value::Object(doc.fields))?;
        record.set_id(doc.id);
        Ok(record)
    }

    fn to_fields(&self) -> ServiceResult<Fields> {
        match serde_json::to_value(self)? {
            serde_json::Value::Object(map) => Ok(map),
            other => Err(crate::error::ServiceError::validation(format!(
                "record serialized to non-object: {}",
                other
            ))),
        }
    }
}

/// Decode a snapshot, skipping documents that do not match the schema.
pub fn decode_all<T: Record>(docs: Vec<Document>) -> Vec<T> {
    docs.into_iter()
        .filter_map(|doc| {
            let id = doc.id.clone();
            match T::from_document(doc) {
                Ok(record) => Some(record),
                Err(e) => {
                    tracing::warn!(doc_id = %id, "Skipping malformed document: {}", e);
                    None
                }
            }
        })
        .collect()
}
