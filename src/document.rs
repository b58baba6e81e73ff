use crate::types::DocumentId;
use bson::{Bson, Document as BsonDocument};
use chrono::{DateTime, Utc};

/// Field stamped into every record's data on creation, used by the default sort.
pub const CREATED_AT_FIELD: &str = "createdAt";
/// Field carrying the document id in materialized records.
pub const ID_FIELD: &str = "_id";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metadata {
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Metadata {
    #[must_use]
    pub fn new() -> Self {
        let now = Utc::now();
        Self { created_at: now, updated_at: now }
    }
}

impl Default for Metadata {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: DocumentId,
    pub data: BsonDocument,
    pub metadata: Metadata,
}

impl Document {
    /// Creates a document with a fresh id. A `createdAt` datetime is added to `data`
    /// unless the caller already supplied one.
    #[must_use]
    pub fn new(data: BsonDocument) -> Self {
        Self::with_id(DocumentId::new(), data)
    }

    #[must_use]
    pub fn with_id(id: DocumentId, mut data: BsonDocument) -> Self {
        let metadata = Metadata::new();
        // An `_id` inside the payload would shadow the real one on materialization.
        data.remove(ID_FIELD);
        if !data.contains_key(CREATED_AT_FIELD) {
            data.insert(
                CREATED_AT_FIELD,
                Bson::DateTime(bson::DateTime::from_millis(metadata.created_at.timestamp_millis())),
            );
        }
        Self { id, data, metadata }
    }

    /// Overwrites the given top-level fields and keeps the rest. `_id` is never stored.
    pub fn merge(&mut self, fields: BsonDocument) {
        for (k, v) in fields {
            if k != ID_FIELD {
                self.data.insert(k, v);
            }
        }
        self.metadata.updated_at = Utc::now();
    }

    /// Returns the record as handed to callers: `_id` first, then the stored fields.
    #[must_use]
    pub fn to_record(&self) -> BsonDocument {
        let mut out = BsonDocument::new();
        out.insert(ID_FIELD, self.id.to_string());
        for (k, v) in &self.data {
            out.insert(k.clone(), v.clone());
        }
        out
    }
}
