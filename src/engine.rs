use crate::collection::Collection;
use crate::document::Document;
use crate::errors::DbError;
use crate::query::{self, Filter, FindOptions, PopulateSpec};
use crate::types::{CollectionName, DocumentId};
use bson::{Bson, Document as BsonDocument};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// In-memory embedded store: a registry of named collections.
#[derive(Default)]
pub struct Engine {
    collections: RwLock<HashMap<CollectionName, Arc<Collection>>>,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine").field("collections", &self.list_collection_names()).finish()
    }
}

impl Engine {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the named collection, creating it when missing.
    pub fn create_collection(&self, name: impl Into<String>) -> Arc<Collection> {
        let name = name.into();
        let mut cols = self.collections.write();
        cols.entry(name.clone())
            .or_insert_with(|| {
                log::info!("created collection {name}");
                Arc::new(Collection::new(name.clone()))
            })
            .clone()
    }

    pub fn get_collection(&self, name: &str) -> Option<Arc<Collection>> {
        self.collections.read().get(name).cloned()
    }

    pub fn delete_collection(&self, name: &str) -> bool {
        self.collections.write().remove(name).is_some()
    }

    /// # Errors
    /// `NoSuchCollection` when `old` is unknown, `CollectionAlreadyExists` when `new` is taken.
    pub fn rename_collection(&self, old: &str, new: &str) -> Result<(), DbError> {
        let mut cols = self.collections.write();
        if cols.contains_key(new) {
            return Err(DbError::CollectionAlreadyExists(new.to_string()));
        }
        let col = cols.remove(old).ok_or_else(|| DbError::NoSuchCollection(old.to_string()))?;
        col.set_name(new.to_string());
        cols.insert(new.to_string(), col);
        Ok(())
    }

    pub fn list_collection_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.collections.read().keys().cloned().collect();
        names.sort();
        names
    }

    fn require(&self, name: &str) -> Result<Arc<Collection>, DbError> {
        self.get_collection(name).ok_or_else(|| DbError::NoSuchCollection(name.to_string()))
    }

    /// # Errors
    /// Returns `NoSuchCollection` if the collection does not exist.
    pub fn insert(&self, collection: &str, data: BsonDocument) -> Result<DocumentId, DbError> {
        Ok(self.require(collection)?.insert_document(Document::new(data)))
    }

    /// Fetches one materialized record by id.
    ///
    /// # Errors
    /// Returns `NoSuchCollection` if the collection does not exist.
    pub fn get_record(&self, collection: &str, id: &DocumentId) -> Result<Option<BsonDocument>, DbError> {
        Ok(self.require(collection)?.find_document(id).map(|d| d.to_record()))
    }

    /// Runs a find and returns materialized records with `opts.populate` references resolved.
    ///
    /// # Errors
    /// Returns `NoSuchCollection` if the queried or a populated collection does not exist.
    pub fn find(&self, collection: &str, filter: &Filter, opts: &FindOptions) -> Result<Vec<BsonDocument>, DbError> {
        let col = self.require(collection)?;
        let docs = query::find_docs(&col, filter, opts);
        let mut records: Vec<BsonDocument> = docs.iter().map(Document::to_record).collect();
        for spec in opts.populate.iter().take(query::MAX_POPULATE_FIELDS) {
            let from = self.require(&spec.from)?;
            for rec in &mut records {
                populate_one(rec, spec, &from);
            }
        }
        Ok(records)
    }

    /// # Errors
    /// Returns `NoSuchCollection` if the collection does not exist.
    pub fn count(&self, collection: &str, filter: &Filter) -> Result<u64, DbError> {
        let col = self.require(collection)?;
        Ok(crate::utils::num::usize_to_u64(query::count_docs(&col, filter)))
    }

    /// First record matching `filter` in id order.
    ///
    /// # Errors
    /// Returns `NoSuchCollection` if the collection does not exist.
    pub fn find_one(&self, collection: &str, filter: &Filter) -> Result<Option<BsonDocument>, DbError> {
        let opts = FindOptions { limit: Some(1), ..FindOptions::default() };
        Ok(self.find(collection, filter, &opts)?.into_iter().next())
    }

    /// Sets the given top-level fields on one document, leaving the others untouched.
    /// Returns false when the id is unknown.
    ///
    /// # Errors
    /// Returns `NoSuchCollection` if the collection does not exist.
    pub fn set_fields(&self, collection: &str, id: &DocumentId, fields: BsonDocument) -> Result<bool, DbError> {
        Ok(self.require(collection)?.merge_fields(id, fields))
    }
}

/// Replaces an id (or array of ids) at `spec.path` with the referenced records. Ids that do
/// not resolve are left untouched.
fn populate_one(rec: &mut BsonDocument, spec: &PopulateSpec, from: &Collection) {
    let resolve = |v: &Bson| -> Option<Bson> {
        let Bson::String(s) = v else { return None };
        let id: DocumentId = s.parse().ok()?;
        from.find_document(&id).map(|d| Bson::Document(d.to_record()))
    };
    let Some(slot) = path_mut(rec, &spec.path) else { return };
    match slot {
        Bson::Array(items) => {
            for it in items.iter_mut() {
                if let Some(r) = resolve(it) {
                    *it = r;
                }
            }
        }
        other => {
            if let Some(r) = resolve(other) {
                *other = r;
            }
        }
    }
}

fn path_mut<'a>(doc: &'a mut BsonDocument, path: &str) -> Option<&'a mut Bson> {
    let mut parts = path.split('.');
    let first = parts.next()?;
    let mut cur = doc.get_mut(first)?;
    for part in parts {
        match cur {
            Bson::Document(d) => cur = d.get_mut(part)?,
            _ => return None,
        }
    }
    Some(cur)
}
