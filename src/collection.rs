use crate::document::Document;
use crate::types::DocumentId;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

pub struct Collection {
    pub name: Arc<RwLock<String>>,
    store: RwLock<HashMap<DocumentId, Document>>,
}

impl Collection {
    #[must_use]
    pub fn new(name: String) -> Self {
        Self { name: Arc::new(RwLock::new(name)), store: RwLock::new(HashMap::new()) }
    }

    pub fn insert_document(&self, document: Document) -> DocumentId {
        let doc_id = document.id.clone();
        log::debug!("insert {} into {}", doc_id, self.name_str());
        self.store.write().insert(doc_id.clone(), document);
        doc_id
    }

    pub fn find_document(&self, id: &DocumentId) -> Option<Document> {
        self.store.read().get(id).cloned()
    }

    /// Merges `fields` into an existing document under one write lock. Returns false when
    /// the id is unknown.
    pub fn merge_fields(&self, id: &DocumentId, fields: bson::Document) -> bool {
        match self.store.write().get_mut(id) {
            Some(doc) => {
                doc.merge(fields);
                true
            }
            None => false,
        }
    }

    pub fn delete_document(&self, id: &DocumentId) -> bool {
        self.store.write().remove(id).is_some()
    }

    pub fn list_ids(&self) -> Vec<DocumentId> {
        self.store.read().keys().cloned().collect()
    }

    /// Clones every document. Callers filter afterwards; the read lock is held only for the copy.
    pub fn get_all_documents(&self) -> Vec<Document> {
        self.store.read().values().cloned().collect()
    }

    /// Counts documents whose data satisfies `pred`, without copying them.
    pub fn count_matching(&self, pred: impl Fn(&bson::Document) -> bool) -> usize {
        self.store.read().values().filter(|d| pred(&d.data)).count()
    }

    pub fn len(&self) -> usize {
        self.store.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.read().is_empty()
    }

    pub fn set_name(&self, new_name: String) {
        *self.name.write() = new_name;
    }

    /// Returns the collection's name as a String (cloned), hiding the RwLock.
    pub fn name_str(&self) -> String {
        self.name.read().clone()
    }
}
