// Versioned Document Store (committed state)

use std::collections::HashMap;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use coffer_core::error::{CoreError, Result};

use crate::context::{Overlay, PendingOp};

/// A versioned JSON document.
///
/// `version` counts successful saves: 0 for a document persisted once and
/// never updated. A save whose version does not match the currently-visible
/// version is rejected with an optimistic-lock conflict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub version: u64,
    /// Epoch milliseconds of the last save.
    pub updated_at: i64,
    pub body: serde_json::Value,
}

impl Document {
    /// A fresh, never-persisted document (version 0).
    pub fn new(id: impl Into<String>, body: serde_json::Value) -> Self {
        Self {
            id: id.into(),
            version: 0,
            updated_at: 0,
            body,
        }
    }
}

/// collection name -> document id -> document
pub(crate) type CollectionMap = HashMap<String, HashMap<String, Document>>;

/// Committed state shared by every context of one driver instance.
///
/// Transactions never write here directly: they stage into their context's
/// overlay and the backend applies the whole overlay on commit, after
/// re-validating every staged base version under the write lock.
#[derive(Default)]
pub(crate) struct MemoryBackend {
    databases: RwLock<HashMap<String, CollectionMap>>,
}

impl MemoryBackend {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Committed document, if any.
    pub(crate) fn get(&self, database: &str, collection: &str, id: &str) -> Option<Document> {
        self.databases
            .read()
            .get(database)
            .and_then(|db| db.get(collection))
            .and_then(|docs| docs.get(id))
            .cloned()
    }

    /// Committed version of a document, if any.
    pub(crate) fn version_of(&self, database: &str, collection: &str, id: &str) -> Option<u64> {
        self.databases
            .read()
            .get(database)
            .and_then(|db| db.get(collection))
            .and_then(|docs| docs.get(id))
            .map(|doc| doc.version)
    }

    /// Snapshot of one committed collection.
    pub(crate) fn scan(&self, database: &str, collection: &str) -> HashMap<String, Document> {
        self.databases
            .read()
            .get(database)
            .and_then(|db| db.get(collection))
            .cloned()
            .unwrap_or_default()
    }

    /// Validate every staged base version against the committed state, then
    /// apply the overlay atomically. On any conflict nothing is applied.
    pub(crate) fn apply(&self, database: &str, overlay: &Overlay) -> Result<()> {
        let mut databases = self.databases.write();
        let db = databases.entry(database.to_string()).or_default();

        for (collection, entries) in overlay.iter() {
            for (id, pending) in entries {
                let committed = db
                    .get(collection)
                    .and_then(|docs| docs.get(id))
                    .map(|doc| doc.version);
                if committed != pending.base {
                    return Err(CoreError::Conflict(format!(
                        "document {collection}/{id} changed underneath this transaction: \
                         staged against {:?}, committed is {:?}",
                        pending.base, committed
                    )));
                }
            }
        }

        for (collection, entries) in overlay.iter() {
            let docs = db.entry(collection.clone()).or_default();
            for (id, pending) in entries {
                match &pending.op {
                    PendingOp::Put(document) => {
                        docs.insert(id.clone(), document.clone());
                    }
                    PendingOp::Delete => {
                        docs.remove(id);
                    }
                }
            }
        }
        Ok(())
    }
}
