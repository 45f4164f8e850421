// Memory Transaction Context (staged-write overlay)

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::Mutex;

use coffer_core::domain::Snapshot;
use coffer_core::error::{CoreError, Result};

use crate::store::{Document, MemoryBackend};

/// One write staged inside a transaction.
///
/// `base` is the committed version observed when the document was first
/// touched (`None` = absent). Commit re-validates it, so a transaction that
/// raced a concurrent commit fails instead of silently overwriting.
#[derive(Clone)]
pub(crate) struct Pending {
    pub(crate) base: Option<u64>,
    pub(crate) op: PendingOp,
}

#[derive(Clone)]
pub(crate) enum PendingOp {
    Put(Document),
    Delete,
}

/// Staged writes of one transaction: collection -> id -> pending write.
/// Savepoint snapshots are full copies of this, per the in-memory strategy.
#[derive(Default, Clone)]
pub(crate) struct Overlay {
    staged: HashMap<String, HashMap<String, Pending>>,
}

impl Overlay {
    pub(crate) fn iter(&self) -> impl Iterator<Item = (&String, &HashMap<String, Pending>)> {
        self.staged.iter()
    }

    fn entry(&mut self, collection: &str, id: &str) -> Option<&Pending> {
        self.staged.get(collection).and_then(|c| c.get(id))
    }
}

/// Per-transaction working state of the memory engine.
///
/// Reads merge the overlay over the committed backend (read-committed:
/// concurrent commits become visible immediately). All writes stay in the
/// overlay until the driver commits the context.
pub struct MemoryContext {
    database: String,
    backend: Arc<MemoryBackend>,
    overlay: Mutex<Overlay>,
}

impl MemoryContext {
    pub(crate) fn new(database: String, backend: Arc<MemoryBackend>) -> Self {
        Self {
            database,
            backend,
            overlay: Mutex::new(Overlay::default()),
        }
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    /// Stage a save. The document's version must match the currently-visible
    /// version (overlay over backend); inserts require version 0. Returns
    /// the document as it will be committed, version bumped.
    pub fn save(&self, collection: &str, document: &Document) -> Result<Document> {
        let mut overlay = self.overlay.lock();

        let visible = match overlay.entry(collection, &document.id) {
            Some(pending) => match &pending.op {
                PendingOp::Put(staged) => Some(staged.version),
                PendingOp::Delete => None,
            },
            None => self
                .backend
                .version_of(&self.database, collection, &document.id),
        };

        let next_version = match visible {
            Some(version) => {
                if document.version != version {
                    return Err(CoreError::Conflict(format!(
                        "stale write to {collection}/{}: version {} but {} is current",
                        document.id, document.version, version
                    )));
                }
                version + 1
            }
            None => {
                if document.version != 0 {
                    return Err(CoreError::Conflict(format!(
                        "{collection}/{} does not exist at version {}",
                        document.id, document.version
                    )));
                }
                0
            }
        };

        let saved = Document {
            id: document.id.clone(),
            version: next_version,
            updated_at: chrono::Utc::now().timestamp_millis(),
            body: document.body.clone(),
        };

        // Keep the base observed at first touch; conflict detection hinges
        // on it at commit time.
        let base = match overlay.entry(collection, &document.id) {
            Some(pending) => pending.base,
            None => self
                .backend
                .version_of(&self.database, collection, &document.id),
        };
        overlay
            .staged
            .entry(collection.to_string())
            .or_default()
            .insert(
                document.id.clone(),
                Pending {
                    base,
                    op: PendingOp::Put(saved.clone()),
                },
            );
        Ok(saved)
    }

    /// The currently-visible document: staged overlay first, committed
    /// backend second.
    pub fn find(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        let mut overlay = self.overlay.lock();
        if let Some(pending) = overlay.entry(collection, id) {
            return Ok(match &pending.op {
                PendingOp::Put(document) => Some(document.clone()),
                PendingOp::Delete => None,
            });
        }
        Ok(self.backend.get(&self.database, collection, id))
    }

    /// Every currently-visible document of a collection.
    pub fn find_all(&self, collection: &str) -> Result<Vec<Document>> {
        let overlay = self.overlay.lock();
        let mut merged = self.backend.scan(&self.database, collection);
        if let Some(entries) = overlay.staged.get(collection) {
            for (id, pending) in entries {
                match &pending.op {
                    PendingOp::Put(document) => {
                        merged.insert(id.clone(), document.clone());
                    }
                    PendingOp::Delete => {
                        merged.remove(id);
                    }
                }
            }
        }
        Ok(merged.into_values().collect())
    }

    /// Number of currently-visible documents in a collection.
    pub fn count(&self, collection: &str) -> Result<usize> {
        let overlay = self.overlay.lock();
        let mut ids: HashSet<String> = self
            .backend
            .scan(&self.database, collection)
            .into_keys()
            .collect();
        if let Some(entries) = overlay.staged.get(collection) {
            for (id, pending) in entries {
                match pending.op {
                    PendingOp::Put(_) => {
                        ids.insert(id.clone());
                    }
                    PendingOp::Delete => {
                        ids.remove(id);
                    }
                }
            }
        }
        Ok(ids.len())
    }

    /// Stage a delete. Returns whether a document was visible to delete.
    pub fn delete(&self, collection: &str, id: &str) -> Result<bool> {
        let mut overlay = self.overlay.lock();

        match overlay.entry(collection, id).cloned() {
            Some(Pending {
                base: None,
                op: PendingOp::Put(_),
            }) => {
                // Inserted by this transaction; deleting it nets out to
                // nothing staged at all.
                if let Some(entries) = overlay.staged.get_mut(collection) {
                    entries.remove(id);
                }
                Ok(true)
            }
            Some(Pending {
                base,
                op: PendingOp::Put(_),
            }) => {
                if let Some(entries) = overlay.staged.get_mut(collection) {
                    entries.insert(
                        id.to_string(),
                        Pending {
                            base,
                            op: PendingOp::Delete,
                        },
                    );
                }
                Ok(true)
            }
            Some(Pending {
                op: PendingOp::Delete,
                ..
            }) => Ok(false),
            None => {
                let base = self.backend.version_of(&self.database, collection, id);
                if base.is_none() {
                    return Ok(false);
                }
                overlay.staged.entry(collection.to_string()).or_default().insert(
                    id.to_string(),
                    Pending {
                        base,
                        op: PendingOp::Delete,
                    },
                );
                Ok(true)
            }
        }
    }

    /// Full copy of the overlay, boxed as an opaque snapshot.
    pub(crate) fn snapshot(&self) -> Snapshot {
        Snapshot::new(self.overlay.lock().clone())
    }

    /// Replace the overlay with a previously-taken snapshot.
    pub(crate) fn restore(&self, snapshot: &Snapshot) -> Result<()> {
        let overlay = snapshot.downcast::<Overlay>().ok_or_else(|| {
            CoreError::Driver("snapshot does not belong to the memory engine".to_string())
        })?;
        *self.overlay.lock() = (*overlay).clone();
        Ok(())
    }

    /// Validate and apply the overlay to the committed backend; on success
    /// the overlay is cleared. On conflict nothing is applied.
    pub(crate) fn commit(&self) -> Result<()> {
        let mut overlay = self.overlay.lock();
        self.backend.apply(&self.database, &overlay)?;
        *overlay = Overlay::default();
        Ok(())
    }

    /// Drop every staged write.
    pub(crate) fn discard(&self) {
        *self.overlay.lock() = Overlay::default();
    }

    #[cfg(test)]
    pub(crate) fn staged_writes(&self) -> usize {
        self.overlay
            .lock()
            .staged
            .values()
            .map(|entries| entries.len())
            .sum()
    }
}
