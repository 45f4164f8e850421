// Memory Document Repository

use std::any::Any;
use std::sync::Arc;

use async_trait::async_trait;

use coffer_core::application::UnitOfWork;
use coffer_core::error::{CoreError, Result};
use coffer_core::port::{Driver, Repository};

use crate::context::MemoryContext;
use crate::driver::MemoryDriver;
use crate::store::Document;

/// Named repository over one collection of the memory engine.
///
/// Constructed unbound (a registry descriptor); `clone_with` produces the
/// per-transaction handles. Every operation re-fetches the context from the
/// bound Unit of Work, so a handle never outlives its transaction's state.
pub struct MemoryDocumentRepository {
    name: String,
    collection: String,
    driver: Arc<dyn Driver>,
    uow: Option<UnitOfWork>,
}

impl MemoryDocumentRepository {
    pub fn new(
        name: impl Into<String>,
        collection: impl Into<String>,
        driver: Arc<MemoryDriver>,
    ) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            collection: collection.into(),
            driver,
            uow: None,
        })
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Persist a document into the current transaction. The document's
    /// version must match what is currently visible; the returned document
    /// carries the bumped version to use for the next save.
    pub async fn save(&self, document: &Document) -> Result<Document> {
        self.memory_context().await?.save(&self.collection, document)
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Option<Document>> {
        self.memory_context().await?.find(&self.collection, id)
    }

    pub async fn find_all(&self) -> Result<Vec<Document>> {
        self.memory_context().await?.find_all(&self.collection)
    }

    pub async fn count(&self) -> Result<usize> {
        self.memory_context().await?.count(&self.collection)
    }

    /// Remove a document inside the current transaction. Returns whether a
    /// document was visible to remove.
    pub async fn delete(&self, id: &str) -> Result<bool> {
        self.memory_context().await?.delete(&self.collection, id)
    }

    async fn memory_context(&self) -> Result<Arc<MemoryContext>> {
        self.context().await?.downcast::<MemoryContext>().ok_or_else(|| {
            CoreError::Driver("context does not belong to the memory engine".to_string())
        })
    }
}

#[async_trait]
impl Repository for MemoryDocumentRepository {
    fn name(&self) -> &str {
        &self.name
    }

    fn driver(&self) -> &Arc<dyn Driver> {
        &self.driver
    }

    fn unit_of_work(&self) -> Option<&UnitOfWork> {
        self.uow.as_ref()
    }

    fn clone_with(&self, uow: Option<UnitOfWork>) -> Arc<dyn Repository> {
        Arc::new(Self {
            name: self.name.clone(),
            collection: self.collection.clone(),
            driver: Arc::clone(&self.driver),
            uow,
        })
    }

    fn as_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}
