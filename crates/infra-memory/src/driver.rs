// Memory Driver

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use coffer_core::domain::{BeginOptions, Context, Snapshot};
use coffer_core::error::{CoreError, Result};
use coffer_core::port::Driver;

use crate::context::MemoryContext;
use crate::store::MemoryBackend;

/// Engine tag of the in-memory reference engine.
pub const MEMORY_ENGINE: &str = "memory";

const DEFAULT_DATABASE: &str = "default";

/// In-process document engine.
///
/// Each named instance owns its committed state; contexts opened from the
/// same instance see each other's commits, while two instances are fully
/// disjoint and therefore incompatible (distinct connection signatures).
/// Isolation levels in `BeginOptions` are accepted and ignored: the engine
/// always behaves read-committed.
pub struct MemoryDriver {
    backend: Arc<MemoryBackend>,
    signature: String,
}

impl MemoryDriver {
    pub fn new(instance: impl AsRef<str>) -> Arc<Self> {
        Arc::new(Self {
            backend: Arc::new(MemoryBackend::new()),
            signature: format!("memory://{}", instance.as_ref()),
        })
    }
}

#[async_trait]
impl Driver for MemoryDriver {
    fn engine(&self) -> &str {
        MEMORY_ENGINE
    }

    fn connection_signature(&self) -> &str {
        &self.signature
    }

    async fn open_context(&self, options: &BeginOptions) -> Result<Context> {
        let database = options
            .database
            .clone()
            .unwrap_or_else(|| DEFAULT_DATABASE.to_string());
        debug!(signature = %self.signature, database = %database, "opening memory context");
        Ok(Context::new(MemoryContext::new(
            database,
            Arc::clone(&self.backend),
        )))
    }

    async fn commit(&self, context: &Context) -> Result<()> {
        self.memory_context(context)?.commit()
    }

    async fn rollback(&self, context: &Context) -> Result<()> {
        self.memory_context(context)?.discard();
        Ok(())
    }

    async fn snapshot(&self, context: &Context) -> Result<Snapshot> {
        Ok(self.memory_context(context)?.snapshot())
    }

    async fn restore(&self, context: &Context, snapshot: &Snapshot) -> Result<()> {
        self.memory_context(context)?.restore(snapshot)
    }
}

impl MemoryDriver {
    fn memory_context(&self, context: &Context) -> Result<Arc<MemoryContext>> {
        context.downcast::<MemoryContext>().ok_or_else(|| {
            CoreError::Driver("context does not belong to the memory engine".to_string())
        })
    }
}
