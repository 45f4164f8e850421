// Driver Port (Interface)

use async_trait::async_trait;

use crate::domain::{BeginOptions, Context, Snapshot};
use crate::error::Result;

/// Storage engine interface consumed by the Unit of Work.
///
/// One driver instance backs many repositories and many concurrent Units of
/// Work; implementations must be shareable (`Send + Sync`) and treat each
/// [`Context`] as the exclusive property of one transaction.
#[async_trait]
pub trait Driver: Send + Sync {
    /// Engine tag, e.g. `"memory"` or `"postgres"`.
    fn engine(&self) -> &str;

    /// Identifies the concrete connection target (instance, host, cluster).
    /// Two repositories may share a transaction only if their drivers agree
    /// on engine and signature.
    fn connection_signature(&self) -> &str;

    /// Open a fresh connection context for one transaction.
    async fn open_context(&self, options: &BeginOptions) -> Result<Context>;

    /// Persist everything staged in the context.
    async fn commit(&self, context: &Context) -> Result<()>;

    /// Discard everything staged in the context.
    async fn rollback(&self, context: &Context) -> Result<()>;

    /// Capture an opaque snapshot of the context's pending state.
    async fn snapshot(&self, context: &Context) -> Result<Snapshot>;

    /// Restore the context's pending state from a snapshot.
    async fn restore(&self, context: &Context, snapshot: &Snapshot) -> Result<()>;

    /// Forget a snapshot without restoring it. Engines with no server-side
    /// savepoint bookkeeping can leave the default no-op in place.
    async fn release(&self, _context: &Context, _snapshot: &Snapshot) -> Result<()> {
        Ok(())
    }

    /// Whether repositories backed by `self` and `other` may share one Unit
    /// of Work.
    ///
    /// Contract requirement: the predicate must be symmetric and transitive.
    /// The default (equal engine and equal connection signature) is an
    /// equivalence relation; overrides must preserve that, otherwise bundle
    /// construction would accept or reject depending on argument order.
    fn is_compatible_with(&self, other: &dyn Driver) -> bool {
        self.engine() == other.engine()
            && self.connection_signature() == other.connection_signature()
    }
}
