// Repository Port (Interface)

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::application::UnitOfWork;
use crate::domain::Context;
use crate::error::{CoreError, Result};
use crate::port::Driver;

/// Data-access repository bound to a storage driver.
///
/// A registered repository is an immutable descriptor: name plus driver,
/// never bound to a transaction. [`Repository::clone_with`] produces the
/// per-transaction handles that actually carry a Unit of Work, so one
/// descriptor serves any number of concurrent transactions without
/// cross-talk.
#[async_trait]
pub trait Repository: Send + Sync {
    /// Unique name within a provider.
    fn name(&self) -> &str;

    /// The driver backing this repository.
    fn driver(&self) -> &Arc<dyn Driver>;

    /// The Unit of Work this handle is bound to, if any. Registered
    /// descriptors return `None`.
    fn unit_of_work(&self) -> Option<&UnitOfWork>;

    /// New handle with the same name and driver, bound to `uow`. Must not
    /// mutate the receiver.
    fn clone_with(&self, uow: Option<UnitOfWork>) -> Arc<dyn Repository>;

    /// Upcast for typed retrieval out of a bundle.
    fn as_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;

    /// Engine tag, delegated to the driver.
    fn engine(&self) -> &str {
        self.driver().engine()
    }

    /// Connection signature, delegated to the driver.
    fn connection_signature(&self) -> &str {
        self.driver().connection_signature()
    }

    /// Fresh, inactive Unit of Work built from this repository's driver.
    fn build_unit_of_work(&self) -> UnitOfWork {
        UnitOfWork::new(Arc::clone(self.driver()))
    }

    /// Whether `self` and `other` may share one Unit of Work. Requires
    /// matching engines at minimum; the rest is the driver's call.
    fn is_compatible_with(&self, other: &dyn Repository) -> bool {
        self.engine() == other.engine()
            && self.driver().is_compatible_with(other.driver().as_ref())
    }

    /// Current connection context, re-fetched from the bound Unit of Work on
    /// every call so a handle rebound via `clone_with` can never observe a
    /// stale context. Errors when unbound or inactive.
    async fn context(&self) -> Result<Context> {
        let uow = self.unit_of_work().ok_or(CoreError::NotActive)?;
        uow.context().await.ok_or(CoreError::NotActive)
    }
}

impl fmt::Debug for dyn Repository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Repository")
            .field("name", &self.name())
            .field("engine", &self.engine())
            .finish()
    }
}
