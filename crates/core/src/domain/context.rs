// Opaque Context & Snapshot Handles

use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Opaque connection context owned by one active Unit of Work.
///
/// The driver decides the concrete type; the coordination layer only moves
/// the handle around. Drivers recover their own type via [`Context::downcast`].
#[derive(Clone)]
pub struct Context {
    inner: Arc<dyn Any + Send + Sync>,
}

impl Context {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            inner: Arc::new(value),
        }
    }

    /// Recover the driver's concrete context type, if this handle holds one.
    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        Arc::clone(&self.inner).downcast::<T>().ok()
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context").finish_non_exhaustive()
    }
}

/// Opaque savepoint snapshot.
///
/// Whatever a driver needs to restore its pending state to a point in time:
/// a native SAVEPOINT token, an MVCC marker, or a full copy for in-memory
/// engines.
#[derive(Clone)]
pub struct Snapshot {
    inner: Arc<dyn Any + Send + Sync>,
}

impl Snapshot {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            inner: Arc::new(value),
        }
    }

    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        Arc::clone(&self.inner).downcast::<T>().ok()
    }
}

impl fmt::Debug for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Snapshot").finish_non_exhaustive()
    }
}
