// Repository Bundle - handles sharing one Unit of Work

use std::collections::HashMap;
use std::sync::Arc;

use crate::application::UnitOfWork;
use crate::error::{CoreError, Result};
use crate::port::Repository;

/// A set of repository handles bound to one shared Unit of Work, scoped to
/// the duration of a single transaction.
///
/// `get` is the single enforcement point preventing repository access
/// outside an open transaction: every lookup checks that the shared Unit of
/// Work is active.
pub struct RepositoryBundle {
    uow: UnitOfWork,
    repositories: HashMap<String, Arc<dyn Repository>>,
}

impl RepositoryBundle {
    pub fn new(uow: UnitOfWork) -> Self {
        Self {
            uow,
            repositories: HashMap::new(),
        }
    }

    /// Store a handle by name. The caller guarantees the handle is already
    /// bound to this bundle's Unit of Work; that is not re-verified here.
    pub fn add(&mut self, repository: Arc<dyn Repository>) {
        self.repositories
            .insert(repository.name().to_string(), repository);
    }

    /// Look up a handle by name. Fails unless the shared Unit of Work is
    /// active.
    pub async fn get(&self, name: &str) -> Result<Arc<dyn Repository>> {
        if !self.uow.is_active().await {
            return Err(CoreError::NotActive);
        }
        self.repositories
            .get(name)
            .cloned()
            .ok_or_else(|| CoreError::RepositoryNotFound(name.to_string()))
    }

    /// Typed lookup: `get` plus a downcast to the concrete repository type.
    pub async fn get_as<R>(&self, name: &str) -> Result<Arc<R>>
    where
        R: Repository + 'static,
    {
        self.get(name)
            .await?
            .as_any_arc()
            .downcast::<R>()
            .map_err(|_| {
                CoreError::Internal(format!("repository {name} has an unexpected concrete type"))
            })
    }

    /// The shared Unit of Work.
    pub fn unit_of_work(&self) -> &UnitOfWork {
        &self.uow
    }

    /// Names of the bundled repositories, unordered.
    pub fn names(&self) -> Vec<&str> {
        self.repositories.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.repositories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.repositories.is_empty()
    }

    /// Release the bundle's resources by disposing the shared Unit of Work.
    pub async fn dispose(&self) -> Result<()> {
        self.uow.dispose().await
    }
}

impl std::fmt::Debug for RepositoryBundle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RepositoryBundle")
            .field("uow_id", &self.uow.id())
            .field("repositories", &self.names())
            .finish()
    }
}
