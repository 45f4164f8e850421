// Repository Provider - registry and bundle resolver

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::application::{RepositoryBundle, UnitOfWork};
use crate::error::{CoreError, Result};
use crate::port::Repository;

/// Registry of repository descriptors plus the resolver that turns a set of
/// names into a compatibility-checked bundle.
///
/// The registry holds immutable, unbound descriptors only, so concurrent
/// bundle construction from different callers needs no coordination beyond
/// the internal map lock. An explicit object rather than a process-global:
/// construct one per composition root and pass it where it is needed;
/// `clear` exists for test isolation.
#[derive(Default)]
pub struct RepositoryProvider {
    repositories: RwLock<HashMap<String, Arc<dyn Repository>>>,
}

impl RepositoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a repository descriptor. Re-using a name is rejected rather
    /// than silently shadowing the earlier registration.
    pub fn register(&self, repository: Arc<dyn Repository>) -> Result<()> {
        let name = repository.name().to_string();
        let mut repositories = self.repositories.write();
        if repositories.contains_key(&name) {
            return Err(CoreError::DuplicateRepository(name));
        }
        debug!(repository = %name, engine = repository.engine(), "repository registered");
        repositories.insert(name, repository);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Repository>> {
        self.repositories.read().get(name).cloned()
    }

    pub fn has(&self, name: &str) -> bool {
        self.repositories.read().contains_key(name)
    }

    pub fn unregister(&self, name: &str) -> Option<Arc<dyn Repository>> {
        self.repositories.write().remove(name)
    }

    /// Drop every registration. Intended for test isolation.
    pub fn clear(&self) {
        self.repositories.write().clear();
    }

    /// Registered names, unordered.
    pub fn names(&self) -> Vec<String> {
        self.repositories.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.repositories.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.repositories.read().is_empty()
    }

    /// Build one Unit of Work the given repositories can all share.
    ///
    /// Checks pairwise compatibility across the whole set - O(n²), fine for
    /// the 2-5 member bundles this is built for - then constructs the Unit
    /// of Work from the first repository's driver and verifies its engine
    /// against every member, which catches a driver handing out a Unit of
    /// Work for the wrong engine.
    pub fn unit_of_work_for(&self, repositories: &[Arc<dyn Repository>]) -> Result<UnitOfWork> {
        let Some(first) = repositories.first() else {
            return Err(CoreError::EmptyBundle);
        };

        for (i, left) in repositories.iter().enumerate() {
            for right in &repositories[i + 1..] {
                if !left.is_compatible_with(right.as_ref()) {
                    return Err(CoreError::IncompatibleRepositories {
                        left: left.name().to_string(),
                        right: right.name().to_string(),
                    });
                }
            }
        }

        let uow = first.build_unit_of_work();
        for repository in repositories {
            if uow.engine() != repository.engine() {
                return Err(CoreError::EngineMismatch {
                    expected: repository.engine().to_string(),
                    actual: uow.engine().to_string(),
                });
            }
        }
        Ok(uow)
    }

    /// Resolve names into a bundle of handles sharing one fresh Unit of
    /// Work. Fails on an empty set, an unknown name, or any incompatibility
    /// - before any driver I/O, and never with a partially-built bundle.
    pub fn bundle_for(&self, names: &[&str]) -> Result<RepositoryBundle> {
        if names.is_empty() {
            return Err(CoreError::EmptyBundle);
        }

        let mut descriptors = Vec::with_capacity(names.len());
        for name in names {
            let descriptor = self
                .get(name)
                .ok_or_else(|| CoreError::RepositoryNotFound((*name).to_string()))?;
            descriptors.push(descriptor);
        }

        let uow = self.unit_of_work_for(&descriptors)?;
        let mut bundle = RepositoryBundle::new(uow.clone());
        for descriptor in &descriptors {
            bundle.add(descriptor.clone_with(Some(uow.clone())));
        }
        debug!(
            uow_id = %uow.id(),
            repositories = ?names,
            "bundle constructed"
        );
        Ok(bundle)
    }
}

impl std::fmt::Debug for RepositoryProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RepositoryProvider")
            .field("registered", &self.len())
            .finish()
    }
}
