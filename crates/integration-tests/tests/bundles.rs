//! Provider registration and bundle construction rules.

use std::any::Any;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use coffer_core::application::{RepositoryProvider, UnitOfWork};
use coffer_core::domain::{BeginOptions, Context, Snapshot};
use coffer_core::error::{CoreError, Result};
use coffer_core::port::{Driver, Repository};
use coffer_infra_memory::{Document, MemoryDocumentRepository, MemoryDriver};

/// Minimal driver for a different engine, to prove cross-engine bundles are
/// rejected before any transaction exists.
struct LedgerDriver;

#[async_trait]
impl Driver for LedgerDriver {
    fn engine(&self) -> &str {
        "ledger"
    }

    fn connection_signature(&self) -> &str {
        "ledger://main"
    }

    async fn open_context(&self, _options: &BeginOptions) -> Result<Context> {
        Ok(Context::new(()))
    }

    async fn commit(&self, _context: &Context) -> Result<()> {
        Ok(())
    }

    async fn rollback(&self, _context: &Context) -> Result<()> {
        Ok(())
    }

    async fn snapshot(&self, _context: &Context) -> Result<Snapshot> {
        Ok(Snapshot::new(()))
    }

    async fn restore(&self, _context: &Context, _snapshot: &Snapshot) -> Result<()> {
        Ok(())
    }
}

struct LedgerRepository {
    name: String,
    driver: Arc<dyn Driver>,
    uow: Option<UnitOfWork>,
}

impl LedgerRepository {
    fn new(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            driver: Arc::new(LedgerDriver),
            uow: None,
        })
    }
}

#[async_trait]
impl Repository for LedgerRepository {
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
            driver: Arc::clone(&self.driver),
            uow,
        })
    }

    fn as_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

fn setup() -> (Arc<MemoryDriver>, RepositoryProvider) {
    let driver = MemoryDriver::new("main");
    let provider = RepositoryProvider::new();
    provider
        .register(MemoryDocumentRepository::new("users", "users", driver.clone()))
        .unwrap();
    provider
        .register(MemoryDocumentRepository::new("orders", "orders", driver.clone()))
        .unwrap();
    (driver, provider)
}

#[tokio::test]
async fn test_register_twice_fails_then_unregister_frees_the_name() {
    let (driver, provider) = setup();

    let err = provider
        .register(MemoryDocumentRepository::new("users", "users", driver.clone()))
        .unwrap_err();
    assert!(matches!(err, CoreError::DuplicateRepository(name) if name == "users"));

    provider.unregister("users").unwrap();
    provider
        .register(MemoryDocumentRepository::new("users", "users", driver))
        .unwrap();
    assert!(provider.has("users"));
}

#[tokio::test]
async fn test_bundle_for_rejects_empty_and_unknown_names() {
    let (_driver, provider) = setup();

    assert!(matches!(
        provider.bundle_for(&[]),
        Err(CoreError::EmptyBundle)
    ));
    assert!(matches!(
        provider.bundle_for(&["users", "payments"]),
        Err(CoreError::RepositoryNotFound(name)) if name == "payments"
    ));
}

#[tokio::test]
async fn test_bundle_for_rejects_mixed_engines() {
    let (_driver, provider) = setup();
    provider.register(LedgerRepository::new("ledger")).unwrap();

    let err = provider.bundle_for(&["users", "ledger"]).unwrap_err();
    assert!(matches!(err, CoreError::IncompatibleRepositories { .. }));
}

#[tokio::test]
async fn test_bundle_for_rejects_separate_instances_of_one_engine() {
    let (_driver, provider) = setup();
    let replica = MemoryDriver::new("replica");
    provider
        .register(MemoryDocumentRepository::new("archive", "users", replica))
        .unwrap();

    // same engine tag, different connection signature
    let err = provider.bundle_for(&["users", "archive"]).unwrap_err();
    assert!(matches!(
        err,
        CoreError::IncompatibleRepositories { left, right }
            if left == "users" && right == "archive"
    ));
}

#[tokio::test]
async fn test_get_enforces_active_unit_of_work() {
    let (_driver, provider) = setup();
    let bundle = provider.bundle_for(&["users"]).unwrap();

    let err = bundle.get("users").await.unwrap_err();
    assert!(matches!(err, CoreError::NotActive));
    assert_eq!(err.to_string(), "Unit of Work is not active");

    bundle
        .unit_of_work()
        .begin(BeginOptions::default())
        .await
        .unwrap();
    let users = bundle
        .get_as::<MemoryDocumentRepository>("users")
        .await
        .unwrap();
    users
        .save(&Document::new("u1", json!({})))
        .await
        .unwrap();

    // unknown names are a lookup failure, not a state violation
    assert!(matches!(
        bundle.get("payments").await,
        Err(CoreError::RepositoryNotFound(_))
    ));

    bundle.dispose().await.unwrap();
}

#[tokio::test]
async fn test_bundled_repositories_share_one_transaction() {
    let (_driver, provider) = setup();

    let bundle = provider.bundle_for(&["users", "orders"]).unwrap();
    let uow = bundle.unit_of_work();
    uow.begin(BeginOptions::default()).await.unwrap();

    let users = bundle
        .get_as::<MemoryDocumentRepository>("users")
        .await
        .unwrap();
    let orders = bundle
        .get_as::<MemoryDocumentRepository>("orders")
        .await
        .unwrap();
    users.save(&Document::new("u1", json!({}))).await.unwrap();
    orders.save(&Document::new("o1", json!({}))).await.unwrap();

    // one rollback discards both repositories' writes
    uow.rollback().await.unwrap();

    let check = provider.bundle_for(&["users", "orders"]).unwrap();
    check
        .unit_of_work()
        .begin(BeginOptions::default())
        .await
        .unwrap();
    let users = check
        .get_as::<MemoryDocumentRepository>("users")
        .await
        .unwrap();
    let orders = check
        .get_as::<MemoryDocumentRepository>("orders")
        .await
        .unwrap();
    assert_eq!(users.count().await.unwrap(), 0);
    assert_eq!(orders.count().await.unwrap(), 0);
    check.dispose().await.unwrap();
}

#[tokio::test]
async fn test_registered_descriptor_is_never_bound() {
    let (_driver, provider) = setup();

    let bundle = provider.bundle_for(&["users"]).unwrap();
    bundle
        .unit_of_work()
        .begin(BeginOptions::default())
        .await
        .unwrap();

    let descriptor = provider.get("users").unwrap();
    assert!(descriptor.unit_of_work().is_none());

    let handle = bundle.get("users").await.unwrap();
    assert_eq!(
        handle.unit_of_work().map(|u| u.id()),
        Some(bundle.unit_of_work().id())
    );
    bundle.dispose().await.unwrap();
}

#[tokio::test]
async fn test_clear_empties_the_registry() {
    let (_driver, provider) = setup();
    assert_eq!(provider.len(), 2);

    provider.clear();
    assert!(provider.is_empty());
    assert!(matches!(
        provider.bundle_for(&["users"]),
        Err(CoreError::RepositoryNotFound(_))
    ));
}
