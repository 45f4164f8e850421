//! Transaction lifecycle: begin, commit, rollback, end routing, disposal.

use std::sync::Arc;

use serde_json::json;

use coffer_core::application::RepositoryProvider;
use coffer_core::domain::BeginOptions;
use coffer_core::error::CoreError;
use coffer_infra_memory::{Document, MemoryDocumentRepository, MemoryDriver};

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

async fn persisted_count(provider: &RepositoryProvider, repository: &str) -> usize {
    let bundle = provider.bundle_for(&[repository]).unwrap();
    bundle
        .unit_of_work()
        .begin(BeginOptions::default())
        .await
        .unwrap();
    let repo = bundle
        .get_as::<MemoryDocumentRepository>(repository)
        .await
        .unwrap();
    let count = repo.count().await.unwrap();
    bundle.dispose().await.unwrap();
    count
}

#[tokio::test]
async fn test_commit_persists_across_transactions() {
    let (_driver, provider) = setup();

    let bundle = provider.bundle_for(&["users"]).unwrap();
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
        .save(&Document::new("u1", json!({"name": "Ada"})))
        .await
        .unwrap();
    bundle.unit_of_work().commit().await.unwrap();

    assert_eq!(persisted_count(&provider, "users").await, 1);
}

#[tokio::test]
async fn test_rollback_discards_changes() {
    let (_driver, provider) = setup();

    let bundle = provider.bundle_for(&["users"]).unwrap();
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
        .save(&Document::new("u1", json!({"name": "Ada"})))
        .await
        .unwrap();
    bundle.unit_of_work().rollback().await.unwrap();

    assert_eq!(persisted_count(&provider, "users").await, 0);
}

#[tokio::test]
async fn test_fail_poisons_commit_and_routes_end_to_rollback() {
    let (_driver, provider) = setup();

    let bundle = provider.bundle_for(&["users"]).unwrap();
    let uow = bundle.unit_of_work();
    uow.begin(BeginOptions::default()).await.unwrap();

    let users = bundle
        .get_as::<MemoryDocumentRepository>("users")
        .await
        .unwrap();
    users
        .save(&Document::new("u1", json!({"name": "Ada"})))
        .await
        .unwrap();

    uow.fail(Some("validation failed downstream".to_string()))
        .await
        .unwrap();
    assert!(matches!(uow.commit().await, Err(CoreError::RollbackOnly)));

    // end must pick rollback, not commit
    uow.end().await.unwrap();
    assert!(!uow.is_active().await);
    assert_eq!(persisted_count(&provider, "users").await, 0);
}

#[tokio::test]
async fn test_end_and_dispose_are_idempotent() {
    let (_driver, provider) = setup();

    let bundle = provider.bundle_for(&["users"]).unwrap();
    let uow = bundle.unit_of_work();

    // end before begin is a no-op, not an error
    uow.end().await.unwrap();

    uow.begin(BeginOptions::default()).await.unwrap();
    uow.end().await.unwrap();
    uow.end().await.unwrap();
    bundle.dispose().await.unwrap();
    bundle.dispose().await.unwrap();
}

#[tokio::test]
async fn test_mutations_after_dispose_fail() {
    let (_driver, provider) = setup();

    let bundle = provider.bundle_for(&["users"]).unwrap();
    let uow = bundle.unit_of_work();
    uow.begin(BeginOptions::default()).await.unwrap();
    bundle.dispose().await.unwrap();

    assert!(matches!(uow.commit().await, Err(CoreError::NotActive)));
    assert!(matches!(
        uow.savepoint("sp1").await,
        Err(CoreError::NotActive)
    ));
    assert!(matches!(uow.fail(None).await, Err(CoreError::NotActive)));
}

#[tokio::test]
async fn test_scoped_transaction_commits_on_success() {
    let (_driver, provider) = setup();

    let bundle = provider.bundle_for(&["users"]).unwrap();
    let count = bundle
        .unit_of_work()
        .scoped_transaction(|_tx| async {
            let users = bundle
                .get_as::<MemoryDocumentRepository>("users")
                .await?;
            users.save(&Document::new("u1", json!({"n": 1}))).await?;
            users.count().await
        })
        .await
        .unwrap();

    assert_eq!(count, 1);
    assert!(!bundle.unit_of_work().is_active().await);
    assert_eq!(persisted_count(&provider, "users").await, 1);
}

#[tokio::test]
async fn test_scoped_transaction_rolls_back_and_reraises_on_error() {
    let (_driver, provider) = setup();

    let bundle = provider.bundle_for(&["users"]).unwrap();
    let err = bundle
        .unit_of_work()
        .scoped_transaction(|_tx| async {
            let users = bundle
                .get_as::<MemoryDocumentRepository>("users")
                .await?;
            users.save(&Document::new("u1", json!({"n": 1}))).await?;
            Err::<(), _>(CoreError::Internal("business rule violated".to_string()))
        })
        .await
        .unwrap_err();

    assert!(matches!(err, CoreError::Internal(_)));
    assert!(!bundle.unit_of_work().is_active().await);
    assert_eq!(persisted_count(&provider, "users").await, 0);
}

#[tokio::test]
async fn test_independent_units_of_work_do_not_interfere() {
    let (_driver, provider) = setup();

    let a = provider.bundle_for(&["users"]).unwrap();
    let b = provider.bundle_for(&["orders"]).unwrap();
    assert_ne!(a.unit_of_work().id(), b.unit_of_work().id());

    let (left, right) = tokio::join!(
        a.unit_of_work().scoped_transaction(|_tx| async {
            let users = a.get_as::<MemoryDocumentRepository>("users").await?;
            users.save(&Document::new("u1", json!({}))).await?;
            Ok(())
        }),
        b.unit_of_work().scoped_transaction(|_tx| async {
            let orders = b.get_as::<MemoryDocumentRepository>("orders").await?;
            orders.save(&Document::new("o1", json!({}))).await?;
            Ok(())
        }),
    );
    left.unwrap();
    right.unwrap();

    assert_eq!(persisted_count(&provider, "users").await, 1);
    assert_eq!(persisted_count(&provider, "orders").await, 1);
}
