// Unit of Work - one logical transaction boundary

use std::future::Future;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::domain::{BeginOptions, Context, Snapshot};
use crate::error::{CoreError, Result};
use crate::port::Driver;

/// One logical transaction against a storage driver.
///
/// State machine: `INACTIVE -> begin -> ACTIVE -> commit | rollback ->
/// INACTIVE`, with an orthogonal rollback-only flag settable while active.
/// Every mutating operation fails on an inactive Unit of Work; `end` and
/// `dispose` are deliberately idempotent so cleanup code stays simple.
///
/// Cloning is cheap and yields another handle onto the same transaction:
/// a bundle and its repository handles all observe one shared lifecycle.
/// Callers must await each operation before issuing the next on the same
/// transaction; concurrent calls on one Unit of Work are not supported.
#[derive(Clone)]
pub struct UnitOfWork {
    id: Uuid,
    driver: Arc<dyn Driver>,
    state: Arc<Mutex<UowState>>,
}

#[derive(Default)]
struct UowState {
    /// `Some` exactly while the transaction is active.
    context: Option<Context>,
    rollback_only: bool,
    rollback_reason: Option<String>,
    /// Savepoints in creation order.
    savepoints: Vec<(String, Snapshot)>,
}

impl UowState {
    fn is_active(&self) -> bool {
        self.context.is_some()
    }

    fn deactivate(&mut self) {
        self.context = None;
        self.rollback_only = false;
        self.rollback_reason = None;
        self.savepoints.clear();
    }
}

impl UnitOfWork {
    pub fn new(driver: Arc<dyn Driver>) -> Self {
        Self {
            id: Uuid::new_v4(),
            driver,
            state: Arc::new(Mutex::new(UowState::default())),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Engine tag of the backing driver.
    pub fn engine(&self) -> &str {
        self.driver.engine()
    }

    pub fn driver(&self) -> &Arc<dyn Driver> {
        &self.driver
    }

    /// Activate the transaction and acquire a connection context.
    pub async fn begin(&self, options: BeginOptions) -> Result<()> {
        let mut state = self.state.lock().await;
        if state.is_active() {
            return Err(CoreError::AlreadyActive);
        }

        let context = self.driver.open_context(&options).await?;
        state.context = Some(context);
        debug!(
            uow_id = %self.id,
            engine = self.driver.engine(),
            database = options.database.as_deref().unwrap_or("<default>"),
            "transaction began"
        );
        Ok(())
    }

    /// The opaque connection context, or `None` while inactive.
    pub async fn context(&self) -> Option<Context> {
        self.state.lock().await.context.clone()
    }

    pub async fn is_active(&self) -> bool {
        self.state.lock().await.is_active()
    }

    pub async fn is_rollback_only(&self) -> bool {
        self.state.lock().await.rollback_only
    }

    /// The reason recorded by `fail`, if any.
    pub async fn rollback_reason(&self) -> Option<String> {
        self.state.lock().await.rollback_reason.clone()
    }

    /// Mark the active transaction rollback-only. Does not itself roll back;
    /// it only forbids `commit` and routes `end` to `rollback`.
    pub async fn fail(&self, reason: Option<String>) -> Result<()> {
        let mut state = self.state.lock().await;
        if !state.is_active() {
            return Err(CoreError::NotActive);
        }
        state.rollback_only = true;
        state.rollback_reason = reason;
        debug!(
            uow_id = %self.id,
            reason = state.rollback_reason.as_deref().unwrap_or("<none>"),
            "transaction marked rollback-only"
        );
        Ok(())
    }

    /// Record a named checkpoint of the pending state.
    pub async fn savepoint(&self, name: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        let Some(context) = state.context.clone() else {
            return Err(CoreError::NotActive);
        };
        if state.savepoints.iter().any(|(n, _)| n == name) {
            return Err(CoreError::DuplicateSavepoint(name.to_string()));
        }

        let snapshot = self.driver.snapshot(&context).await?;
        state.savepoints.push((name.to_string(), snapshot));
        debug!(uow_id = %self.id, savepoint = name, "savepoint created");
        Ok(())
    }

    /// Restore pending state to the named checkpoint. Every savepoint
    /// created strictly after `name` is discarded; `name` itself survives.
    pub async fn rollback_to(&self, name: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        let Some(context) = state.context.clone() else {
            return Err(CoreError::NotActive);
        };
        let position = state
            .savepoints
            .iter()
            .position(|(n, _)| n == name)
            .ok_or_else(|| CoreError::SavepointNotFound(name.to_string()))?;

        let snapshot = state.savepoints[position].1.clone();
        self.driver.restore(&context, &snapshot).await?;
        state.savepoints.truncate(position + 1);
        debug!(
            uow_id = %self.id,
            savepoint = name,
            remaining = state.savepoints.len(),
            "rolled back to savepoint"
        );
        Ok(())
    }

    /// Forget the named checkpoint without restoring it.
    pub async fn release_savepoint(&self, name: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        let Some(context) = state.context.clone() else {
            return Err(CoreError::NotActive);
        };
        let position = state
            .savepoints
            .iter()
            .position(|(n, _)| n == name)
            .ok_or_else(|| CoreError::SavepointNotFound(name.to_string()))?;

        let (_, snapshot) = state.savepoints.remove(position);
        self.driver.release(&context, &snapshot).await?;
        debug!(uow_id = %self.id, savepoint = name, "savepoint released");
        Ok(())
    }

    /// Commit via the driver and deactivate. Fails while rollback-only.
    /// A driver failure propagates unchanged and leaves the transaction
    /// active, savepoints intact.
    pub async fn commit(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        self.commit_locked(&mut state).await
    }

    /// Roll back via the driver and deactivate.
    pub async fn rollback(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        self.rollback_locked(&mut state).await
    }

    /// Finish the transaction: rollback when rollback-only, commit
    /// otherwise. No-op when already inactive.
    pub async fn end(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        self.end_locked(&mut state).await
    }

    /// End the transaction if still active and clear the savepoint stack.
    /// Safe to call any number of times.
    pub async fn dispose(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        let result = self.end_locked(&mut state).await;
        state.savepoints.clear();
        result
    }

    /// Run `run` inside this Unit of Work with `BeginOptions::default()`.
    /// See [`UnitOfWork::scoped_transaction_with`].
    pub async fn scoped_transaction<T, F, Fut>(&self, run: F) -> Result<T>
    where
        F: FnOnce(UnitOfWork) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.scoped_transaction_with(BeginOptions::default(), run)
            .await
    }

    /// Begin, run `run` with a clone of this handle, and guarantee the
    /// transaction is ended exactly once on every path: on success the
    /// result of `end` (normally a commit) decides the outcome; on error
    /// the transaction is marked rollback-only, ended, and the original
    /// error is re-raised.
    pub async fn scoped_transaction_with<T, F, Fut>(
        &self,
        options: BeginOptions,
        run: F,
    ) -> Result<T>
    where
        F: FnOnce(UnitOfWork) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.begin(options).await?;

        match run(self.clone()).await {
            Ok(value) => {
                self.end().await?;
                Ok(value)
            }
            Err(err) => {
                // The closure may already have ended the transaction itself.
                if self.is_active().await {
                    let _ = self.fail(Some(err.to_string())).await;
                }
                if let Err(end_err) = self.end().await {
                    warn!(
                        uow_id = %self.id,
                        error = %end_err,
                        "cleanup failed while ending errored transaction"
                    );
                }
                Err(err)
            }
        }
    }

    /// Names of currently-open savepoints, in creation order.
    pub async fn savepoint_names(&self) -> Vec<String> {
        self.state
            .lock()
            .await
            .savepoints
            .iter()
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub async fn savepoint_count(&self) -> usize {
        self.state.lock().await.savepoints.len()
    }

    async fn commit_locked(&self, state: &mut UowState) -> Result<()> {
        let Some(context) = state.context.clone() else {
            return Err(CoreError::NotActive);
        };
        if state.rollback_only {
            return Err(CoreError::RollbackOnly);
        }

        self.driver.commit(&context).await?;
        state.deactivate();
        debug!(uow_id = %self.id, "transaction committed");
        Ok(())
    }

    async fn rollback_locked(&self, state: &mut UowState) -> Result<()> {
        let Some(context) = state.context.clone() else {
            return Err(CoreError::NotActive);
        };

        self.driver.rollback(&context).await?;
        state.deactivate();
        debug!(uow_id = %self.id, "transaction rolled back");
        Ok(())
    }

    async fn end_locked(&self, state: &mut UowState) -> Result<()> {
        if !state.is_active() {
            return Ok(());
        }
        if state.rollback_only {
            self.rollback_locked(state).await
        } else {
            self.commit_locked(state).await
        }
    }
}

impl std::fmt::Debug for UnitOfWork {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnitOfWork")
            .field("id", &self.id)
            .field("engine", &self.driver.engine())
            .finish_non_exhaustive()
    }
}
