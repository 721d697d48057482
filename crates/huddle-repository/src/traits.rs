//! Repository trait definitions.

use async_trait::async_trait;
use futures::FutureExt;
use huddle_core::{BoxFuture, Group, GroupId, HuddleError, HuddleResult, Interface, User, UserId};
use std::panic::AssertUnwindSafe;
use std::time::Duration;
use tracing::{debug, warn};

/// Pool-level access to groups and the users that belong to them.
///
/// Every read returns groups with members eagerly loaded, leader first.
/// Every mutation goes through [`GroupRepository::begin`].
#[async_trait]
pub trait GroupRepository: Interface + Send + Sync {
    /// Finds the group the user currently belongs to.
    async fn find_by_user(&self, user_id: UserId) -> HuddleResult<Option<Group>>;

    /// Finds a group by its invite token.
    async fn find_by_token(&self, token: &str) -> HuddleResult<Option<Group>>;

    /// Reads a user from the user directory.
    async fn find_user(&self, user_id: UserId) -> HuddleResult<Option<User>>;

    /// Opens a unit of work. Dropping the handle without committing rolls back.
    async fn begin(&self) -> HuddleResult<Box<dyn GroupTransaction>>;
}

/// Transactional handle returned by [`GroupRepository::begin`].
///
/// Callers lock every user row they touch before any group row, and lock
/// rows of one kind in ascending id order.
#[async_trait]
pub trait GroupTransaction: Send {
    /// Row-locks the given users. Unknown ids are skipped.
    async fn lock_users(&mut self, ids: &[UserId]) -> HuddleResult<Vec<User>>;

    /// Row-locks the given groups and loads their members. Unknown ids are skipped.
    async fn lock_groups(&mut self, ids: &[GroupId]) -> HuddleResult<Vec<Group>>;

    /// Resolves a token to a group id without locking.
    async fn group_id_by_token(&mut self, token: &str) -> HuddleResult<Option<GroupId>>;

    /// Inserts an unconfirmed group led by `leader_id`. Members are not moved.
    async fn create_group(&mut self, leader_id: UserId, token: &str) -> HuddleResult<Group>;

    /// Points a user at a group. `NotFound` if no user row was affected.
    async fn reassign_user(&mut self, user_id: UserId, group_id: GroupId) -> HuddleResult<()>;

    /// Deletes a group row. `NotFound` if no row was affected.
    async fn delete_group(&mut self, group_id: GroupId) -> HuddleResult<()>;

    /// Sets the confirmation flag. `NotFound` if no row was affected.
    async fn update_confirmation(&mut self, group_id: GroupId, confirmed: bool) -> HuddleResult<()>;

    /// Commits every write made through this handle.
    async fn commit(self: Box<Self>) -> HuddleResult<()>;
}

/// Runs units of work against any [`GroupRepository`].
#[async_trait]
pub trait TransactionExt: GroupRepository {
    /// Executes `work` inside one transaction bounded by `deadline`.
    ///
    /// `Ok` commits. An error, an elapsed deadline, or a panic inside `work`
    /// drops the transaction, which rolls it back. Panics and timeouts are
    /// reported as internal failures.
    async fn run_in_transaction<T, F>(&self, deadline: Duration, work: F) -> HuddleResult<T>
    where
        T: Send + 'static,
        F: for<'t> FnOnce(&'t mut dyn GroupTransaction) -> BoxFuture<'t, T> + Send + 'static,
    {
        let unit = async move {
            let mut tx = self.begin().await?;
            let value = work(&mut *tx).await?;
            tx.commit().await?;
            Ok(value)
        };

        let guarded = AssertUnwindSafe(unit).catch_unwind().map(|outcome| match outcome {
            Ok(result) => result,
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                warn!("Unit of work panicked, transaction rolled back: {}", message);
                Err(HuddleError::internal(format!("unit of work panicked: {}", message)))
            }
        });

        let result = huddle_resilience::with_timeout(deadline, || guarded).await;
        match &result {
            Ok(_) => debug!("Transaction committed"),
            Err(HuddleError::Timeout(_)) => warn!("Unit of work exceeded {:?}, transaction rolled back", deadline),
            Err(e) => debug!("Transaction rolled back: {}", e),
        }
        result
    }
}

impl<R: GroupRepository + ?Sized> TransactionExt for R {}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
