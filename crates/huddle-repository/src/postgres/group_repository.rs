//! Postgres group repository implementation.

use super::rows::{attach_members, GroupRow, UserRow, GROUP_COLUMNS, USER_COLUMNS};
use crate::{DatabasePoolInterface, GroupRepository, GroupTransaction};
use async_trait::async_trait;
use huddle_core::{Group, GroupId, HuddleError, HuddleResult, ResultExt, User, UserId};
use shaku::Component;
use sqlx::{Postgres, Transaction};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// Postgres group repository implementation.
#[derive(Component, Clone)]
#[shaku(interface = GroupRepository)]
pub struct PgGroupRepository {
    #[shaku(inject)]
    pool: Arc<dyn DatabasePoolInterface>,
}

impl PgGroupRepository {
    /// Creates a new Postgres group repository.
    #[must_use]
    pub fn new(pool: Arc<dyn DatabasePoolInterface>) -> Self {
        Self { pool }
    }

    /// Inserts a user row on behalf of the user directory.
    pub async fn insert_user(&self, user: &User) -> HuddleResult<()> {
        sqlx::query(
            r#"
            INSERT INTO users (id, firstname, lastname, photo_url, group_id, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(user.id.into_inner())
        .bind(&user.firstname)
        .bind(&user.lastname)
        .bind(&user.photo_url)
        .bind(user.group_id.map(GroupId::into_inner))
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(self.pool.inner())
        .await
        .map_err(HuddleError::from)
        .context("insert_user")?;
        Ok(())
    }
}

#[async_trait]
impl GroupRepository for PgGroupRepository {
    async fn find_by_user(&self, user_id: UserId) -> HuddleResult<Option<Group>> {
        debug!("Finding group by user: {}", user_id);

        let row = sqlx::query_as::<_, GroupRow>(&format!(
            "SELECT {GROUP_COLUMNS} FROM groups WHERE id = (SELECT group_id FROM users WHERE id = $1)"
        ))
        .bind(user_id.into_inner())
        .fetch_optional(self.pool.inner())
        .await
        .map_err(HuddleError::from)
        .context("find_by_user")?;

        let groups = attach_members(self.pool.inner(), row.into_iter().collect()).await;
        groups.map(|mut g| g.pop()).context("find_by_user")
    }

    async fn find_by_token(&self, token: &str) -> HuddleResult<Option<Group>> {
        debug!("Finding group by token");

        let row = sqlx::query_as::<_, GroupRow>(&format!("SELECT {GROUP_COLUMNS} FROM groups WHERE token = $1"))
            .bind(token)
            .fetch_optional(self.pool.inner())
            .await
            .map_err(HuddleError::from)
            .context("find_by_token")?;

        let groups = attach_members(self.pool.inner(), row.into_iter().collect()).await;
        groups.map(|mut g| g.pop()).context("find_by_token")
    }

    async fn find_user(&self, user_id: UserId) -> HuddleResult<Option<User>> {
        debug!("Finding user by id: {}", user_id);

        let row = sqlx::query_as::<_, UserRow>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(user_id.into_inner())
            .fetch_optional(self.pool.inner())
            .await
            .map_err(HuddleError::from)
            .context("find_user")?;

        Ok(row.map(User::from))
    }

    async fn begin(&self) -> HuddleResult<Box<dyn GroupTransaction>> {
        let tx = self
            .pool
            .inner()
            .begin()
            .await
            .map_err(HuddleError::from)
            .context("begin")?;
        Ok(Box::new(PgGroupTransaction { tx }))
    }
}

/// Open Postgres transaction. Rolled back by sqlx when dropped uncommitted.
pub struct PgGroupTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl GroupTransaction for PgGroupTransaction {
    async fn lock_users(&mut self, ids: &[UserId]) -> HuddleResult<Vec<User>> {
        let ids: Vec<Uuid> = ids.iter().map(|id| id.into_inner()).collect();

        let rows = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = ANY($1) ORDER BY id FOR UPDATE"
        ))
        .bind(ids)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(HuddleError::from)
        .context("lock_users")?;

        Ok(rows.into_iter().map(User::from).collect())
    }

    async fn lock_groups(&mut self, ids: &[GroupId]) -> HuddleResult<Vec<Group>> {
        let ids: Vec<Uuid> = ids.iter().map(|id| id.into_inner()).collect();

        let rows = sqlx::query_as::<_, GroupRow>(&format!(
            "SELECT {GROUP_COLUMNS} FROM groups WHERE id = ANY($1) ORDER BY id FOR UPDATE"
        ))
        .bind(ids)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(HuddleError::from)
        .context("lock_groups")?;

        attach_members(&mut *self.tx, rows).await.context("lock_groups")
    }

    async fn group_id_by_token(&mut self, token: &str) -> HuddleResult<Option<GroupId>> {
        let id: Option<Uuid> = sqlx::query_scalar("SELECT id FROM groups WHERE token = $1")
            .bind(token)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(HuddleError::from)
            .context("group_id_by_token")?;

        Ok(id.map(GroupId::from_uuid))
    }

    async fn create_group(&mut self, leader_id: UserId, token: &str) -> HuddleResult<Group> {
        let group = Group::new(leader_id, token);

        let row = sqlx::query_as::<_, GroupRow>(&format!(
            r#"
            INSERT INTO groups (id, leader_id, token, is_confirmed, created_at, updated_at)
            VALUES ($1, $2, $3, FALSE, $4, $4)
            RETURNING {GROUP_COLUMNS}
            "#
        ))
        .bind(group.id.into_inner())
        .bind(leader_id.into_inner())
        .bind(token)
        .bind(group.created_at)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(HuddleError::from)
        .context("create_group")?;

        debug!("Created group {} led by {}", group.id, leader_id);
        Ok(Group::from(row))
    }

    async fn reassign_user(&mut self, user_id: UserId, group_id: GroupId) -> HuddleResult<()> {
        let result = sqlx::query("UPDATE users SET group_id = $2, updated_at = NOW() WHERE id = $1")
            .bind(user_id.into_inner())
            .bind(group_id.into_inner())
            .execute(&mut *self.tx)
            .await
            .map_err(HuddleError::from)
            .context("reassign_user")?;

        if result.rows_affected() == 0 {
            return Err(HuddleError::not_found("User", user_id));
        }
        Ok(())
    }

    async fn delete_group(&mut self, group_id: GroupId) -> HuddleResult<()> {
        let result = sqlx::query("DELETE FROM groups WHERE id = $1")
            .bind(group_id.into_inner())
            .execute(&mut *self.tx)
            .await
            .map_err(HuddleError::from)
            .context("delete_group")?;

        if result.rows_affected() == 0 {
            return Err(HuddleError::not_found("Group", group_id));
        }
        Ok(())
    }

    async fn update_confirmation(&mut self, group_id: GroupId, confirmed: bool) -> HuddleResult<()> {
        let result = sqlx::query("UPDATE groups SET is_confirmed = $2, updated_at = NOW() WHERE id = $1")
            .bind(group_id.into_inner())
            .bind(confirmed)
            .execute(&mut *self.tx)
            .await
            .map_err(HuddleError::from)
            .context("update_confirmation")?;

        if result.rows_affected() == 0 {
            return Err(HuddleError::not_found("Group", group_id));
        }
        Ok(())
    }

    async fn commit(self: Box<Self>) -> HuddleResult<()> {
        let this = *self;
        this.tx
            .commit()
            .await
            .map_err(HuddleError::from)
            .context("commit")
    }
}
