//! Row types and shared queries for the Postgres backend.

use chrono::{DateTime, Utc};
use huddle_core::{Group, GroupId, HuddleResult, User, UserId};
use sqlx::{FromRow, PgExecutor};
use std::collections::HashMap;
use uuid::Uuid;

pub(crate) const USER_COLUMNS: &str =
    "id, firstname, lastname, photo_url, group_id, created_at, updated_at";

pub(crate) const GROUP_COLUMNS: &str =
    "id, leader_id, token, is_confirmed, created_at, updated_at";

/// Database row representation of a user.
#[derive(Debug, FromRow)]
pub(crate) struct UserRow {
    id: Uuid,
    firstname: String,
    lastname: String,
    photo_url: String,
    group_id: Option<Uuid>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        Self {
            id: UserId::from_uuid(row.id),
            firstname: row.firstname,
            lastname: row.lastname,
            photo_url: row.photo_url,
            group_id: row.group_id.map(GroupId::from_uuid),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Database row representation of a group, without members.
#[derive(Debug, FromRow)]
pub(crate) struct GroupRow {
    id: Uuid,
    leader_id: Uuid,
    token: String,
    is_confirmed: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<GroupRow> for Group {
    fn from(row: GroupRow) -> Self {
        Self {
            id: GroupId::from_uuid(row.id),
            leader_id: UserId::from_uuid(row.leader_id),
            token: row.token,
            is_confirmed: row.is_confirmed,
            members: Vec::new(),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Loads the members of every listed group and attaches them.
pub(crate) async fn attach_members<'e, E>(executor: E, rows: Vec<GroupRow>) -> HuddleResult<Vec<Group>>
where
    E: PgExecutor<'e>,
{
    if rows.is_empty() {
        return Ok(Vec::new());
    }

    let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
    let members = sqlx::query_as::<_, UserRow>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE group_id = ANY($1) ORDER BY id"
    ))
    .bind(ids)
    .fetch_all(executor)
    .await?;

    let mut by_group: HashMap<GroupId, Vec<User>> = HashMap::new();
    for member in members {
        let user = User::from(member);
        if let Some(group_id) = user.group_id {
            by_group.entry(group_id).or_default().push(user);
        }
    }

    Ok(rows
        .into_iter()
        .map(|row| {
            let group = Group::from(row);
            let members = by_group.remove(&group.id).unwrap_or_default();
            group.with_members(members)
        })
        .collect())
}
