//! Integration tests for PgGroupRepository.
//!
//! These tests run against a real Postgres database using testcontainers.
//! Requires Docker to be available on the system.

mod common;

use common::TestDatabase;
use huddle_core::{ErrorKind, GroupId, HuddleError, HuddleResult, User, UserId};
use huddle_repository::{GroupRepository, PgGroupRepository, TransactionExt};
use std::sync::Arc;
use std::time::Duration;

const DEADLINE: Duration = Duration::from_secs(5);

async fn setup() -> (TestDatabase, PgGroupRepository) {
    let db = TestDatabase::new().await;
    let repo = PgGroupRepository::new(db.pool());
    (db, repo)
}

async fn provision(repo: &PgGroupRepository, firstname: &str) -> User {
    let user = User::new(firstname, "Tester", format!("https://img/{firstname}.png"));
    repo.insert_user(&user).await.expect("Failed to insert user");
    user
}

/// Creates a group led by `leader` and moves every listed user into it.
async fn form_group(repo: &PgGroupRepository, leader: UserId, token: &str, members: Vec<UserId>) -> GroupId {
    let token = token.to_string();
    repo.run_in_transaction(DEADLINE, move |tx| {
        Box::pin(async move {
            let group = tx.create_group(leader, &token).await?;
            for member in members {
                tx.reassign_user(member, group.id).await?;
            }
            Ok(group.id)
        })
    })
    .await
    .expect("Failed to form group")
}

#[tokio::test]
async fn test_find_user_and_missing_group() {
    let (_db, repo) = setup().await;
    let ada = provision(&repo, "ada").await;

    let found = repo.find_user(ada.id).await.unwrap().expect("User not found");
    assert_eq!(found.firstname, "ada");
    assert!(found.group_id.is_none());

    assert!(repo.find_by_user(ada.id).await.unwrap().is_none());
    assert!(repo.find_user(UserId::new()).await.unwrap().is_none());
}

#[tokio::test]
async fn test_group_loads_members_leader_first() {
    let (_db, repo) = setup().await;
    let ada = provision(&repo, "ada").await;
    let bob = provision(&repo, "bob").await;
    let cy = provision(&repo, "cy").await;

    let group_id = form_group(&repo, cy.id, "tok-abc", vec![ada.id, bob.id, cy.id]).await;

    let by_user = repo.find_by_user(bob.id).await.unwrap().expect("Group not found");
    assert_eq!(by_user.id, group_id);
    assert_eq!(by_user.member_count(), 3);
    assert_eq!(by_user.members[0].id, cy.id);
    assert!(by_user.check_integrity(3).is_ok());

    let by_token = repo.find_by_token("tok-abc").await.unwrap().expect("Group not found");
    assert_eq!(by_token, by_user);
    assert!(repo.find_by_token("missing").await.unwrap().is_none());
}

#[tokio::test]
async fn test_failed_unit_of_work_rolls_back() {
    let (_db, repo) = setup().await;
    let ada = provision(&repo, "ada").await;
    let ada_id = ada.id;

    let result: HuddleResult<()> = repo
        .run_in_transaction(DEADLINE, move |tx| {
            Box::pin(async move {
                let group = tx.create_group(ada_id, "tok-rollback").await?;
                tx.reassign_user(ada_id, group.id).await?;
                Err(HuddleError::internal("injected failure"))
            })
        })
        .await;

    assert!(result.is_err());
    assert!(repo.find_by_token("tok-rollback").await.unwrap().is_none());
    assert!(repo.find_user(ada_id).await.unwrap().unwrap().group_id.is_none());
}

#[tokio::test]
async fn test_zero_row_writes_are_not_found() {
    let (_db, repo) = setup().await;
    let ada = provision(&repo, "ada").await;
    let ada_id = ada.id;
    form_group(&repo, ada_id, "tok-1", vec![ada_id]).await;

    let result: HuddleResult<()> = repo
        .run_in_transaction(DEADLINE, |tx| {
            Box::pin(async move { tx.update_confirmation(GroupId::new(), true).await })
        })
        .await;
    assert_eq!(result.unwrap_err().kind(), ErrorKind::NotFound);

    let result: HuddleResult<()> = repo
        .run_in_transaction(DEADLINE, |tx| Box::pin(async move { tx.delete_group(GroupId::new()).await }))
        .await;
    assert_eq!(result.unwrap_err().kind(), ErrorKind::NotFound);

    let result: HuddleResult<()> = repo
        .run_in_transaction(DEADLINE, move |tx| {
            Box::pin(async move {
                let group = tx.create_group(ada_id, "tok-2").await?;
                tx.reassign_user(UserId::new(), group.id).await
            })
        })
        .await;
    assert_eq!(result.unwrap_err().kind(), ErrorKind::NotFound);
    assert!(repo.find_by_token("tok-2").await.unwrap().is_none());
}

#[tokio::test]
async fn test_update_confirmation_persists() {
    let (_db, repo) = setup().await;
    let ada = provision(&repo, "ada").await;
    let group_id = form_group(&repo, ada.id, "tok-confirm", vec![ada.id]).await;

    repo.run_in_transaction(DEADLINE, move |tx| {
        Box::pin(async move { tx.update_confirmation(group_id, true).await })
    })
    .await
    .unwrap();
    assert!(repo.find_by_user(ada.id).await.unwrap().unwrap().is_confirmed);
}

#[tokio::test]
async fn test_delete_group_inside_transaction() {
    let (_db, repo) = setup().await;
    let ada = provision(&repo, "ada").await;
    let bob = provision(&repo, "bob").await;
    let ada_id = ada.id;
    let old = form_group(&repo, ada_id, "tok-old", vec![ada_id]).await;
    let new = form_group(&repo, bob.id, "tok-new", vec![bob.id]).await;

    repo.run_in_transaction(DEADLINE, move |tx| {
        Box::pin(async move {
            let locked = tx.lock_users(&[ada_id]).await?;
            assert_eq!(locked.len(), 1);
            let groups = tx.lock_groups(&[old, new]).await?;
            assert_eq!(groups.len(), 2);
            assert_eq!(tx.group_id_by_token("tok-new").await?, Some(new));
            tx.reassign_user(ada_id, new).await?;
            tx.delete_group(old).await
        })
    })
    .await
    .unwrap();

    assert!(repo.find_by_token("tok-old").await.unwrap().is_none());
    let joined = repo.find_by_user(ada_id).await.unwrap().unwrap();
    assert_eq!(joined.id, new);
    assert_eq!(joined.member_count(), 2);
}

#[tokio::test]
async fn test_row_locks_serialize_concurrent_units_of_work() {
    let (_db, repo) = setup().await;
    let repo = Arc::new(repo);
    let ada = provision(&repo, "ada").await;
    let group_id = form_group(&repo, ada.id, "tok-lock", vec![ada.id]).await;

    let mut handles = Vec::new();
    for _ in 0..4 {
        let repo = Arc::clone(&repo);
        handles.push(tokio::spawn(async move {
            repo.run_in_transaction(DEADLINE, move |tx| {
                Box::pin(async move {
                    let groups = tx.lock_groups(&[group_id]).await?;
                    let flipped = !groups[0].is_confirmed;
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    tx.update_confirmation(group_id, flipped).await
                })
            })
            .await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    // four serialized flips return to the starting value
    assert!(!repo.find_by_user(ada.id).await.unwrap().unwrap().is_confirmed);
}
