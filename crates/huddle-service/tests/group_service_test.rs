//! Scenario tests for the group coordinator over the in-memory backends.

mod common;

use common::{build_service, FailingRepository, Fault, Harness, PoisonedKeyCache};
use huddle_core::{ErrorKind, UserId};
use huddle_repository::{GroupRepository, TransactionExt};
use huddle_service::{GroupService, MemoryCacheService};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn test_first_lookup_creates_singleton_group() {
    let h = Harness::new(4);
    let [a] = h.users(&["a"]).await[..] else { unreachable!() };

    let first = h.service.find_by_user(a).await.unwrap();
    assert_eq!(first.leader_id, a);
    assert_eq!(first.member_ids(), vec![a]);
    assert!(!first.is_confirmed);
    assert!(!first.token.is_empty());

    let second = h.service.find_by_user(a).await.unwrap();
    assert_eq!(second.id, first.id);
    assert_eq!(h.repo.groups().await.len(), 1);
    h.assert_invariants(4).await;
}

#[tokio::test]
async fn test_second_lookup_is_served_from_cache() {
    let h = Harness::new(4);
    let [a] = h.users(&["a"]).await[..] else { unreachable!() };

    let first = h.service.find_by_user(a).await.unwrap();
    assert_eq!(h.cached_group(a).await, Some(first.clone()));

    // change the store behind the service's back; the cached copy wins
    let group_id = first.id;
    h.repo
        .run_in_transaction(Duration::from_secs(1), move |tx| {
            Box::pin(async move { tx.update_confirmation(group_id, true).await })
        })
        .await
        .unwrap();
    let second = h.service.find_by_user(a).await.unwrap();
    assert_eq!(second, first);
    assert!(!second.is_confirmed);
}

#[tokio::test]
async fn test_leader_cannot_leave_or_join_elsewhere_with_followers() {
    let h = Harness::new(4);
    let [a, b, c] = h.users(&["a", "b", "c"]).await[..] else { unreachable!() };
    let group_a = h.service.find_by_user(a).await.unwrap();
    let group_c = h.service.find_by_user(c).await.unwrap();

    let err = h.service.leave(a).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PermissionDenied);

    h.service.join(b, &group_a.token).await.unwrap();

    let err = h.service.join(a, &group_c.token).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PermissionDenied);
    let err = h.service.leave(a).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PermissionDenied);

    assert_eq!(h.stored_group(a).await.member_ids(), vec![a, b]);
    assert_eq!(h.stored_group(c).await.member_ids(), vec![c]);
    h.assert_invariants(4).await;
}

#[tokio::test]
async fn test_full_group_rejects_fifth_member() {
    let h = Harness::new(4);
    let ids = h.users(&["a", "b", "c", "d", "e"]).await;
    let group = h.service.find_by_user(ids[0]).await.unwrap();
    h.service.find_by_user(ids[4]).await.unwrap();
    for id in &ids[1..4] {
        h.service.join(*id, &group.token).await.unwrap();
    }
    assert_eq!(h.stored_group(ids[0]).await.member_count(), 4);

    let err = h.service.join(ids[4], &group.token).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PermissionDenied);

    assert_eq!(h.stored_group(ids[0]).await.member_count(), 4);
    assert_ne!(h.stored_group(ids[4]).await.id, group.id);
    h.assert_invariants(4).await;
}

#[tokio::test]
async fn test_delete_member_splits_the_group() {
    let h = Harness::new(4);
    let [a, b] = h.users(&["a", "b"]).await[..] else { unreachable!() };
    let group = h.service.find_by_user(a).await.unwrap();
    h.service.join(b, &group.token).await.unwrap();

    // warm both cache entries with the shared group
    assert_eq!(h.service.find_by_user(b).await.unwrap().id, group.id);

    let remaining = h.service.delete_member(a, b).await.unwrap();
    assert_eq!(remaining.id, group.id);
    assert_eq!(remaining.member_ids(), vec![a]);

    let seen_by_a = h.service.find_by_user(a).await.unwrap();
    let seen_by_b = h.service.find_by_user(b).await.unwrap();
    assert_eq!(seen_by_a.member_ids(), vec![a]);
    assert_ne!(seen_by_b.id, group.id);
    assert_eq!(seen_by_b.leader_id, b);
    assert_eq!(seen_by_b.member_ids(), vec![b]);
    h.assert_invariants(4).await;
}

#[tokio::test]
async fn test_confirmed_group_blocks_leave() {
    let h = Harness::new(4);
    let [a, b] = h.users(&["a", "b"]).await[..] else { unreachable!() };
    let group = h.service.find_by_user(a).await.unwrap();
    h.service.join(b, &group.token).await.unwrap();

    let confirmed = h.service.update_confirm(a, true).await.unwrap();
    assert!(confirmed.is_confirmed);
    assert!(h.cached_group(b).await.unwrap().is_confirmed);

    let err = h.service.leave(b).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PermissionDenied);
    assert_eq!(h.stored_group(b).await.id, group.id);
}

#[tokio::test]
async fn test_confirmed_groups_reject_joins_and_evictions() {
    let h = Harness::new(4);
    let [a, b, c] = h.users(&["a", "b", "c"]).await[..] else { unreachable!() };
    let group = h.service.find_by_user(a).await.unwrap();
    h.service.join(b, &group.token).await.unwrap();
    h.service.find_by_user(c).await.unwrap();
    h.service.update_confirm(a, true).await.unwrap();

    let err = h.service.join(c, &group.token).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PermissionDenied);
    let err = h.service.delete_member(a, b).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PermissionDenied);

    // unlocking restores the normal rules
    h.service.update_confirm(a, false).await.unwrap();
    h.service.join(c, &group.token).await.unwrap();
    assert_eq!(h.stored_group(a).await.member_count(), 3);
}

#[tokio::test]
async fn test_member_leaves_into_new_singleton() {
    let h = Harness::new(4);
    let [a, b] = h.users(&["a", "b"]).await[..] else { unreachable!() };
    let group = h.service.find_by_user(a).await.unwrap();
    h.service.join(b, &group.token).await.unwrap();

    let mine = h.service.leave(b).await.unwrap();
    assert_ne!(mine.id, group.id);
    assert_eq!(mine.member_ids(), vec![b]);
    assert_eq!(h.cached_group(a).await.unwrap().member_ids(), vec![a]);
    assert_eq!(h.cached_group(b).await.unwrap().id, mine.id);

    let err = h.service.leave(b).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PermissionDenied);
    h.assert_invariants(4).await;
}

#[tokio::test]
async fn test_join_deletes_former_singleton_and_its_token() {
    let h = Harness::new(4);
    let [a, b] = h.users(&["a", "b"]).await[..] else { unreachable!() };
    let group_a = h.service.find_by_user(a).await.unwrap();
    let group_b = h.service.find_by_user(b).await.unwrap();
    h.service.find_by_token(&group_b.token).await.unwrap();

    let joined = h.service.join(b, &group_a.token).await.unwrap();
    assert_eq!(joined.id, group_a.id);
    assert_eq!(joined.member_ids(), vec![a, b]);

    assert!(h.repo.find_by_token(&group_b.token).await.unwrap().is_none());
    let err = h.service.find_by_token(&group_b.token).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(h.cached_group(a).await.unwrap(), joined);
    assert_eq!(h.cached_group(b).await.unwrap(), joined);
    assert_eq!(h.repo.groups().await.len(), 1);
}

#[tokio::test]
async fn test_member_switching_groups_refreshes_former_group() {
    let h = Harness::new(4);
    let [a, b, c] = h.users(&["a", "b", "c"]).await[..] else { unreachable!() };
    let group_a = h.service.find_by_user(a).await.unwrap();
    let group_c = h.service.find_by_user(c).await.unwrap();
    h.service.join(b, &group_a.token).await.unwrap();

    h.service.join(b, &group_c.token).await.unwrap();

    assert_eq!(h.cached_group(a).await.unwrap().member_ids(), vec![a]);
    assert_eq!(h.cached_group(b).await.unwrap().id, group_c.id);
    assert_eq!(h.stored_group(a).await.member_ids(), vec![a]);
    h.assert_invariants(4).await;
}

#[tokio::test]
async fn test_join_rejects_own_group_and_unknown_token() {
    let h = Harness::new(4);
    let [a] = h.users(&["a"]).await[..] else { unreachable!() };
    let group = h.service.find_by_user(a).await.unwrap();

    let err = h.service.join(a, &group.token).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PermissionDenied);

    let err = h.service.join(a, "no-such-token").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_find_by_token_returns_leader_summary() {
    let h = Harness::new(4);
    let [a, b] = h.users(&["a", "b"]).await[..] else { unreachable!() };
    let group = h.service.find_by_user(a).await.unwrap();
    h.service.join(b, &group.token).await.unwrap();

    let summary = h.service.find_by_token(&group.token).await.unwrap();
    assert_eq!(summary.id, group.id);
    assert_eq!(summary.token, group.token);
    assert_eq!(summary.leader.id, a);
    assert_eq!(summary.leader.firstname, "a");
    assert_eq!(summary.leader.photo_url, "https://img/a.png");
}

#[tokio::test]
async fn test_leave_rolls_back_when_second_write_fails() {
    let h = Harness::new(4);
    let [a, b] = h.users(&["a", "b"]).await[..] else { unreachable!() };
    let group = h.service.find_by_user(a).await.unwrap();
    h.service.join(b, &group.token).await.unwrap();

    let failing = build_service(
        Arc::new(FailingRepository::new(h.repo.clone(), Fault::Reassign)),
        Arc::new(MemoryCacheService::new()),
        4,
    );

    let err = failing.leave(b).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Internal);

    // neither the new group nor the move is visible
    assert_eq!(h.repo.groups().await.len(), 1);
    assert_eq!(h.stored_group(a).await.member_ids(), vec![a, b]);
    assert_eq!(h.stored_group(b).await.id, group.id);
    h.assert_invariants(4).await;
}

#[tokio::test]
async fn test_partial_fan_out_failure_is_not_reported() {
    let h = Harness::new(4);
    let [a, b, c] = h.users(&["a", "b", "c"]).await[..] else { unreachable!() };
    let group = h.service.find_by_user(a).await.unwrap();
    h.service.join(b, &group.token).await.unwrap();
    let stale_for_b = h.service.find_by_user(b).await.unwrap();

    let flaky = build_service(
        h.repo.clone(),
        Arc::new(PoisonedKeyCache {
            inner: h.cache.clone(),
            poisoned: h.keys.group_by_user(b),
        }),
        4,
    );

    let joined = flaky.join(c, &group.token).await.unwrap();
    assert_eq!(joined.members.len(), 3);

    assert_eq!(h.cached_group(a).await.unwrap(), joined);
    assert_eq!(h.cached_group(c).await.unwrap(), joined);
    // b's key kept the pre-join snapshot until its TTL runs out
    assert_eq!(h.cached_group(b).await.unwrap(), stale_for_b);
    assert_eq!(h.stored_group(b).await.member_count(), 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_joins_never_exceed_capacity() {
    let h = Harness::new(4);
    let ids = h.users(&["lead", "u1", "u2", "u3", "u4", "u5", "u6", "u7"]).await;
    let group = h.service.find_by_user(ids[0]).await.unwrap();
    for id in &ids[1..] {
        h.service.find_by_user(*id).await.unwrap();
    }

    let mut handles = Vec::new();
    for id in ids[1..].iter().copied() {
        let service = h.service.clone();
        let token = group.token.clone();
        handles.push(tokio::spawn(async move { service.join(id, &token).await }));
    }

    let mut joined = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => joined += 1,
            Err(e) => assert_eq!(e.kind(), ErrorKind::PermissionDenied),
        }
    }

    assert_eq!(joined, 3);
    assert_eq!(h.stored_group(ids[0]).await.member_count(), 4);
    h.assert_invariants(4).await;
}

#[tokio::test]
async fn test_every_user_keeps_a_group_through_mixed_operations() {
    let h = Harness::new(3);
    let ids: Vec<UserId> = h.users(&["a", "b", "c", "d", "e"]).await;
    let group_a = h.service.find_by_user(ids[0]).await.unwrap();
    let group_d = h.service.find_by_user(ids[3]).await.unwrap();

    h.service.join(ids[1], &group_a.token).await.unwrap();
    h.service.join(ids[2], &group_a.token).await.unwrap();
    h.service.delete_member(ids[0], ids[1]).await.unwrap();
    h.service.join(ids[4], &group_d.token).await.unwrap();
    h.service.leave(ids[2]).await.unwrap();
    h.service.join(ids[1], &group_d.token).await.unwrap();

    h.assert_invariants(3).await;
    assert_eq!(h.stored_group(ids[3]).await.member_ids().len(), 3);
    for id in &ids {
        let cached = h.cached_group(*id).await.unwrap();
        assert_eq!(cached.id, h.stored_group(*id).await.id);
    }
}

#[tokio::test]
async fn test_join_succeeds_when_former_group_reload_fails() {
    let h = Harness::new(4);
    let [a, b, c] = h.users(&["a", "b", "c"]).await[..] else { unreachable!() };
    let group_a = h.service.find_by_user(a).await.unwrap();
    let group_c = h.service.find_by_user(c).await.unwrap();
    h.service.join(b, &group_a.token).await.unwrap();

    let service = build_service(
        Arc::new(FailingRepository::new(h.repo.clone(), Fault::TokenRead)),
        h.cache.clone(),
        4,
    );

    let joined = service.join(b, &group_c.token).await.unwrap();
    assert_eq!(joined.id, group_c.id);
    assert_eq!(joined.member_ids(), vec![c, b]);
    assert_eq!(h.stored_group(b).await.id, group_c.id);
    assert_eq!(h.cached_group(c).await.unwrap().member_ids(), vec![c, b]);
    h.assert_invariants(4).await;
}

#[tokio::test]
async fn test_failed_confirmation_write_keeps_group_open() {
    let h = Harness::new(4);
    let [a, b] = h.users(&["a", "b"]).await[..] else { unreachable!() };
    let group = h.service.find_by_user(a).await.unwrap();
    h.service.join(b, &group.token).await.unwrap();

    let service = build_service(
        Arc::new(FailingRepository::new(h.repo.clone(), Fault::Confirm)),
        h.cache.clone(),
        4,
    );

    let err = service.update_confirm(a, true).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Internal);
    assert!(!h.stored_group(a).await.is_confirmed);
    assert!(!h.cached_group(b).await.unwrap().is_confirmed);

    // the group is still open, so members can still leave
    h.service.leave(b).await.unwrap();
    h.assert_invariants(4).await;
}
