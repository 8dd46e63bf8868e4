//! Transaction behavior: policy-filtered visibility, loud zero-row
//! mutations, idempotency uniqueness, and lock release.

use pitboss_core::{EntityKind, ErrorCode, Role, TenantId};
use pitboss_policy::PolicyEngine;
use pitboss_store::{Database, Pool, PoolConfig};
use pitboss_testkit::FloorFixture;
use serde_json::json;
use std::sync::Arc;

fn pool(connections: usize) -> Pool {
    Pool::new(
        Arc::new(Database::new()),
        Arc::new(PolicyEngine::new()),
        PoolConfig { connections },
    )
}

#[tokio::test]
async fn insert_is_scoped_to_resolved_tenant() {
    let fixture = FloorFixture::new();
    let tenant_a = TenantId::new();
    let tenant_b = TenantId::new();
    let staff_a = fixture.staff(tenant_a, Role::Dealer);
    let staff_b = fixture.staff(tenant_b, Role::Dealer);
    let pool = pool(2);

    let mut txn = pool.begin(staff_a.principal.claims()).await.unwrap();
    txn.inject(fixture.resolve_ok(&staff_a).await).unwrap();
    let id = txn
        .insert(EntityKind::PlayerSession, json!({"table": 7}), None)
        .unwrap();
    txn.commit().unwrap();

    // Tenant A sees the row.
    let mut txn_a = pool.begin(staff_a.principal.claims()).await.unwrap();
    txn_a.inject(fixture.resolve_ok(&staff_a).await).unwrap();
    assert!(txn_a.get(EntityKind::PlayerSession, id).unwrap().is_some());
    txn_a.rollback();

    // Tenant B does not, through get or list.
    let mut txn_b = pool.begin(staff_b.principal.claims()).await.unwrap();
    txn_b.inject(fixture.resolve_ok(&staff_b).await).unwrap();
    assert!(txn_b.get(EntityKind::PlayerSession, id).unwrap().is_none());
    assert!(txn_b.list(EntityKind::PlayerSession).unwrap().is_empty());
    txn_b.rollback();
}

#[tokio::test]
async fn row_creator_comes_from_resolution_not_claims() {
    let fixture = FloorFixture::new();
    let tenant = TenantId::new();
    let staff = fixture.staff(tenant, Role::Dealer);
    let pool = pool(1);

    let ctx = fixture.resolve_ok(&staff).await;
    let actor = ctx.actor();
    let mut txn = pool.begin(staff.principal.claims()).await.unwrap();
    txn.inject(ctx).unwrap();
    txn.insert(EntityKind::PlayerSession, json!({}), None).unwrap();
    txn.commit().unwrap();

    let rows = pool.database().raw_rows(EntityKind::PlayerSession);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].created_by, actor);
    assert_eq!(rows[0].tenant, tenant);
}

#[tokio::test]
async fn context_only_insert_without_injection_is_loud() {
    let fixture = FloorFixture::new();
    let staff = fixture.staff(TenantId::new(), Role::Supervisor);
    let pool = pool(1);

    let mut txn = pool.begin(staff.principal.claims()).await.unwrap();
    // No inject: context-only entities must refuse, not no-op.
    let err = txn
        .insert(EntityKind::CreditMarker, json!({"amount": 5000}), None)
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::ContextMismatch);
    assert!(pool.database().raw_rows(EntityKind::CreditMarker).is_empty());
}

#[tokio::test]
async fn update_of_invisible_row_is_precondition_failure() {
    let fixture = FloorFixture::new();
    let tenant_a = TenantId::new();
    let tenant_b = TenantId::new();
    let staff_a = fixture.staff(tenant_a, Role::Dealer);
    let staff_b = fixture.staff(tenant_b, Role::Dealer);
    let pool = pool(2);

    let mut txn = pool.begin(staff_a.principal.claims()).await.unwrap();
    txn.inject(fixture.resolve_ok(&staff_a).await).unwrap();
    let id = txn
        .insert(EntityKind::PlayerSession, json!({"table": 1}), None)
        .unwrap();
    txn.commit().unwrap();

    // Tenant B tries to update tenant A's row: zero rows, hard error.
    let mut txn_b = pool.begin(staff_b.principal.claims()).await.unwrap();
    txn_b.inject(fixture.resolve_ok(&staff_b).await).unwrap();
    let err = txn_b
        .update(EntityKind::PlayerSession, id, json!({"table": 99}))
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::PreconditionFailed);

    // The row is untouched.
    let rows = pool.database().raw_rows(EntityKind::PlayerSession);
    assert_eq!(rows[0].payload, json!({"table": 1}));
}

#[tokio::test]
async fn write_once_marker_rejects_update_even_in_tenant() {
    let fixture = FloorFixture::new();
    let tenant = TenantId::new();
    let staff = fixture.staff(tenant, Role::Supervisor);
    let pool = pool(1);

    let mut txn = pool.begin(staff.principal.claims()).await.unwrap();
    txn.inject(fixture.resolve_ok(&staff).await).unwrap();
    let id = txn
        .insert(EntityKind::CreditMarker, json!({"amount": 5000}), None)
        .unwrap();
    txn.commit().unwrap();

    let mut txn2 = pool.begin(staff.principal.claims()).await.unwrap();
    txn2.inject(fixture.resolve_ok(&staff).await).unwrap();
    let err = txn2
        .update(EntityKind::CreditMarker, id, json!({"amount": 1}))
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::Forbidden);
}

#[tokio::test]
async fn duplicate_idempotency_key_conflicts() {
    let fixture = FloorFixture::new();
    let tenant = TenantId::new();
    let staff = fixture.staff(tenant, Role::Supervisor);
    let pool = pool(2);

    let mut txn = pool.begin(staff.principal.claims()).await.unwrap();
    txn.inject(fixture.resolve_ok(&staff).await).unwrap();
    txn.insert(
        EntityKind::CreditMarker,
        json!({"amount": 5000}),
        Some("marker-001".into()),
    )
    .unwrap();
    txn.commit().unwrap();

    let mut retry = pool.begin(staff.principal.claims()).await.unwrap();
    retry.inject(fixture.resolve_ok(&staff).await).unwrap();
    let err = retry
        .insert(
            EntityKind::CreditMarker,
            json!({"amount": 5000}),
            Some("marker-001".into()),
        )
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::Conflict);
    assert_eq!(pool.database().raw_rows(EntityKind::CreditMarker).len(), 1);
}

#[tokio::test]
async fn racing_idempotent_inserts_commit_exactly_once() {
    let fixture = FloorFixture::new();
    let tenant = TenantId::new();
    let staff = fixture.staff(tenant, Role::Supervisor);
    let pool = pool(2);

    // Both transactions stage the same key before either commits; the
    // commit-time uniqueness check must let exactly one through.
    let mut first = pool.begin(staff.principal.claims()).await.unwrap();
    first.inject(fixture.resolve_ok(&staff).await).unwrap();
    first
        .insert(EntityKind::CreditMarker, json!({}), Some("race".into()))
        .unwrap();

    let mut second = pool.begin(staff.principal.claims()).await.unwrap();
    second.inject(fixture.resolve_ok(&staff).await).unwrap();
    second
        .insert(EntityKind::CreditMarker, json!({}), Some("race".into()))
        .unwrap();

    assert!(first.commit().is_ok());
    let err = second.commit().unwrap_err();
    assert_eq!(err.code(), ErrorCode::Conflict);
    assert_eq!(pool.database().raw_rows(EntityKind::CreditMarker).len(), 1);
}

#[tokio::test]
async fn rollback_discards_staged_writes_and_locks() {
    let fixture = FloorFixture::new();
    let tenant = TenantId::new();
    let staff = fixture.staff(tenant, Role::Dealer);
    let pool = pool(2);

    let mut txn = pool.begin(staff.principal.claims()).await.unwrap();
    txn.inject(fixture.resolve_ok(&staff).await).unwrap();
    let id = txn
        .insert(EntityKind::PlayerSession, json!({"table": 2}), None)
        .unwrap();
    txn.commit().unwrap();

    let mut doomed = pool.begin(staff.principal.claims()).await.unwrap();
    doomed.inject(fixture.resolve_ok(&staff).await).unwrap();
    doomed
        .update(EntityKind::PlayerSession, id, json!({"table": 3}))
        .unwrap();
    let claimed = doomed.claim_rows(EntityKind::PlayerSession, 10).unwrap();
    assert_eq!(claimed.len(), 1);
    doomed.rollback();

    // Update discarded, lock released.
    let rows = pool.database().raw_rows(EntityKind::PlayerSession);
    assert_eq!(rows[0].payload, json!({"table": 2}));
    let mut next = pool.begin(staff.principal.claims()).await.unwrap();
    next.inject(fixture.resolve_ok(&staff).await).unwrap();
    assert_eq!(next.claim_rows(EntityKind::PlayerSession, 10).unwrap().len(), 1);
}

#[tokio::test]
async fn claim_rows_skips_rows_locked_by_concurrent_transaction() {
    let fixture = FloorFixture::new();
    let tenant = TenantId::new();
    let staff = fixture.staff(tenant, Role::Dealer);
    let pool = pool(2);

    let mut seed = pool.begin(staff.principal.claims()).await.unwrap();
    seed.inject(fixture.resolve_ok(&staff).await).unwrap();
    for table in 0..4 {
        seed.insert(EntityKind::PlayerSession, json!({ "table": table }), None)
            .unwrap();
    }
    seed.commit().unwrap();

    let mut worker_a = pool.begin(staff.principal.claims()).await.unwrap();
    worker_a.inject(fixture.resolve_ok(&staff).await).unwrap();
    let mut worker_b = pool.begin(staff.principal.claims()).await.unwrap();
    worker_b.inject(fixture.resolve_ok(&staff).await).unwrap();

    let a_rows = worker_a.claim_rows(EntityKind::PlayerSession, 2).unwrap();
    let b_rows = worker_b.claim_rows(EntityKind::PlayerSession, 4).unwrap();

    assert_eq!(a_rows.len(), 2);
    // B skips A's locked rows instead of blocking on them.
    assert_eq!(b_rows.len(), 2);
    let mut all: Vec<_> = a_rows.iter().chain(b_rows.iter()).map(|r| r.id).collect();
    all.sort_unstable();
    all.dedup();
    assert_eq!(all.len(), 4, "no row claimed twice");
}

#[tokio::test]
async fn claimed_row_rejects_concurrent_update() {
    let fixture = FloorFixture::new();
    let tenant = TenantId::new();
    let staff = fixture.staff(tenant, Role::Dealer);
    let pool = pool(3);

    let mut seed = pool.begin(staff.principal.claims()).await.unwrap();
    seed.inject(fixture.resolve_ok(&staff).await).unwrap();
    let id = seed
        .insert(EntityKind::PlayerSession, json!({"table": 5}), None)
        .unwrap();
    seed.commit().unwrap();

    // A worker claims the row; a plain update from another transaction
    // must conflict, not clobber the claimed row.
    let mut worker = pool.begin(staff.principal.claims()).await.unwrap();
    worker.inject(fixture.resolve_ok(&staff).await).unwrap();
    assert_eq!(worker.claim_rows(EntityKind::PlayerSession, 1).unwrap().len(), 1);

    let mut writer = pool.begin(staff.principal.claims()).await.unwrap();
    writer.inject(fixture.resolve_ok(&staff).await).unwrap();
    let err = writer
        .update(EntityKind::PlayerSession, id, json!({"table": 99}))
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::Conflict);
    let err = writer.delete(EntityKind::PlayerSession, id).unwrap_err();
    assert_eq!(err.code(), ErrorCode::Conflict);
    writer.rollback();

    let rows = pool.database().raw_rows(EntityKind::PlayerSession);
    assert_eq!(rows[0].payload, json!({"table": 5}));

    // Once the claim is released the write goes through.
    worker.rollback();
    let mut retry = pool.begin(staff.principal.claims()).await.unwrap();
    retry.inject(fixture.resolve_ok(&staff).await).unwrap();
    retry
        .update(EntityKind::PlayerSession, id, json!({"table": 99}))
        .unwrap();
    retry.commit().unwrap();
    let rows = pool.database().raw_rows(EntityKind::PlayerSession);
    assert_eq!(rows[0].payload, json!({"table": 99}));
}

#[tokio::test]
async fn staged_write_excludes_later_claim_and_still_commits() {
    let fixture = FloorFixture::new();
    let tenant = TenantId::new();
    let staff = fixture.staff(tenant, Role::Dealer);
    let pool = pool(2);

    let mut seed = pool.begin(staff.principal.claims()).await.unwrap();
    seed.inject(fixture.resolve_ok(&staff).await).unwrap();
    let id = seed
        .insert(EntityKind::PlayerSession, json!({"table": 8}), None)
        .unwrap();
    seed.commit().unwrap();

    let mut writer = pool.begin(staff.principal.claims()).await.unwrap();
    writer.inject(fixture.resolve_ok(&staff).await).unwrap();
    writer
        .update(EntityKind::PlayerSession, id, json!({"table": 1}))
        .unwrap();
    // The writer's stage-time lock excludes the claimer.
    let mut worker = pool.begin(staff.principal.claims()).await.unwrap();
    worker.inject(fixture.resolve_ok(&staff).await).unwrap();
    assert!(worker.claim_rows(EntityKind::PlayerSession, 1).unwrap().is_empty());

    // The writer still holds the lock, so its commit lands.
    assert!(writer.commit().is_ok());
    let rows = pool.database().raw_rows(EntityKind::PlayerSession);
    assert_eq!(rows[0].payload, json!({"table": 1}));
}

#[tokio::test]
async fn double_injection_is_rejected() {
    let fixture = FloorFixture::new();
    let staff = fixture.staff(TenantId::new(), Role::Dealer);
    let pool = pool(1);

    let mut txn = pool.begin(staff.principal.claims()).await.unwrap();
    txn.inject(fixture.resolve_ok(&staff).await).unwrap();
    let err = txn.inject(fixture.resolve_ok(&staff).await).unwrap_err();
    assert_eq!(err.code(), ErrorCode::Invalid);
}
