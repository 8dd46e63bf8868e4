//! Policy evaluation
//!
//! Evaluation takes the entity's rule, derives the effective (tenant, role)
//! according to the rule's family, and checks the row's tenant plus the
//! mutation gates. The deny path is always loud: a context-only rule that
//! finds no injected context produces a `CONTEXT_MISMATCH` error, never an
//! empty result.

use crate::family::PolicyFamily;
use crate::rules::{floor_rules, PolicyRule};
use pitboss_core::{Claims, EntityKind, PitError, Result, Role, StaffId, TenantId};
use pitboss_registry::ResolvedContext;
use std::collections::HashMap;
use tracing::{debug, warn};

/// The kind of mutation being attempted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationKind {
    /// Insert a new row
    Insert,
    /// Update an existing row
    Update,
    /// Delete an existing row
    Delete,
}

impl MutationKind {
    fn verb(&self) -> &'static str {
        match self {
            MutationKind::Insert => "insert",
            MutationKind::Update => "update",
            MutationKind::Delete => "delete",
        }
    }
}

/// Evaluation input: verified claims plus the transaction's injected context
///
/// The context half is always the transaction's own slot; there is no
/// ambient lookup. A subject with `context: None` models a statement running
/// without injection (e.g. a chain round trip whose injection stage failed).
#[derive(Debug, Clone, Copy)]
pub struct AccessSubject<'a> {
    /// Signed claims from the authenticated principal
    pub claims: &'a Claims,
    /// The transaction's injected context, if any
    pub context: Option<&'a ResolvedContext>,
}

impl<'a> AccessSubject<'a> {
    /// Subject with injected context
    pub fn new(claims: &'a Claims, context: Option<&'a ResolvedContext>) -> Self {
        Self { claims, context }
    }

    /// Subject with claims only (no injection happened)
    pub fn claims_only(claims: &'a Claims) -> Self {
        Self {
            claims,
            context: None,
        }
    }
}

/// Why an access was denied
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DenyReason {
    /// A context-only rule found no injected context
    MissingContext,
    /// The effective tenant does not match the row's tenant
    TenantMismatch {
        /// Tenant the subject resolved to
        effective: TenantId,
        /// Tenant the row belongs to
        row: TenantId,
    },
    /// The effective role is below the rule's write threshold
    RoleInsufficient {
        /// Minimum role the rule requires
        required: Role,
        /// Role the subject resolved to
        actual: Role,
    },
    /// The rule forbids this mutation kind for the entity
    MutationForbidden {
        /// Which mutation was attempted
        mutation: MutationKind,
    },
}

/// Result of evaluating one access
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Access is allowed
    Allow,
    /// Access is denied for the given reason
    Deny(DenyReason),
}

/// Per-entity rule registry and evaluation
pub struct PolicyEngine {
    rules: HashMap<EntityKind, PolicyRule>,
}

impl Default for PolicyEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl PolicyEngine {
    /// Engine with the builtin floor rule set
    pub fn new() -> Self {
        let rules = EntityKind::ALL
            .into_iter()
            .map(|kind| (kind, floor_rules(kind)))
            .collect();
        Self { rules }
    }

    /// Replace the rule for one entity kind
    pub fn register(&mut self, kind: EntityKind, rule: PolicyRule) {
        self.rules.insert(kind, rule);
    }

    /// The rule registered for a kind
    pub fn rule(&self, kind: EntityKind) -> &PolicyRule {
        // `new` registers every kind and `register` only replaces.
        self.rules
            .get(&kind)
            .expect("every entity kind has a registered rule")
    }

    /// Evaluate a row read
    pub fn evaluate_read(
        &self,
        kind: EntityKind,
        subject: AccessSubject<'_>,
        row_tenant: TenantId,
    ) -> Decision {
        let rule = self.rule(kind);
        let effective = match self.effective_tenant(rule, subject) {
            Ok(tenant) => tenant,
            Err(deny) => return Decision::Deny(deny),
        };
        if effective != row_tenant {
            return Decision::Deny(DenyReason::TenantMismatch {
                effective,
                row: row_tenant,
            });
        }
        Decision::Allow
    }

    /// Evaluate a row mutation
    pub fn evaluate_write(
        &self,
        kind: EntityKind,
        mutation: MutationKind,
        subject: AccessSubject<'_>,
        row_tenant: TenantId,
    ) -> Decision {
        let rule = self.rule(kind);

        let permitted = match mutation {
            MutationKind::Insert => rule.allow_insert,
            MutationKind::Update => rule.allow_update,
            MutationKind::Delete => rule.allow_delete,
        };
        if !permitted {
            return Decision::Deny(DenyReason::MutationForbidden { mutation });
        }

        let (_, effective_tenant, effective_role) = match self.effective_identity(rule, subject) {
            Ok(triple) => triple,
            Err(deny) => return Decision::Deny(deny),
        };

        if effective_tenant != row_tenant {
            return Decision::Deny(DenyReason::TenantMismatch {
                effective: effective_tenant,
                row: row_tenant,
            });
        }

        if !effective_role.at_least(rule.min_write_role) {
            return Decision::Deny(DenyReason::RoleInsufficient {
                required: rule.min_write_role,
                actual: effective_role,
            });
        }

        Decision::Allow
    }

    /// Read check mapped to the error taxonomy
    pub fn check_read(
        &self,
        kind: EntityKind,
        subject: AccessSubject<'_>,
        row_tenant: TenantId,
    ) -> Result<()> {
        match self.evaluate_read(kind, subject, row_tenant) {
            Decision::Allow => Ok(()),
            Decision::Deny(reason) => {
                debug!(entity = %kind, ?reason, "read denied");
                Err(self.deny_error(kind, "read", reason))
            }
        }
    }

    /// Write check mapped to the error taxonomy
    pub fn check_write(
        &self,
        kind: EntityKind,
        mutation: MutationKind,
        subject: AccessSubject<'_>,
        row_tenant: TenantId,
    ) -> Result<()> {
        match self.evaluate_write(kind, mutation, subject, row_tenant) {
            Decision::Allow => Ok(()),
            Decision::Deny(reason) => {
                warn!(entity = %kind, mutation = mutation.verb(), ?reason, "write denied");
                Err(self.deny_error(kind, mutation.verb(), reason))
            }
        }
    }

    /// The identity a statement on `kind` acts as, mapped to the error
    /// taxonomy
    ///
    /// The store uses this to derive the tenant and actor of new rows; they
    /// are outputs of policy evaluation, never caller parameters.
    pub fn effective(
        &self,
        kind: EntityKind,
        subject: AccessSubject<'_>,
    ) -> Result<(StaffId, TenantId, Role)> {
        self.effective_identity(self.rule(kind), subject)
            .map_err(|reason| self.deny_error(kind, "statement", reason))
    }

    /// Effective (actor, tenant, role) per the rule's family
    ///
    /// Fixed precedence for hybrid: resolved context wins if present; claims
    /// are the fallback, never the override.
    fn effective_identity(
        &self,
        rule: &PolicyRule,
        subject: AccessSubject<'_>,
    ) -> std::result::Result<(StaffId, TenantId, Role), DenyReason> {
        match rule.family {
            PolicyFamily::ClaimsOnly => Ok((
                subject.claims.staff,
                subject.claims.tenant,
                subject.claims.role,
            )),
            PolicyFamily::HybridFallback => match subject.context {
                Some(ctx) => Ok((ctx.actor(), ctx.tenant(), ctx.role())),
                None => Ok((
                    subject.claims.staff,
                    subject.claims.tenant,
                    subject.claims.role,
                )),
            },
            PolicyFamily::ContextOnly => match subject.context {
                Some(ctx) => Ok((ctx.actor(), ctx.tenant(), ctx.role())),
                None => Err(DenyReason::MissingContext),
            },
        }
    }

    fn effective_tenant(
        &self,
        rule: &PolicyRule,
        subject: AccessSubject<'_>,
    ) -> std::result::Result<TenantId, DenyReason> {
        self.effective_identity(rule, subject).map(|(_, t, _)| t)
    }

    /// Map a deny to the error taxonomy
    ///
    /// Context-only denials are context mismatches (the privileged path must
    /// treat them as fatal); everything else is a plain rights failure.
    fn deny_error(&self, kind: EntityKind, verb: &str, reason: DenyReason) -> PitError {
        let context_only = self.rule(kind).family == PolicyFamily::ContextOnly;
        match reason {
            DenyReason::MissingContext => PitError::context_mismatch(format!(
                "{verb} on {kind} requires injected context and none is present"
            )),
            DenyReason::TenantMismatch { effective, row } if context_only => {
                PitError::context_mismatch(format!(
                    "{verb} on {kind}: resolved tenant {effective} does not match row tenant {row}"
                ))
            }
            DenyReason::TenantMismatch { .. } => {
                PitError::forbidden(format!("{verb} on {kind}: tenant mismatch"))
            }
            DenyReason::RoleInsufficient { required, actual } => PitError::forbidden(format!(
                "{verb} on {kind} requires role {required}, caller has {actual}"
            )),
            DenyReason::MutationForbidden { mutation } => PitError::forbidden(format!(
                "{} is not permitted on {kind}",
                mutation.verb()
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pitboss_core::ErrorCode;
    use pitboss_testkit::FloorFixture;

    #[tokio::test]
    async fn claims_only_read_filters_by_claims_tenant() {
        let fixture = FloorFixture::new();
        let tenant_a = TenantId::new();
        let tenant_b = TenantId::new();
        let staff = fixture.staff(tenant_a, Role::Supervisor);
        let engine = PolicyEngine::new();

        let subject = AccessSubject::claims_only(staff.principal.claims());
        assert_eq!(
            engine.evaluate_read(EntityKind::ShiftAssignment, subject, tenant_a),
            Decision::Allow
        );
        assert!(matches!(
            engine.evaluate_read(EntityKind::ShiftAssignment, subject, tenant_b),
            Decision::Deny(DenyReason::TenantMismatch { .. })
        ));
    }

    #[tokio::test]
    async fn hybrid_context_wins_over_claims() {
        let fixture = FloorFixture::new();
        let tenant = TenantId::new();
        let staff = fixture.staff(tenant, Role::Dealer);

        // Registry moves the staff member to a new tenant after issuance;
        // the claims still carry the old tenant.
        let new_tenant = TenantId::new();
        let mut moved = staff.record.clone();
        moved.tenant_id = new_tenant;
        fixture.directory.upsert(moved);
        let ctx = fixture.resolve(&staff).await.unwrap();
        assert_eq!(ctx.tenant(), new_tenant);

        let engine = PolicyEngine::new();
        let subject = AccessSubject::new(staff.principal.claims(), Some(&ctx));

        // Context (new tenant) wins; the claims tenant no longer matches.
        assert_eq!(
            engine.evaluate_read(EntityKind::PlayerSession, subject, new_tenant),
            Decision::Allow
        );
        assert!(matches!(
            engine.evaluate_read(EntityKind::PlayerSession, subject, tenant),
            Decision::Deny(DenyReason::TenantMismatch { .. })
        ));
    }

    #[tokio::test]
    async fn hybrid_falls_back_to_claims_without_context() {
        let fixture = FloorFixture::new();
        let tenant = TenantId::new();
        let staff = fixture.staff(tenant, Role::Dealer);
        let engine = PolicyEngine::new();

        let subject = AccessSubject::claims_only(staff.principal.claims());
        assert_eq!(
            engine.evaluate_write(
                EntityKind::PlayerSession,
                MutationKind::Insert,
                subject,
                tenant
            ),
            Decision::Allow
        );
    }

    #[tokio::test]
    async fn context_only_without_context_is_context_mismatch() {
        let fixture = FloorFixture::new();
        let tenant = TenantId::new();
        let staff = fixture.staff(tenant, Role::Supervisor);
        let engine = PolicyEngine::new();

        let subject = AccessSubject::claims_only(staff.principal.claims());
        let err = engine
            .check_write(
                EntityKind::CreditMarker,
                MutationKind::Insert,
                subject,
                tenant,
            )
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::ContextMismatch);
    }

    #[tokio::test]
    async fn context_only_tenant_mismatch_is_context_mismatch() {
        let fixture = FloorFixture::new();
        let tenant_a = TenantId::new();
        let tenant_b = TenantId::new();
        let staff = fixture.staff(tenant_a, Role::Supervisor);
        let ctx = fixture.resolve(&staff).await.unwrap();
        let engine = PolicyEngine::new();

        let subject = AccessSubject::new(staff.principal.claims(), Some(&ctx));
        let err = engine
            .check_write(
                EntityKind::CreditMarker,
                MutationKind::Insert,
                subject,
                tenant_b,
            )
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::ContextMismatch);
    }

    #[tokio::test]
    async fn write_role_gates_apply() {
        let fixture = FloorFixture::new();
        let tenant = TenantId::new();
        let dealer = fixture.staff(tenant, Role::Dealer);
        let supervisor = fixture.staff(tenant, Role::Supervisor);
        let engine = PolicyEngine::new();

        let dealer_ctx = fixture.resolve(&dealer).await.unwrap();
        let dealer_subject = AccessSubject::new(dealer.principal.claims(), Some(&dealer_ctx));
        let err = engine
            .check_write(
                EntityKind::CreditMarker,
                MutationKind::Insert,
                dealer_subject,
                tenant,
            )
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::Forbidden);

        let sup_ctx = fixture.resolve(&supervisor).await.unwrap();
        let sup_subject = AccessSubject::new(supervisor.principal.claims(), Some(&sup_ctx));
        assert!(engine
            .check_write(
                EntityKind::CreditMarker,
                MutationKind::Insert,
                sup_subject,
                tenant,
            )
            .is_ok());
    }

    #[tokio::test]
    async fn write_once_and_append_only_are_enforced_by_rule() {
        let fixture = FloorFixture::new();
        let tenant = TenantId::new();
        let manager = fixture.staff(tenant, Role::PitManager);
        let ctx = fixture.resolve(&manager).await.unwrap();
        let engine = PolicyEngine::new();
        let subject = AccessSubject::new(manager.principal.claims(), Some(&ctx));

        // Markers are write-once: no update even for a pit manager.
        assert!(matches!(
            engine.evaluate_write(
                EntityKind::CreditMarker,
                MutationKind::Update,
                subject,
                tenant
            ),
            Decision::Deny(DenyReason::MutationForbidden { .. })
        ));
        // Loyalty adjustments are append-only: no delete.
        assert!(matches!(
            engine.evaluate_write(
                EntityKind::LoyaltyAdjustment,
                MutationKind::Delete,
                subject,
                tenant
            ),
            Decision::Deny(DenyReason::MutationForbidden { .. })
        ));
    }

    #[tokio::test]
    async fn audit_log_rejects_generic_inserts() {
        let fixture = FloorFixture::new();
        let tenant = TenantId::new();
        let manager = fixture.staff(tenant, Role::PitManager);
        let engine = PolicyEngine::new();
        let subject = AccessSubject::claims_only(manager.principal.claims());

        let err = engine
            .check_write(EntityKind::AuditLog, MutationKind::Insert, subject, tenant)
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::Forbidden);
    }
}
