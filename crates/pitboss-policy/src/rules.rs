//! The floor rule set
//!
//! One rule per entity kind. Write-once and append-only postures are
//! expressed as rule flags so the engine, not each call site, refuses
//! updates and deletes.

use crate::family::PolicyFamily;
use pitboss_core::{EntityKind, Role};

/// A named predicate attached to an entity kind
#[derive(Debug, Clone)]
pub struct PolicyRule {
    /// Trust posture for sourcing (tenant, role)
    pub family: PolicyFamily,
    /// Minimum role required for any mutation
    pub min_write_role: Role,
    /// Whether new rows may be inserted through the generic write path
    pub allow_insert: bool,
    /// Whether existing rows may be updated (false = write-once)
    pub allow_update: bool,
    /// Whether rows may be deleted (false = append-only)
    pub allow_delete: bool,
}

/// The builtin rule for an entity kind
///
/// High-sensitivity entities (credit markers, loyalty adjustments) are
/// context-only with no fallback; they mutate exclusively through privileged
/// operations. The audit log accepts no mutation at all through the generic
/// path - appends go through the audit sink.
pub fn floor_rules(kind: EntityKind) -> PolicyRule {
    match kind {
        EntityKind::PlayerSession => PolicyRule {
            family: PolicyFamily::HybridFallback,
            min_write_role: Role::Dealer,
            allow_insert: true,
            allow_update: true,
            allow_delete: true,
        },
        EntityKind::ShiftAssignment => PolicyRule {
            family: PolicyFamily::ClaimsOnly,
            min_write_role: Role::Supervisor,
            allow_insert: true,
            allow_update: true,
            allow_delete: true,
        },
        EntityKind::CompIssuance => PolicyRule {
            family: PolicyFamily::HybridFallback,
            min_write_role: Role::Supervisor,
            allow_insert: true,
            allow_update: true,
            allow_delete: false,
        },
        EntityKind::CreditMarker => PolicyRule {
            family: PolicyFamily::ContextOnly,
            min_write_role: Role::Supervisor,
            allow_insert: true,
            allow_update: false,
            allow_delete: false,
        },
        EntityKind::LoyaltyAdjustment => PolicyRule {
            family: PolicyFamily::ContextOnly,
            min_write_role: Role::PitManager,
            allow_insert: true,
            allow_update: false,
            allow_delete: false,
        },
        EntityKind::AuditLog => PolicyRule {
            family: PolicyFamily::ClaimsOnly,
            min_write_role: Role::PitManager,
            allow_insert: false,
            allow_update: false,
            allow_delete: false,
        },
    }
}
