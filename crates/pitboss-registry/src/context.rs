//! The resolved (actor, tenant, role) triple
//!
//! Lifecycle: created by the resolver at the start of a transaction that
//! needs it, carried explicitly through that transaction, discarded with it.
//! Never persisted, never returned to the caller, never accepted as input.

use pitboss_core::{Role, StaffId, TenantId};

/// The authoritative context for one transaction
///
/// Fields are private and the only constructor is `pub(crate)`: a
/// `ResolvedContext` can only come out of
/// [`IdentityResolver::resolve`](crate::IdentityResolver::resolve), which
/// makes "caller supplies a tenant and we validate it" unrepresentable.
///
/// Deliberately not `Serialize`: this value must never cross a wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedContext {
    actor: StaffId,
    tenant: TenantId,
    role: Role,
}

impl ResolvedContext {
    pub(crate) fn new(actor: StaffId, tenant: TenantId, role: Role) -> Self {
        Self {
            actor,
            tenant,
            role,
        }
    }

    /// The acting staff member
    pub fn actor(&self) -> StaffId {
        self.actor
    }

    /// The tenant the actor belongs to
    pub fn tenant(&self) -> TenantId {
        self.tenant
    }

    /// The actor's current role per the registry
    pub fn role(&self) -> Role {
        self.role
    }
}
