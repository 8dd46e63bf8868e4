//! Stored rows

use pitboss_core::{EntityKind, RowId, StaffId, TenantId};
use serde::{Deserialize, Serialize};

/// Arbitrary entity payload
///
/// The core never interprets payloads; business rule computation lives
/// above this layer.
pub type RowPayload = serde_json::Value;

/// One stored row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row {
    /// Row identity
    pub id: RowId,
    /// Owning tenant; the unit of isolation
    pub tenant: TenantId,
    /// Entity kind the policy engine dispatches on
    pub kind: EntityKind,
    /// Staff member whose transaction inserted the row
    pub created_by: StaffId,
    /// Entity payload
    pub payload: RowPayload,
    /// Optional idempotency key; unique per (tenant, kind, key)
    pub idempotency_key: Option<String>,
    /// Bumped on every committed update
    pub version: u64,
}
