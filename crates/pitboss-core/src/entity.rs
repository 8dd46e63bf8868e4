//! Entity kinds the policy engine dispatches on
//!
//! Every stored row carries exactly one kind. The kind is the static tag the
//! policy engine uses to select an access rule; there is no runtime string
//! matching anywhere in the dispatch path.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Floor entity kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// A player's active table session
    PlayerSession,
    /// A staff member's shift assignment
    ShiftAssignment,
    /// A complimentary issued to a player
    CompIssuance,
    /// A credit marker; write-once after issuance
    CreditMarker,
    /// An append-only loyalty ledger adjustment
    LoyaltyAdjustment,
    /// The append-only audit log itself
    AuditLog,
}

impl EntityKind {
    /// All kinds, in registration order
    pub const ALL: [EntityKind; 6] = [
        EntityKind::PlayerSession,
        EntityKind::ShiftAssignment,
        EntityKind::CompIssuance,
        EntityKind::CreditMarker,
        EntityKind::LoyaltyAdjustment,
        EntityKind::AuditLog,
    ];

    /// Stable snake_case name used in logs and audit records
    pub fn name(&self) -> &'static str {
        match self {
            EntityKind::PlayerSession => "player_session",
            EntityKind::ShiftAssignment => "shift_assignment",
            EntityKind::CompIssuance => "comp_issuance",
            EntityKind::CreditMarker => "credit_marker",
            EntityKind::LoyaltyAdjustment => "loyalty_adjustment",
            EntityKind::AuditLog => "audit_log",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
