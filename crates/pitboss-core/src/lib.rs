//! # Pitboss Core - Shared Types
//!
//! Fundamental types used across the Pitboss workspace: newtype identifiers,
//! the unified error type with stable wire codes, signed-claims tokens, and
//! the entity-kind tags the policy engine dispatches on.

pub mod claims;
pub mod entity;
pub mod errors;
pub mod identifiers;

pub use claims::{Claims, Principal, Role, SignedToken, TokenKey};
pub use entity::EntityKind;
pub use errors::{ErrorCode, PitError, Result};
pub use identifiers::{PrincipalId, RequestId, RowId, StaffId, TenantId};
