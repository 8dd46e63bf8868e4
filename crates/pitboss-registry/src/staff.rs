//! The authoritative staff registry
//!
//! One record per staff member, keyed by the principal id issued at
//! authentication time. Every directory write bumps a generation counter so
//! resolver caches can detect staleness eagerly instead of waiting out the
//! TTL.

use async_trait::async_trait;
use parking_lot::RwLock;
use pitboss_core::{PitError, PrincipalId, Result, Role, StaffId, TenantId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Whether a staff member may currently act
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StaffStatus {
    /// May resolve and act
    Active,
    /// Exists but must not resolve; deactivation must take effect promptly
    Inactive,
}

/// A registry entry: the single source of truth for (tenant, role)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaffRecord {
    /// Staff identity within the tenant
    pub staff_id: StaffId,
    /// The tenant this staff member belongs to
    pub tenant_id: TenantId,
    /// Current role; claims may lag behind this
    pub role: Role,
    /// Active/inactive gate checked on every resolution
    pub status: StaffStatus,
    /// Back-reference to the authenticated principal
    pub principal_id: PrincipalId,
}

/// Read access to the staff registry
///
/// `generation` increments on every write, letting callers detect that a
/// cached record may be stale without re-reading the record itself.
#[async_trait]
pub trait StaffDirectory: Send + Sync {
    /// Look up the record for a principal, if any
    async fn find_by_principal(&self, principal: PrincipalId) -> Result<Option<StaffRecord>>;

    /// Monotonic write counter for cache invalidation
    fn generation(&self) -> u64;
}

/// In-memory staff directory
///
/// The production deployment backs this trait with the HR system of record;
/// the in-memory form serves tests and single-node setups.
#[derive(Debug, Default)]
pub struct InMemoryStaffDirectory {
    records: RwLock<HashMap<PrincipalId, StaffRecord>>,
    generation: AtomicU64,
}

impl InMemoryStaffDirectory {
    /// Create an empty directory
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a record
    pub fn upsert(&self, record: StaffRecord) {
        self.records
            .write()
            .insert(record.principal_id, record);
        self.generation.fetch_add(1, Ordering::Release);
    }

    /// Mark a staff member inactive
    ///
    /// Errors with `INVALID` if the principal has no record; silently
    /// "deactivating" a missing record would hide registry drift.
    pub fn deactivate(&self, principal: PrincipalId) -> Result<()> {
        let mut records = self.records.write();
        let record = records
            .get_mut(&principal)
            .ok_or_else(|| PitError::invalid(format!("no staff record for {principal}")))?;
        record.status = StaffStatus::Inactive;
        drop(records);
        self.generation.fetch_add(1, Ordering::Release);
        Ok(())
    }

    /// Change a staff member's role
    pub fn set_role(&self, principal: PrincipalId, role: Role) -> Result<()> {
        let mut records = self.records.write();
        let record = records
            .get_mut(&principal)
            .ok_or_else(|| PitError::invalid(format!("no staff record for {principal}")))?;
        record.role = role;
        drop(records);
        self.generation.fetch_add(1, Ordering::Release);
        Ok(())
    }
}

#[async_trait]
impl StaffDirectory for InMemoryStaffDirectory {
    async fn find_by_principal(&self, principal: PrincipalId) -> Result<Option<StaffRecord>> {
        Ok(self.records.read().get(&principal).cloned())
    }

    fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }
}
