//! The audit hook point
//!
//! Append-only records of who did what, written after the domain operation
//! completes, on success and on failure alike. Record *content* design is
//! out of scope here; this is only the hook and its sink contract.

use parking_lot::Mutex;
use pitboss_core::{ErrorCode, RequestId, StaffId, TenantId};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// How the operation ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditOutcome {
    /// The operation committed
    Success,
    /// The operation failed with the given stable code
    Failure(ErrorCode),
}

/// One append-only audit entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    /// Request this entry belongs to
    pub request: RequestId,
    /// Acting staff member, when resolution got that far
    pub actor: Option<StaffId>,
    /// Tenant, when resolution got that far
    pub tenant: Option<TenantId>,
    /// Operation name as declared by the caller or the privileged op
    pub operation: String,
    /// Success or failure with code
    pub outcome: AuditOutcome,
    /// Milliseconds since the Unix epoch
    pub at_ms: u64,
}

/// Where audit entries go
///
/// Append and read-back only; no update or delete is exposed, matching the
/// append-only posture of the audit log itself.
pub trait AuditSink: Send + Sync {
    /// Append one entry
    fn append(&self, record: AuditRecord);

    /// All entries appended so far, oldest first
    fn entries(&self) -> Vec<AuditRecord>;
}

/// In-memory audit sink
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    entries: Mutex<Vec<AuditRecord>>,
}

impl MemoryAuditSink {
    /// Create an empty sink
    pub fn new() -> Self {
        Self::default()
    }
}

impl AuditSink for MemoryAuditSink {
    fn append(&self, record: AuditRecord) {
        self.entries.lock().push(record);
    }

    fn entries(&self) -> Vec<AuditRecord> {
        self.entries.lock().clone()
    }
}

/// Current wall-clock time in milliseconds since the epoch
pub(crate) fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sink_preserves_append_order() {
        let sink = MemoryAuditSink::new();
        for operation in ["first", "second", "third"] {
            sink.append(AuditRecord {
                request: RequestId::new(),
                actor: None,
                tenant: None,
                operation: operation.into(),
                outcome: AuditOutcome::Success,
                at_ms: now_ms(),
            });
        }
        let names: Vec<_> = sink.entries().into_iter().map(|e| e.operation).collect();
        assert_eq!(names, ["first", "second", "third"]);
    }
}
