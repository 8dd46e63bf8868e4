//! Recorded responses for idempotent replay
//!
//! The store's uniqueness constraint on (tenant, kind, key) is what makes a
//! retried operation at-most-once effective; this ledger only preserves the
//! first response so a duplicate returns an observably equivalent result
//! instead of a bare conflict. Retention is bounded: once the ledger is
//! full, the oldest recorded response is evicted. Eviction cannot duplicate
//! a mutation - a retry arriving after the window gets the conflict.

use parking_lot::Mutex;
use pitboss_core::TenantId;
use pitboss_store::RowPayload;
use std::collections::{HashMap, VecDeque};

/// Responses retained before the oldest is evicted
const DEFAULT_RETENTION: usize = 4096;

#[derive(Debug)]
struct LedgerState {
    responses: HashMap<(TenantId, String), RowPayload>,
    order: VecDeque<(TenantId, String)>,
    retention: usize,
}

/// First-response ledger keyed by (tenant, idempotency key)
#[derive(Debug)]
pub struct IdempotencyLedger {
    state: Mutex<LedgerState>,
}

impl Default for IdempotencyLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl IdempotencyLedger {
    /// Ledger with the default retention window
    pub fn new() -> Self {
        Self::with_retention(DEFAULT_RETENTION)
    }

    /// Ledger retaining at most `retention` responses, oldest evicted first
    pub fn with_retention(retention: usize) -> Self {
        Self {
            state: Mutex::new(LedgerState {
                responses: HashMap::new(),
                order: VecDeque::new(),
                retention: retention.max(1),
            }),
        }
    }

    /// Record the first successful response for a key
    pub fn record(&self, tenant: TenantId, key: &str, response: RowPayload) {
        let mut state = self.state.lock();
        let full_key = (tenant, key.to_string());
        if state.responses.contains_key(&full_key) {
            return;
        }
        if state.order.len() == state.retention {
            if let Some(oldest) = state.order.pop_front() {
                state.responses.remove(&oldest);
            }
        }
        state.order.push_back(full_key.clone());
        state.responses.insert(full_key, response);
    }

    /// The recorded response for a key, if one is still retained
    pub fn replay(&self, tenant: TenantId, key: &str) -> Option<RowPayload> {
        self.state
            .lock()
            .responses
            .get(&(tenant, key.to_string()))
            .cloned()
    }
}
