//! Shared database state
//!
//! All transactions stage writes privately and apply them here on commit,
//! under a single write lock, so a commit is all-or-nothing. The database
//! also owns the row-lock registry used for non-blocking batch claims and
//! the idempotency index that enforces at-most-one application per
//! (tenant, kind, key).

use crate::row::Row;
use crate::transaction::{CommitReceipt, StagedWrite};
use parking_lot::{Mutex, RwLock};
use pitboss_core::{EntityKind, PitError, Result, RowId, TenantId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

type IdempotencyKey = (TenantId, EntityKind, String);

/// The in-memory store shared by every pooled connection
#[derive(Debug, Default)]
pub struct Database {
    tables: RwLock<HashMap<EntityKind, HashMap<RowId, Row>>>,
    idempotency: RwLock<HashMap<IdempotencyKey, RowId>>,
    locks: Mutex<HashMap<RowId, u64>>,
    next_txn: AtomicU64,
}

impl Database {
    /// Create an empty database
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn next_txn_id(&self) -> u64 {
        self.next_txn.fetch_add(1, Ordering::Relaxed)
    }

    pub(crate) fn get_row(&self, kind: EntityKind, id: RowId) -> Option<Row> {
        self.tables
            .read()
            .get(&kind)
            .and_then(|table| table.get(&id))
            .cloned()
    }

    pub(crate) fn rows_of(&self, kind: EntityKind) -> Vec<Row> {
        self.tables
            .read()
            .get(&kind)
            .map(|table| table.values().cloned().collect())
            .unwrap_or_default()
    }

    pub(crate) fn idempotency_hit(&self, key: &IdempotencyKey) -> Option<RowId> {
        self.idempotency.read().get(key).copied()
    }

    /// Try to lock a row for a transaction; false if another holds it
    pub(crate) fn try_lock(&self, row: RowId, txn: u64) -> bool {
        let mut locks = self.locks.lock();
        match locks.get(&row) {
            Some(&holder) if holder != txn => false,
            _ => {
                locks.insert(row, txn);
                true
            }
        }
    }

    pub(crate) fn release_locks(&self, txn: u64) {
        self.locks.lock().retain(|_, holder| *holder != txn);
    }

    /// Whether a different transaction holds the lock on a row
    fn locked_by_other(&self, row: RowId, txn: u64) -> bool {
        self.locks
            .lock()
            .get(&row)
            .map_or(false, |holder| *holder != txn)
    }

    /// Apply a transaction's staged writes atomically
    ///
    /// Validates every write against current state first (uniqueness,
    /// concurrent removal, claim locks held elsewhere), then mutates; a
    /// failed validation leaves the database untouched and the caller rolls
    /// back.
    pub(crate) fn apply(&self, writes: &[StagedWrite], txn: u64) -> Result<CommitReceipt> {
        let mut tables = self.tables.write();
        let mut idempotency = self.idempotency.write();

        // Validation pass.
        for write in writes {
            match write {
                StagedWrite::Insert(row) => {
                    if let Some(key) = &row.idempotency_key {
                        let full_key = (row.tenant, row.kind, key.clone());
                        if idempotency.contains_key(&full_key) {
                            return Err(PitError::conflict(format!(
                                "idempotency key already applied for {}",
                                row.kind
                            )));
                        }
                    }
                }
                StagedWrite::Update { kind, id, .. } | StagedWrite::Delete { kind, id } => {
                    let present = tables
                        .get(kind)
                        .map(|table| table.contains_key(id))
                        .unwrap_or(false);
                    if !present {
                        return Err(PitError::conflict(format!(
                            "row {id} of {kind} was removed by a concurrent transaction"
                        )));
                    }
                    // Claim locks exclude writers, not just other claimers.
                    if self.locked_by_other(*id, txn) {
                        return Err(PitError::conflict(format!(
                            "row {id} of {kind} is claimed by a concurrent transaction"
                        )));
                    }
                }
            }
        }

        // Mutation pass.
        let mut receipt = CommitReceipt::default();
        for write in writes {
            match write {
                StagedWrite::Insert(row) => {
                    if let Some(key) = &row.idempotency_key {
                        idempotency.insert((row.tenant, row.kind, key.clone()), row.id);
                    }
                    tables.entry(row.kind).or_default().insert(row.id, row.clone());
                    receipt.inserted += 1;
                }
                StagedWrite::Update { kind, id, payload } => {
                    // Presence checked in the validation pass above.
                    if let Some(row) = tables.entry(*kind).or_default().get_mut(id) {
                        row.payload = payload.clone();
                        row.version += 1;
                        receipt.updated += 1;
                    }
                }
                StagedWrite::Delete { kind, id } => {
                    if tables.entry(*kind).or_default().remove(id).is_some() {
                        receipt.deleted += 1;
                    }
                }
            }
        }

        debug!(
            txn,
            inserted = receipt.inserted,
            updated = receipt.updated,
            deleted = receipt.deleted,
            "transaction committed"
        );
        Ok(receipt)
    }

    /// Unfiltered rows of a kind, for diagnostics and test assertions only
    ///
    /// Production reads go through [`Transaction`](crate::Transaction) so
    /// the policy engine filters them.
    pub fn raw_rows(&self, kind: EntityKind) -> Vec<Row> {
        self.rows_of(kind)
    }
}
