//! Policy-checked transactions
//!
//! A transaction stages its writes privately and applies them atomically on
//! commit. Its resolved context is an explicit field, injected once; every
//! statement evaluates policy against that field and the caller's claims.
//! Because the context travels with the transaction value rather than the
//! connection, a statement can never observe context injected by some other
//! transaction that happened to use the same connection earlier.

use crate::database::Database;
use crate::row::{Row, RowPayload};
use parking_lot::Mutex;
use pitboss_core::{Claims, EntityKind, PitError, Result, RowId};
use pitboss_policy::{AccessSubject, MutationKind, PolicyEngine};
use pitboss_registry::ResolvedContext;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::OwnedSemaphorePermit;
use tracing::debug;

/// A staged write, applied on commit
#[derive(Debug, Clone)]
pub(crate) enum StagedWrite {
    Insert(Row),
    Update {
        kind: EntityKind,
        id: RowId,
        payload: RowPayload,
    },
    Delete {
        kind: EntityKind,
        id: RowId,
    },
}

/// Counts of rows a commit actually touched
///
/// Privileged operations verify these against their declared expectations;
/// a zero where one was expected is a hard error, never a silent success.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommitReceipt {
    /// Rows inserted
    pub inserted: u64,
    /// Rows updated
    pub updated: u64,
    /// Rows deleted
    pub deleted: u64,
}

impl CommitReceipt {
    /// Total rows affected
    pub fn affected(&self) -> u64 {
        self.inserted + self.updated + self.deleted
    }
}

/// Returns a logical connection id to the pool's free list on drop
#[derive(Debug)]
pub(crate) struct ConnectionSlot {
    id: usize,
    free: Arc<Mutex<Vec<usize>>>,
}

impl ConnectionSlot {
    pub(crate) fn new(id: usize, free: Arc<Mutex<Vec<usize>>>) -> Self {
        Self { id, free }
    }

    fn id(&self) -> usize {
        self.id
    }
}

impl Drop for ConnectionSlot {
    fn drop(&mut self) {
        self.free.lock().push(self.id);
    }
}

/// One transaction: staged writes, row locks, and the explicit context slot
pub struct Transaction {
    database: Arc<Database>,
    engine: Arc<PolicyEngine>,
    claims: Claims,
    context: Option<ResolvedContext>,
    txn_id: u64,
    connection: ConnectionSlot,
    writes: Vec<StagedWrite>,
    // Overlay for read-your-writes within the transaction.
    staged_rows: HashMap<(EntityKind, RowId), Option<Row>>,
    _permit: OwnedSemaphorePermit,
}

impl Transaction {
    pub(crate) fn start(
        database: Arc<Database>,
        engine: Arc<PolicyEngine>,
        claims: Claims,
        txn_id: u64,
        connection: ConnectionSlot,
        permit: OwnedSemaphorePermit,
    ) -> Self {
        Self {
            database,
            engine,
            claims,
            context: None,
            txn_id,
            connection,
            writes: Vec::new(),
            staged_rows: HashMap::new(),
            _permit: permit,
        }
    }

    /// Inject the resolver's output into this transaction
    ///
    /// Accepts only a [`ResolvedContext`], which only the resolver can
    /// construct. At most once per transaction; the slot dies with the
    /// transaction on commit or rollback.
    pub fn inject(&mut self, context: ResolvedContext) -> Result<()> {
        if self.context.is_some() {
            return Err(PitError::invalid("context already injected"));
        }
        debug!(
            txn = self.txn_id,
            actor = %context.actor(),
            tenant = %context.tenant(),
            "context injected"
        );
        self.context = Some(context);
        Ok(())
    }

    /// Whether a context has been injected
    pub fn has_context(&self) -> bool {
        self.context.is_some()
    }

    /// The logical connection this transaction runs on (diagnostics only)
    pub fn connection_id(&self) -> usize {
        self.connection.id()
    }

    fn subject(&self) -> AccessSubject<'_> {
        AccessSubject::new(&self.claims, self.context.as_ref())
    }

    /// Current row as this transaction sees it: staged overlay, then store
    fn current_row(&self, kind: EntityKind, id: RowId) -> Option<Row> {
        match self.staged_rows.get(&(kind, id)) {
            Some(staged) => staged.clone(),
            None => self.database.get_row(kind, id),
        }
    }

    /// Read one row; rows outside the effective tenant are invisible
    ///
    /// A context-only read without injected context errors loudly instead
    /// of returning an empty result.
    pub fn get(&self, kind: EntityKind, id: RowId) -> Result<Option<Row>> {
        let (_, tenant, _) = self.engine.effective(kind, self.subject())?;
        Ok(self.current_row(kind, id).filter(|row| row.tenant == tenant))
    }

    /// List rows of a kind visible to the effective tenant
    pub fn list(&self, kind: EntityKind) -> Result<Vec<Row>> {
        let (_, tenant, _) = self.engine.effective(kind, self.subject())?;
        let mut rows: Vec<Row> = self
            .database
            .rows_of(kind)
            .into_iter()
            .filter(|row| !self.staged_rows.contains_key(&(kind, row.id)))
            .collect();
        for staged in self.staged_rows.values().flatten() {
            if staged.kind == kind {
                rows.push(staged.clone());
            }
        }
        rows.retain(|row| row.tenant == tenant);
        Ok(rows)
    }

    /// Insert a row; tenant and creator come from policy evaluation
    ///
    /// The caller supplies only business data and an optional idempotency
    /// key. A key that was already applied for this (tenant, kind) fails at
    /// stage time or, if racing another transaction, at commit.
    pub fn insert(
        &mut self,
        kind: EntityKind,
        payload: RowPayload,
        idempotency_key: Option<String>,
    ) -> Result<RowId> {
        let (actor, tenant, _) = self.engine.effective(kind, self.subject())?;
        self.engine
            .check_write(kind, MutationKind::Insert, self.subject(), tenant)?;

        if let Some(key) = &idempotency_key {
            if self
                .database
                .idempotency_hit(&(tenant, kind, key.clone()))
                .is_some()
            {
                return Err(PitError::conflict(format!(
                    "idempotency key already applied for {kind}"
                )));
            }
        }

        let row = Row {
            id: RowId::new(),
            tenant,
            kind,
            created_by: actor,
            payload,
            idempotency_key,
            version: 0,
        };
        let id = row.id;
        self.staged_rows.insert((kind, id), Some(row.clone()));
        self.writes.push(StagedWrite::Insert(row));
        Ok(id)
    }

    /// Update a row's payload
    ///
    /// A row that is absent or invisible to the effective tenant is a
    /// zero-row update and fails with `PRECONDITION_FAILED`. Takes the row
    /// lock: a row claimed or being written by a concurrent transaction
    /// conflicts instead of being clobbered.
    pub fn update(&mut self, kind: EntityKind, id: RowId, payload: RowPayload) -> Result<()> {
        let (_, tenant, _) = self.engine.effective(kind, self.subject())?;
        let mut row = self
            .current_row(kind, id)
            .filter(|row| row.tenant == tenant)
            .ok_or_else(|| {
                PitError::precondition_failed(format!(
                    "update of {kind} affected zero rows"
                ))
            })?;
        self.engine
            .check_write(kind, MutationKind::Update, self.subject(), row.tenant)?;
        if !self.database.try_lock(id, self.txn_id) {
            return Err(PitError::conflict(format!(
                "row {id} of {kind} is locked by a concurrent transaction"
            )));
        }

        row.payload = payload.clone();
        self.staged_rows.insert((kind, id), Some(row));
        self.writes.push(StagedWrite::Update { kind, id, payload });
        Ok(())
    }

    /// Delete a row; absent or invisible rows fail like zero-row updates
    ///
    /// Takes the row lock, like [`update`](Self::update).
    pub fn delete(&mut self, kind: EntityKind, id: RowId) -> Result<()> {
        let (_, tenant, _) = self.engine.effective(kind, self.subject())?;
        let row = self
            .current_row(kind, id)
            .filter(|row| row.tenant == tenant)
            .ok_or_else(|| {
                PitError::precondition_failed(format!(
                    "delete of {kind} affected zero rows"
                ))
            })?;
        self.engine
            .check_write(kind, MutationKind::Delete, self.subject(), row.tenant)?;
        if !self.database.try_lock(id, self.txn_id) {
            return Err(PitError::conflict(format!(
                "row {id} of {kind} is locked by a concurrent transaction"
            )));
        }

        self.staged_rows.insert((kind, id), None);
        self.writes.push(StagedWrite::Delete { kind, id });
        Ok(())
    }

    /// Claim up to `limit` visible rows with non-blocking row locks
    ///
    /// Rows already locked by a concurrent transaction are skipped, not
    /// awaited, so batch workflows do not stall on each other. While held,
    /// a claim lock also rejects updates and deletes from other
    /// transactions. Locks are released when the transaction ends.
    pub fn claim_rows(&mut self, kind: EntityKind, limit: usize) -> Result<Vec<Row>> {
        let (_, tenant, _) = self.engine.effective(kind, self.subject())?;

        let mut claimed = Vec::new();
        for row in self.database.rows_of(kind) {
            if claimed.len() == limit {
                break;
            }
            if row.tenant != tenant {
                continue;
            }
            if self.database.try_lock(row.id, self.txn_id) {
                claimed.push(row);
            }
        }
        debug!(txn = self.txn_id, kind = %kind, claimed = claimed.len(), "rows claimed");
        Ok(claimed)
    }

    /// Apply staged writes atomically
    pub fn commit(self) -> Result<CommitReceipt> {
        self.database.apply(&self.writes, self.txn_id)
        // Drop releases row locks and the connection.
    }

    /// Discard staged writes
    pub fn rollback(self) {
        debug!(txn = self.txn_id, "transaction rolled back");
        // Drop releases row locks and the connection.
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        self.database.release_locks(self.txn_id);
    }
}
