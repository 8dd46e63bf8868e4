//! Self-contained privileged operations
//!
//! One atomic unit per logical action: resolve, inject, mutate, verify. The
//! context is resolved freshly for each operation, immediately before it
//! runs; nothing here trusts context injected by an earlier round trip,
//! which is what makes this path safe for context-only entities.

use crate::idempotency::IdempotencyLedger;
use pitboss_core::{PitError, Principal, Result};
use pitboss_registry::ResolvedContext;
use pitboss_store::{Pool, RowPayload, Transaction};
use tracing::{debug, warn};

/// A privileged unit of work
///
/// Implementations receive only business-relevant parameters at
/// construction; actor, tenant, and role are derived inside the framework
/// and are never accepted from the caller.
pub trait PrivilegedOperation: Send + Sync {
    /// Operation name for audit records and logs
    fn name(&self) -> &str;

    /// Idempotency key, for operations that may be retried
    ///
    /// Retried operations must supply one; the store's uniqueness
    /// constraint, not this framework's logic, is what makes the retry
    /// at-most-once effective.
    fn idempotency_key(&self) -> Option<&str> {
        None
    }

    /// The business mutation, issued against the prepared transaction
    fn apply(&self, txn: &mut Transaction) -> Result<RowPayload>;

    /// Whether a successful run must have affected at least one row
    fn expects_effect(&self) -> bool {
        true
    }
}

/// Run a privileged operation against a freshly resolved context
///
/// The caller resolves immediately beforehand and passes the resolver's
/// output; only the resolver can construct a [`ResolvedContext`], so a
/// forged or caller-supplied identity cannot enter here. Order within one
/// transaction: injection, mutation, row-count verification, commit. A
/// duplicate idempotency key replays the recorded first response instead of
/// mutating again.
pub async fn run(
    pool: &Pool,
    ledger: &IdempotencyLedger,
    principal: &Principal,
    context: ResolvedContext,
    op: &dyn PrivilegedOperation,
) -> Result<RowPayload> {
    let tenant = context.tenant();

    let replay = |err: PitError| -> Result<RowPayload> {
        if let Some(key) = op.idempotency_key() {
            if let Some(response) = ledger.replay(tenant, key) {
                debug!(operation = op.name(), key, "duplicate replayed");
                return Ok(response);
            }
        }
        Err(err)
    };

    // Injection into the same transaction the mutation will use.
    let mut txn = pool.begin(principal.claims()).await?;
    txn.inject(context)?;

    // The business mutation.
    let response = match op.apply(&mut txn) {
        Ok(response) => response,
        Err(err @ PitError::Conflict { .. }) => {
            txn.rollback();
            return replay(err);
        }
        Err(err) => {
            txn.rollback();
            warn!(operation = op.name(), %err, "privileged operation failed");
            return Err(err);
        }
    };

    // Commit and verify the row count.
    let receipt = match txn.commit() {
        Ok(receipt) => receipt,
        Err(err @ PitError::Conflict { .. }) => return replay(err),
        Err(err) => return Err(err),
    };
    if op.expects_effect() && receipt.affected() == 0 {
        // A zero-row effect must never masquerade as success.
        warn!(operation = op.name(), "privileged operation affected zero rows");
        return Err(PitError::precondition_failed(format!(
            "{} affected zero rows",
            op.name()
        )));
    }

    if let Some(key) = op.idempotency_key() {
        ledger.record(tenant, key, response.clone());
    }

    debug!(
        operation = op.name(),
        affected = receipt.affected(),
        "privileged operation committed"
    );
    Ok(response)
}
