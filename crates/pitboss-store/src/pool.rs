//! The connection pool
//!
//! A fixed set of logical connections guarded by a semaphore. Which
//! connection a transaction lands on is arbitrary, exactly like a pooled
//! deployment; nothing may depend on connection identity, and nothing does,
//! because all per-transaction state lives on the [`Transaction`] value
//! itself.

use crate::database::Database;
use crate::transaction::{ConnectionSlot, Transaction};
use parking_lot::Mutex;
use pitboss_core::{Claims, PitError, Result};
use pitboss_policy::PolicyEngine;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::debug;

/// Pool sizing
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Number of logical connections; requests beyond this wait
    pub connections: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self { connections: 4 }
    }
}

/// Fixed-size connection pool over one shared database
#[derive(Clone)]
pub struct Pool {
    database: Arc<Database>,
    engine: Arc<PolicyEngine>,
    semaphore: Arc<Semaphore>,
    free: Arc<Mutex<Vec<usize>>>,
}

impl Pool {
    /// Create a pool over a database with the builtin policy engine
    pub fn new(database: Arc<Database>, engine: Arc<PolicyEngine>, config: PoolConfig) -> Self {
        let connections = config.connections.max(1);
        Self {
            database,
            engine,
            semaphore: Arc::new(Semaphore::new(connections)),
            free: Arc::new(Mutex::new((0..connections).rev().collect())),
        }
    }

    /// Begin a transaction for an authenticated caller
    ///
    /// Waits for a free connection. The transaction starts with no injected
    /// context; callers that need one inject the resolver's output before
    /// issuing statements against context-only entities.
    pub async fn begin(&self, claims: &Claims) -> Result<Transaction> {
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| PitError::internal("connection pool closed"))?;

        let connection_id = self
            .free
            .lock()
            .pop()
            .ok_or_else(|| PitError::internal("pool permit without free connection"))?;

        let txn_id = self.database.next_txn_id();
        debug!(txn = txn_id, connection = connection_id, "transaction started");

        Ok(Transaction::start(
            self.database.clone(),
            self.engine.clone(),
            claims.clone(),
            txn_id,
            ConnectionSlot::new(connection_id, self.free.clone()),
            permit,
        ))
    }

    /// The shared database behind this pool
    pub fn database(&self) -> &Arc<Database> {
        &self.database
    }

    /// The policy engine transactions evaluate against
    pub fn engine(&self) -> &Arc<PolicyEngine> {
        &self.engine
    }
}
