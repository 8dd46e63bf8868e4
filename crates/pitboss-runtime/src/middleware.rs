//! The request middleware chain
//!
//! Ordered stages per inbound request: authenticate, resolve+inject,
//! execute the domain handler, check the idempotency key, append the audit
//! record. An early failure short-circuits later stages; the audit append
//! runs for failures too, recording the outcome code and, once resolution
//! has succeeded, the resolved actor and tenant. Errors crossing this
//! boundary are mapped to stable `{code, message}` pairs - raw store text
//! never reaches the caller.

use crate::audit::{now_ms, AuditOutcome, AuditRecord, AuditSink};
use crate::config::RuntimeConfig;
use crate::idempotency::IdempotencyLedger;
use crate::privileged::{self, PrivilegedOperation};
use pitboss_core::{
    ErrorCode, PitError, Principal, RequestId, Result, SignedToken, StaffId, TenantId, TokenKey,
};
use pitboss_policy::PolicyEngine;
use pitboss_registry::{IdentityResolver, ResolvedContext, StaffDirectory};
use pitboss_store::{Database, Pool, RowPayload, Transaction};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

/// The structured error callers receive
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiError {
    /// Stable code from the error taxonomy
    pub code: ErrorCode,
    /// Human-readable message
    pub message: String,
}

impl From<PitError> for ApiError {
    fn from(err: PitError) -> Self {
        Self {
            code: err.code(),
            message: err.message().to_string(),
        }
    }
}

/// A successful response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    /// Request this response answers
    pub request: RequestId,
    /// Handler or operation payload
    pub body: RowPayload,
}

/// The wired runtime: token key, registry, pool, policy engine, audit sink
pub struct FloorRuntime {
    key: TokenKey,
    resolver: Arc<IdentityResolver>,
    pool: Pool,
    audit: Arc<dyn AuditSink>,
    ledger: IdempotencyLedger,
}

impl FloorRuntime {
    /// Wire a runtime over a staff directory and audit sink
    pub fn new(
        key: TokenKey,
        directory: Arc<dyn StaffDirectory>,
        audit: Arc<dyn AuditSink>,
        config: RuntimeConfig,
    ) -> Self {
        let database = Arc::new(Database::new());
        let engine = Arc::new(PolicyEngine::new());
        let pool = Pool::new(database, engine, config.pool);
        let resolver = Arc::new(IdentityResolver::new(directory, config.resolver));
        Self {
            key,
            resolver,
            pool,
            audit,
            ledger: IdempotencyLedger::new(),
        }
    }

    /// The pool, for handlers issued outside the chain (tests, tooling)
    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    /// The identity resolver
    pub fn resolver(&self) -> &Arc<IdentityResolver> {
        &self.resolver
    }

    /// Handle an ordinary (non-privileged) request
    ///
    /// The handler gets one transaction with best-effort injected context;
    /// claims-only and hybrid entities are safe here. Context-only entities
    /// must go through [`handle_privileged`](Self::handle_privileged).
    pub async fn handle<F>(
        &self,
        token: &SignedToken,
        operation: &str,
        idempotency_key: Option<&str>,
        handler: F,
    ) -> std::result::Result<Response, ApiError>
    where
        F: FnOnce(&mut Transaction) -> Result<RowPayload>,
    {
        let request = RequestId::new();
        debug!(%request, operation, "request received");

        // Stages 1-2: authenticate, then resolve. Failures here have no
        // resolved identity to audit.
        let (principal, context) = match self.resolve_caller(token).await {
            Ok(caller) => caller,
            Err(err) => {
                warn!(%request, operation, code = %err.code(), "request refused");
                self.append_audit(request, None, None, operation, AuditOutcome::Failure(err.code()));
                return Err(err.into());
            }
        };
        let actor = context.actor();
        let tenant = context.tenant();

        match self.run_chain(&principal, context, idempotency_key, handler).await {
            Ok(body) => {
                self.append_audit(
                    request,
                    Some(actor),
                    Some(tenant),
                    operation,
                    AuditOutcome::Success,
                );
                Ok(Response { request, body })
            }
            Err(err) => {
                warn!(%request, operation, code = %err.code(), "request failed");
                self.append_audit(
                    request,
                    Some(actor),
                    Some(tenant),
                    operation,
                    AuditOutcome::Failure(err.code()),
                );
                Err(err.into())
            }
        }
    }

    /// Handle a privileged request
    ///
    /// Authentication and a fresh resolution happen here, immediately before
    /// the operation; injection, mutation, and verification happen inside
    /// the operation's own transaction.
    pub async fn handle_privileged(
        &self,
        token: &SignedToken,
        op: &dyn PrivilegedOperation,
    ) -> std::result::Result<Response, ApiError> {
        let request = RequestId::new();
        debug!(%request, operation = op.name(), "privileged request received");

        let (principal, context) = match self.resolve_caller(token).await {
            Ok(caller) => caller,
            Err(err) => {
                warn!(%request, operation = op.name(), code = %err.code(), "privileged request refused");
                self.append_audit(
                    request,
                    None,
                    None,
                    op.name(),
                    AuditOutcome::Failure(err.code()),
                );
                return Err(err.into());
            }
        };
        let actor = context.actor();
        let tenant = context.tenant();

        match privileged::run(&self.pool, &self.ledger, &principal, context, op).await {
            Ok(body) => {
                self.append_audit(
                    request,
                    Some(actor),
                    Some(tenant),
                    op.name(),
                    AuditOutcome::Success,
                );
                Ok(Response { request, body })
            }
            Err(err) => {
                warn!(%request, operation = op.name(), code = %err.code(), "privileged request failed");
                self.append_audit(
                    request,
                    Some(actor),
                    Some(tenant),
                    op.name(),
                    AuditOutcome::Failure(err.code()),
                );
                Err(err.into())
            }
        }
    }

    /// Stages 1-2: authenticate the token, then resolve against the registry
    ///
    /// Resolution failure aborts the request; there is no anonymous
    /// fallback.
    async fn resolve_caller(&self, token: &SignedToken) -> Result<(Principal, ResolvedContext)> {
        let principal = Principal::authenticate(token, &self.key)?;
        let context = self.resolver.resolve(&principal).await?;
        Ok((principal, context))
    }

    /// Stages 3-4: execute the domain handler, then the idempotency check
    async fn run_chain<F>(
        &self,
        principal: &Principal,
        context: ResolvedContext,
        idempotency_key: Option<&str>,
        handler: F,
    ) -> Result<RowPayload>
    where
        F: FnOnce(&mut Transaction) -> Result<RowPayload>,
    {
        let tenant = context.tenant();
        let mut txn = self.pool.begin(principal.claims()).await?;
        txn.inject(context)?;

        // Stage 3: the domain handler, then commit.
        let outcome = handler(&mut txn).and_then(|body| txn.commit().map(|_| body));

        // Stage 4: idempotency. A uniqueness conflict on a keyed request is
        // a duplicate; replay the recorded first response so the retry is
        // observably equivalent.
        match outcome {
            Ok(body) => {
                if let Some(key) = idempotency_key {
                    self.ledger.record(tenant, key, body.clone());
                }
                Ok(body)
            }
            Err(err @ PitError::Conflict { .. }) => match idempotency_key
                .and_then(|key| self.ledger.replay(tenant, key))
            {
                Some(body) => {
                    debug!("duplicate request replayed");
                    Ok(body)
                }
                None => Err(err),
            },
            Err(err) => Err(err),
        }
    }

    fn append_audit(
        &self,
        request: RequestId,
        actor: Option<StaffId>,
        tenant: Option<TenantId>,
        operation: &str,
        outcome: AuditOutcome,
    ) {
        self.audit.append(AuditRecord {
            request,
            actor,
            tenant,
            operation: operation.to_string(),
            outcome,
            at_ms: now_ms(),
        });
    }
}
