//! # Pitboss Runtime - Request Orchestration
//!
//! The request middleware chain (authenticate, resolve+inject, execute,
//! idempotency, audit) and the self-contained privileged operation
//! framework for sensitive mutations. Business handlers issue storage
//! operations through this crate rather than touching the store directly.

pub mod audit;
pub mod config;
pub mod idempotency;
pub mod middleware;
pub mod privileged;

pub use audit::{AuditOutcome, AuditRecord, AuditSink, MemoryAuditSink};
pub use config::RuntimeConfig;
pub use idempotency::IdempotencyLedger;
pub use middleware::{ApiError, FloorRuntime, Response};
pub use privileged::PrivilegedOperation;
