//! # Pitboss Store - Pooled Transactional Row Store
//!
//! An in-memory multi-tenant row store behind a fixed-size connection pool.
//! Every read and write inside a [`Transaction`] passes the policy engine.
//! The transaction carries its resolved context as an explicit slot - there
//! is no connection-local ambient state, so context set for one transaction
//! can never be observed by, or leak into, another, no matter how the pool
//! assigns physical connections.

pub mod database;
pub mod pool;
pub mod row;
pub mod transaction;

pub use database::Database;
pub use pool::{Pool, PoolConfig};
pub use row::{Row, RowPayload};
pub use transaction::{CommitReceipt, Transaction};
