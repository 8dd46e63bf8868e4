//! # Pitboss Registry - Identity Resolution
//!
//! The authoritative staff registry and the identity resolver that derives a
//! [`ResolvedContext`] from an authenticated principal. Claims are a cache;
//! the registry is the source of truth. Nothing in this crate accepts a
//! caller-supplied tenant, actor, or role as input - those are outputs of
//! resolution, never inputs to it.

pub mod context;
pub mod resolver;
pub mod staff;

pub use context::ResolvedContext;
pub use resolver::{IdentityResolver, ResolverConfig};
pub use staff::{InMemoryStaffDirectory, StaffDirectory, StaffRecord, StaffStatus};
