//! Policy families, partitioned by trust posture

use std::fmt;

/// How a rule sources the (tenant, role) it evaluates against
///
/// The family is a static property of the entity kind. The design rule that
/// follows from pooled access: context-only entities may only be mutated by
/// a self-contained privileged operation, because only that path guarantees
/// injection and mutation share one transaction. Entities reachable through
/// the general middleware chain use the weaker families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PolicyFamily {
    /// Reads only signed claims. Immune to injection failures, but cannot
    /// see anything the token does not carry.
    ClaimsOnly,
    /// Prefers resolved context, falls back to claims when absent. Tolerant
    /// of partial injection failure; slightly weaker isolation.
    HybridFallback,
    /// Requires resolved context; no fallback. Strongest isolation, only
    /// safe where every write path injects in the same transaction.
    ContextOnly,
}

impl fmt::Display for PolicyFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PolicyFamily::ClaimsOnly => f.write_str("claims_only"),
            PolicyFamily::HybridFallback => f.write_str("hybrid_fallback"),
            PolicyFamily::ContextOnly => f.write_str("context_only"),
        }
    }
}
