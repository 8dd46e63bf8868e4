//! Identity resolution: principal in, authoritative context out
//!
//! `resolve` looks the principal up in the registry and returns the
//! registry's current (actor, tenant, role) - never the claims' copy. Claims
//! enter this function only as the lookup key (the principal id); if the
//! registry and the claims disagree, the registry wins.

use crate::context::ResolvedContext;
use crate::staff::{StaffDirectory, StaffStatus};
use parking_lot::RwLock;
use pitboss_core::{PitError, Principal, PrincipalId, Result};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Resolver tuning
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// How long a cached registry read may serve repeated resolutions.
    /// Bounded staleness: a deactivated staff member is rejected within
    /// this window at worst, immediately when the directory generation
    /// moves.
    pub cache_ttl: Duration,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::from_secs(2),
        }
    }
}

struct CacheEntry {
    context: ResolvedContext,
    cached_at: Instant,
    generation: u64,
}

/// Derives the authoritative (actor, tenant, role) triple for a principal
///
/// The resolver is the only constructor of [`ResolvedContext`]. It takes no
/// tenant, actor, or role parameters by design; any API that accepted those
/// and "validated" them against claims would reintroduce the spoofing
/// surface this type exists to close.
pub struct IdentityResolver {
    directory: Arc<dyn StaffDirectory>,
    cache: RwLock<HashMap<PrincipalId, CacheEntry>>,
    config: ResolverConfig,
}

impl IdentityResolver {
    /// Create a resolver over a staff directory
    pub fn new(directory: Arc<dyn StaffDirectory>, config: ResolverConfig) -> Self {
        Self {
            directory,
            cache: RwLock::new(HashMap::new()),
            config,
        }
    }

    /// Resolve the principal to its current registry context
    ///
    /// # Errors
    /// - `UNAUTHORIZED` if no record exists for the principal
    /// - `FORBIDDEN` if the record exists but is inactive
    pub async fn resolve(&self, principal: &Principal) -> Result<ResolvedContext> {
        let generation = self.directory.generation();

        if let Some(context) = self.cached(principal.id(), generation) {
            return Ok(context);
        }

        let record = self
            .directory
            .find_by_principal(principal.id())
            .await?
            .ok_or_else(|| {
                warn!(principal = %principal.id(), "resolution failed: no staff record");
                PitError::unauthorized("no staff record for principal")
            })?;

        if record.status != StaffStatus::Active {
            warn!(
                principal = %principal.id(),
                staff = %record.staff_id,
                "resolution refused: staff record inactive"
            );
            return Err(PitError::forbidden("staff record inactive"));
        }

        let context = ResolvedContext::new(record.staff_id, record.tenant_id, record.role);
        debug!(
            staff = %record.staff_id,
            tenant = %record.tenant_id,
            role = %record.role,
            "resolved principal"
        );

        self.cache.write().insert(
            principal.id(),
            CacheEntry {
                context: context.clone(),
                cached_at: Instant::now(),
                generation,
            },
        );

        Ok(context)
    }

    /// Drop a principal's cached resolution
    pub fn invalidate(&self, principal: PrincipalId) {
        self.cache.write().remove(&principal);
    }

    fn cached(&self, principal: PrincipalId, current_generation: u64) -> Option<ResolvedContext> {
        let cache = self.cache.read();
        let entry = cache.get(&principal)?;
        // A directory write invalidates every cached read immediately; the
        // TTL bounds staleness against backends without a generation signal.
        if entry.generation != current_generation {
            return None;
        }
        if entry.cached_at.elapsed() > self.config.cache_ttl {
            return None;
        }
        Some(entry.context.clone())
    }
}
