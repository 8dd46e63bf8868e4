//! Runtime configuration

use pitboss_registry::ResolverConfig;
use pitboss_store::PoolConfig;

/// Tuning for a floor runtime instance
#[derive(Debug, Clone, Default)]
pub struct RuntimeConfig {
    /// Connection pool sizing
    pub pool: PoolConfig,
    /// Identity resolver cache tuning
    pub resolver: ResolverConfig,
}
