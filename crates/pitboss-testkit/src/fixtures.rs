//! Staff and registry fixtures

use pitboss_core::{
    Claims, PitError, Principal, PrincipalId, Result, Role, SignedToken, StaffId, TenantId,
    TokenKey,
};
use pitboss_registry::{
    IdentityResolver, InMemoryStaffDirectory, ResolvedContext, ResolverConfig, StaffRecord,
    StaffStatus,
};
use rand::RngCore;
use std::sync::Arc;

/// A staff member created by the fixture: registry record plus credentials
#[derive(Debug, Clone)]
pub struct TestStaff {
    /// The authenticated principal (token already verified)
    pub principal: Principal,
    /// The registry record as initially inserted
    pub record: StaffRecord,
    /// The minted token, for middleware-level tests
    pub token: SignedToken,
}

/// A directory, token key, and resolver wired together
pub struct FloorFixture {
    /// The staff directory fixtures write records into
    pub directory: Arc<InMemoryStaffDirectory>,
    /// Token key used for minting
    pub key: TokenKey,
    /// Resolver over the fixture directory
    pub resolver: Arc<IdentityResolver>,
}

impl Default for FloorFixture {
    fn default() -> Self {
        Self::new()
    }
}

impl FloorFixture {
    /// Fixture with a random token key and default resolver config
    pub fn new() -> Self {
        Self::with_resolver_config(ResolverConfig::default())
    }

    /// Fixture with explicit resolver tuning
    pub fn with_resolver_config(config: ResolverConfig) -> Self {
        let mut key_bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut key_bytes);
        let key = TokenKey::from_bytes(key_bytes);
        let directory = Arc::new(InMemoryStaffDirectory::new());
        let resolver = Arc::new(IdentityResolver::new(directory.clone(), config));
        Self {
            directory,
            key,
            resolver,
        }
    }

    /// Insert an active staff member and mint matching credentials
    pub fn staff(&self, tenant: TenantId, role: Role) -> TestStaff {
        let principal_id = PrincipalId::new();
        let record = StaffRecord {
            staff_id: StaffId::new(),
            tenant_id: tenant,
            role,
            status: StaffStatus::Active,
            principal_id,
        };
        self.directory.upsert(record.clone());

        let claims = Claims {
            principal: principal_id,
            staff: record.staff_id,
            tenant,
            role,
            issued_at_ms: 0,
        };
        let token = SignedToken::mint(&claims, &self.key).expect("claims serialize");
        let principal = Principal::authenticate(&token, &self.key).expect("fresh token verifies");

        TestStaff {
            principal,
            record,
            token,
        }
    }

    /// Mint a token whose claims have no backing registry record
    ///
    /// Useful for testing that valid signatures alone grant nothing.
    pub fn orphan_token(&self, tenant: TenantId, role: Role) -> SignedToken {
        let claims = Claims {
            principal: PrincipalId::new(),
            staff: StaffId::new(),
            tenant,
            role,
            issued_at_ms: 0,
        };
        SignedToken::mint(&claims, &self.key).expect("claims serialize")
    }

    /// Resolve a fixture staff member through the fixture resolver
    pub async fn resolve(&self, staff: &TestStaff) -> Result<ResolvedContext> {
        self.resolver.resolve(&staff.principal).await
    }

    /// Resolve, panicking on failure with the error in the message
    pub async fn resolve_ok(&self, staff: &TestStaff) -> ResolvedContext {
        match self.resolve(staff).await {
            Ok(ctx) => ctx,
            Err(err) => panic!("fixture staff should resolve: {err}"),
        }
    }

    /// Deactivate a fixture staff member in the directory
    pub fn deactivate(&self, staff: &TestStaff) -> Result<()> {
        self.directory
            .deactivate(staff.principal.id())
            .map_err(|e| PitError::internal(format!("fixture deactivate: {e}")))
    }
}
