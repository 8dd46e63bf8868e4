//! Signed claims and the authenticated principal
//!
//! Claims are a snapshot of the staff registry taken at token-issue time:
//! tenant id, staff id, and role, bound to an opaque principal id and sealed
//! with an HMAC-SHA256 tag. They are accepted as-is by claims-only policies
//! and re-validated against the registry on resolution. The caller can never
//! rewrite them after issuance; a tampered body fails tag verification.

use crate::errors::{PitError, Result};
use crate::identifiers::{PrincipalId, StaffId, TenantId};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::fmt;

type HmacSha256 = Hmac<Sha256>;

/// Staff role as recorded in the registry and cached in claims
///
/// Ordered by authority: a pit manager can do everything a supervisor can,
/// a supervisor everything a dealer can.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Table-level staff; may read and write ordinary floor entities
    Dealer,
    /// Pit supervisor; may issue comps and markers
    Supervisor,
    /// Pit manager; may additionally adjust loyalty ledgers
    PitManager,
}

impl Role {
    fn rank(&self) -> u8 {
        match self {
            Role::Dealer => 0,
            Role::Supervisor => 1,
            Role::PitManager => 2,
        }
    }

    /// Whether this role carries at least the authority of `other`
    pub fn at_least(&self, other: Role) -> bool {
        self.rank() >= other.rank()
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Dealer => f.write_str("dealer"),
            Role::Supervisor => f.write_str("supervisor"),
            Role::PitManager => f.write_str("pit_manager"),
        }
    }
}

/// The claim set sealed into a token at authentication time
///
/// A cache of the staff record as of issuance; may be stale. The registry is
/// authoritative whenever the two disagree (resolution re-checks it).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Opaque principal id the staff registry keys on
    pub principal: PrincipalId,
    /// Staff id as of issuance
    pub staff: StaffId,
    /// Tenant id as of issuance
    pub tenant: TenantId,
    /// Role as of issuance
    pub role: Role,
    /// Issuance time, milliseconds since the Unix epoch
    pub issued_at_ms: u64,
}

/// Key material for minting and verifying signed tokens
#[derive(Clone)]
pub struct TokenKey(Vec<u8>);

impl TokenKey {
    /// Wrap raw key bytes
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    fn mac(&self) -> HmacSha256 {
        // HMAC accepts any key length; new_from_slice only fails for
        // implementations with a fixed key size.
        HmacSha256::new_from_slice(&self.0).expect("HMAC accepts any key length")
    }
}

impl fmt::Debug for TokenKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never print key material.
        f.write_str("TokenKey(..)")
    }
}

/// A minted token: base64url(claims JSON) + "." + base64url(HMAC tag)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedToken(String);

impl SignedToken {
    /// Mint a token over the given claims
    pub fn mint(claims: &Claims, key: &TokenKey) -> Result<Self> {
        let body = serde_json::to_vec(claims)?;
        let mut mac = key.mac();
        mac.update(&body);
        let tag = mac.finalize().into_bytes();
        Ok(Self(format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(&body),
            URL_SAFE_NO_PAD.encode(tag)
        )))
    }

    /// Verify the tag and decode the claims
    ///
    /// Fails with `UNAUTHORIZED` on any malformed or tampered token; the
    /// caller learns nothing about which part failed.
    pub fn verify(&self, key: &TokenKey) -> Result<Claims> {
        let (body_b64, tag_b64) = self
            .0
            .split_once('.')
            .ok_or_else(|| PitError::unauthorized("malformed token"))?;
        let body = URL_SAFE_NO_PAD
            .decode(body_b64)
            .map_err(|_| PitError::unauthorized("malformed token"))?;
        let tag = URL_SAFE_NO_PAD
            .decode(tag_b64)
            .map_err(|_| PitError::unauthorized("malformed token"))?;

        let mut mac = key.mac();
        mac.update(&body);
        mac.verify_slice(&tag)
            .map_err(|_| PitError::unauthorized("token signature invalid"))?;

        serde_json::from_slice(&body).map_err(|_| PitError::unauthorized("malformed token"))
    }

    /// Wrap an incoming wire-form string, e.g. a bearer header value
    ///
    /// No validation happens here; [`verify`](Self::verify) is where a bad
    /// token is rejected.
    pub fn from_wire(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The encoded wire form
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SignedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The authenticated caller: principal id plus verified claims
///
/// Constructed only by [`Principal::authenticate`], which verifies the token
/// tag. Downstream code can therefore trust that the claims were issued by
/// the authentication service, though they may be stale relative to the
/// registry.
#[derive(Debug, Clone)]
pub struct Principal {
    id: PrincipalId,
    claims: Claims,
}

impl Principal {
    /// Verify a token and produce the authenticated principal
    pub fn authenticate(token: &SignedToken, key: &TokenKey) -> Result<Self> {
        let claims = token.verify(key)?;
        Ok(Self {
            id: claims.principal,
            claims,
        })
    }

    /// The opaque principal identifier
    pub fn id(&self) -> PrincipalId {
        self.id
    }

    /// The verified (possibly stale) claims
    pub fn claims(&self) -> &Claims {
        &self.claims
    }
}
