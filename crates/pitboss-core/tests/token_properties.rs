//! Property tests for signed-claims tokens
//!
//! Verification must accept exactly the claims that were minted, under
//! exactly the minting key, and nothing else.

use pitboss_core::{Claims, PrincipalId, Role, SignedToken, StaffId, TenantId, TokenKey};
use proptest::prelude::*;
use uuid::Uuid;

fn role_strategy() -> impl Strategy<Value = Role> {
    prop_oneof![
        Just(Role::Dealer),
        Just(Role::Supervisor),
        Just(Role::PitManager),
    ]
}

fn claims_strategy() -> impl Strategy<Value = Claims> {
    (
        any::<u128>(),
        any::<u128>(),
        any::<u128>(),
        role_strategy(),
        any::<u64>(),
    )
        .prop_map(|(principal, staff, tenant, role, issued_at_ms)| Claims {
            principal: PrincipalId::from_uuid(Uuid::from_u128(principal)),
            staff: StaffId::from_uuid(Uuid::from_u128(staff)),
            tenant: TenantId::from_uuid(Uuid::from_u128(tenant)),
            role,
            issued_at_ms,
        })
}

fn key_strategy() -> impl Strategy<Value = TokenKey> {
    proptest::collection::vec(any::<u8>(), 16..64).prop_map(TokenKey::from_bytes)
}

proptest! {
    /// Minting and verifying under the same key recovers the exact claims.
    #[test]
    fn mint_verify_round_trips(claims in claims_strategy(), key in key_strategy()) {
        let token = SignedToken::mint(&claims, &key).unwrap();
        prop_assert_eq!(token.verify(&key).unwrap(), claims);
    }

    /// A token never verifies under a key other than the minting key.
    #[test]
    fn wrong_key_never_verifies(
        claims in claims_strategy(),
        key_bytes in proptest::collection::vec(any::<u8>(), 16..64),
        other_bytes in proptest::collection::vec(any::<u8>(), 16..64),
    ) {
        prop_assume!(key_bytes != other_bytes);
        let key = TokenKey::from_bytes(key_bytes);
        let other = TokenKey::from_bytes(other_bytes);
        let token = SignedToken::mint(&claims, &key).unwrap();
        prop_assert!(token.verify(&other).is_err());
    }

    /// Corrupting any single character of the wire form defeats verification.
    #[test]
    fn single_character_corruption_is_rejected(
        claims in claims_strategy(),
        position in any::<prop::sample::Index>(),
    ) {
        let key = TokenKey::from_bytes(*b"floor-token-key-0000000000000000");
        let token = SignedToken::mint(&claims, &key).unwrap();
        let wire = token.as_str();

        let idx = position.index(wire.len());
        let original = wire.as_bytes()[idx];
        // Swap to a different base64url character so the token stays ASCII.
        let replacement = if original == b'A' { b'B' } else { b'A' };
        prop_assume!(original != b'.' && original != replacement);

        let mut corrupted = wire.as_bytes().to_vec();
        corrupted[idx] = replacement;
        let forged = SignedToken::from_wire(String::from_utf8(corrupted).unwrap());
        prop_assert!(forged.verify(&key).is_err());
    }
}
