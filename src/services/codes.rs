//! Party code generation and allocation.

use rand::Rng;
use tracing::debug;

use uuid::Uuid;

use crate::{dao::party_store::PartyStore, dto::validation, error::ServiceError};

/// Code alphabet without the ambiguous glyphs 0, 1, I and O.
const CODE_ALPHABET: &[u8] = b"23456789ABCDEFGHJKLMNPQRSTUVWXYZ";
const CODE_LENGTH: usize = 5;
const MAX_CODE_ATTEMPTS: usize = 64;

/// Draw a random party code.
pub fn generate_party_code<R: Rng + ?Sized>(rng: &mut R) -> String {
    (0..CODE_LENGTH)
        .map(|_| CODE_ALPHABET[rng.random_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}

/// Reserve a code for `party_id`: the caller's custom code when given,
/// otherwise a fresh random code that is not in use.
pub async fn allocate_party_code(
    store: &dyn PartyStore,
    custom: Option<&str>,
    party_id: Uuid,
) -> Result<String, ServiceError> {
    if let Some(custom) = custom {
        let code = validation::normalize_custom_code(custom)?;
        if !store.reserve_code(code.clone(), party_id).await? {
            return Err(ServiceError::Conflict("Party code already exists".into()));
        }
        return Ok(code);
    }

    for attempt in 0..MAX_CODE_ATTEMPTS {
        let candidate = generate_party_code(&mut rand::rng());
        if store.reserve_code(candidate.clone(), party_id).await? {
            return Ok(candidate);
        }
        debug!(attempt, code = %candidate, "party code collision; retrying");
    }

    Err(ServiceError::Conflict(
        "unable to allocate a free party code".into(),
    ))
}

#[cfg(test)]
mod tests {
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;
    use crate::dao::party_store::memory::MemoryPartyStore;

    #[test]
    fn generated_codes_use_unambiguous_alphabet() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            let code = generate_party_code(&mut rng);
            assert_eq!(code.len(), CODE_LENGTH);
            assert!(code.bytes().all(|b| CODE_ALPHABET.contains(&b)));
            assert!(!code.contains(['0', '1', 'I', 'O']));
        }
    }

    #[tokio::test]
    async fn custom_code_is_normalized() {
        let store = MemoryPartyStore::new();
        let code = allocate_party_code(&store, Some(" party7 "), Uuid::new_v4())
            .await
            .unwrap();
        assert_eq!(code, "PARTY7");
    }

    #[tokio::test]
    async fn taken_custom_code_conflicts() {
        let store = MemoryPartyStore::new();
        allocate_party_code(&store, Some("PARTY7"), Uuid::new_v4())
            .await
            .unwrap();
        let err = allocate_party_code(&store, Some("party7"), Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));
    }

    #[tokio::test]
    async fn random_codes_are_reserved_for_the_party() {
        let store = MemoryPartyStore::new();
        let party_id = Uuid::new_v4();
        let code = allocate_party_code(&store, None, party_id).await.unwrap();
        assert_eq!(
            store.find_party_id_by_code(code).await.unwrap(),
            Some(party_id)
        );
    }

    #[tokio::test]
    async fn invalid_custom_code_is_rejected() {
        let store = MemoryPartyStore::new();
        let err = allocate_party_code(&store, Some("no"), Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
    }
}
