//! Deterministic RNG streams derived from a session seed.
//!
//! Each stream is keyed by HMAC-SHA256 over the seed and a domain tag, so the
//! person drawn at any index can be regenerated without persisting RNG state.

use hmac::{Hmac, Mac};
use rand::SeedableRng;
use rand::rngs::SmallRng;
use sha2::Sha256;

use crate::constants::{STREAM_PERSON, STREAM_STATISTICS};

/// Derive a 64-bit stream seed from a session seed and a domain tag.
#[must_use]
pub fn derive_stream_seed(session_seed: u64, domain_tag: &[u8]) -> u64 {
    let mut mac = Hmac::<Sha256>::new_from_slice(&session_seed.to_le_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(domain_tag);
    let digest = mac.finalize().into_bytes();
    let mut seed_bytes = [0_u8; 8];
    seed_bytes.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(seed_bytes)
}

/// RNG used to draw the person at `index`.
#[must_use]
pub fn person_rng(session_seed: u64, index: u32) -> SmallRng {
    let mut tag = [0_u8; STREAM_PERSON.len() + 4];
    tag[..STREAM_PERSON.len()].copy_from_slice(STREAM_PERSON);
    tag[STREAM_PERSON.len()..].copy_from_slice(&index.to_le_bytes());
    SmallRng::seed_from_u64(derive_stream_seed(session_seed, &tag))
}

/// RNG used to generate randomized attribute statistics for a session.
#[must_use]
pub fn statistics_rng(session_seed: u64) -> SmallRng {
    SmallRng::seed_from_u64(derive_stream_seed(session_seed, STREAM_STATISTICS))
}
