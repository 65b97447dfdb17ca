use rand::Rng;
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Length of a shareable referral hash.
const SHORT_HASH_LEN: usize = 12;

pub fn new_id() -> Uuid {
    Uuid::new_v4()
}

/// Derive a short, collision-resistant shareable hash from a seed string.
/// Callers seed with a fresh uuid, so the output is unique in practice
/// while staying short enough to put in a link.
pub fn short_hash(seed: &str) -> String {
    let digest = Sha256::digest(seed.as_bytes());
    hex::encode(digest)[..SHORT_HASH_LEN].to_string()
}

/// Fresh shareable hash seeded from a new uuid.
pub fn new_hash() -> String {
    short_hash(&new_id().to_string())
}

/// Random display color as a hex tag.
pub fn random_color() -> String {
    let mut rng = rand::rng();
    format!("#{:06x}", rng.random_range(0..=0xFFFFFFu32))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_hash_is_deterministic_and_short() {
        let a = short_hash("seed");
        let b = short_hash("seed");
        assert_eq!(a, b);
        assert_eq!(a.len(), SHORT_HASH_LEN);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn distinct_seeds_give_distinct_hashes() {
        assert_ne!(short_hash("a"), short_hash("b"));
        assert_ne!(new_hash(), new_hash());
    }

    #[test]
    fn random_color_is_a_hex_tag() {
        let c = random_color();
        assert_eq!(c.len(), 7);
        assert!(c.starts_with('#'));
        assert!(c[1..].chars().all(|ch| ch.is_ascii_hexdigit()));
    }
}
