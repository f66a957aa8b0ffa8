use std::fmt;
use std::sync::Arc;

use rand::{Rng, SeedableRng, rngs::SmallRng};

const ALPHABET: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const RANDOM_LEN: usize = 9;

/// Stable identifier naming the logical session.
///
/// Generated once when the session is constructed and immutable afterwards. The random suffix
/// plus a millisecond timestamp keeps identifiers from colliding across processes.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ClientIdentity(Arc<str>);

impl ClientIdentity {
    pub fn generate() -> Self {
        let mut rng = SmallRng::from_entropy();
        let suffix: String = (0..RANDOM_LEN)
            .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
            .collect();
        let millis = chrono::Utc::now().timestamp_millis();
        Self(Arc::from(format!("client_{suffix}_{millis}")))
    }

    /// Use a caller-supplied identifier instead of generating one.
    pub fn from_existing(id: impl Into<String>) -> Self {
        Self(Arc::from(id.into()))
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for ClientIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ClientIdentity").field(&&*self.0).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_identity_has_prefix_random_part_and_timestamp() {
        let id = ClientIdentity::generate();
        let parts: Vec<&str> = id.as_str().split('_').collect();
        assert_eq!(parts.len(), 3, "unexpected shape: {id}");
        assert_eq!(parts[0], "client");
        assert_eq!(parts[1].len(), RANDOM_LEN);
        assert!(parts[1].bytes().all(|b| ALPHABET.contains(&b)));
        assert!(parts[2].parse::<i64>().expect("millis") > 0);
    }

    #[test]
    fn identities_do_not_collide() {
        let a = ClientIdentity::generate();
        let b = ClientIdentity::generate();
        assert_ne!(a, b);
    }

    #[test]
    fn clones_share_the_same_value() {
        let id = ClientIdentity::from_existing("client_fixed");
        let copy = id.clone();
        assert_eq!(copy.as_str(), "client_fixed");
        assert_eq!(copy, id);
    }
}
