//! Token → key cache
//!
//! Derivation is cheap but not free, and the receive path decrypts every
//! message of a history replay. The cache makes derivation idempotent: at
//! most one [`RoomKey`] exists per token at any time.

use std::collections::HashMap;

use wishpernet_proto::RoomToken;

use crate::derivation::{RoomKey, derive_room_key};

/// Explicit, caller-owned mapping from room token to derived key.
///
/// # Invariants
///
/// - At most one key per token.
/// - A key is only ever inserted by [`RoomKeyCache::get_or_derive`] and only
///   ever removed by [`RoomKeyCache::evict`] or [`RoomKeyCache::clear`].
///   Removed keys are zeroized as they drop.
#[derive(Debug, Default)]
pub struct RoomKeyCache {
    keys: HashMap<RoomToken, RoomKey>,
    derivations: u64,
}

impl RoomKeyCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached key for `token`, deriving it on first use.
    pub fn get_or_derive(&mut self, token: &RoomToken) -> &RoomKey {
        let derivations = &mut self.derivations;
        self.keys.entry(token.clone()).or_insert_with(|| {
            *derivations += 1;
            derive_room_key(token)
        })
    }

    /// Drop the key for `token`. Returns whether a key was present.
    pub fn evict(&mut self, token: &RoomToken) -> bool {
        self.keys.remove(token).is_some()
    }

    /// Drop every cached key.
    pub fn clear(&mut self) {
        self.keys.clear();
    }

    /// Whether a key for `token` is cached.
    pub fn contains(&self, token: &RoomToken) -> bool {
        self.keys.contains_key(token)
    }

    /// Number of cached keys.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Whether the cache holds no keys.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Total number of derivations performed over the cache's lifetime.
    ///
    /// A re-derivation after eviction increments this counter again.
    pub fn derivations(&self) -> u64 {
        self.derivations
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(pair: &str) -> RoomToken {
        RoomToken::parse(&pair.repeat(32)).unwrap()
    }

    #[test]
    fn derives_once_per_token() {
        let mut cache = RoomKeyCache::new();
        let t = token("ab");

        cache.get_or_derive(&t);
        cache.get_or_derive(&t);
        cache.get_or_derive(&t);

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.derivations(), 1);
    }

    #[test]
    fn evict_forces_rederivation() {
        let mut cache = RoomKeyCache::new();
        let t = token("ab");

        cache.get_or_derive(&t);
        assert!(cache.evict(&t));
        assert!(!cache.contains(&t));
        assert!(!cache.evict(&t));

        cache.get_or_derive(&t);
        assert_eq!(cache.derivations(), 2);
    }

    #[test]
    fn evict_leaves_other_rooms() {
        let mut cache = RoomKeyCache::new();
        let (a, b) = (token("aa"), token("bb"));

        cache.get_or_derive(&a);
        cache.get_or_derive(&b);
        cache.evict(&a);

        assert!(!cache.contains(&a));
        assert!(cache.contains(&b));
    }

    #[test]
    fn clear_empties_cache() {
        let mut cache = RoomKeyCache::new();
        cache.get_or_derive(&token("aa"));
        cache.get_or_derive(&token("bb"));

        cache.clear();

        assert!(cache.is_empty());
        assert_eq!(cache.derivations(), 2);
    }
}
