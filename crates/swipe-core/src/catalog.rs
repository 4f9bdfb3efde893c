//! Character catalog: the entity type, the TTL cache that holds the current
//! snapshot, and the presentation helpers shared by every endpoint.

use std::collections::HashSet;
use std::sync::{Arc, LazyLock};

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::constants::CATALOG_RETRY_MS;

/// A selectable character, identified by its tag.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CharacterEntity {
    /// Stable tag identifier, unique within a catalog.
    pub name: String,
    /// Number of posts carrying this tag. Snapshot files written by the tag
    /// harvester call this `posts`; older snapshots use `count`.
    #[serde(rename = "postCount", alias = "posts", alias = "count", default)]
    pub post_count: u64,
}

impl CharacterEntity {
    pub fn new(name: impl Into<String>, post_count: u64) -> Self {
        Self {
            name: name.into(),
            post_count,
        }
    }
}

/// In-memory catalog snapshot with a time-to-live.
///
/// A snapshot is only ever replaced by another non-empty snapshot: a failed or
/// empty reload keeps the previous one, so callers see stale data rather than
/// no data. Load attempts are spaced at least `retry_ms` apart whether or
/// not they succeed.
#[derive(Debug)]
pub struct CatalogCache {
    entities: Arc<[CharacterEntity]>,
    loaded_at: Option<u64>,
    last_attempt: Option<u64>,
    ttl_ms: u64,
    retry_ms: u64,
}

impl CatalogCache {
    pub fn new(ttl_ms: u64) -> Self {
        Self {
            entities: Arc::from(Vec::new()),
            loaded_at: None,
            last_attempt: None,
            ttl_ms,
            retry_ms: CATALOG_RETRY_MS.min(ttl_ms),
        }
    }

    pub fn with_retry_ms(mut self, retry_ms: u64) -> Self {
        self.retry_ms = retry_ms;
        self
    }

    /// Current snapshot. Empty only if no load has ever succeeded.
    pub fn entities(&self) -> Arc<[CharacterEntity]> {
        Arc::clone(&self.entities)
    }

    pub fn loaded_at(&self) -> Option<u64> {
        self.loaded_at
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded_at.is_some()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn ttl_ms(&self) -> u64 {
        self.ttl_ms
    }

    /// True when nothing is loaded yet or the snapshot is at least one TTL old,
    /// and no load was attempted in the last `retry_ms`.
    pub fn needs_refresh(&self, now_ms: u64) -> bool {
        if let Some(attempt) = self.last_attempt
            && now_ms.saturating_sub(attempt) < self.retry_ms
        {
            return false;
        }
        match self.loaded_at {
            None => true,
            Some(loaded) => now_ms.saturating_sub(loaded) >= self.ttl_ms,
        }
    }

    /// Record that a load is starting now.
    pub fn mark_attempt(&mut self, now_ms: u64) {
        self.last_attempt = Some(now_ms);
    }

    /// Install a freshly loaded entity list.
    ///
    /// Returns `false` (and leaves the cache untouched) when the list is empty.
    /// Duplicate names keep their first occurrence.
    pub fn replace(&mut self, entities: Vec<CharacterEntity>, now_ms: u64) -> bool {
        if entities.is_empty() {
            return false;
        }
        let mut seen = HashSet::with_capacity(entities.len());
        let unique: Vec<CharacterEntity> = entities
            .into_iter()
            .filter(|e| !e.name.is_empty() && seen.insert(e.name.clone()))
            .collect();
        if unique.is_empty() {
            return false;
        }
        self.entities = Arc::from(unique);
        self.loaded_at = Some(now_ms);
        true
    }
}

static QUALIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"_\([^)]*\)").expect("qualifier pattern is valid"));

/// Human-readable name for a tag: `monkey_d._luffy_(one_piece)` → `Monkey D. Luffy`.
pub fn display_name(tag: &str) -> String {
    if tag.is_empty() {
        return "Unknown Character".to_string();
    }
    let stripped = QUALIFIER.replace_all(tag, "");
    stripped
        .trim()
        .replace('_', " ")
        .split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => {
                    first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase()
                }
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// FNV-1a over the seed bytes, so equal seed strings shuffle identically
/// across processes and releases.
fn seed_hash(seed: &str) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;
    seed.bytes()
        .fold(OFFSET, |hash, b| (hash ^ u64::from(b)).wrapping_mul(PRIME))
}

/// Deterministically shuffle `items` for a client-supplied seed string.
pub fn seeded_shuffle<T>(items: &mut [T], seed: &str) {
    let mut rng = StdRng::seed_from_u64(seed_hash(seed));
    items.shuffle(&mut rng);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entities(names: &[&str]) -> Vec<CharacterEntity> {
        names
            .iter()
            .enumerate()
            .map(|(i, n)| CharacterEntity::new(*n, i as u64 * 10))
            .collect()
    }

    #[test]
    fn test_new_cache_is_empty_and_stale() {
        let cache = CatalogCache::new(1_000);
        assert!(cache.is_empty());
        assert!(!cache.is_loaded());
        assert!(cache.needs_refresh(0));
    }

    #[test]
    fn test_replace_sets_loaded_at() {
        let mut cache = CatalogCache::new(1_000);
        assert!(cache.replace(entities(&["a", "b"]), 500));
        assert_eq!(cache.loaded_at(), Some(500));
        assert_eq!(cache.len(), 2);
        assert!(!cache.needs_refresh(1_499));
        assert!(cache.needs_refresh(1_500));
    }

    #[test]
    fn test_empty_replace_keeps_previous_snapshot() {
        let mut cache = CatalogCache::new(1_000);
        cache.replace(entities(&["a", "b"]), 0);

        assert!(!cache.replace(Vec::new(), 5_000));
        assert_eq!(cache.loaded_at(), Some(0));
        assert_eq!(cache.entities().len(), 2);
    }

    #[test]
    fn test_failed_attempt_backs_off() {
        let mut cache = CatalogCache::new(1_000).with_retry_ms(100);
        cache.mark_attempt(0);
        assert!(!cache.needs_refresh(50));
        assert!(cache.needs_refresh(100));

        cache.replace(entities(&["a"]), 100);
        cache.mark_attempt(1_100);
        assert!(!cache.needs_refresh(1_150), "stale but recently attempted");
        assert!(cache.needs_refresh(1_200));
    }

    #[test]
    fn test_replace_drops_duplicate_and_blank_names() {
        let mut cache = CatalogCache::new(1_000);
        let mut list = entities(&["a", "b", "a"]);
        list.push(CharacterEntity::new("", 3));
        cache.replace(list, 0);

        let snapshot = cache.entities();
        let names: Vec<&str> = snapshot.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(snapshot[0].post_count, 0);
    }

    #[test]
    fn test_entity_accepts_snapshot_field_names() {
        let from_posts: CharacterEntity =
            serde_json::from_str(r#"{"name":"x","types":["character"],"posts":12,"isCharacter":true}"#)
                .unwrap();
        assert_eq!(from_posts.post_count, 12);

        let from_count: CharacterEntity = serde_json::from_str(r#"{"name":"y","count":3}"#).unwrap();
        assert_eq!(from_count.post_count, 3);

        let missing: CharacterEntity = serde_json::from_str(r#"{"name":"z"}"#).unwrap();
        assert_eq!(missing.post_count, 0);
    }

    #[test]
    fn test_display_name() {
        assert_eq!(display_name("monkey_d._luffy_(one_piece)"), "Monkey D. Luffy");
        assert_eq!(display_name("TIFA_LOCKHART"), "Tifa Lockhart");
        assert_eq!(display_name("zelda"), "Zelda");
        assert_eq!(display_name(""), "Unknown Character");
    }

    #[test]
    fn test_seeded_shuffle_is_deterministic() {
        let mut a: Vec<u32> = (0..50).collect();
        let mut b: Vec<u32> = (0..50).collect();
        seeded_shuffle(&mut a, "session-1");
        seeded_shuffle(&mut b, "session-1");
        assert_eq!(a, b);

        let mut c: Vec<u32> = (0..50).collect();
        seeded_shuffle(&mut c, "session-2");
        assert_ne!(a, c, "different seeds should give different orders");

        let mut sorted = a.clone();
        sorted.sort();
        assert_eq!(sorted, (0..50).collect::<Vec<_>>());
    }
}
