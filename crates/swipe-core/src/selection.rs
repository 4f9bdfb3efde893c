//! Two-tier weighted-random character selection.
//!
//! Candidates are the catalog minus the request's exclusions. Users without
//! affinity data get a uniform draw. Users with data are split into an
//! exploit tier (tags with positive affinity, weighted by score) and an
//! explore tier (everything else, uniform), and the explore tier wins
//! [`EXPLORE_RATE`] of the time.

use std::collections::HashSet;

use rand::Rng;

use crate::affinity::AffinityMap;
use crate::catalog::CharacterEntity;
use crate::constants::{
    EXPLORE_RATE, SMASHED_AFFINITY_FACTOR, SMASHED_BASE_WEIGHT, SMASHED_MIN_WEIGHT,
};

/// Names a request must not be served.
///
/// `excluded` and `blacklisted` are hard: nothing in them is ever returned.
/// `recently_served` is soft and is dropped when it would leave no candidates.
#[derive(Debug, Clone, Default)]
pub struct Exclusions {
    pub excluded: HashSet<String>,
    pub blacklisted: HashSet<String>,
    pub recently_served: HashSet<String>,
}

impl Exclusions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_excluded<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.excluded.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn with_blacklisted<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.blacklisted.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn with_recently_served(mut self, names: HashSet<String>) -> Self {
        self.recently_served = names;
        self
    }

    /// Add a name to the hard exclusions (e.g. after its media failed).
    pub fn exclude(&mut self, name: &str) {
        self.excluded.insert(name.to_string());
    }

    pub fn is_hard_excluded(&self, name: &str) -> bool {
        self.excluded.contains(name) || self.blacklisted.contains(name)
    }

    pub fn is_excluded(&self, name: &str) -> bool {
        self.is_hard_excluded(name) || self.recently_served.contains(name)
    }

    /// Catalog entries that survive the hard exclusions only.
    pub fn filter_hard<'a>(&self, catalog: &'a [CharacterEntity]) -> Vec<&'a CharacterEntity> {
        catalog
            .iter()
            .filter(|e| !self.is_hard_excluded(&e.name))
            .collect()
    }

    /// Candidate pool for a single draw, relaxing recency only when the
    /// strict pool is empty. Returns the pool and whether it was relaxed.
    pub fn candidates<'a>(&self, catalog: &'a [CharacterEntity]) -> (Vec<&'a CharacterEntity>, bool) {
        let strict: Vec<&CharacterEntity> =
            catalog.iter().filter(|e| !self.is_excluded(&e.name)).collect();
        if !strict.is_empty() {
            return (strict, false);
        }
        (self.filter_hard(catalog), true)
    }
}

/// Which branch of the policy produced a selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SelectionTier {
    /// No affinity data: uniform over the candidates.
    Uniform,
    /// Uniform draw from tags without positive affinity.
    Explore,
    /// Weighted draw from tags with positive affinity.
    Exploit,
    /// The rolled tier was empty, so the other one was used.
    Fallback,
}

impl SelectionTier {
    pub fn as_str(self) -> &'static str {
        match self {
            SelectionTier::Uniform => "uniform",
            SelectionTier::Explore => "explore",
            SelectionTier::Exploit => "exploit",
            SelectionTier::Fallback => "fallback",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub entity: CharacterEntity,
    pub tier: SelectionTier,
    /// True if recently-served names had to be readmitted to find a candidate.
    pub recency_relaxed: bool,
}

/// Tunables for the two-tier draw.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SelectionPolicy {
    pub explore_rate: f64,
    pub base_weight: f64,
    pub affinity_factor: f64,
    pub min_weight: f64,
}

impl Default for SelectionPolicy {
    fn default() -> Self {
        Self {
            explore_rate: EXPLORE_RATE,
            base_weight: SMASHED_BASE_WEIGHT,
            affinity_factor: SMASHED_AFFINITY_FACTOR,
            min_weight: SMASHED_MIN_WEIGHT,
        }
    }
}

impl SelectionPolicy {
    /// Weight of a tag in the exploit tier.
    pub fn weight(&self, affinity: i64) -> f64 {
        (self.base_weight + affinity as f64 * self.affinity_factor).max(self.min_weight)
    }

    /// Draw one character.
    ///
    /// `None` means no candidate survives the hard exclusions.
    pub fn select_next(
        &self,
        catalog: &[CharacterEntity],
        affinity: Option<&AffinityMap>,
        exclusions: &Exclusions,
        rng: &mut impl Rng,
    ) -> Option<Selection> {
        let (pool, recency_relaxed) = exclusions.candidates(catalog);
        let (idx, tier) = self.pick(&pool, affinity, rng)?;
        Some(Selection {
            entity: pool[idx].clone(),
            tier,
            recency_relaxed,
        })
    }

    /// Draw up to `count` distinct characters.
    ///
    /// Draws from the strict pool first; once it runs dry, recently-served
    /// names not yet picked are readmitted. Stops early when both are spent.
    pub fn select_batch(
        &self,
        catalog: &[CharacterEntity],
        affinity: Option<&AffinityMap>,
        exclusions: &Exclusions,
        count: usize,
        rng: &mut impl Rng,
    ) -> Vec<Selection> {
        let mut out = Vec::with_capacity(count.min(catalog.len()));
        if count == 0 {
            return out;
        }

        let mut strict: Vec<&CharacterEntity> =
            catalog.iter().filter(|e| !exclusions.is_excluded(&e.name)).collect();
        let mut relaxed: Vec<&CharacterEntity> = catalog
            .iter()
            .filter(|e| {
                !exclusions.is_hard_excluded(&e.name) && exclusions.recently_served.contains(&e.name)
            })
            .collect();

        while out.len() < count {
            let (pool, recency_relaxed) = if !strict.is_empty() {
                (&mut strict, false)
            } else if !relaxed.is_empty() {
                (&mut relaxed, true)
            } else {
                break;
            };
            let Some((idx, tier)) = self.pick(pool, affinity, rng) else {
                break;
            };
            let entity = pool.remove(idx).clone();
            out.push(Selection {
                entity,
                tier,
                recency_relaxed,
            });
        }
        out
    }

    /// Index into `pool` plus the tier it came from.
    fn pick(
        &self,
        pool: &[&CharacterEntity],
        affinity: Option<&AffinityMap>,
        rng: &mut impl Rng,
    ) -> Option<(usize, SelectionTier)> {
        if pool.is_empty() {
            return None;
        }
        let affinity = match affinity {
            Some(map) if !map.is_empty() => map,
            _ => return Some((rng.random_range(0..pool.len()), SelectionTier::Uniform)),
        };

        let mut smashed: Vec<(usize, f64)> = Vec::new();
        let mut other: Vec<usize> = Vec::new();
        for (i, entity) in pool.iter().enumerate() {
            match affinity.get(&entity.name) {
                Some(&score) if score > 0 => smashed.push((i, self.weight(score))),
                _ => other.push(i),
            }
        }

        let explore = rng.random::<f64>() < self.explore_rate;
        let pick = match (explore, other.is_empty(), smashed.is_empty()) {
            (true, false, _) => (other[rng.random_range(0..other.len())], SelectionTier::Explore),
            (true, true, _) => (weighted_index(&smashed, rng), SelectionTier::Fallback),
            (false, _, false) => (weighted_index(&smashed, rng), SelectionTier::Exploit),
            (false, _, true) => (other[rng.random_range(0..other.len())], SelectionTier::Fallback),
        };
        Some(pick)
    }
}

/// Cumulative-weight draw over `(index, weight)` pairs: subtract weights
/// from `r ∈ [0, total)` in order until `r ≤ 0`. Falls back to the last
/// entry on float rounding.
fn weighted_index(items: &[(usize, f64)], rng: &mut impl Rng) -> usize {
    let total: f64 = items.iter().map(|(_, w)| w).sum();
    let last = items[items.len() - 1].0;
    if total <= 0.0 {
        return last;
    }
    let mut r = rng.random_range(0.0..total);
    for &(idx, w) in items {
        r -= w;
        if r <= 0.0 {
            return idx;
        }
    }
    last
}

/// Draw one character with the default policy.
pub fn select_next(
    catalog: &[CharacterEntity],
    affinity: Option<&AffinityMap>,
    exclusions: &Exclusions,
    rng: &mut impl Rng,
) -> Option<Selection> {
    SelectionPolicy::default().select_next(catalog, affinity, exclusions, rng)
}

/// Draw up to `count` distinct characters with the default policy.
pub fn select_batch(
    catalog: &[CharacterEntity],
    affinity: Option<&AffinityMap>,
    exclusions: &Exclusions,
    count: usize,
    rng: &mut impl Rng,
) -> Vec<Selection> {
    SelectionPolicy::default().select_batch(catalog, affinity, exclusions, count, rng)
}

/// Stable reorder moving tags the user dislikes (negative affinity) to the end.
pub fn demote_disliked(items: &mut [CharacterEntity], affinity: &AffinityMap) {
    items.sort_by_key(|e| affinity.get(&e.name).is_some_and(|&s| s < 0));
}
