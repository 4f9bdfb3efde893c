//! The selection service shared by every request handler.
//!
//! One [`Engine`] owns the process-wide state (catalog snapshot, recently
//! served ring, RNG) and the injected collaborators (clock, catalog source,
//! preference store, media lookup). Synchronous locks are only taken for
//! short, non-async sections; the preference store sits behind an async
//! mutex because its callers await it.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use futures_util::future::join_all;
use rand::SeedableRng;
use rand::rngs::SmallRng;
use swipe_core::{
    AffinityMap, CatalogCache, CharacterEntity, Clock, Exclusions, InteractionMetrics,
    InteractionType, Media, MediaQuery, MediaTypePreference, RecentlyServedRing, Selection,
    SelectionPolicy, TagPreference, choose_media, demote_disliked, seeded_shuffle,
};
use swipe_store::{CatalogSource, PreferenceStore, StoreError};

use crate::config::Config;
use crate::media::MediaLookup;

#[derive(Debug)]
pub enum EngineError {
    /// No catalog load has ever succeeded.
    CatalogUnavailable,
    /// Every candidate is excluded or blacklisted.
    NoCandidates,
    /// Media lookups failed for every character tried.
    MediaExhausted { attempts: usize },
    Invalid(String),
    Store(StoreError),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::CatalogUnavailable => {
                f.write_str("Character cache is not available. Please try again shortly.")
            }
            EngineError::NoCandidates => {
                f.write_str("No characters available based on current exclusions.")
            }
            EngineError::MediaExhausted { attempts } => write!(
                f,
                "Failed to fetch media for selected character after {attempts} attempts."
            ),
            EngineError::Invalid(msg) => f.write_str(msg),
            EngineError::Store(e) => write!(f, "preference store error: {e}"),
        }
    }
}

impl std::error::Error for EngineError {}

impl From<StoreError> for EngineError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::InvalidData(msg) => EngineError::Invalid(msg),
            other => EngineError::Store(other),
        }
    }
}

/// Knobs taken from [`Config`] at construction.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub cache_ttl_ms: u64,
    pub recently_served_capacity: usize,
    pub max_media_attempts: usize,
    pub media_top_n: Option<usize>,
}

impl From<&Config> for EngineSettings {
    fn from(config: &Config) -> Self {
        Self {
            cache_ttl_ms: config.cache_ttl_ms(),
            recently_served_capacity: config.recently_served_capacity,
            max_media_attempts: config.max_media_attempts.max(1),
            media_top_n: config.media.top_n,
        }
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

/// Per-request filters and preferences shared by every selection endpoint.
#[derive(Debug, Clone, Default)]
pub struct SelectionRequest {
    pub user_id: Option<String>,
    pub excluded: Vec<String>,
    pub blacklisted: Vec<String>,
    pub media_type: MediaTypePreference,
}

impl SelectionRequest {
    fn exclusions(&self) -> Exclusions {
        Exclusions::new()
            .with_excluded(self.excluded.iter().cloned())
            .with_blacklisted(self.blacklisted.iter().cloned())
    }
}

/// A character plus the media resolved for it, if any.
#[derive(Debug, Clone, PartialEq)]
pub struct Served {
    pub entity: CharacterEntity,
    pub media: Option<Media>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ListPage {
    pub items: Vec<Served>,
    pub current_page: usize,
    pub total_pages: usize,
    pub total_in_system: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HealthReport {
    pub catalog_size: usize,
    pub catalog_loaded: bool,
}

pub struct Engine {
    catalog: RwLock<CatalogCache>,
    recent: Mutex<RecentlyServedRing>,
    rng: Mutex<SmallRng>,
    prefs: tokio::sync::Mutex<PreferenceStore>,
    source: Arc<dyn CatalogSource>,
    media: Arc<dyn MediaLookup>,
    clock: Arc<dyn Clock>,
    policy: SelectionPolicy,
    settings: EngineSettings,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Engine {
    pub fn new(
        settings: EngineSettings,
        source: Arc<dyn CatalogSource>,
        prefs: PreferenceStore,
        media: Arc<dyn MediaLookup>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            catalog: RwLock::new(CatalogCache::new(settings.cache_ttl_ms)),
            recent: Mutex::new(RecentlyServedRing::new(settings.recently_served_capacity)),
            rng: Mutex::new(SmallRng::from_os_rng()),
            prefs: tokio::sync::Mutex::new(prefs),
            source,
            media,
            clock,
            policy: SelectionPolicy::default(),
            settings,
        }
    }

    /// Replace the OS-seeded RNG, for reproducible runs.
    pub fn with_rng_seed(self, seed: u64) -> Self {
        *lock(&self.rng) = SmallRng::seed_from_u64(seed);
        self
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    // --- Catalog ---

    /// Current catalog snapshot, reloading from the source when the TTL has
    /// elapsed. A failed or empty reload keeps serving the previous snapshot
    /// and is not retried until the cache's retry interval has passed.
    pub async fn catalog(&self) -> Arc<[CharacterEntity]> {
        let now = self.clock.now_millis();
        let (stale, snapshot) = {
            let mut cache = self.catalog.write().unwrap_or_else(PoisonError::into_inner);
            let stale = cache.needs_refresh(now);
            if stale {
                cache.mark_attempt(now);
            }
            (stale, cache.entities())
        };
        if !stale {
            return snapshot;
        }
        self.refresh_catalog(now).await.unwrap_or(snapshot)
    }

    /// Force a reload. Returns the new snapshot, or `None` if the load failed
    /// or produced nothing (the previous snapshot is kept).
    pub async fn refresh_catalog(&self, now: u64) -> Option<Arc<[CharacterEntity]>> {
        self.catalog
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .mark_attempt(now);
        let source = Arc::clone(&self.source);
        let loaded = match tokio::task::spawn_blocking(move || source.load_catalog()).await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!("catalog load task failed: {e}");
                return None;
            }
        };

        match loaded {
            Ok(entities) => {
                let count = entities.len();
                let mut cache = self.catalog.write().unwrap_or_else(PoisonError::into_inner);
                if cache.replace(entities, now) {
                    tracing::info!(
                        source = %self.source.describe(),
                        count = cache.len(),
                        "catalog loaded"
                    );
                    Some(cache.entities())
                } else {
                    tracing::warn!(
                        source = %self.source.describe(),
                        count,
                        "catalog reload produced no usable entries, keeping previous snapshot"
                    );
                    None
                }
            }
            Err(e) => {
                tracing::warn!(
                    source = %self.source.describe(),
                    "catalog reload failed, keeping previous snapshot: {e}"
                );
                None
            }
        }
    }

    async fn loaded_catalog(&self) -> Result<Arc<[CharacterEntity]>, EngineError> {
        let catalog = self.catalog().await;
        if catalog.is_empty() {
            return Err(EngineError::CatalogUnavailable);
        }
        Ok(catalog)
    }

    pub fn recently_served(&self) -> Vec<String> {
        lock(&self.recent).iter().map(str::to_string).collect()
    }

    // --- Affinity ---

    /// The user's affinity map; `None` for anonymous requests. A store error
    /// degrades to an unpersonalized draw.
    async fn affinity_for(&self, user_id: Option<&str>) -> Option<AffinityMap> {
        let user_id = user_id.filter(|u| !u.trim().is_empty())?;
        let store = self.prefs.lock().await;
        match store.affinity_map(user_id) {
            Ok(map) => Some(map),
            Err(e) => {
                tracing::warn!(user_id, "failed to load affinities, selecting uniformly: {e}");
                None
            }
        }
    }

    pub async fn affinities(&self, user_id: &str) -> Result<AffinityMap, EngineError> {
        if user_id.trim().is_empty() {
            return Err(EngineError::Invalid("userId is required".into()));
        }
        Ok(self.prefs.lock().await.affinity_map(user_id)?)
    }

    pub async fn record_interaction(
        &self,
        user_id: &str,
        tag: &str,
        interaction: InteractionType,
        metrics: &InteractionMetrics,
    ) -> Result<TagPreference, EngineError> {
        metrics
            .validate()
            .map_err(|e| EngineError::Invalid(e.to_string()))?;
        let at = self.clock.now_iso8601();
        let mut store = self.prefs.lock().await;
        let pref = store.record_interaction(user_id, tag, interaction, metrics, &at)?;
        tracing::info!(
            user_id,
            tag,
            interaction = interaction.as_str(),
            affinity = pref.affinity_score,
            "interaction recorded"
        );
        Ok(pref)
    }

    /// Preference row and distinct user counts.
    pub async fn preference_counts(&self) -> Result<(u64, u64), EngineError> {
        let store = self.prefs.lock().await;
        Ok((store.count_preferences()?, store.count_users()?))
    }

    // --- Media ---

    async fn resolve_media(
        &self,
        tag: &str,
        blacklisted: &[String],
        preference: MediaTypePreference,
    ) -> Option<Media> {
        let query = MediaQuery::new(tag, blacklisted, preference);
        match self.media.search(&query).await {
            Ok(posts) => {
                let chosen = {
                    let mut rng = lock(&self.rng);
                    choose_media(&posts, self.settings.media_top_n, &mut *rng)
                };
                if chosen.is_none() {
                    tracing::warn!(tag, posts = posts.len(), %preference, "no usable media");
                }
                chosen
            }
            Err(e) => {
                tracing::warn!(tag, %preference, "{e}");
                None
            }
        }
    }

    // --- Selection ---

    fn draw(&self, catalog: &[CharacterEntity], affinity: Option<&AffinityMap>, exclusions: &Exclusions) -> Option<Selection> {
        let mut rng = lock(&self.rng);
        self.policy.select_next(catalog, affinity, exclusions, &mut *rng)
    }

    /// One character with media, retrying with a fresh draw when media fails.
    ///
    /// Each failed character is pushed to the recently-served ring and
    /// excluded for the rest of the request.
    pub async fn random_character(&self, req: &SelectionRequest) -> Result<(Served, usize), EngineError> {
        let catalog = self.loaded_catalog().await?;
        let affinity = self.affinity_for(req.user_id.as_deref()).await;
        let mut exclusions = req.exclusions();
        let max_attempts = self.settings.max_media_attempts;

        for attempt in 1..=max_attempts {
            exclusions.recently_served = lock(&self.recent).snapshot();
            let Some(selection) = self.draw(&catalog, affinity.as_ref(), &exclusions) else {
                if attempt == 1 {
                    return Err(EngineError::NoCandidates);
                }
                tracing::warn!(attempt, "no alternative characters left after media failures");
                return Err(EngineError::MediaExhausted {
                    attempts: attempt - 1,
                });
            };
            let name = selection.entity.name.clone();
            tracing::debug!(
                tag = %name,
                tier = selection.tier.as_str(),
                recency_relaxed = selection.recency_relaxed,
                attempt,
                "selected character"
            );

            let media = self
                .resolve_media(&name, &req.blacklisted, req.media_type)
                .await;
            lock(&self.recent).push(&name);
            match media {
                Some(media) => {
                    return Ok((
                        Served {
                            entity: selection.entity,
                            media: Some(media),
                        },
                        catalog.len(),
                    ));
                }
                None => {
                    tracing::warn!(tag = %name, attempt, max_attempts, "media failed, reselecting");
                    exclusions.exclude(&name);
                }
            }
        }
        Err(EngineError::MediaExhausted {
            attempts: max_attempts,
        })
    }

    /// Up to `count` distinct characters with media. Characters whose media
    /// fails are skipped and replaced from the remaining pool, with at most
    /// `count * max_media_attempts` lookups in total.
    ///
    /// Nothing to draw is `NoCandidates`; draws whose media all failed is
    /// `MediaExhausted`.
    pub async fn random_batch(
        &self,
        req: &SelectionRequest,
        count: usize,
    ) -> Result<(Vec<Served>, usize), EngineError> {
        let catalog = self.loaded_catalog().await?;
        let affinity = self.affinity_for(req.user_id.as_deref()).await;
        let mut exclusions = req
            .exclusions()
            .with_recently_served(lock(&self.recent).snapshot());

        let budget = count.saturating_mul(self.settings.max_media_attempts);
        let mut lookups = 0usize;
        let mut served: Vec<Served> = Vec::with_capacity(count);

        while served.len() < count && lookups < budget {
            let wanted = (count - served.len()).min(budget - lookups);
            let picks = {
                let mut rng = lock(&self.rng);
                self.policy
                    .select_batch(&catalog, affinity.as_ref(), &exclusions, wanted, &mut *rng)
            };
            if picks.is_empty() {
                break;
            }
            for pick in &picks {
                exclusions.exclude(&pick.entity.name);
            }
            lookups += picks.len();

            let media = join_all(
                picks
                    .iter()
                    .map(|p| self.resolve_media(&p.entity.name, &req.blacklisted, req.media_type)),
            )
            .await;

            for (pick, media) in picks.into_iter().zip(media) {
                match media {
                    Some(media) => served.push(Served {
                        entity: pick.entity,
                        media: Some(media),
                    }),
                    None => tracing::warn!(tag = %pick.entity.name, "media failed, skipping in batch"),
                }
            }
        }

        if served.is_empty() && count > 0 {
            if lookups == 0 {
                return Err(EngineError::NoCandidates);
            }
            tracing::warn!(lookups, "every media lookup in batch failed");
            return Err(EngineError::MediaExhausted { attempts: lookups });
        }
        {
            let mut ring = lock(&self.recent);
            for s in &served {
                ring.push(&s.entity.name);
            }
        }
        tracing::debug!(requested = count, served = served.len(), lookups, "batch complete");
        Ok((served, catalog.len()))
    }

    /// One page of the catalog in a stable, seed-determined order.
    ///
    /// Tags the user dislikes sink to the end. Media is resolved concurrently
    /// for the page; a failed lookup leaves that entry without media.
    pub async fn list_characters(
        &self,
        req: &SelectionRequest,
        seed: &str,
        page: usize,
        limit: usize,
    ) -> Result<ListPage, EngineError> {
        if page == 0 || limit == 0 {
            return Err(EngineError::Invalid("page and limit must be at least 1".into()));
        }
        let catalog = self.loaded_catalog().await?;

        let mut ordered: Vec<CharacterEntity> = catalog.to_vec();
        seeded_shuffle(&mut ordered, seed);
        if let Some(affinity) = self.affinity_for(req.user_id.as_deref()).await
            && !affinity.is_empty()
        {
            demote_disliked(&mut ordered, &affinity);
        }

        let exclusions = req.exclusions();
        ordered.retain(|e| !exclusions.is_hard_excluded(&e.name));

        let total = ordered.len();
        let total_pages = total.div_ceil(limit);
        let start = (page - 1).saturating_mul(limit).min(total);
        let end = start.saturating_add(limit).min(total);
        let page_items = &ordered[start..end];

        let media = join_all(
            page_items
                .iter()
                .map(|e| self.resolve_media(&e.name, &req.blacklisted, req.media_type)),
        )
        .await;

        let items = page_items
            .iter()
            .cloned()
            .zip(media)
            .map(|(entity, media)| Served { entity, media })
            .collect();

        Ok(ListPage {
            items,
            current_page: page,
            total_pages,
            total_in_system: catalog.len(),
        })
    }

    pub async fn health(&self) -> HealthReport {
        let catalog = self.catalog().await;
        HealthReport {
            catalog_size: catalog.len(),
            catalog_loaded: !catalog.is_empty(),
        }
    }
}
