//! Character selection and affinity engine for a swipe-based content app.
//!
//! Picks the next character to show with a two-tier weighted-random policy
//! (explore unseen or disliked tags, exploit liked ones), keeps the bookkeeping
//! that stops immediate repeats, and folds swipe interactions into per-tag
//! affinity records.
//!
//! Zero I/O: no opinions about transport or persistence. Time comes in
//! through [`Clock`], randomness through any [`rand::Rng`].

pub mod affinity;
pub mod catalog;
pub mod constants;
pub mod media;
pub mod recent;
pub mod selection;
pub mod time;

pub use affinity::{
    AffinityMap, InteractionMetrics, InteractionType, MetricsError, ParseInteractionError,
    TagPreference,
};
pub use catalog::{CatalogCache, CharacterEntity, display_name, seeded_shuffle};
pub use constants::{CATALOG_RETRY_MS, CATALOG_TTL_MS, EXPLORE_RATE, MAX_MEDIA_ATTEMPTS, RECENTLY_SERVED_CAPACITY};
pub use media::{
    Media, MediaKind, MediaPost, MediaQuery, MediaTypePreference, ParseMediaTypeError,
    choose_media, classify_url, normalize_url,
};
pub use recent::RecentlyServedRing;
pub use selection::{
    Exclusions, Selection, SelectionPolicy, SelectionTier, demote_disliked, select_batch,
    select_next,
};
pub use time::{Clock, ManualClock, SystemClock, unix_millis_to_iso8601};
