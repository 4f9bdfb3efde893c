/// How long a loaded catalog snapshot is served before a reload is attempted (5 minutes).
pub const CATALOG_TTL_MS: u64 = 5 * 60 * 1000;

/// Minimum gap between catalog load attempts, so a broken source is not
/// re-read on every request.
pub const CATALOG_RETRY_MS: u64 = 10 * 1000;

/// Capacity of the process-wide recently-served ring.
pub const RECENTLY_SERVED_CAPACITY: usize = 15;

/// Probability of drawing from the "other" (unexplored or disliked) tier.
pub const EXPLORE_RATE: f64 = 0.8;

/// Base weight for any tag in the smashed tier.
pub const SMASHED_BASE_WEIGHT: f64 = 1.0;

/// Weight added per point of affinity in the smashed tier.
pub const SMASHED_AFFINITY_FACTOR: f64 = 0.5;

/// Floor so that every smashed tag keeps a chance of being drawn.
pub const SMASHED_MIN_WEIGHT: f64 = 0.1;

/// Smash increments added by a single favorite.
pub const FAVORITE_SMASH_WEIGHT: u64 = 2;

/// Upper bound on a single reported view time, in milliseconds.
pub const MAX_VIEW_TIME_MS: f64 = 30_000.0;

/// Total media resolution attempts for a single selection before giving up.
pub const MAX_MEDIA_ATTEMPTS: usize = 3;

/// Tag always excluded from media queries.
pub const EXCLUDED_MEDIA_TAG: &str = "ai_generated";

/// Number of posts requested from the media lookup per query.
pub const MEDIA_RESULT_LIMIT: usize = 20;
