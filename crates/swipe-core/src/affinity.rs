//! Affinity aggregation: fold swipe interactions into per-tag counters.
//!
//! Every interaction a user reports for a tag updates one [`TagPreference`].
//! The scalar affinity score is always recomputed from the counters, never
//! nudged incrementally, so a record can be repaired by fixing its counts.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::constants::{FAVORITE_SMASH_WEIGHT, MAX_VIEW_TIME_MS};

/// Per-user map of tag → affinity score.
pub type AffinityMap = HashMap<String, i64>;

/// What the user did with a character card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InteractionType {
    Smash,
    Pass,
    /// Counts as a double smash on top of its own counter.
    Favorite,
}

impl InteractionType {
    pub fn as_str(self) -> &'static str {
        match self {
            InteractionType::Smash => "smash",
            InteractionType::Pass => "pass",
            InteractionType::Favorite => "favorite",
        }
    }

    /// Direction of this single interaction: +1 for smash/favorite, -1 for pass.
    pub fn direction(self) -> i64 {
        match self {
            InteractionType::Pass => -1,
            InteractionType::Smash | InteractionType::Favorite => 1,
        }
    }
}

impl fmt::Display for InteractionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseInteractionError(pub String);

impl fmt::Display for ParseInteractionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid interaction type '{}': must be \"smash\", \"pass\", or \"favorite\"",
            self.0
        )
    }
}

impl std::error::Error for ParseInteractionError {}

impl FromStr for InteractionType {
    type Err = ParseInteractionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "smash" => Ok(InteractionType::Smash),
            "pass" => Ok(InteractionType::Pass),
            "favorite" => Ok(InteractionType::Favorite),
            _ => Err(ParseInteractionError(s.to_string())),
        }
    }
}

/// Optional behavioral signals reported alongside an interaction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InteractionMetrics {
    /// Milliseconds the card was on screen.
    pub view_time_ms: Option<f64>,
    pub swipe_speed: Option<f64>,
    /// Local hour, 0–23.
    pub time_of_day: Option<u8>,
    /// 0 = Sunday … 6 = Saturday.
    pub day_of_week: Option<u8>,
    pub device_type: Option<String>,
    pub session_swipe_count: Option<f64>,
    pub action_streak_count: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MetricsError {
    TimeOfDay(u8),
    DayOfWeek(u8),
    NotFinite(&'static str),
    Negative(&'static str),
}

impl fmt::Display for MetricsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricsError::TimeOfDay(h) => write!(f, "timeOfDay must be 0-23, got {h}"),
            MetricsError::DayOfWeek(d) => write!(f, "dayOfWeek must be 0-6, got {d}"),
            MetricsError::NotFinite(field) => write!(f, "{field} must be a finite number"),
            MetricsError::Negative(field) => write!(f, "{field} must not be negative"),
        }
    }
}

impl std::error::Error for MetricsError {}

impl InteractionMetrics {
    pub fn validate(&self) -> Result<(), MetricsError> {
        if let Some(h) = self.time_of_day
            && h > 23
        {
            return Err(MetricsError::TimeOfDay(h));
        }
        if let Some(d) = self.day_of_week
            && d > 6
        {
            return Err(MetricsError::DayOfWeek(d));
        }
        let numbers = [
            ("viewTime", self.view_time_ms),
            ("swipeSpeed", self.swipe_speed),
            ("sessionSwipeCount", self.session_swipe_count),
            ("actionStreakCount", self.action_streak_count),
        ];
        for (field, value) in numbers {
            if let Some(v) = value {
                if !v.is_finite() {
                    return Err(MetricsError::NotFinite(field));
                }
                if v < 0.0 {
                    return Err(MetricsError::Negative(field));
                }
            }
        }
        Ok(())
    }

    /// View time clamped to the accepted range.
    pub fn capped_view_time(&self) -> f64 {
        self.view_time_ms.unwrap_or(0.0).clamp(0.0, MAX_VIEW_TIME_MS)
    }

    pub fn device(&self) -> &str {
        match self.device_type.as_deref().map(str::trim) {
            Some(d) if !d.is_empty() => d,
            _ => "unknown",
        }
    }
}

/// Accumulated interaction state for one `(user, tag)` pair.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagPreference {
    pub tag: String,
    pub smash_count: u64,
    pub pass_count: u64,
    pub favorite_count: u64,
    pub interaction_count: u64,
    pub total_view_time: f64,
    pub total_swipe_speed: f64,
    pub total_session_swipe_value: f64,
    pub total_action_streak_value: f64,
    pub time_of_day_counts: BTreeMap<String, u64>,
    pub day_of_week_counts: BTreeMap<String, u64>,
    pub device_counts: BTreeMap<String, u64>,
    pub affinity_score: i64,
    pub last_interacted_at: Option<String>,
    pub last_interaction_type: Option<InteractionType>,
    pub last_affinity: i64,
}

impl TagPreference {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Default::default()
        }
    }

    /// Fold one interaction into the record and recompute the score.
    ///
    /// `at` is the ISO-8601 timestamp of the interaction.
    pub fn apply(&mut self, interaction: InteractionType, metrics: &InteractionMetrics, at: &str) {
        self.interaction_count += 1;
        match interaction {
            InteractionType::Smash => self.smash_count += 1,
            InteractionType::Pass => self.pass_count += 1,
            InteractionType::Favorite => {
                self.favorite_count += 1;
                self.smash_count += FAVORITE_SMASH_WEIGHT;
            }
        }

        self.total_view_time += metrics.capped_view_time();
        self.total_swipe_speed += metrics.swipe_speed.unwrap_or(0.0);
        self.total_session_swipe_value += metrics.session_swipe_count.unwrap_or(0.0);
        self.total_action_streak_value += metrics.action_streak_count.unwrap_or(0.0);

        if let Some(hour) = metrics.time_of_day {
            *self.time_of_day_counts.entry(hour.to_string()).or_default() += 1;
        }
        if let Some(day) = metrics.day_of_week {
            *self.day_of_week_counts.entry(day.to_string()).or_default() += 1;
        }
        *self
            .device_counts
            .entry(metrics.device().to_string())
            .or_default() += 1;

        self.last_interacted_at = Some(at.to_string());
        self.last_interaction_type = Some(interaction);
        self.last_affinity = interaction.direction();
        self.recompute_affinity();
    }

    /// `smash_count - pass_count`, written back to `affinity_score`.
    pub fn recompute_affinity(&mut self) -> i64 {
        let smash = i64::try_from(self.smash_count).unwrap_or(i64::MAX);
        let pass = i64::try_from(self.pass_count).unwrap_or(i64::MAX);
        self.affinity_score = smash.saturating_sub(pass);
        self.affinity_score
    }

    fn average(&self, total: f64) -> f64 {
        if self.interaction_count == 0 {
            0.0
        } else {
            total / self.interaction_count as f64
        }
    }

    pub fn avg_view_time(&self) -> f64 {
        self.average(self.total_view_time)
    }

    pub fn avg_swipe_speed(&self) -> f64 {
        self.average(self.total_swipe_speed)
    }

    pub fn avg_session_swipe_count(&self) -> f64 {
        self.average(self.total_session_swipe_value)
    }

    pub fn avg_action_streak_count(&self) -> f64 {
        self.average(self.total_action_streak_value)
    }
}
