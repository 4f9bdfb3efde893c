use std::collections::BTreeMap;
use std::path::Path;

use rusqlite::{Connection, OptionalExtension, Row, TransactionBehavior, params};

use swipe_core::{AffinityMap, InteractionMetrics, InteractionType, TagPreference};

use crate::error::{Result, StoreError};
use crate::schema;

const PREFERENCE_COLUMNS: &str = "tag, smash_count, pass_count, favorite_count, interaction_count,
     total_view_time, total_swipe_speed, total_session_swipe_value, total_action_streak_value,
     time_of_day_counts, day_of_week_counts, device_counts,
     affinity_score, last_interacted_at, last_interaction_type, last_affinity";

/// Per-user, per-tag interaction records backed by SQLite.
pub struct PreferenceStore {
    conn: Connection,
}

impl PreferenceStore {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        schema::initialize(&conn)?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        schema::initialize(&conn)?;
        Ok(Self { conn })
    }

    // --- Interactions ---

    /// Fold one interaction into the `(user_id, tag)` record and return the
    /// updated record.
    ///
    /// The read-modify-write runs in a `BEGIN IMMEDIATE` transaction, so a
    /// concurrent writer (this process or another one on the same file) waits
    /// on the busy timeout rather than interleaving and losing an update.
    pub fn record_interaction(
        &mut self,
        user_id: &str,
        tag: &str,
        interaction: InteractionType,
        metrics: &InteractionMetrics,
        at: &str,
    ) -> Result<TagPreference> {
        if user_id.trim().is_empty() {
            return Err(StoreError::InvalidData("user id must not be empty".into()));
        }
        if tag.trim().is_empty() {
            return Err(StoreError::InvalidData("tag must not be empty".into()));
        }

        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let mut pref = load_preference(&tx, user_id, tag)?.unwrap_or_else(|| TagPreference::new(tag));
        pref.apply(interaction, metrics, at);
        upsert_preference(&tx, user_id, &pref)?;

        tx.commit()?;
        tracing::debug!(
            user_id,
            tag,
            interaction = interaction.as_str(),
            affinity = pref.affinity_score,
            "recorded interaction"
        );
        Ok(pref)
    }

    pub fn get_preference(&self, user_id: &str, tag: &str) -> Result<Option<TagPreference>> {
        load_preference(&self.conn, user_id, tag)
    }

    /// All records for a user, highest affinity first.
    pub fn preferences_for_user(&self, user_id: &str) -> Result<Vec<TagPreference>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {PREFERENCE_COLUMNS} FROM tag_preferences
             WHERE user_id = ?1 ORDER BY affinity_score DESC, tag ASC"
        ))?;
        let raws: Vec<RawPreference> = stmt
            .query_map([user_id], RawPreference::from_row)?
            .collect::<std::result::Result<_, _>>()?;
        raws.into_iter().map(RawPreference::into_preference).collect()
    }

    /// Tag → affinity score for one user. Empty when the user has no records.
    pub fn affinity_map(&self, user_id: &str) -> Result<AffinityMap> {
        let mut stmt = self
            .conn
            .prepare("SELECT tag, affinity_score FROM tag_preferences WHERE user_id = ?1")?;
        let map = stmt
            .query_map([user_id], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })?
            .collect::<std::result::Result<AffinityMap, _>>()?;
        Ok(map)
    }

    pub fn count_preferences(&self) -> Result<u64> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM tag_preferences", [], |row| row.get(0))?;
        Ok(n as u64)
    }

    pub fn count_users(&self) -> Result<u64> {
        let n: i64 = self.conn.query_row(
            "SELECT COUNT(DISTINCT user_id) FROM tag_preferences",
            [],
            |row| row.get(0),
        )?;
        Ok(n as u64)
    }
}

fn load_preference(conn: &Connection, user_id: &str, tag: &str) -> Result<Option<TagPreference>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {PREFERENCE_COLUMNS} FROM tag_preferences WHERE user_id = ?1 AND tag = ?2"
    ))?;
    let raw = stmt
        .query_row(params![user_id, tag], RawPreference::from_row)
        .optional()?;
    raw.map(RawPreference::into_preference).transpose()
}

fn upsert_preference(conn: &Connection, user_id: &str, pref: &TagPreference) -> Result<()> {
    conn.execute(
        "INSERT INTO tag_preferences (
             user_id, tag, smash_count, pass_count, favorite_count, interaction_count,
             total_view_time, total_swipe_speed, total_session_swipe_value, total_action_streak_value,
             time_of_day_counts, day_of_week_counts, device_counts,
             affinity_score, last_interacted_at, last_interaction_type, last_affinity)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)
         ON CONFLICT(user_id, tag) DO UPDATE SET
             smash_count = excluded.smash_count,
             pass_count = excluded.pass_count,
             favorite_count = excluded.favorite_count,
             interaction_count = excluded.interaction_count,
             total_view_time = excluded.total_view_time,
             total_swipe_speed = excluded.total_swipe_speed,
             total_session_swipe_value = excluded.total_session_swipe_value,
             total_action_streak_value = excluded.total_action_streak_value,
             time_of_day_counts = excluded.time_of_day_counts,
             day_of_week_counts = excluded.day_of_week_counts,
             device_counts = excluded.device_counts,
             affinity_score = excluded.affinity_score,
             last_interacted_at = excluded.last_interacted_at,
             last_interaction_type = excluded.last_interaction_type,
             last_affinity = excluded.last_affinity",
        params![
            user_id,
            pref.tag,
            to_sql_count(pref.smash_count),
            to_sql_count(pref.pass_count),
            to_sql_count(pref.favorite_count),
            to_sql_count(pref.interaction_count),
            pref.total_view_time,
            pref.total_swipe_speed,
            pref.total_session_swipe_value,
            pref.total_action_streak_value,
            serde_json::to_string(&pref.time_of_day_counts)?,
            serde_json::to_string(&pref.day_of_week_counts)?,
            serde_json::to_string(&pref.device_counts)?,
            pref.affinity_score,
            pref.last_interacted_at,
            pref.last_interaction_type.map(InteractionType::as_str),
            pref.last_affinity,
        ],
    )?;
    Ok(())
}

fn to_sql_count(n: u64) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

/// Row as stored, before the JSON histograms and enum columns are parsed.
struct RawPreference {
    tag: String,
    counts: [i64; 4],
    totals: [f64; 4],
    histograms: [String; 3],
    affinity_score: i64,
    last_interacted_at: Option<String>,
    last_interaction_type: Option<String>,
    last_affinity: i64,
}

impl RawPreference {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            tag: row.get(0)?,
            counts: [row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?],
            totals: [row.get(5)?, row.get(6)?, row.get(7)?, row.get(8)?],
            histograms: [row.get(9)?, row.get(10)?, row.get(11)?],
            affinity_score: row.get(12)?,
            last_interacted_at: row.get(13)?,
            last_interaction_type: row.get(14)?,
            last_affinity: row.get(15)?,
        })
    }

    fn into_preference(self) -> Result<TagPreference> {
        let [smash, pass, favorite, interactions] = self.counts.map(|n| n.max(0) as u64);
        let [view, speed, session, streak] = self.totals;
        let [tod, dow, device] = self.histograms;
        let last_interaction_type = self
            .last_interaction_type
            .map(|s| {
                s.parse::<InteractionType>()
                    .map_err(|e| StoreError::InvalidData(e.to_string()))
            })
            .transpose()?;

        Ok(TagPreference {
            tag: self.tag,
            smash_count: smash,
            pass_count: pass,
            favorite_count: favorite,
            interaction_count: interactions,
            total_view_time: view,
            total_swipe_speed: speed,
            total_session_swipe_value: session,
            total_action_streak_value: streak,
            time_of_day_counts: parse_histogram(&tod)?,
            day_of_week_counts: parse_histogram(&dow)?,
            device_counts: parse_histogram(&device)?,
            affinity_score: self.affinity_score,
            last_interacted_at: self.last_interacted_at,
            last_interaction_type,
            last_affinity: self.last_affinity,
        })
    }
}

fn parse_histogram(raw: &str) -> Result<BTreeMap<String, u64>> {
    if raw.trim().is_empty() {
        return Ok(BTreeMap::new());
    }
    Ok(serde_json::from_str(raw)?)
}
