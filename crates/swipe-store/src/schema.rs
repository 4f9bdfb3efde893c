use rusqlite::Connection;

use crate::error::{Result, StoreError};

pub const SCHEMA_VERSION: i64 = 1;

pub fn initialize(conn: &Connection) -> Result<()> {
    conn.execute_batch("PRAGMA journal_mode = WAL;")?;
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    // Concurrent interactions on the same row wait here instead of failing.
    conn.pragma_update(None, "busy_timeout", 5000)?;
    conn.pragma_update(None, "wal_autocheckpoint", 100)?;

    // Errors are non-fatal: in-memory DBs and fresh files legitimately fail this.
    if conn
        .execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")
        .is_ok()
    {
        tracing::debug!("startup WAL checkpoint complete");
    }

    // Histograms are JSON objects keyed by bucket ("0".."23", "0".."6", device class).
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS metadata (
            key   TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS tag_preferences (
            user_id                   TEXT NOT NULL,
            tag                       TEXT NOT NULL,
            smash_count               INTEGER NOT NULL DEFAULT 0,
            pass_count                INTEGER NOT NULL DEFAULT 0,
            favorite_count            INTEGER NOT NULL DEFAULT 0,
            interaction_count         INTEGER NOT NULL DEFAULT 0,
            total_view_time           REAL NOT NULL DEFAULT 0,
            total_swipe_speed         REAL NOT NULL DEFAULT 0,
            total_session_swipe_value REAL NOT NULL DEFAULT 0,
            total_action_streak_value REAL NOT NULL DEFAULT 0,
            time_of_day_counts        TEXT NOT NULL DEFAULT '{}',
            day_of_week_counts        TEXT NOT NULL DEFAULT '{}',
            device_counts             TEXT NOT NULL DEFAULT '{}',
            affinity_score            INTEGER NOT NULL DEFAULT 0,
            last_interacted_at        TEXT,
            last_interaction_type     TEXT,
            last_affinity             INTEGER NOT NULL DEFAULT 0,
            PRIMARY KEY (user_id, tag)
        );

        CREATE INDEX IF NOT EXISTS idx_pref_user ON tag_preferences(user_id);
        ",
    )?;

    if let Some(found) = get_schema_version(conn)?
        && found > SCHEMA_VERSION
    {
        return Err(StoreError::InvalidData(format!(
            "database schema version {found} is newer than supported version {SCHEMA_VERSION}"
        )));
    }

    conn.execute(
        "INSERT OR REPLACE INTO metadata (key, value) VALUES ('schema_version', ?1)",
        [SCHEMA_VERSION.to_string()],
    )?;

    Ok(())
}

pub fn get_schema_version(conn: &Connection) -> Result<Option<i64>> {
    let mut stmt = conn.prepare("SELECT value FROM metadata WHERE key = 'schema_version'")?;
    let version = stmt
        .query_row([], |row| {
            let v: String = row.get(0)?;
            Ok(v.parse::<i64>().unwrap_or(0))
        })
        .ok();
    Ok(version)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initialize_creates_tables() {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();

        for table in &["metadata", "tag_preferences"] {
            let count: i64 = conn
                .query_row(&format!("SELECT count(*) FROM {table}"), [], |row| {
                    row.get(0)
                })
                .unwrap();
            assert!(count >= 0, "table {table} should exist");
        }
    }

    #[test]
    fn test_schema_version_set() {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();

        let version = get_schema_version(&conn).unwrap();
        assert_eq!(version, Some(SCHEMA_VERSION));
    }

    #[test]
    fn test_idempotent_initialize() {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();
        initialize(&conn).unwrap();
    }

    #[test]
    fn test_newer_schema_rejected() {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();
        conn.execute(
            "UPDATE metadata SET value = '99' WHERE key = 'schema_version'",
            [],
        )
        .unwrap();

        assert!(matches!(initialize(&conn), Err(StoreError::InvalidData(_))));
        assert_eq!(get_schema_version(&conn).unwrap(), Some(99));
    }

    #[test]
    fn test_busy_timeout_set() {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();

        let timeout: i64 = conn
            .query_row("PRAGMA busy_timeout", [], |row| row.get(0))
            .unwrap();
        assert_eq!(timeout, 5000, "busy_timeout should be 5000ms");
    }

    #[test]
    fn test_primary_key_is_user_and_tag() {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();

        conn.execute(
            "INSERT INTO tag_preferences (user_id, tag) VALUES ('u', 't')",
            [],
        )
        .unwrap();
        let dup = conn.execute(
            "INSERT INTO tag_preferences (user_id, tag) VALUES ('u', 't')",
            [],
        );
        assert!(dup.is_err(), "duplicate (user_id, tag) must be rejected");
        conn.execute(
            "INSERT INTO tag_preferences (user_id, tag) VALUES ('v', 't')",
            [],
        )
        .unwrap();
    }
}
