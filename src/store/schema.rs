//! SQLite DDL definitions for the location sample store.
//!
//! All `CREATE TABLE` / `CREATE INDEX` statements live here so they are
//! reviewable and testable in isolation.

use rusqlite::Connection;

/// Schema version stamped into `schema_meta` on first open.
pub(crate) const CURRENT_SCHEMA_VERSION: u32 = 1;

/// Complete DDL for the sample database.
///
/// Uses `IF NOT EXISTS` throughout so `apply_schema` is idempotent.
pub(crate) const SCHEMA_SQL: &str = r#"
-- Enable WAL mode so history reads proceed while the collector appends.
PRAGMA journal_mode = WAL;

CREATE TABLE IF NOT EXISTS schema_meta (
    key   TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

-- AUTOINCREMENT keeps ids strictly increasing and never reused.
CREATE TABLE IF NOT EXISTS location_samples (
    id        INTEGER PRIMARY KEY AUTOINCREMENT,
    latitude  REAL    NOT NULL,
    longitude REAL    NOT NULL,
    precision REAL    NOT NULL,
    timestamp INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_samples_timestamp ON location_samples(timestamp, id);
"#;

/// Apply the full schema to an open connection.
///
/// Safe to call multiple times. Seeds the schema version into
/// `schema_meta` if not already present.
pub(crate) fn apply_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_meta (key, value) VALUES ('schema_version', ?1)",
        rusqlite::params![CURRENT_SCHEMA_VERSION.to_string()],
    )?;

    Ok(())
}

/// Read the current schema version from the database.
///
/// Returns `None` if the key is missing.
pub(crate) fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<u32>> {
    let mut stmt = conn.prepare("SELECT value FROM schema_meta WHERE key = 'schema_version'")?;
    let mut rows = stmt.query([])?;
    match rows.next()? {
        Some(row) => {
            let val: String = row.get(0)?;
            Ok(val.parse::<u32>().ok())
        }
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apply_schema_creates_tables() {
        let conn = Connection::open_in_memory().expect("open in-memory db");
        apply_schema(&conn).expect("apply_schema");

        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .expect("prepare")
            .query_map([], |row| row.get(0))
            .expect("query")
            .filter_map(|r| r.ok())
            .collect();

        assert!(tables.contains(&"location_samples".to_owned()));
        assert!(tables.contains(&"schema_meta".to_owned()));
    }

    #[test]
    fn apply_schema_is_idempotent() {
        let conn = Connection::open_in_memory().expect("open in-memory db");
        apply_schema(&conn).expect("first apply_schema");
        apply_schema(&conn).expect("second apply_schema");
    }

    #[test]
    fn schema_version_not_overwritten_on_reapply() {
        let conn = Connection::open_in_memory().expect("open in-memory db");
        apply_schema(&conn).expect("first apply");
        assert_eq!(
            read_schema_version(&conn).expect("read"),
            Some(CURRENT_SCHEMA_VERSION)
        );

        conn.execute(
            "UPDATE schema_meta SET value = '7' WHERE key = 'schema_version'",
            [],
        )
        .expect("bump version");
        apply_schema(&conn).expect("second apply");

        assert_eq!(read_schema_version(&conn).expect("read"), Some(7));
    }
}
