use rusqlite::{params, Connection, OptionalExtension};

use crate::db::DatabaseError;

/// Set when contactable authors were last derived.
pub const META_CONTACTABLE_REFRESHED: &str = "contactable_refreshed_at";
/// Identifier of the authoritative randomisation run.
pub const META_RANDOMISATION_ID: &str = "randomisation_id";
/// Seed used by the authoritative randomisation run.
pub const META_RANDOMISATION_SEED: &str = "randomisation_seed";
/// Digest of the authoritative allocation (pmid → arm).
pub const META_ALLOCATION_DIGEST: &str = "allocation_digest";

pub fn get_meta(conn: &Connection, key: &str) -> Result<Option<String>, DatabaseError> {
    Ok(conn
        .query_row(
            "SELECT value FROM cohort_meta WHERE key = ?1",
            params![key],
            |row| row.get(0),
        )
        .optional()?)
}

pub fn set_meta(conn: &Connection, key: &str, value: &str) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO cohort_meta (key, value) VALUES (?1, ?2)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = datetime('now')",
        params![key, value],
    )?;
    Ok(())
}

pub fn delete_meta(conn: &Connection, key: &str) -> Result<(), DatabaseError> {
    conn.execute("DELETE FROM cohort_meta WHERE key = ?1", params![key])?;
    Ok(())
}
