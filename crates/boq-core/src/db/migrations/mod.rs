//! Schema upgrades for the BOQ store.
//!
//! The store's version lives in `PRAGMA user_version` and is mirrored into
//! `store_meta.schema_version`. Each step runs in its own transaction and
//! its DDL is `IF NOT EXISTS`, so a step interrupted before commit simply
//! runs again on the next open.

use super::schema;
use rusqlite::{Connection, types::Type};
use tracing::{debug, warn};

/// Newest schema this build writes.
pub const LATEST_SCHEMA_VERSION: u32 = 2;

struct Step {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

const STEPS: &[Step] = &[
    Step {
        version: 1,
        name: "core tables",
        sql: schema::MIGRATION_V1_SQL,
    },
    Step {
        version: 2,
        name: "aggregate indexes",
        sql: schema::MIGRATION_V2_SQL,
    },
];

/// Schema version recorded in `PRAGMA user_version`.
///
/// # Errors
///
/// Returns an error if the pragma cannot be read or holds a negative value.
pub fn current_schema_version(conn: &Connection) -> rusqlite::Result<u32> {
    let raw: i64 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
    u32::try_from(raw)
        .map_err(|error| rusqlite::Error::FromSqlConversionFailure(0, Type::Integer, Box::new(error)))
}

/// Bring the store up to [`LATEST_SCHEMA_VERSION`] and return the version
/// it ends at. A store written by a newer build is left untouched.
///
/// # Errors
///
/// Returns an error if a step fails; that step's transaction rolls back.
pub fn migrate(conn: &mut Connection) -> rusqlite::Result<u32> {
    let start = current_schema_version(conn)?;
    if start > LATEST_SCHEMA_VERSION {
        warn!(
            store_version = start,
            latest = LATEST_SCHEMA_VERSION,
            "store schema is newer than this build"
        );
        return Ok(start);
    }

    let mut version = start;
    for step in STEPS.iter().filter(|step| step.version > start) {
        let tx = conn.transaction()?;
        tx.execute_batch(step.sql)?;
        tx.pragma_update(None, "user_version", i64::from(step.version))?;
        tx.execute(
            "UPDATE store_meta SET schema_version = ?1 WHERE id = 1",
            [i64::from(step.version)],
        )?;
        tx.commit()?;
        debug!(version = step.version, step = step.name, "store schema upgraded");
        version = step.version;
    }
    Ok(version)
}
