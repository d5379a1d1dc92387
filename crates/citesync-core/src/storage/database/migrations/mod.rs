mod v1_initial;

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};

use crate::error::{CatalogError, Result};

/// One forward-only schema step, recorded in `schema_migrations` once applied.
pub trait Migration {
    fn version(&self) -> u32;
    fn description(&self) -> &'static str;
    fn up(&self, conn: &Connection) -> Result<()>;
}

fn all_migrations() -> Vec<Box<dyn Migration>> {
    vec![Box::new(v1_initial::V1Initial)]
}

fn has_migrations_table(conn: &Connection) -> Result<bool> {
    let found = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'schema_migrations'",
            [],
            |_| Ok(()),
        )
        .optional()?;
    Ok(found.is_some())
}

/// Applies every migration newer than the highest recorded version.
pub fn run_migrations(conn: &Connection) -> Result<()> {
    let current = get_applied_versions(conn)?.into_iter().max().unwrap_or(0);

    for migration in all_migrations().into_iter().filter(|m| m.version() > current) {
        let version = migration.version();
        tracing::debug!(version, "applying migration: {}", migration.description());
        migration.up(conn).map_err(|e| CatalogError::Migration {
            version,
            message: e.to_string(),
        })?;
        conn.execute(
            "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
            params![version, Utc::now().to_rfc3339()],
        )?;
    }
    Ok(())
}

pub fn get_applied_versions(conn: &Connection) -> Result<Vec<u32>> {
    if !has_migrations_table(conn)? {
        return Ok(Vec::new());
    }
    let mut stmt = conn.prepare("SELECT version FROM schema_migrations ORDER BY version")?;
    let versions = stmt
        .query_map([], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<u32>>>()?;
    Ok(versions)
}
