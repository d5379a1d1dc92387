use rusqlite::Connection;

use super::Migration;
use crate::error::Result;
use crate::storage::database::schema;

/// Papers, publications, journals, publishers and publisher aliases.
pub struct V1Initial;

impl Migration for V1Initial {
    fn version(&self) -> u32 {
        schema::SCHEMA_VERSION
    }

    fn description(&self) -> &'static str {
        "paper catalog"
    }

    fn up(&self, conn: &Connection) -> Result<()> {
        schema::create_tables(conn)?;
        schema::create_indexes(conn)
    }
}
