use rusqlite::{Connection, OptionalExtension, params};
use uuid::Uuid;

use crate::error::Result;
use crate::models::{Journal, Publisher};

use super::{opt_uuid_column, uuid_column};

/// Journals, publishers and the publisher alias counters.
pub trait JournalRepository {
    fn find_journal(&self, title: &str, issn: Option<&str>) -> Result<Option<Journal>>;
    fn insert_journal(&self, journal: &Journal) -> Result<()>;
    fn find_publisher_by_name(&self, name: &str) -> Result<Option<Publisher>>;
    fn find_publisher_by_id(&self, id: &Uuid) -> Result<Option<Publisher>>;
    fn insert_publisher(&self, publisher: &Publisher) -> Result<()>;
    fn increment_alias(&self, name: &str, publisher_id: &Uuid) -> Result<u32>;
}

pub struct SqliteJournalRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteJournalRepository<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn row_to_journal(row: &rusqlite::Row) -> rusqlite::Result<Journal> {
        Ok(Journal {
            id: uuid_column(row, 0)?,
            title: row.get(1)?,
            issn: row.get(2)?,
            publisher_id: opt_uuid_column(row, 3)?,
        })
    }

    fn row_to_publisher(row: &rusqlite::Row) -> rusqlite::Result<Publisher> {
        Ok(Publisher {
            id: uuid_column(row, 0)?,
            name: row.get(1)?,
        })
    }
}

impl<'a> JournalRepository for SqliteJournalRepository<'a> {
    fn find_journal(&self, title: &str, issn: Option<&str>) -> Result<Option<Journal>> {
        if let Some(issn) = issn.map(str::trim).filter(|s| !s.is_empty()) {
            let by_issn = self
                .conn
                .query_row(
                    "SELECT id, title, issn, publisher_id FROM journals WHERE issn = ?1 LIMIT 1",
                    params![issn],
                    Self::row_to_journal,
                )
                .optional()?;
            if by_issn.is_some() {
                return Ok(by_issn);
            }
        }

        Ok(self
            .conn
            .query_row(
                "SELECT id, title, issn, publisher_id FROM journals
                  WHERE title = ?1 COLLATE NOCASE LIMIT 1",
                params![title.trim()],
                Self::row_to_journal,
            )
            .optional()?)
    }

    fn insert_journal(&self, journal: &Journal) -> Result<()> {
        self.conn.execute(
            "INSERT INTO journals (id, title, issn, publisher_id) VALUES (?1, ?2, ?3, ?4)",
            params![
                journal.id.to_string(),
                journal.title,
                journal.issn,
                journal.publisher_id.map(|id| id.to_string()),
            ],
        )?;
        Ok(())
    }

    fn find_publisher_by_name(&self, name: &str) -> Result<Option<Publisher>> {
        Ok(self
            .conn
            .query_row(
                "SELECT id, name FROM publishers WHERE name = ?1",
                params![name],
                Self::row_to_publisher,
            )
            .optional()?)
    }

    fn find_publisher_by_id(&self, id: &Uuid) -> Result<Option<Publisher>> {
        Ok(self
            .conn
            .query_row(
                "SELECT id, name FROM publishers WHERE id = ?1",
                params![id.to_string()],
                Self::row_to_publisher,
            )
            .optional()?)
    }

    fn insert_publisher(&self, publisher: &Publisher) -> Result<()> {
        self.conn.execute(
            "INSERT INTO publishers (id, name) VALUES (?1, ?2)",
            params![publisher.id.to_string(), publisher.name],
        )?;
        Ok(())
    }

    fn increment_alias(&self, name: &str, publisher_id: &Uuid) -> Result<u32> {
        let count: i64 = self.conn.query_row(
            "INSERT INTO publisher_aliases (name, publisher_id, count) VALUES (?1, ?2, 1)
             ON CONFLICT(name, publisher_id) DO UPDATE SET count = count + 1
             RETURNING count",
            params![name, publisher_id.to_string()],
            |row| row.get(0),
        )?;
        Ok(count as u32)
    }
}
