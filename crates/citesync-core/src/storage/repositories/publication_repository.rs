use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};
use uuid::Uuid;

use crate::error::{CatalogError, Result};
use crate::models::{Publication, PublicationType};

use super::{
    Repository, datetime_column, format_date, opt_date_column, opt_uuid_column, uuid_column,
};

pub trait PublicationRepository: Repository<Entity = Publication, Id = Uuid> {
    fn find_by_doi(&self, doi: &str) -> Result<Option<Publication>>;
    fn list_for_paper(&self, paper_id: &Uuid) -> Result<Vec<Publication>>;
    fn update(&self, publication: &Publication) -> Result<()>;
    fn count(&self) -> Result<usize>;
}

const PUBLICATION_COLUMNS: &str = "id, paper_id, doi, journal_title, issue, volume, pages, pubdate,
     pubtype, publisher_name, journal_id, publisher_id, pdf_url, splash_url, description,
     source, identifier, created_at, updated_at";

pub struct SqlitePublicationRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SqlitePublicationRepository<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn row_to_publication(row: &rusqlite::Row) -> rusqlite::Result<Publication> {
        let pubtype: String = row.get(8)?;
        Ok(Publication {
            id: uuid_column(row, 0)?,
            paper_id: uuid_column(row, 1)?,
            doi: row.get(2)?,
            journal_title: row.get(3)?,
            issue: row.get(4)?,
            volume: row.get(5)?,
            pages: row.get(6)?,
            pubdate: opt_date_column(row, 7)?,
            pubtype: PublicationType::from_crossref_type(&pubtype),
            publisher_name: row.get(9)?,
            journal_id: opt_uuid_column(row, 10)?,
            publisher_id: opt_uuid_column(row, 11)?,
            pdf_url: row.get(12)?,
            splash_url: row.get(13)?,
            description: row.get(14)?,
            source: row.get(15)?,
            identifier: row.get(16)?,
            created_at: datetime_column(row, 17)?,
            updated_at: datetime_column(row, 18)?,
        })
    }
}

impl<'a> Repository for SqlitePublicationRepository<'a> {
    type Entity = Publication;
    type Id = Uuid;

    fn find_by_id(&self, id: &Self::Id) -> Result<Option<Self::Entity>> {
        let sql = format!("SELECT {PUBLICATION_COLUMNS} FROM publications WHERE id = ?1");
        Ok(self
            .conn
            .query_row(&sql, params![id.to_string()], Self::row_to_publication)
            .optional()?)
    }

    fn insert(&self, p: &Self::Entity) -> Result<()> {
        self.conn.execute(
            "INSERT INTO publications
                (id, paper_id, doi, journal_title, issue, volume, pages, pubdate, pubtype,
                 publisher_name, journal_id, publisher_id, pdf_url, splash_url, description,
                 source, identifier, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19)",
            params![
                p.id.to_string(),
                p.paper_id.to_string(),
                p.doi,
                p.journal_title,
                p.issue,
                p.volume,
                p.pages,
                p.pubdate.as_ref().map(format_date),
                p.pubtype.as_str(),
                p.publisher_name,
                p.journal_id.map(|id| id.to_string()),
                p.publisher_id.map(|id| id.to_string()),
                p.pdf_url,
                p.splash_url,
                p.description,
                p.source,
                p.identifier,
                p.created_at.to_rfc3339(),
                p.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }
}

impl<'a> PublicationRepository for SqlitePublicationRepository<'a> {
    fn find_by_doi(&self, doi: &str) -> Result<Option<Publication>> {
        let sql = format!("SELECT {PUBLICATION_COLUMNS} FROM publications WHERE doi = ?1");
        Ok(self
            .conn
            .query_row(&sql, params![doi], Self::row_to_publication)
            .optional()?)
    }

    fn list_for_paper(&self, paper_id: &Uuid) -> Result<Vec<Publication>> {
        let sql = format!(
            "SELECT {PUBLICATION_COLUMNS} FROM publications WHERE paper_id = ?1 ORDER BY created_at, id"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![paper_id.to_string()], Self::row_to_publication)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Only the fields enrichment may change: description, pdf_url, splash_url.
    fn update(&self, p: &Publication) -> Result<()> {
        let changed = self.conn.execute(
            "UPDATE publications
                SET description = ?2, pdf_url = ?3, splash_url = ?4, updated_at = ?5
              WHERE id = ?1",
            params![
                p.id.to_string(),
                p.description,
                p.pdf_url,
                p.splash_url,
                Utc::now().to_rfc3339(),
            ],
        )?;
        if changed == 0 {
            return Err(CatalogError::PublicationNotFound(p.id.to_string()));
        }
        Ok(())
    }

    fn count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM publications", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}
