use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};
use std::str::FromStr;
use uuid::Uuid;

use crate::error::{CatalogError, Result};
use crate::models::{OaStatus, Paper, PaperAuthor};

use super::{Repository, date_column, datetime_column, format_date, uuid_column};

pub trait PaperRepository: Repository<Entity = Paper, Id = Uuid> {
    fn find_by_fingerprint(&self, fingerprint: &str) -> Result<Option<Paper>>;
    fn update_authors(&self, id: &Uuid, authors: &[PaperAuthor]) -> Result<()>;
    fn set_availability(&self, id: &Uuid, pdf_url: Option<&str>, status: OaStatus) -> Result<()>;
    fn set_visible(&self, id: &Uuid, visible: bool) -> Result<()>;
    fn count(&self) -> Result<usize>;
}

const PAPER_COLUMNS: &str =
    "id, fingerprint, title, authors, pubdate, visible, pdf_url, oa_status, created_at, updated_at";

pub struct SqlitePaperRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SqlitePaperRepository<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn row_to_paper(row: &rusqlite::Row) -> rusqlite::Result<(Paper, String, String)> {
        let authors_str: String = row.get(3)?;
        let status_str: String = row.get(7)?;
        let paper = Paper {
            id: uuid_column(row, 0)?,
            fingerprint: row.get(1)?,
            title: row.get(2)?,
            authors: Vec::new(),
            pubdate: date_column(row, 4)?,
            visible: row.get(5)?,
            pdf_url: row.get(6)?,
            oa_status: OaStatus::Closed,
            created_at: datetime_column(row, 8)?,
            updated_at: datetime_column(row, 9)?,
        };
        Ok((paper, authors_str, status_str))
    }

    fn finish(raw: (Paper, String, String)) -> Result<Paper> {
        let (mut paper, authors_str, status_str) = raw;
        paper.authors = serde_json::from_str(&authors_str)?;
        paper.oa_status = OaStatus::from_str(&status_str).map_err(CatalogError::DataFormat)?;
        Ok(paper)
    }

    fn query_one(&self, where_clause: &str, key: &str) -> Result<Option<Paper>> {
        let sql = format!("SELECT {PAPER_COLUMNS} FROM papers WHERE {where_clause}");
        let raw = self
            .conn
            .query_row(&sql, params![key], Self::row_to_paper)
            .optional()?;
        raw.map(Self::finish).transpose()
    }

    fn touch_and_check(&self, id: &Uuid, changed: usize) -> Result<()> {
        if changed == 0 {
            return Err(CatalogError::PaperNotFound(id.to_string()));
        }
        Ok(())
    }
}

impl<'a> Repository for SqlitePaperRepository<'a> {
    type Entity = Paper;
    type Id = Uuid;

    fn find_by_id(&self, id: &Self::Id) -> Result<Option<Self::Entity>> {
        self.query_one("id = ?1", &id.to_string())
    }

    fn insert(&self, paper: &Self::Entity) -> Result<()> {
        let authors_json = serde_json::to_string(&paper.authors)?;
        self.conn.execute(
            "INSERT INTO papers
                (id, fingerprint, title, authors, pubdate, visible, pdf_url, oa_status,
                 created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                paper.id.to_string(),
                paper.fingerprint,
                paper.title,
                authors_json,
                format_date(&paper.pubdate),
                paper.visible,
                paper.pdf_url,
                paper.oa_status.as_str(),
                paper.created_at.to_rfc3339(),
                paper.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }
}

impl<'a> PaperRepository for SqlitePaperRepository<'a> {
    fn find_by_fingerprint(&self, fingerprint: &str) -> Result<Option<Paper>> {
        self.query_one("fingerprint = ?1", fingerprint)
    }

    fn update_authors(&self, id: &Uuid, authors: &[PaperAuthor]) -> Result<()> {
        let authors_json = serde_json::to_string(authors)?;
        let changed = self.conn.execute(
            "UPDATE papers SET authors = ?2, updated_at = ?3 WHERE id = ?1",
            params![id.to_string(), authors_json, Utc::now().to_rfc3339()],
        )?;
        self.touch_and_check(id, changed)
    }

    fn set_availability(&self, id: &Uuid, pdf_url: Option<&str>, status: OaStatus) -> Result<()> {
        let changed = self.conn.execute(
            "UPDATE papers SET pdf_url = ?2, oa_status = ?3, updated_at = ?4 WHERE id = ?1",
            params![id.to_string(), pdf_url, status.as_str(), Utc::now().to_rfc3339()],
        )?;
        self.touch_and_check(id, changed)
    }

    fn set_visible(&self, id: &Uuid, visible: bool) -> Result<()> {
        let changed = self.conn.execute(
            "UPDATE papers SET visible = ?2, updated_at = ?3 WHERE id = ?1",
            params![id.to_string(), visible, Utc::now().to_rfc3339()],
        )?;
        self.touch_and_check(id, changed)
    }

    fn count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM papers", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}
