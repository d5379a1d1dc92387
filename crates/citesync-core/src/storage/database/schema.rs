use rusqlite::Connection;

use crate::error::Result;

pub const SCHEMA_VERSION: u32 = 1;

/// Longest paper title the catalog accepts.
pub const MAX_PAPER_TITLE_LEN: usize = 1024;
/// Longest journal title / publisher name the catalog accepts.
pub const MAX_NAME_LEN: usize = 512;
/// Longest issue / volume / pages value the catalog accepts.
pub const MAX_LOCATOR_LEN: usize = 64;

pub fn apply_pragmas(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA foreign_keys = ON;
        ",
    )?;
    Ok(())
}

pub fn create_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS schema_migrations (
            version    INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS publishers (
            id          TEXT PRIMARY KEY,
            name        TEXT UNIQUE NOT NULL CHECK (length(name) <= 512)
        );

        CREATE TABLE IF NOT EXISTS publisher_aliases (
            name         TEXT NOT NULL CHECK (length(name) <= 512),
            publisher_id TEXT NOT NULL REFERENCES publishers(id) ON DELETE CASCADE,
            count        INTEGER NOT NULL DEFAULT 0,
            PRIMARY KEY (name, publisher_id)
        );

        CREATE TABLE IF NOT EXISTS journals (
            id           TEXT PRIMARY KEY,
            title        TEXT NOT NULL CHECK (length(title) <= 512),
            issn         TEXT,
            publisher_id TEXT REFERENCES publishers(id) ON DELETE SET NULL
        );

        CREATE TABLE IF NOT EXISTS papers (
            id          TEXT PRIMARY KEY,
            fingerprint TEXT UNIQUE NOT NULL,
            title       TEXT NOT NULL CHECK (length(title) <= 1024),
            authors     TEXT NOT NULL DEFAULT '[]',
            pubdate     TEXT NOT NULL,
            visible     INTEGER NOT NULL DEFAULT 1,
            pdf_url     TEXT,
            oa_status   TEXT NOT NULL DEFAULT 'closed',
            created_at  TEXT NOT NULL,
            updated_at  TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS publications (
            id             TEXT PRIMARY KEY,
            paper_id       TEXT NOT NULL REFERENCES papers(id) ON DELETE CASCADE,
            doi            TEXT UNIQUE,
            journal_title  TEXT NOT NULL CHECK (length(journal_title) <= 512),
            issue          TEXT CHECK (issue IS NULL OR length(issue) <= 64),
            volume         TEXT CHECK (volume IS NULL OR length(volume) <= 64),
            pages          TEXT CHECK (pages IS NULL OR length(pages) <= 64),
            pubdate        TEXT,
            pubtype        TEXT NOT NULL DEFAULT 'unknown',
            publisher_name TEXT CHECK (publisher_name IS NULL OR length(publisher_name) <= 512),
            journal_id     TEXT REFERENCES journals(id) ON DELETE SET NULL,
            publisher_id   TEXT REFERENCES publishers(id) ON DELETE SET NULL,
            pdf_url        TEXT CHECK (pdf_url IS NULL OR length(pdf_url) <= 1024),
            splash_url     TEXT CHECK (splash_url IS NULL OR length(splash_url) <= 1024),
            description    TEXT,
            source         TEXT NOT NULL,
            identifier     TEXT NOT NULL,
            created_at     TEXT NOT NULL,
            updated_at     TEXT NOT NULL
        );
        ",
    )?;
    Ok(())
}

pub fn create_indexes(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE INDEX IF NOT EXISTS idx_publications_paper ON publications(paper_id);
        CREATE INDEX IF NOT EXISTS idx_journals_title     ON journals(title COLLATE NOCASE);
        CREATE INDEX IF NOT EXISTS idx_journals_issn      ON journals(issn);
        ",
    )?;
    Ok(())
}
