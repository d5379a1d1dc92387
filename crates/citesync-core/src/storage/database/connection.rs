use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use rusqlite::Connection;

use super::migrations::run_migrations;
use super::schema::apply_pragmas;
use crate::error::Result;

/// The catalog's single SQLite connection behind a mutex. The guard is held
/// for one catalog call and never across an `.await`.
pub struct ConnectionPool {
    location: Option<PathBuf>,
    connection: Mutex<Connection>,
}

impl ConnectionPool {
    /// Opens (creating parent directories) and migrates the file at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        Self::prepare(Connection::open(path)?, Some(path.to_path_buf()))
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::prepare(Connection::open_in_memory()?, None)
    }

    fn prepare(conn: Connection, location: Option<PathBuf>) -> Result<Self> {
        apply_pragmas(&conn)?;
        run_migrations(&conn)?;
        Ok(Self {
            location,
            connection: Mutex::new(conn),
        })
    }

    pub fn get_connection(&self) -> MutexGuard<'_, Connection> {
        self.connection
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// `None` for in-memory catalogs.
    pub fn location(&self) -> Option<&Path> {
        self.location.as_deref()
    }
}
