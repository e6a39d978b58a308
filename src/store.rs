use crate::sqlite::schema;

use anyhow::{anyhow, Result};
use rusqlite::Connection;

use std::{
    path::Path,
    sync::{Mutex, MutexGuard},
};

///
/// Owns the database connection shared by every request.
///
/// A request takes the connection with [Store::session] and gives it back
/// when the returned guard is dropped, whichever way the request ends.
#[derive(Debug)]
pub struct Store {
    conn: Mutex<Connection>,
}

///
/// The connection held for the duration of one request
pub type Session<'a> = MutexGuard<'a, Connection>;

impl Store {
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    ///
    /// Open (or create) a database file
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::new(Connection::open(path)?))
    }

    pub fn open_in_memory() -> Result<Self> {
        Ok(Self::new(Connection::open_in_memory()?))
    }

    ///
    /// Acquire the connection for one request
    pub fn session(&self) -> Result<Session<'_>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("The database connection is poisoned by an earlier panic"))
    }

    ///
    /// Create the baseline tables when they don't exist yet,
    /// see [schema::bootstrap]
    pub fn bootstrap(&self) -> Result<()> {
        let conn = self.session()?;
        schema::bootstrap(&conn)
    }
}
