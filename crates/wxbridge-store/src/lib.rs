mod accounting;
mod config_kv;
mod db;
mod fixed_listeners;
mod instances;
mod listeners;
mod messages;
mod models;
mod platforms;
mod rules;

pub mod error;

use rusqlite::Connection;
use std::sync::Mutex;

pub use error::{Result, StoreError};
pub use models::*;

/// Durable state for the bridge. Backed by an embedded SQLite database,
/// wrapped in a single mutex the way `MemoryManager`/`SessionManager` wrap
/// theirs â€” operations are short-lived synchronous SQL, never held across
/// an `.await` point.
pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)?;
        db::init_db(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        db::init_db(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opens_in_memory_and_initializes_schema() {
        let store = Store::open_in_memory().unwrap();
        let conn = store.conn.lock().unwrap();
        let count: i64 = conn
            .query_row(
                "SELECT count(*) FROM sqlite_master WHERE type='table'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert!(count >= 8, "expected at least 8 tables, got {count}");
    }
}
