use crate::error::Result;
use crate::models::FixedListener;
use crate::Store;
use rusqlite::{params, Row};

fn row_to_fixed_listener(row: &Row) -> rusqlite::Result<FixedListener> {
    Ok(FixedListener {
        id: row.get(0)?,
        session_name: row.get(1)?,
        enabled: row.get::<_, i64>(2)? != 0,
        description: row.get(3)?,
    })
}

const SELECT_COLUMNS: &str = "id, session_name, enabled, description";

impl Store {
    pub fn upsert_fixed_listener(&self, entry: &FixedListener) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO fixed_listeners (id, session_name, enabled, description)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(id) DO UPDATE SET
                session_name = excluded.session_name, enabled = excluded.enabled,
                description = excluded.description",
            params![entry.id, entry.session_name, entry.enabled as i64, entry.description],
        )?;
        Ok(())
    }

    /// The desired fixed-listener set, applied to every enabled instance on
    /// startup and on `FixedListenerChanged` reload events.
    pub fn list_enabled_fixed_listeners(&self) -> Result<Vec<FixedListener>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {SELECT_COLUMNS} FROM fixed_listeners WHERE enabled = 1"
        ))?;
        let rows = stmt
            .query_map([], row_to_fixed_listener)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn delete_fixed_listener(&self, id: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute("DELETE FROM fixed_listeners WHERE id = ?1", params![id])?;
        Ok(())
    }
}
