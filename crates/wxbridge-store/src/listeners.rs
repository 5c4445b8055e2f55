use crate::error::Result;
use crate::models::{Listener, ListenerStatus};
use crate::Store;
use rusqlite::{params, Row};
use std::str::FromStr;
use wxbridge_core::InstanceId;

fn row_to_listener(row: &Row) -> rusqlite::Result<Listener> {
    let status: String = row.get(2)?;
    Ok(Listener {
        instance_id: InstanceId::from(row.get::<_, String>(0)?),
        chat_name: row.get(1)?,
        status: ListenerStatus::from_str(&status).unwrap_or(ListenerStatus::Inactive),
        last_message_time: row.get(3)?,
        manual_added: row.get::<_, i64>(4)? != 0,
        fixed: row.get::<_, i64>(5)? != 0,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

const SELECT_COLUMNS: &str = "instance_id, chat_name, status, last_message_time, manual_added, fixed, created_at, updated_at";

impl Store {
    /// Create a listener if absent, or leave the existing row untouched.
    /// Returns true if a new row was inserted.
    pub fn ensure_listener(
        &self,
        instance_id: &InstanceId,
        chat_name: &str,
        manual_added: bool,
        fixed: bool,
        now: i64,
    ) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let changed = conn.execute(
            "INSERT OR IGNORE INTO listeners
                (instance_id, chat_name, status, last_message_time, manual_added, fixed, created_at, updated_at)
             VALUES (?1, ?2, 'active', 0, ?3, ?4, ?5, ?5)",
            params![instance_id.as_str(), chat_name, manual_added as i64, fixed as i64, now],
        )?;
        Ok(changed == 1)
    }

    pub fn get_listener(&self, instance_id: &InstanceId, chat_name: &str) -> Result<Option<Listener>> {
        let conn = self.conn.lock().unwrap();
        let result = conn.query_row(
            &format!("SELECT {SELECT_COLUMNS} FROM listeners WHERE instance_id = ?1 AND chat_name = ?2"),
            params![instance_id.as_str(), chat_name],
            row_to_listener,
        );
        match result {
            Ok(listener) => Ok(Some(listener)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn list_active_listeners(&self, instance_id: &InstanceId) -> Result<Vec<Listener>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {SELECT_COLUMNS} FROM listeners
             WHERE instance_id = ?1 AND status = 'active'
             ORDER BY last_message_time DESC"
        ))?;
        let rows = stmt
            .query_map(params![instance_id.as_str()], row_to_listener)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn count_active_listeners(&self, instance_id: &InstanceId) -> Result<u32> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row(
            "SELECT count(*) FROM listeners WHERE instance_id = ?1 AND status = 'active'",
            params![instance_id.as_str()],
            |row| row.get(0),
        )?;
        Ok(count as u32)
    }

    pub fn touch_listener(&self, instance_id: &InstanceId, chat_name: &str, last_message_time: i64, now: i64) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE listeners SET last_message_time = ?1, updated_at = ?2
             WHERE instance_id = ?3 AND chat_name = ?4 AND last_message_time < ?1",
            params![last_message_time, now, instance_id.as_str(), chat_name],
        )?;
        Ok(())
    }

    pub fn mark_listener_inactive(&self, instance_id: &InstanceId, chat_name: &str, now: i64) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE listeners SET status = 'inactive', updated_at = ?1
             WHERE instance_id = ?2 AND chat_name = ?3",
            params![now, instance_id.as_str(), chat_name],
        )?;
        Ok(())
    }

    pub fn mark_listener_active(&self, instance_id: &InstanceId, chat_name: &str, now: i64) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE listeners SET status = 'active', updated_at = ?1
             WHERE instance_id = ?2 AND chat_name = ?3",
            params![now, instance_id.as_str(), chat_name],
        )?;
        Ok(())
    }

    /// Candidates for reaping: active, not exempt, idle past `older_than`.
    pub fn find_reapable_listeners(&self, instance_id: &InstanceId, idle_cutoff: i64) -> Result<Vec<Listener>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {SELECT_COLUMNS} FROM listeners
             WHERE instance_id = ?1 AND status = 'active'
               AND manual_added = 0 AND fixed = 0
               AND last_message_time < ?2
             ORDER BY last_message_time ASC"
        ))?;
        let rows = stmt
            .query_map(params![instance_id.as_str(), idle_cutoff], row_to_listener)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Least-recently-active non-exempt listener, used by the supervisor to
    /// make room under the per-instance capacity cap.
    pub fn find_oldest_reclaimable_listener(&self, instance_id: &InstanceId) -> Result<Option<Listener>> {
        let conn = self.conn.lock().unwrap();
        let result = conn.query_row(
            &format!(
                "SELECT {SELECT_COLUMNS} FROM listeners
                 WHERE instance_id = ?1 AND status = 'active'
                   AND manual_added = 0 AND fixed = 0
                 ORDER BY last_message_time ASC LIMIT 1"
            ),
            params![instance_id.as_str()],
            row_to_listener,
        );
        match result {
            Ok(listener) => Ok(Some(listener)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn delete_listener(&self, instance_id: &InstanceId, chat_name: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "DELETE FROM listeners WHERE instance_id = ?1 AND chat_name = ?2",
            params![instance_id.as_str(), chat_name],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ensure_listener_is_idempotent() {
        let store = Store::open_in_memory().unwrap();
        let iid = InstanceId::from("i1");
        assert!(store.ensure_listener(&iid, "alice", false, false, 100).unwrap());
        assert!(!store.ensure_listener(&iid, "alice", false, false, 200).unwrap());
        assert_eq!(store.count_active_listeners(&iid).unwrap(), 1);
    }

    #[test]
    fn reap_exempts_manual_and_fixed() {
        let store = Store::open_in_memory().unwrap();
        let iid = InstanceId::from("i1");
        store.ensure_listener(&iid, "plain", false, false, 0).unwrap();
        store.ensure_listener(&iid, "manual", true, false, 0).unwrap();
        store.ensure_listener(&iid, "fixed", false, true, 0).unwrap();

        let reapable = store.find_reapable_listeners(&iid, 10_000).unwrap();
        let names: Vec<_> = reapable.iter().map(|l| l.chat_name.as_str()).collect();
        assert_eq!(names, vec!["plain"]);
    }

    #[test]
    fn touch_never_moves_time_backward() {
        let store = Store::open_in_memory().unwrap();
        let iid = InstanceId::from("i1");
        store.ensure_listener(&iid, "alice", false, false, 0).unwrap();
        store.touch_listener(&iid, "alice", 500, 500).unwrap();
        store.touch_listener(&iid, "alice", 100, 600).unwrap();
        let listener = store.get_listener(&iid, "alice").unwrap().unwrap();
        assert_eq!(listener.last_message_time, 500);
    }
}
