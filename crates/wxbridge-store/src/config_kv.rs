use crate::error::Result;
use crate::Store;
use rusqlite::params;

impl Store {
    pub fn set_config_value(&self, key: &str, value: &str, now: i64) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO bridge_config (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, value, now],
        )?;
        Ok(())
    }

    pub fn get_config_value(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn.lock().unwrap();
        let result = conn.query_row(
            "SELECT value FROM bridge_config WHERE key = ?1",
            params![key],
            |row| row.get::<_, String>(0),
        );
        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_then_get_roundtrips() {
        let store = Store::open_in_memory().unwrap();
        store.set_config_value("poll_interval", "5", 100).unwrap();
        assert_eq!(store.get_config_value("poll_interval").unwrap().as_deref(), Some("5"));
    }

    #[test]
    fn missing_key_is_none() {
        let store = Store::open_in_memory().unwrap();
        assert_eq!(store.get_config_value("missing").unwrap(), None);
    }
}
