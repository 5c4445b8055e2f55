use crate::error::{Result, StoreError};
use crate::models::Instance;
use crate::Store;
use rusqlite::{params, Row};
use wxbridge_core::InstanceId;

fn row_to_instance(row: &Row) -> rusqlite::Result<Instance> {
    Ok(Instance {
        instance_id: InstanceId::from(row.get::<_, String>(0)?),
        name: row.get(1)?,
        base_url: row.get(2)?,
        api_key: row.get(3)?,
        enabled: row.get::<_, i64>(4)? != 0,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

const SELECT_COLUMNS: &str =
    "instance_id, name, base_url, api_key, enabled, created_at, updated_at";

impl Store {
    pub fn upsert_instance(&self, instance: &Instance) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO instances (instance_id, name, base_url, api_key, enabled, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(instance_id) DO UPDATE SET
                name = excluded.name,
                base_url = excluded.base_url,
                api_key = excluded.api_key,
                enabled = excluded.enabled,
                updated_at = excluded.updated_at",
            params![
                instance.instance_id.as_str(),
                instance.name,
                instance.base_url,
                instance.api_key,
                instance.enabled as i64,
                instance.created_at,
                instance.updated_at,
            ],
        )?;
        Ok(())
    }

    pub fn get_instance(&self, id: &InstanceId) -> Result<Instance> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            &format!("SELECT {SELECT_COLUMNS} FROM instances WHERE instance_id = ?1"),
            params![id.as_str()],
            row_to_instance,
        )
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound {
                kind: "instance",
                id: id.to_string(),
            },
            other => StoreError::Database(other),
        })
    }

    pub fn list_enabled_instances(&self) -> Result<Vec<Instance>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {SELECT_COLUMNS} FROM instances WHERE enabled = 1 ORDER BY created_at"
        ))?;
        let rows = stmt
            .query_map([], row_to_instance)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn list_instances(&self) -> Result<Vec<Instance>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt =
            conn.prepare(&format!("SELECT {SELECT_COLUMNS} FROM instances ORDER BY created_at"))?;
        let rows = stmt
            .query_map([], row_to_instance)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn set_instance_enabled(&self, id: &InstanceId, enabled: bool, now: i64) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE instances SET enabled = ?1, updated_at = ?2 WHERE instance_id = ?3",
            params![enabled as i64, now, id.as_str()],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(id: &str) -> Instance {
        Instance {
            instance_id: InstanceId::from(id),
            name: "test".into(),
            base_url: "http://localhost:9000".into(),
            api_key: "key".into(),
            enabled: true,
            created_at: 1000,
            updated_at: 1000,
        }
    }

    #[test]
    fn upsert_then_get_roundtrips() {
        let store = Store::open_in_memory().unwrap();
        store.upsert_instance(&sample("i1")).unwrap();
        let fetched = store.get_instance(&InstanceId::from("i1")).unwrap();
        assert_eq!(fetched.base_url, "http://localhost:9000");
        assert!(fetched.enabled);
    }

    #[test]
    fn disabling_excludes_from_enabled_list() {
        let store = Store::open_in_memory().unwrap();
        store.upsert_instance(&sample("i1")).unwrap();
        store
            .set_instance_enabled(&InstanceId::from("i1"), false, 2000)
            .unwrap();
        assert!(store.list_enabled_instances().unwrap().is_empty());
        assert_eq!(store.list_instances().unwrap().len(), 1);
    }

    #[test]
    fn missing_instance_is_not_found() {
        let store = Store::open_in_memory().unwrap();
        let err = store.get_instance(&InstanceId::from("missing")).unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }
}
