use crate::error::{Result, StoreError};
use crate::models::{Platform, PlatformKind};
use crate::Store;
use rusqlite::{params, Row};
use std::str::FromStr;
use wxbridge_core::PlatformId;

fn row_to_platform(row: &Row) -> rusqlite::Result<Platform> {
    let kind: String = row.get(2)?;
    let config: String = row.get(3)?;
    Ok(Platform {
        platform_id: PlatformId::from(row.get::<_, String>(0)?),
        name: row.get(1)?,
        kind: PlatformKind::from_str(&kind).unwrap_or(PlatformKind::Keyword),
        config: serde_json::from_str(&config).unwrap_or(serde_json::Value::Null),
        enabled: row.get::<_, i64>(4)? != 0,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

const SELECT_COLUMNS: &str = "platform_id, name, kind, config, enabled, created_at, updated_at";

impl Store {
    pub fn upsert_platform(&self, platform: &Platform) -> Result<()> {
        let config = serde_json::to_string(&platform.config)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO platforms (platform_id, name, kind, config, enabled, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(platform_id) DO UPDATE SET
                name = excluded.name, kind = excluded.kind, config = excluded.config,
                enabled = excluded.enabled, updated_at = excluded.updated_at",
            params![
                platform.platform_id.as_str(),
                platform.name,
                platform.kind.as_str(),
                config,
                platform.enabled as i64,
                platform.created_at,
                platform.updated_at,
            ],
        )?;
        Ok(())
    }

    pub fn get_platform(&self, id: &PlatformId) -> Result<Platform> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            &format!("SELECT {SELECT_COLUMNS} FROM platforms WHERE platform_id = ?1"),
            params![id.as_str()],
            row_to_platform,
        )
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound {
                kind: "platform",
                id: id.to_string(),
            },
            other => StoreError::Database(other),
        })
    }

    pub fn list_platforms(&self) -> Result<Vec<Platform>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!("SELECT {SELECT_COLUMNS} FROM platforms"))?;
        let rows = stmt
            .query_map([], row_to_platform)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn list_enabled_platforms(&self) -> Result<Vec<Platform>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!("SELECT {SELECT_COLUMNS} FROM platforms WHERE enabled = 1"))?;
        let rows = stmt
            .query_map([], row_to_platform)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn delete_platform(&self, id: &PlatformId) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute("DELETE FROM platforms WHERE platform_id = ?1", params![id.as_str()])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyword_match_alias_normalizes_on_read() {
        let store = Store::open_in_memory().unwrap();
        let platform = Platform {
            platform_id: PlatformId::from("p1"),
            name: "legacy".into(),
            kind: PlatformKind::Keyword,
            config: serde_json::json!({}),
            enabled: true,
            created_at: 0,
            updated_at: 0,
        };
        store.upsert_platform(&platform).unwrap();
        // Simulate a legacy row written with the deprecated tag directly.
        {
            let conn = store.conn.lock().unwrap();
            conn.execute(
                "UPDATE platforms SET kind = 'keyword_match' WHERE platform_id = 'p1'",
                [],
            )
            .unwrap();
        }
        let fetched = store.get_platform(&PlatformId::from("p1")).unwrap();
        assert_eq!(fetched.kind, PlatformKind::Keyword);
    }
}
