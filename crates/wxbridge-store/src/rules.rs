use crate::error::{Result, StoreError};
use crate::models::Rule;
use crate::Store;
use rusqlite::{params, Row};
use wxbridge_core::{PlatformId, RuleId};

fn row_to_rule(row: &Row) -> rusqlite::Result<Rule> {
    Ok(Rule {
        rule_id: RuleId::from(row.get::<_, String>(0)?),
        name: row.get(1)?,
        instance_selector: row.get(2)?,
        chat_pattern: row.get(3)?,
        platform_id: PlatformId::from(row.get::<_, String>(4)?),
        priority: row.get(5)?,
        enabled: row.get::<_, i64>(6)? != 0,
        only_at_messages: row.get::<_, i64>(7)? != 0,
        at_name: row.get(8)?,
        reply_at_sender: row.get::<_, i64>(9)? != 0,
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
    })
}

const SELECT_COLUMNS: &str = "rule_id, name, instance_selector, chat_pattern, platform_id, priority, \
     enabled, only_at_messages, at_name, reply_at_sender, created_at, updated_at";

impl Store {
    pub fn upsert_rule(&self, rule: &Rule) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO rules
                (rule_id, name, instance_selector, chat_pattern, platform_id, priority,
                 enabled, only_at_messages, at_name, reply_at_sender, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
             ON CONFLICT(rule_id) DO UPDATE SET
                name = excluded.name, instance_selector = excluded.instance_selector,
                chat_pattern = excluded.chat_pattern, platform_id = excluded.platform_id,
                priority = excluded.priority, enabled = excluded.enabled,
                only_at_messages = excluded.only_at_messages, at_name = excluded.at_name,
                reply_at_sender = excluded.reply_at_sender, updated_at = excluded.updated_at",
            params![
                rule.rule_id.as_str(),
                rule.name,
                rule.instance_selector,
                rule.chat_pattern,
                rule.platform_id.as_str(),
                rule.priority,
                rule.enabled as i64,
                rule.only_at_messages as i64,
                rule.at_name,
                rule.reply_at_sender as i64,
                rule.created_at,
                rule.updated_at,
            ],
        )?;
        Ok(())
    }

    pub fn get_rule(&self, id: &RuleId) -> Result<Rule> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            &format!("SELECT {SELECT_COLUMNS} FROM rules WHERE rule_id = ?1"),
            params![id.as_str()],
            row_to_rule,
        )
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound {
                kind: "rule",
                id: id.to_string(),
            },
            other => StoreError::Database(other),
        })
    }

    /// The full enabled rule set, ordered the way the engine wants it:
    /// priority descending, rule_id ascending as the tie-break.
    pub fn list_enabled_rules(&self) -> Result<Vec<Rule>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {SELECT_COLUMNS} FROM rules WHERE enabled = 1 ORDER BY priority DESC, rule_id ASC"
        ))?;
        let rows = stmt
            .query_map([], row_to_rule)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn delete_rule(&self, id: &RuleId) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute("DELETE FROM rules WHERE rule_id = ?1", params![id.as_str()])?;
        Ok(())
    }
}
