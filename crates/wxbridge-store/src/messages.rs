use crate::error::Result;
use crate::models::{DeliveryStatus, Message, MessageType, NewMessage, ReplyStatus};
use crate::Store;
use rusqlite::{params, Row};
use std::str::FromStr;
use wxbridge_core::{InstanceId, PlatformId};

fn row_to_message(row: &Row) -> rusqlite::Result<Message> {
    let message_type: String = row.get(7)?;
    Ok(Message {
        id: row.get(0)?,
        message_id: row.get(1)?,
        instance_id: InstanceId::from(row.get::<_, String>(2)?),
        chat_name: row.get(3)?,
        sender: row.get(4)?,
        sender_remark: row.get(5)?,
        content: row.get(6)?,
        message_type: MessageType::from_str(&message_type).unwrap_or(MessageType::Other),
        create_time: row.get(8)?,
        fingerprint: row.get(9)?,
        processed: row.get::<_, i64>(10)? != 0,
        delivery_status: DeliveryStatus::from_i64(row.get(11)?),
        delivery_time: row.get(12)?,
        platform_id: row.get::<_, Option<String>>(13)?.map(PlatformId::from),
        reply_content: row.get(14)?,
        reply_status: ReplyStatus::from_i64(row.get(15)?),
        reply_time: row.get(16)?,
        retry_count: row.get::<_, i64>(17)? as u32,
        next_retry_at: row.get(18)?,
        last_error: row.get(19)?,
    })
}

const SELECT_COLUMNS: &str = "id, message_id, instance_id, chat_name, sender, sender_remark, content, \
     message_type, create_time, fingerprint, processed, delivery_status, delivery_time, \
     platform_id, reply_content, reply_status, reply_time, retry_count, next_retry_at, last_error";

impl Store {
    /// Insert a freshly-ingested message. Returns `false` without error if
    /// the `(instance_id, chat_name, fingerprint)` unique key already
    /// exists â€” the caller treats this as a silent drop, not a failure.
    pub fn insert_message_if_new(&self, msg: &NewMessage) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let changed = conn.execute(
            "INSERT OR IGNORE INTO messages
                (message_id, instance_id, chat_name, sender, sender_remark, content,
                 message_type, create_time, fingerprint, processed, delivery_status, reply_status)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 0, 0, 0)",
            params![
                msg.message_id,
                msg.instance_id.as_str(),
                msg.chat_name,
                msg.sender,
                msg.sender_remark,
                msg.content,
                msg.message_type.as_str(),
                msg.create_time,
                msg.fingerprint,
            ],
        )?;
        Ok(changed == 1)
    }

    /// Up to `limit` unprocessed messages, oldest first â€” the delivery
    /// scanner's source query.
    pub fn fetch_unprocessed(&self, limit: u32) -> Result<Vec<Message>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {SELECT_COLUMNS} FROM messages
             WHERE processed = 0 AND (next_retry_at IS NULL OR next_retry_at <= strftime('%s','now'))
             ORDER BY create_time ASC LIMIT ?1"
        ))?;
        let rows = stmt
            .query_map(params![limit], row_to_message)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// All unprocessed messages in one chat within `[from_time, to_time]`,
    /// used to discover merge-window neighbors of a just-fetched message.
    pub fn fetch_unprocessed_in_chat_window(
        &self,
        instance_id: &InstanceId,
        chat_name: &str,
        from_time: i64,
        to_time: i64,
    ) -> Result<Vec<Message>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {SELECT_COLUMNS} FROM messages
             WHERE processed = 0 AND instance_id = ?1 AND chat_name = ?2
               AND create_time BETWEEN ?3 AND ?4
             ORDER BY create_time ASC"
        ))?;
        let rows = stmt
            .query_map(params![instance_id.as_str(), chat_name, from_time, to_time], row_to_message)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn get_message(&self, id: i64) -> Result<Option<Message>> {
        let conn = self.conn.lock().unwrap();
        let result = conn.query_row(
            &format!("SELECT {SELECT_COLUMNS} FROM messages WHERE id = ?1"),
            params![id],
            row_to_message,
        );
        match result {
            Ok(msg) => Ok(Some(msg)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Mark a set of message rows (a merged unit, or a lone message) as
    /// delivered with a reply. All rows in `ids` are updated in one
    /// transaction so they share the exact same outcome.
    pub fn mark_delivered(
        &self,
        ids: &[i64],
        platform_id: &PlatformId,
        reply_content: Option<&str>,
        reply_status: ReplyStatus,
        now: i64,
    ) -> Result<()> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        for id in ids {
            tx.execute(
                "UPDATE messages SET
                    processed = 1, delivery_status = 1, delivery_time = ?1,
                    platform_id = ?2, reply_content = ?3, reply_status = ?4, reply_time = ?1,
                    last_error = NULL
                 WHERE id = ?5",
                params![now, platform_id.as_str(), reply_content, reply_status as i64, id],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Mark a unit as having no matching rule. Not an error.
    pub fn mark_no_rule(&self, ids: &[i64], now: i64) -> Result<()> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        for id in ids {
            tx.execute(
                "UPDATE messages SET processed = 1, delivery_status = 0, delivery_time = ?1 WHERE id = ?2",
                params![now, id],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Permanent failure: mark failed immediately, no further retry.
    pub fn mark_delivery_failed(&self, ids: &[i64], error: &str, now: i64) -> Result<()> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        for id in ids {
            tx.execute(
                "UPDATE messages SET processed = 1, delivery_status = 2, delivery_time = ?1, last_error = ?2 WHERE id = ?3",
                params![now, error, id],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Transient failure: bump the retry counter and schedule the next
    /// attempt, leaving `processed = 0` so the scanner picks it up again.
    pub fn schedule_retry(&self, ids: &[i64], retry_count: u32, next_retry_at: i64, error: &str) -> Result<()> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        for id in ids {
            tx.execute(
                "UPDATE messages SET retry_count = ?1, next_retry_at = ?2, last_error = ?3 WHERE id = ?4",
                params![retry_count, next_retry_at, error, id],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Exhausted retries: finalize as a delivery failure.
    pub fn mark_retries_exhausted(&self, ids: &[i64], error: &str, now: i64) -> Result<()> {
        self.mark_delivery_failed(ids, error, now)
    }

    pub fn mark_reply_failed(&self, ids: &[i64], now: i64) -> Result<()> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        for id in ids {
            tx.execute(
                "UPDATE messages SET reply_status = 2, reply_time = ?1 WHERE id = ?2",
                params![now, id],
            )?;
        }
        tx.commit()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(msg_id: &str, chat: &str, create_time: i64, fp: &str) -> NewMessage {
        NewMessage {
            message_id: msg_id.into(),
            instance_id: InstanceId::from("i1"),
            chat_name: chat.into(),
            sender: "alice".into(),
            sender_remark: None,
            content: "hi".into(),
            message_type: MessageType::Text,
            create_time,
            fingerprint: fp.into(),
        }
    }

    #[test]
    fn duplicate_fingerprint_is_silently_dropped() {
        let store = Store::open_in_memory().unwrap();
        assert!(store.insert_message_if_new(&sample("m1", "alice", 100, "fp1")).unwrap());
        assert!(!store.insert_message_if_new(&sample("m2", "alice", 100, "fp1")).unwrap());
        assert_eq!(store.fetch_unprocessed(10).unwrap().len(), 1);
    }

    #[test]
    fn reply_status_implies_delivery_status() {
        let store = Store::open_in_memory().unwrap();
        store.insert_message_if_new(&sample("m1", "alice", 100, "fp1")).unwrap();
        let msg = &store.fetch_unprocessed(10).unwrap()[0];
        store
            .mark_delivered(&[msg.id], &PlatformId::from("p1"), Some("reply"), ReplyStatus::Success, 200)
            .unwrap();
        let updated = store.get_message(msg.id).unwrap().unwrap();
        assert!(matches!(updated.delivery_status, DeliveryStatus::Success));
        assert!(matches!(updated.reply_status, ReplyStatus::Success));
    }

    #[test]
    fn fetch_unprocessed_respects_retry_schedule() {
        let store = Store::open_in_memory().unwrap();
        store.insert_message_if_new(&sample("m1", "alice", 100, "fp1")).unwrap();
        let msg = &store.fetch_unprocessed(10).unwrap()[0];
        let far_future = 9_999_999_999;
        store.schedule_retry(&[msg.id], 1, far_future, "timeout").unwrap();
        assert!(store.fetch_unprocessed(10).unwrap().is_empty());
    }
}
