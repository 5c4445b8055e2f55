use crate::error::Result;
use crate::fingerprint::fingerprint;
use tracing::debug;
use wxbridge_client::RemoteMessage;
use wxbridge_core::InstanceId;
use wxbridge_store::{MessageType, NewMessage, Store};

/// Sentinel content marking "messages below are new" in a raw batch. Earlier
/// messages in the same batch, and the sentinel itself, are dropped.
const NEW_MESSAGES_BOUNDARY_MARKER: &str = "\u{ee}\u{a1}new_messages_boundary\u{ee}\u{a1}";

/// Ingest one raw batch for `(instance_id, chat_name)`. Filters markers and
/// self/system messages, normalizes, fingerprints, and persists; duplicate
/// fingerprints are silently dropped. Returns the count of newly-persisted
/// messages and the max `create_time` seen (used to advance the listener's
/// `last_message_time`).
pub fn ingest_batch(
    store: &Store,
    instance_id: &InstanceId,
    chat_name: &str,
    raw: &[RemoteMessage],
) -> Result<(u32, Option<i64>)> {
    let kept = drop_before_boundary(raw);

    let mut inserted = 0u32;
    let mut max_create_time = None;

    for message in kept {
        let message_type: MessageType = message.message_type.parse().unwrap_or(MessageType::Other);
        if message_type.is_dropped_at_ingest() || message.sender.eq_ignore_ascii_case("self") {
            continue;
        }

        let sender = if message.sender.trim().is_empty() {
            "系统".to_string()
        } else {
            message.sender.clone()
        };
        let content = normalize_whitespace(&message.content);
        let fp = fingerprint(&sender, &content, message.create_time);

        let new_message = NewMessage {
            message_id: message.message_id.clone(),
            instance_id: instance_id.clone(),
            chat_name: chat_name.to_string(),
            sender,
            sender_remark: message.sender_remark.clone(),
            content,
            message_type,
            create_time: message.create_time,
            fingerprint: fp,
        };

        if store.insert_message_if_new(&new_message)? {
            inserted += 1;
        } else {
            debug!(chat = %chat_name, message_id = %message.message_id, "dropped duplicate fingerprint");
        }

        max_create_time = Some(max_create_time.map_or(message.create_time, |t: i64| t.max(message.create_time)));
    }

    Ok((inserted, max_create_time))
}

/// Drop every message at or before the last "new messages" sentinel in the
/// batch, and the sentinel itself. If no sentinel is present, keeps all.
fn drop_before_boundary(raw: &[RemoteMessage]) -> Vec<&RemoteMessage> {
    let boundary_index = raw
        .iter()
        .rposition(|m| m.content.trim() == NEW_MESSAGES_BOUNDARY_MARKER);
    match boundary_index {
        Some(idx) => raw.iter().skip(idx + 1).collect(),
        None => raw.iter().collect(),
    }
}

fn normalize_whitespace(content: &str) -> String {
    content
        .chars()
        .filter(|c| !c.is_control() || *c == '\n')
        .collect::<String>()
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(id: &str, sender: &str, content: &str, t: i64, kind: &str) -> RemoteMessage {
        RemoteMessage {
            message_id: id.into(),
            sender: sender.into(),
            sender_remark: None,
            content: content.into(),
            message_type: kind.into(),
            create_time: t,
        }
    }

    #[test]
    fn drops_self_and_time_messages() {
        let store = Store::open_in_memory().unwrap();
        let iid = InstanceId::from("i1");
        let batch = vec![
            msg("m1", "Self", "ignored", 100, "self"),
            msg("m2", "system", "13:00", 100, "time"),
            msg("m3", "alice", "hello", 100, "text"),
        ];
        let (inserted, _) = ingest_batch(&store, &iid, "alice", &batch).unwrap();
        assert_eq!(inserted, 1);
    }

    #[test]
    fn ingest_is_idempotent_across_repeated_batches() {
        let store = Store::open_in_memory().unwrap();
        let iid = InstanceId::from("i1");
        let batch = vec![msg("m1", "alice", "hello", 100, "text")];
        ingest_batch(&store, &iid, "alice", &batch).unwrap();
        let (inserted_again, _) = ingest_batch(&store, &iid, "alice", &batch).unwrap();
        assert_eq!(inserted_again, 0);
        assert_eq!(store.fetch_unprocessed(10).unwrap().len(), 1);
    }

    #[test]
    fn drops_messages_before_new_messages_boundary() {
        let store = Store::open_in_memory().unwrap();
        let iid = InstanceId::from("i1");
        let batch = vec![
            msg("m1", "alice", "old message", 100, "text"),
            msg("m2", "system", NEW_MESSAGES_BOUNDARY_MARKER, 150, "other"),
            msg("m3", "alice", "new message", 200, "text"),
        ];
        let (inserted, max_time) = ingest_batch(&store, &iid, "alice", &batch).unwrap();
        assert_eq!(inserted, 1);
        assert_eq!(max_time, Some(200));
        let unprocessed = store.fetch_unprocessed(10).unwrap();
        assert_eq!(unprocessed[0].content, "new message");
    }
}
