use wxbridge_store::Message;

/// A group of one or more unprocessed messages to be delivered together as
/// a single inbound unit.
#[derive(Debug, Clone)]
pub struct MergedUnit {
    pub ids: Vec<i64>,
    pub content: String,
    pub sample: Message,
}

impl MergedUnit {
    fn single(msg: Message) -> Self {
        Self {
            ids: vec![msg.id],
            content: msg.content.clone(),
            sample: msg,
        }
    }
}

/// Groups a chronologically-ordered batch of same-chat messages into merge
/// units, folding consecutive messages whose gap is within
/// `merge_window_secs` into one delivery. Messages from different chats or
/// instances are never merged together.
pub fn coalesce(messages: Vec<Message>, merge_enabled: bool, merge_window_secs: i64) -> Vec<MergedUnit> {
    if !merge_enabled {
        return messages.into_iter().map(MergedUnit::single).collect();
    }

    let mut units: Vec<MergedUnit> = Vec::new();
    for msg in messages {
        let joins_previous = units.last().is_some_and(|unit| {
            unit.sample.instance_id == msg.instance_id
                && unit.sample.chat_name == msg.chat_name
                && (msg.create_time - unit.sample.create_time).abs() <= merge_window_secs
        });
        if joins_previous {
            let unit = units.last_mut().expect("checked by joins_previous");
            if unit.ids.len() == 1 {
                unit.content = format!("{}: {}", unit.sample.sender, unit.content);
            }
            unit.content.push('\n');
            unit.content.push_str(&msg.sender);
            unit.content.push_str(": ");
            unit.content.push_str(&msg.content);
            unit.ids.push(msg.id);
            unit.sample = msg;
        } else {
            units.push(MergedUnit::single(msg));
        }
    }
    units
}

#[cfg(test)]
mod tests {
    use super::*;
    use wxbridge_core::InstanceId;
    use wxbridge_store::{DeliveryStatus, MessageType, ReplyStatus};

    fn msg(id: i64, chat: &str, t: i64, content: &str) -> Message {
        Message {
            id,
            message_id: format!("m{id}"),
            instance_id: InstanceId::from("i1"),
            chat_name: chat.into(),
            sender: "alice".into(),
            sender_remark: None,
            content: content.into(),
            message_type: MessageType::Text,
            create_time: t,
            fingerprint: format!("fp{id}"),
            processed: false,
            delivery_status: DeliveryStatus::None,
            delivery_time: None,
            platform_id: None,
            reply_content: None,
            reply_status: ReplyStatus::None,
            reply_time: None,
            retry_count: 0,
            next_retry_at: None,
            last_error: None,
        }
    }

    #[test]
    fn merge_disabled_keeps_messages_separate() {
        let units = coalesce(vec![msg(1, "alice", 0, "a"), msg(2, "alice", 1, "b")], false, 60);
        assert_eq!(units.len(), 2);
    }

    #[test]
    fn merges_messages_within_window() {
        let units = coalesce(vec![msg(1, "alice", 0, "a"), msg(2, "alice", 30, "b")], true, 60);
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].ids, vec![1, 2]);
        assert_eq!(units[0].content, "alice: a\nalice: b");
    }

    #[test]
    fn does_not_merge_across_the_window_boundary() {
        let units = coalesce(vec![msg(1, "alice", 0, "a"), msg(2, "alice", 120, "b")], true, 60);
        assert_eq!(units.len(), 2);
    }

    #[test]
    fn does_not_merge_across_different_chats() {
        let units = coalesce(vec![msg(1, "alice", 0, "a"), msg(2, "bob", 10, "b")], true, 60);
        assert_eq!(units.len(), 2);
    }
}
