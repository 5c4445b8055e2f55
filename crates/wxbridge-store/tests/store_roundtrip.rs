use wxbridge_core::{InstanceId, PlatformId, RuleId};
use wxbridge_store::{
    DeliveryStatus, Instance, MessageType, NewMessage, Platform, PlatformKind, ReplyStatus, Rule,
    Store,
};

fn store() -> Store {
    Store::open_in_memory().unwrap()
}

#[test]
fn instance_listener_message_chain_persists() {
    let store = store();
    let iid = InstanceId::from("i1");

    store
        .upsert_instance(&Instance {
            instance_id: iid.clone(),
            name: "work".into(),
            base_url: "http://localhost:9001".into(),
            api_key: "secret".into(),
            enabled: true,
            created_at: 0,
            updated_at: 0,
        })
        .unwrap();

    store.ensure_listener(&iid, "alice", false, false, 0).unwrap();

    store
        .insert_message_if_new(&NewMessage {
            message_id: "m1".into(),
            instance_id: iid.clone(),
            chat_name: "alice".into(),
            sender: "alice".into(),
            sender_remark: None,
            content: "hello".into(),
            message_type: MessageType::Text,
            create_time: 1000,
            fingerprint: "fp-1".into(),
        })
        .unwrap();

    let unprocessed = store.fetch_unprocessed(10).unwrap();
    assert_eq!(unprocessed.len(), 1);
    assert_eq!(unprocessed[0].content, "hello");
    assert!(matches!(unprocessed[0].delivery_status, DeliveryStatus::None));
}

#[test]
fn platform_and_rule_roundtrip_with_priority_order() {
    let store = store();
    let platform_id = PlatformId::from("p1");
    store
        .upsert_platform(&Platform {
            platform_id: platform_id.clone(),
            name: "openai default".into(),
            kind: PlatformKind::Openai,
            config: serde_json::json!({"api_base": "https://api.openai.com/v1"}),
            enabled: true,
            created_at: 0,
            updated_at: 0,
        })
        .unwrap();

    store
        .upsert_rule(&Rule {
            rule_id: RuleId::from("r-010"),
            name: "low priority id".into(),
            instance_selector: "*".into(),
            chat_pattern: "*".into(),
            platform_id: platform_id.clone(),
            priority: 5,
            enabled: true,
            only_at_messages: false,
            at_name: None,
            reply_at_sender: false,
            created_at: 0,
            updated_at: 0,
        })
        .unwrap();
    store
        .upsert_rule(&Rule {
            rule_id: RuleId::from("r-002"),
            name: "same priority, smaller id".into(),
            instance_selector: "*".into(),
            chat_pattern: "*".into(),
            platform_id,
            priority: 5,
            enabled: true,
            only_at_messages: false,
            at_name: None,
            reply_at_sender: false,
            created_at: 0,
            updated_at: 0,
        })
        .unwrap();

    let rules = store.list_enabled_rules().unwrap();
    assert_eq!(rules[0].rule_id.as_str(), "r-002");
    assert_eq!(rules[1].rule_id.as_str(), "r-010");
}

#[test]
fn delivered_with_reply_failure_keeps_delivery_success() {
    let store = store();
    let iid = InstanceId::from("i1");
    store
        .insert_message_if_new(&NewMessage {
            message_id: "m1".into(),
            instance_id: iid,
            chat_name: "alice".into(),
            sender: "alice".into(),
            sender_remark: None,
            content: "hi".into(),
            message_type: MessageType::Text,
            create_time: 1000,
            fingerprint: "fp-1".into(),
        })
        .unwrap();
    let msg = &store.fetch_unprocessed(10).unwrap()[0];
    store
        .mark_delivered(&[msg.id], &PlatformId::from("p1"), Some("reply"), ReplyStatus::Success, 2000)
        .unwrap();
    store.mark_reply_failed(&[msg.id], 2500).unwrap();

    let updated = store.get_message(msg.id).unwrap().unwrap();
    assert!(matches!(updated.delivery_status, DeliveryStatus::Success));
    assert!(matches!(updated.reply_status, ReplyStatus::Failed));
}
