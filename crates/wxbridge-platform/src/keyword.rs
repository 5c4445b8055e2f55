use crate::error::Result;
use crate::platform::{InboundUnit, OutboundReply, Platform, SendMode};
use async_trait::async_trait;
use rand::Rng;
use serde::Deserialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    Exact,
    Contains,
    Fuzzy,
}

#[derive(Debug, Clone, Deserialize)]
pub struct KeywordRule {
    pub keywords: Vec<String>,
    pub match_type: MatchType,
    pub replies: Vec<String>,
    #[serde(default)]
    pub is_random_reply: bool,
    #[serde(default)]
    pub min_delay_secs: u64,
    #[serde(default)]
    pub max_delay_secs: u64,
}

impl KeywordRule {
    fn matches(&self, text: &str) -> bool {
        let lowered = text.to_lowercase();
        match self.match_type {
            MatchType::Exact => self.keywords.iter().any(|k| k.to_lowercase() == lowered),
            MatchType::Contains => self
                .keywords
                .iter()
                .any(|k| lowered.contains(&k.to_lowercase())),
            MatchType::Fuzzy => self.keywords.iter().any(|k| {
                let k = k.to_lowercase();
                lowered.contains(&k) || k.contains(&lowered)
            }),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct KeywordConfig {
    pub rules: Vec<KeywordRule>,
}

/// Keyword-match platform: no network calls, picks a canned reply and
/// optionally sleeps a cooperative delay before returning, bounded at 60s
/// to keep a single slow rule from starving the delivery pipeline.
pub struct KeywordPlatform {
    config: KeywordConfig,
    rotation_cursors: Vec<AtomicUsize>,
    rng_seed_guard: Mutex<()>,
}

const MAX_DELAY_SECS: u64 = 60;

impl KeywordPlatform {
    pub fn new(config: KeywordConfig) -> Self {
        let rotation_cursors = config.rules.iter().map(|_| AtomicUsize::new(0)).collect();
        Self {
            config,
            rotation_cursors,
            rng_seed_guard: Mutex::new(()),
        }
    }

    fn pick_reply(&self, rule_index: usize, rule: &KeywordRule) -> Option<String> {
        if rule.replies.is_empty() {
            return None;
        }
        if rule.is_random_reply {
            let _guard = self.rng_seed_guard.lock().unwrap();
            let idx = rand::thread_rng().gen_range(0..rule.replies.len());
            Some(rule.replies[idx].clone())
        } else {
            let cursor = &self.rotation_cursors[rule_index];
            let idx = cursor.fetch_add(1, Ordering::Relaxed) % rule.replies.len();
            Some(rule.replies[idx].clone())
        }
    }
}

#[async_trait]
impl Platform for KeywordPlatform {
    fn kind(&self) -> &'static str {
        "keyword"
    }

    async fn process(&self, unit: &InboundUnit) -> Result<OutboundReply> {
        for (index, rule) in self.config.rules.iter().enumerate() {
            if !rule.matches(&unit.content) {
                continue;
            }
            if rule.max_delay_secs > 0 {
                let low = rule.min_delay_secs.min(rule.max_delay_secs);
                let high = rule.max_delay_secs.min(MAX_DELAY_SECS).max(low);
                let delay_secs = if high > low {
                    let _guard = self.rng_seed_guard.lock().unwrap();
                    rand::thread_rng().gen_range(low..=high)
                } else {
                    low
                };
                if delay_secs > 0 {
                    tokio::time::sleep(Duration::from_secs(delay_secs)).await;
                }
            }
            let Some(content) = self.pick_reply(index, rule) else {
                continue;
            };
            return Ok(OutboundReply {
                content,
                should_reply: true,
                send_mode: SendMode::default(),
            });
        }
        Ok(OutboundReply {
            content: String::new(),
            should_reply: false,
            send_mode: SendMode::default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with(match_type: MatchType, keywords: Vec<&str>, replies: Vec<&str>) -> KeywordConfig {
        KeywordConfig {
            rules: vec![KeywordRule {
                keywords: keywords.into_iter().map(String::from).collect(),
                match_type,
                replies: replies.into_iter().map(String::from).collect(),
                is_random_reply: false,
                min_delay_secs: 0,
                max_delay_secs: 0,
            }],
        }
    }

    #[tokio::test]
    async fn exact_match_requires_full_equality() {
        let platform = KeywordPlatform::new(config_with(MatchType::Exact, vec!["hello"], vec!["hi"]));
        let unit = InboundUnit {
            instance_id: "i1".into(),
            chat_name: "alice".into(),
            sender: "alice".into(),
            sender_remark: None,
            content: "hello world".into(),
            is_group_chat: false,
            message_type: "text".into(),
        };
        let reply = platform.process(&unit).await.unwrap();
        assert!(!reply.should_reply);
    }

    #[tokio::test]
    async fn contains_match_fires_on_substring() {
        let platform = KeywordPlatform::new(config_with(MatchType::Contains, vec!["hello"], vec!["hi"]));
        let unit = InboundUnit {
            instance_id: "i1".into(),
            chat_name: "alice".into(),
            sender: "alice".into(),
            sender_remark: None,
            content: "hello world".into(),
            is_group_chat: false,
            message_type: "text".into(),
        };
        let reply = platform.process(&unit).await.unwrap();
        assert!(reply.should_reply);
        assert_eq!(reply.content, "hi");
    }

    #[tokio::test]
    async fn rotating_replies_cycle_in_order() {
        let platform = KeywordPlatform::new(config_with(
            MatchType::Contains,
            vec!["hi"],
            vec!["one", "two"],
        ));
        let unit = InboundUnit {
            instance_id: "i1".into(),
            chat_name: "alice".into(),
            sender: "alice".into(),
            sender_remark: None,
            content: "hi".into(),
            is_group_chat: false,
            message_type: "text".into(),
        };
        let first = platform.process(&unit).await.unwrap();
        let second = platform.process(&unit).await.unwrap();
        let third = platform.process(&unit).await.unwrap();
        assert_eq!(first.content, "one");
        assert_eq!(second.content, "two");
        assert_eq!(third.content, "one");
    }
}
