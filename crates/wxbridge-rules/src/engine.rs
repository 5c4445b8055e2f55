use crate::pattern::{contains_mention, ChatPattern};
use std::collections::HashSet;
use tracing::warn;
use wxbridge_core::{InstanceId, PlatformId, RuleId};
use wxbridge_store::Rule;

/// A rule with its chat pattern pre-compiled, ready for repeated matching.
#[derive(Debug, Clone)]
pub struct CompiledRule {
    pub rule_id: RuleId,
    pub instance_selector: String,
    pub pattern: ChatPattern,
    pub platform_id: PlatformId,
    pub priority: i64,
    pub only_at_messages: bool,
    pub at_name: Option<String>,
    pub reply_at_sender: bool,
}

/// Compiles a rule set once per reload event and serves repeated matches
/// against it. `rebuild` and `match_message` are both pure over the input.
pub struct RuleEngine {
    rules: Vec<CompiledRule>,
}

impl RuleEngine {
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    /// Compile the given enabled rule set against the given enabled-platform
    /// set. Rules with a `regex:` pattern that fails to compile, or whose
    /// `platform_id` doesn't name an enabled platform, are dropped (logged),
    /// never panicking the engine. Caller is expected to pass rules already
    /// ordered by `(priority DESC, rule_id ASC)` (the store's
    /// `list_enabled_rules` does this), which `match_message` relies on for
    /// the tie-break.
    pub fn rebuild(rules: Vec<Rule>, enabled_platforms: &HashSet<PlatformId>) -> Self {
        let mut compiled = Vec::with_capacity(rules.len());
        for rule in rules {
            if !enabled_platforms.contains(&rule.platform_id) {
                warn!(rule_id = %rule.rule_id, platform_id = %rule.platform_id, "dropping rule, platform missing or disabled");
                continue;
            }
            match ChatPattern::compile(&rule.chat_pattern) {
                Ok(pattern) => compiled.push(CompiledRule {
                    rule_id: rule.rule_id,
                    instance_selector: rule.instance_selector,
                    pattern,
                    platform_id: rule.platform_id,
                    priority: rule.priority,
                    only_at_messages: rule.only_at_messages,
                    at_name: rule.at_name,
                    reply_at_sender: rule.reply_at_sender,
                }),
                Err(e) => {
                    warn!(rule_id = %rule.rule_id, error = %e, "dropping rule with invalid regex pattern");
                }
            }
        }
        Self { rules: compiled }
    }

    /// Highest-priority enabled rule matching `(instance_id, chat_name, text)`,
    /// or `None` if nothing matches.
    pub fn match_message(
        &self,
        instance_id: &InstanceId,
        chat_name: &str,
        text: &str,
    ) -> Option<&CompiledRule> {
        self.rules.iter().find(|rule| {
            instance_id.matches_selector(&rule.instance_selector)
                && rule.pattern.matches(chat_name)
                && (!rule.only_at_messages
                    || rule
                        .at_name
                        .as_deref()
                        .is_some_and(|name| contains_mention(text, name)))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(id: &str, selector: &str, pattern: &str, priority: i64) -> Rule {
        Rule {
            rule_id: RuleId::from(id),
            name: id.to_string(),
            instance_selector: selector.to_string(),
            chat_pattern: pattern.to_string(),
            platform_id: PlatformId::from("p1"),
            priority,
            enabled: true,
            only_at_messages: false,
            at_name: None,
            reply_at_sender: false,
            created_at: 0,
            updated_at: 0,
        }
    }

    fn enabled_platforms() -> HashSet<PlatformId> {
        HashSet::from([PlatformId::from("p1")])
    }

    #[test]
    fn priority_descending_wins() {
        let engine = RuleEngine::rebuild(vec![rule("low", "*", "*", 1), rule("high", "*", "*", 5)], &enabled_platforms());
        let matched = engine
            .match_message(&InstanceId::from("i1"), "alice", "hi")
            .unwrap();
        assert_eq!(matched.rule_id.as_str(), "high");
    }

    #[test]
    fn tie_breaks_on_rule_id_when_preordered() {
        // The store orders by (priority DESC, rule_id ASC); rebuild trusts
        // that order, so passing it pre-sorted reproduces the tie-break.
        let engine = RuleEngine::rebuild(vec![rule("r-002", "*", "*", 5), rule("r-010", "*", "*", 5)], &enabled_platforms());
        let matched = engine
            .match_message(&InstanceId::from("i1"), "alice", "hi")
            .unwrap();
        assert_eq!(matched.rule_id.as_str(), "r-002");
    }

    #[test]
    fn instance_selector_filters_non_wildcard_rules() {
        let engine = RuleEngine::rebuild(vec![rule("scoped", "i2", "*", 10)], &enabled_platforms());
        assert!(engine
            .match_message(&InstanceId::from("i1"), "alice", "hi")
            .is_none());
        assert!(engine
            .match_message(&InstanceId::from("i2"), "alice", "hi")
            .is_some());
    }

    #[test]
    fn at_mention_gate_blocks_non_matching_text() {
        let mut r = rule("gated", "*", "*", 10);
        r.only_at_messages = true;
        r.at_name = Some("bot".to_string());
        let engine = RuleEngine::rebuild(vec![r], &enabled_platforms());
        let iid = InstanceId::from("i1");
        assert!(engine.match_message(&iid, "alice", "hello").is_none());
        assert!(engine.match_message(&iid, "alice", "@bot hello").is_some());
    }

    #[test]
    fn invalid_regex_rule_is_dropped_not_panicking() {
        let engine = RuleEngine::rebuild(vec![rule("bad", "*", "regex:(unclosed", 10)], &enabled_platforms());
        assert!(engine
            .match_message(&InstanceId::from("i1"), "alice", "hi")
            .is_none());
    }

    #[test]
    fn rule_referencing_disabled_or_missing_platform_is_dropped() {
        let engine = RuleEngine::rebuild(vec![rule("orphan", "*", "*", 10)], &HashSet::new());
        assert!(engine
            .match_message(&InstanceId::from("i1"), "alice", "hi")
            .is_none());
    }
}
