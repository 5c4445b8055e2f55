use regex::Regex;

/// One of the three chat-pattern dialects a rule's `chat_pattern` field may
/// take. Chosen by prefix at compile time (`rebuild`), not re-inspected on
/// every match.
#[derive(Debug, Clone)]
pub enum ChatPattern {
    Literal(String),
    Wildcard,
    Regex(Regex),
}

impl ChatPattern {
    pub fn compile(raw: &str) -> Result<Self, regex::Error> {
        if raw == "*" {
            Ok(ChatPattern::Wildcard)
        } else if let Some(expr) = raw.strip_prefix("regex:") {
            Ok(ChatPattern::Regex(Regex::new(expr)?))
        } else {
            Ok(ChatPattern::Literal(raw.to_string()))
        }
    }

    pub fn matches(&self, chat_name: &str) -> bool {
        match self {
            ChatPattern::Literal(lit) => lit == chat_name,
            ChatPattern::Wildcard => true,
            ChatPattern::Regex(re) => re.is_match(chat_name),
        }
    }
}

/// True if `text`, after leading whitespace, begins with `@{at_name}`
/// followed by whitespace or end-of-string.
pub fn contains_mention(text: &str, at_name: &str) -> bool {
    let trimmed = text.trim_start();
    let Some(rest) = trimmed.strip_prefix('@') else {
        return false;
    };
    let Some(rest) = rest.strip_prefix(at_name) else {
        return false;
    };
    rest.is_empty() || rest.starts_with(char::is_whitespace)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_requires_exact_match() {
        let p = ChatPattern::compile("alice").unwrap();
        assert!(p.matches("alice"));
        assert!(!p.matches("alice2"));
    }

    #[test]
    fn wildcard_matches_anything() {
        let p = ChatPattern::compile("*").unwrap();
        assert!(p.matches("anything"));
        assert!(p.matches(""));
    }

    #[test]
    fn regex_dialect_matches_by_prefix() {
        let p = ChatPattern::compile("regex:^group-\\d+$").unwrap();
        assert!(p.matches("group-42"));
        assert!(!p.matches("group-abc"));
    }

    #[test]
    fn invalid_regex_is_rejected_at_compile_time() {
        assert!(ChatPattern::compile("regex:(unclosed").is_err());
    }

    #[test]
    fn mention_requires_exact_name_and_boundary() {
        assert!(contains_mention("@bot hello", "bot"));
        assert!(contains_mention("  @bot", "bot"));
        assert!(!contains_mention("@bot2 hello", "bot"));
        assert!(!contains_mention("hello @bot", "bot"));
    }
}
