//! robots.txt handling

use robotstxt::DefaultMatcher;
use tracing::debug;

/// Parsed robots.txt rules for one host
#[derive(Debug, Clone, Default)]
pub struct RobotsRules {
    content: String,
}

impl RobotsRules {
    /// Keep robots.txt content for matching
    pub fn parse(content: &str) -> Self {
        Self {
            content: content.to_string(),
        }
    }

    /// Rules used when a host has no robots.txt
    pub fn allow_all() -> Self {
        Self::default()
    }

    /// Check if a URL is allowed for a user agent
    pub fn is_allowed(&self, url: &str, user_agent: &str) -> bool {
        if self.content.trim().is_empty() {
            return true;
        }

        let mut matcher = DefaultMatcher::default();
        let allowed = matcher.one_agent_allowed_by_robots(&self.content, user_agent, url);

        if !allowed {
            debug!("robots.txt disallows {} for {}", url, user_agent);
        }

        allowed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_robots_allow_all() {
        let rules = RobotsRules::allow_all();
        assert!(rules.is_allowed("https://example.com/any/path", "lise"));
    }

    #[test]
    fn test_robots_rules() {
        let content = r#"
User-agent: *
Disallow: /private/

User-agent: BadBot
Disallow: /
"#;
        let rules = RobotsRules::parse(content);

        assert!(rules.is_allowed("https://example.com/about", "lise"));
        assert!(!rules.is_allowed("https://example.com/private/page", "lise"));
        assert!(!rules.is_allowed("https://example.com/about", "BadBot"));
    }
}
