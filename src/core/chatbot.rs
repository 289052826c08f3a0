use regex::Regex;

type Predicate = Box<dyn Fn(&str) -> bool + Send + Sync>;

pub struct ResponseRule {
    name: String,
    predicate: Predicate,
    response: String,
}

impl ResponseRule {
    pub fn new<P>(name: impl Into<String>, predicate: P, response: impl Into<String>) -> Self
    where
        P: Fn(&str) -> bool + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            predicate: Box::new(predicate),
            response: response.into(),
        }
    }

    /// Case-insensitive substring match.
    pub fn keyword(keyword: &str, response: impl Into<String>) -> Self {
        let needle = keyword.to_lowercase();
        Self::new(
            keyword,
            move |message: &str| message.to_lowercase().contains(&needle),
            response,
        )
    }

    pub fn pattern(pattern: Regex, response: impl Into<String>) -> Self {
        let name = pattern.as_str().to_string();
        Self::new(name, move |message: &str| pattern.is_match(message), response)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn matches(&self, message: &str) -> bool {
        (self.predicate)(message)
    }
}

impl std::fmt::Debug for ResponseRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseRule")
            .field("name", &self.name)
            .field("response", &self.response)
            .finish()
    }
}

/// 依序比對規則，第一個符合的規則決定回覆
#[derive(Debug)]
pub struct Chatbot {
    rules: Vec<ResponseRule>,
    fallback: String,
}

pub const DEFAULT_FALLBACK: &str = "That's an interesting question! I'm here to help you learn more about MahiLLM. Try asking about our features, pricing, or how to get started.";

impl Chatbot {
    pub fn new(fallback: impl Into<String>) -> Self {
        Self {
            rules: Vec::new(),
            fallback: fallback.into(),
        }
    }

    pub fn with_rule(mut self, rule: ResponseRule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn push_rule(&mut self, rule: ResponseRule) {
        self.rules.push(rule);
    }

    pub fn rules(&self) -> &[ResponseRule] {
        &self.rules
    }

    pub fn respond(&self, message: &str) -> &str {
        match self.rules.iter().find(|rule| rule.matches(message)) {
            Some(rule) => {
                tracing::debug!("💬 Chat rule '{}' matched", rule.name);
                &rule.response
            }
            None => &self.fallback,
        }
    }
}

impl Default for Chatbot {
    fn default() -> Self {
        Chatbot::new(DEFAULT_FALLBACK)
            .with_rule(ResponseRule::keyword(
                "hello",
                "Hello! Welcome to MahiLLM. How can I help you today?",
            ))
            .with_rule(ResponseRule::keyword(
                "features",
                "MahiLLM offers automatic data analysis, report generation, chart creation, and AI-powered insights. Would you like to know more about any specific feature?",
            ))
            .with_rule(ResponseRule::keyword(
                "pricing",
                "We offer three plans: Free (5 reports/month), Plus (₹250/month), and Enterprise (custom pricing). Check our pricing section for details!",
            ))
            .with_rule(ResponseRule::keyword(
                "demo",
                "You can try our demo by clicking \"Try MahiLLM\" on our homepage. Upload your data and see instant insights!",
            ))
            .with_rule(ResponseRule::keyword(
                "contact",
                "You can reach the team through the contact form on our website.",
            ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyword_match_is_case_insensitive() {
        let bot = Chatbot::default();
        assert!(bot.respond("HELLO there").starts_with("Hello! Welcome"));
    }

    #[test]
    fn test_first_matching_rule_wins() {
        let bot = Chatbot::default();
        // "hello" 排在 "pricing" 之前
        let reply = bot.respond("hello, what is your pricing?");
        assert!(reply.starts_with("Hello!"));
    }

    #[test]
    fn test_fallback_when_nothing_matches() {
        let bot = Chatbot::default();
        assert_eq!(bot.respond("tell me a joke"), DEFAULT_FALLBACK);
    }

    #[test]
    fn test_pattern_rule() {
        let bot = Chatbot::new("no idea").with_rule(ResponseRule::pattern(
            Regex::new(r"(?i)\bplans?\b").unwrap(),
            "See the pricing page.",
        ));
        assert_eq!(bot.respond("Which plan fits me?"), "See the pricing page.");
        assert_eq!(bot.respond("airplane"), "no idea");
    }

    #[test]
    fn test_default_rule_order() {
        let bot = Chatbot::default();
        let names: Vec<&str> = bot.rules().iter().map(ResponseRule::name).collect();
        assert_eq!(names, vec!["hello", "features", "pricing", "demo", "contact"]);
    }
}
