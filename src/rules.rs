//! Keyword rules that pick the reply template for a message.
//!
//! Rules are tried in list order and the first one with a keyword present in
//! the subject or body wins. Priority is position, nothing else.

use serde::{Deserialize, Serialize};
use std::{fs, io, path::Path};

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Rule {
    pub keywords: Vec<String>,
    #[serde(rename = "reply_template")]
    pub template: String,
}

impl Rule {
    pub fn new<I, S>(keywords: I, template: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keywords: keywords.into_iter().map(Into::into).collect(),
            template: template.into(),
        }
    }

    /// `text` must already be lowercased.
    fn matches(&self, text: &str) -> bool {
        self.keywords
            .iter()
            .any(|k| text.contains(&k.to_lowercase()))
    }
}

#[derive(Debug, Clone)]
pub struct RuleEngine {
    rules: Vec<Rule>,
    fallback: String,
}

impl Default for RuleEngine {
    fn default() -> Self {
        Self::new(default_rules(), DEFAULT_FALLBACK)
    }
}

impl RuleEngine {
    pub fn new(rules: Vec<Rule>, fallback: impl Into<String>) -> Self {
        Self {
            rules,
            fallback: fallback.into(),
        }
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn fallback(&self) -> &str {
        &self.fallback
    }

    /// Returns the template of the first rule matching `subject` or `body`,
    /// or the fallback template.
    pub fn match_reply(&self, subject: &str, body: &str) -> &str {
        let text = format!("{subject} {body}").to_lowercase();

        self.rules
            .iter()
            .find(|r| r.matches(&text))
            .map(|r| r.template.as_str())
            .unwrap_or(self.fallback.as_str())
    }

    /// Appends a rule at the lowest priority.
    pub fn add_rule(&mut self, rule: Rule) {
        tracing::info!(keywords = ?rule.keywords, "added reply rule");
        self.rules.push(rule);
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }
        let json = serde_json::to_string_pretty(&self.rules)?;
        fs::write(path, json).map_err(|e| Error::io(path, e))?;
        tracing::info!(path = %path.display(), count = self.rules.len(), "saved reply rules");
        Ok(())
    }

    /// Replaces the rule list with the one stored at `path`.
    ///
    /// On any error, including [`Error::RulesNotFound`], the current rules are
    /// left untouched.
    pub fn load(&mut self, path: &Path) -> Result<()> {
        let data = match fs::read_to_string(path) {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(Error::RulesNotFound(path.to_path_buf()));
            }
            Err(e) => return Err(Error::io(path, e)),
        };

        let rules: Vec<Rule> = serde_json::from_str(&data)?;
        tracing::info!(path = %path.display(), count = rules.len(), "loaded reply rules");
        self.rules = rules;
        Ok(())
    }
}

pub const DEFAULT_FALLBACK: &str = "Hello,

Thank you for your email. I have received your message and will respond shortly.

Best regards";

pub fn default_rules() -> Vec<Rule> {
    vec![
        Rule::new(
            ["meeting", "schedule", "appointment", "calendar"],
            "Hello,

Thank you for your email regarding scheduling. I've received your message and will review my calendar to find a suitable time.

I'll get back to you within 24 hours with my availability.

Best regards",
        ),
        Rule::new(
            ["urgent", "asap", "emergency", "immediate"],
            "Hello,

I've received your urgent message and it has been flagged for priority attention.

I will respond as soon as possible.

Best regards",
        ),
        Rule::new(
            ["quote", "pricing", "price", "cost", "estimate"],
            "Hello,

Thank you for your inquiry about pricing. I've received your request for a quote.

I will prepare the information and send you a detailed response within 2 business days.

Best regards",
        ),
        Rule::new(
            ["support", "help", "issue", "problem", "bug"],
            "Hello,

Thank you for contacting support. Your message has been received and logged.

Our support team will review your issue and respond within 24-48 hours.

Best regards",
        ),
        Rule::new(
            ["invoice", "payment", "bill", "receipt"],
            "Hello,

Thank you for your message regarding billing. I've received your inquiry.

Our accounting team will review this and respond within 2 business days.

Best regards",
        ),
        Rule::new(
            ["application", "job", "position", "resume", "cv"],
            "Hello,

Thank you for your interest and for submitting your application. We have received your materials.

Our team will review your application and contact you if your qualifications match our current needs.

Best regards",
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_rules() -> RuleEngine {
        RuleEngine::new(
            vec![Rule::new(["meeting"], "T1"), Rule::new(["urgent"], "T2")],
            "FALLBACK",
        )
    }

    #[test]
    fn earliest_rule_wins_regardless_of_case() {
        let engine = two_rules();
        assert_eq!(engine.match_reply("URGENT: meeting request", ""), "T1");
    }

    #[test]
    fn no_keyword_gives_fallback() {
        let engine = two_rules();
        assert_eq!(
            engine.match_reply("please call me", "nothing relevant"),
            "FALLBACK"
        );
    }

    #[test]
    fn keyword_found_in_body() {
        let engine = two_rules();
        assert_eq!(engine.match_reply("hi", "this is Urgent, sorry"), "T2");
    }

    #[test]
    fn keyword_is_substring_match() {
        let engine = two_rules();
        assert_eq!(engine.match_reply("Meetings next week", ""), "T1");
    }

    #[test]
    fn uppercase_keyword_in_rule_still_matches() {
        let engine = RuleEngine::new(vec![Rule::new(["ASAP"], "fast")], "slow");
        assert_eq!(engine.match_reply("", "reply asap please"), "fast");
    }

    #[test]
    fn empty_input_gives_fallback() {
        let engine = two_rules();
        assert_eq!(engine.match_reply("", ""), "FALLBACK");
    }

    #[test]
    fn whitespace_in_keyword_is_significant() {
        let engine = RuleEngine::new(vec![Rule::new(["cv "], "CV")], "FB");
        assert_eq!(engine.match_reply("cvs report", ""), "FB");
        assert_eq!(engine.match_reply("my cv attached", ""), "CV");
    }

    #[test]
    fn added_rule_has_lowest_priority() {
        let mut engine = two_rules();
        engine.add_rule(Rule::new(["refund", "meeting"], "T3"));

        assert_eq!(engine.rules().len(), 3);
        assert_eq!(engine.match_reply("meeting about refund", ""), "T1");
        assert_eq!(engine.match_reply("refund please", ""), "T3");
    }

    #[test]
    fn default_engine_matches_scheduling_and_billing() {
        let engine = RuleEngine::default();
        assert!(engine
            .match_reply("Can we schedule a call?", "")
            .contains("regarding scheduling"));
        assert!(engine
            .match_reply("Invoice #42", "")
            .contains("regarding billing"));
        assert_eq!(engine.match_reply("hello there", "just saying hi"), DEFAULT_FALLBACK);
    }

    #[test]
    fn save_then_load_keeps_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rules").join("reply_rules.json");

        let mut original = two_rules();
        original.add_rule(Rule::new(["refund", "return"], "T3"));
        original.save(&path).unwrap();

        let mut loaded = RuleEngine::new(vec![], "FALLBACK");
        loaded.load(&path).unwrap();
        assert_eq!(loaded.rules(), original.rules());
    }

    #[test]
    fn saved_file_uses_reply_template_field() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reply_rules.json");
        two_rules().save(&path).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        let keywords = text.find("\"keywords\"").unwrap();
        let template = text.find("\"reply_template\"").unwrap();
        assert!(keywords < template);
    }

    #[test]
    fn missing_file_is_reported_and_rules_kept() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nope.json");

        let mut engine = two_rules();
        let err = engine.load(&path).unwrap_err();
        assert!(matches!(err, Error::RulesNotFound(p) if p == path));
        assert_eq!(engine.rules(), two_rules().rules());
    }

    #[test]
    fn malformed_file_keeps_rules() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        fs::write(&path, "{ not json").unwrap();

        let mut engine = two_rules();
        let err = engine.load(&path).unwrap_err();
        assert!(err.to_string().starts_with("rule file JSON error"), "{err}");
        assert!(matches!(err, Error::Json(_)));
        assert_eq!(engine.rules().len(), 2);
    }

    #[test]
    fn loads_file_written_by_hand() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reply_rules.json");
        fs::write(
            &path,
            r#"[{"keywords": ["refund", "return"], "reply_template": "We will process it."}]"#,
        )
        .unwrap();

        let mut engine = RuleEngine::default();
        engine.load(&path).unwrap();
        assert_eq!(engine.match_reply("Return request", ""), "We will process it.");
    }
}
