use log::warn;
use regex::Regex;

use crate::capture::CaptureContext;

use super::types::{Rule, TriggerSpec};

/// A rule with its patterns compiled once at load time. Patterns that fail to
/// compile are logged and left empty, which excludes the rule from matching
/// without ever aborting a batch.
#[derive(Debug, Clone)]
pub struct CompiledRule {
    pub rule: Rule,
    trigger_regex: Option<Regex>,
    scope_patterns: Vec<Regex>,
}

impl CompiledRule {
    pub fn compile(rule: Rule) -> Self {
        let trigger_regex = match &rule.trigger {
            TriggerSpec::Regex { pattern, .. } => match Regex::new(pattern) {
                Ok(re) => Some(re),
                Err(err) => {
                    warn!(
                        "rule '{}': trigger pattern '{}' failed to compile: {}",
                        rule.meta.id, pattern, err
                    );
                    None
                }
            },
            _ => None,
        };

        let scope_patterns = rule
            .scope
            .include
            .iter()
            .filter_map(|pattern| match compile_scope_pattern(pattern) {
                Ok(re) => Some(re),
                Err(err) => {
                    warn!(
                        "rule '{}': scope pattern '{}' failed to compile: {}",
                        rule.meta.id, pattern, err
                    );
                    None
                }
            })
            .collect();

        Self {
            rule,
            trigger_regex,
            scope_patterns,
        }
    }

    fn applies_to(&self, app_id: &str) -> bool {
        self.scope_patterns.iter().any(|re| re.is_match(app_id))
    }

    fn matches_text(&self, text: &str) -> bool {
        match &self.rule.trigger {
            TriggerSpec::Regex { .. } => self
                .trigger_regex
                .as_ref()
                .is_some_and(|re| re.is_match(text)),
            TriggerSpec::Keyword { pattern } => {
                !pattern.is_empty() && text.to_lowercase().contains(&pattern.to_lowercase())
            }
            // Reserved trigger kind; no matching semantics yet.
            TriggerSpec::Context { .. } => false,
        }
    }
}

/// Glob-style app patterns become anchored case-insensitive regexes, so `*`
/// matches any run of characters and everything else is literal.
fn compile_scope_pattern(pattern: &str) -> Result<Regex, regex::Error> {
    let escaped = regex::escape(pattern).replace(r"\*", ".*");
    Regex::new(&format!("(?i)^{escaped}$"))
}

/// Match the captured context against a rule snapshot. Pure: the ranked result
/// is ordered by priority descending with declaration order as the stable
/// tiebreak, and is never re-sorted after creation.
pub fn match_rules(context: &CaptureContext, rules: &[CompiledRule]) -> Vec<Rule> {
    if context.text.trim().is_empty() {
        return Vec::new();
    }

    let mut matched: Vec<&CompiledRule> = rules
        .iter()
        .filter(|compiled| {
            compiled.applies_to(&context.app_id) && compiled.matches_text(&context.text)
        })
        .collect();

    matched.sort_by(|a, b| b.rule.scope.priority.cmp(&a.rule.scope.priority));
    matched.into_iter().map(|c| c.rule.clone()).collect()
}
