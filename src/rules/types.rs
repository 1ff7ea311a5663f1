use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleMeta {
    pub id: String,
    pub name: String,
    pub version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleScope {
    /// App-identifier patterns with glob semantics; `"*"` matches any app.
    pub include: Vec<String>,
    pub priority: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TriggerSpec {
    Regex {
        pattern: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        extraction_pattern: Option<String>,
    },
    Keyword {
        pattern: String,
    },
    /// Reserved for future semantic matchers; never matches today.
    Context {
        pattern: String,
    },
}

impl TriggerSpec {
    pub fn extraction_pattern(&self) -> Option<&str> {
        match self {
            TriggerSpec::Regex {
                extraction_pattern, ..
            } => extraction_pattern.as_deref(),
            _ => None,
        }
    }
}

/// Per-kind action payloads. Keeping this a tagged enum means a rule can't be
/// loaded with the fields of one kind and the behavior of another.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActionSpec {
    Url {
        template: String,
    },
    Path,
    Script {
        #[serde(default)]
        script_path: Option<String>,
        /// Fallback script location when `script_path` is absent.
        #[serde(default)]
        template: String,
        #[serde(default)]
        arguments: Vec<String>,
    },
    AiTranslate,
    AiSummarize,
    AiProcess {
        /// Intent string handed to the model alongside the captured text.
        template: String,
    },
    LocalFormat,
}

impl ActionSpec {
    pub fn kind_name(&self) -> &'static str {
        match self {
            ActionSpec::Url { .. } => "url",
            ActionSpec::Path => "path",
            ActionSpec::Script { .. } => "script",
            ActionSpec::AiTranslate => "ai_translate",
            ActionSpec::AiSummarize => "ai_summarize",
            ActionSpec::AiProcess { .. } => "ai_process",
            ActionSpec::LocalFormat => "local_format",
        }
    }

    pub fn is_ai(&self) -> bool {
        matches!(
            self,
            ActionSpec::AiTranslate | ActionSpec::AiSummarize | ActionSpec::AiProcess { .. }
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    pub meta: RuleMeta,
    pub scope: RuleScope,
    pub trigger: TriggerSpec,
    pub action: ActionSpec,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rule_roundtrips_through_tagged_json() {
        let json = r#"{
            "meta": {"id": "r1", "name": "Open link", "version": "1.0.0"},
            "scope": {"include": ["*"], "priority": 90},
            "trigger": {"kind": "regex", "pattern": "https?://", "extraction_pattern": "https?://\\S+"},
            "action": {"kind": "url", "template": "${0}"}
        }"#;

        let rule: Rule = serde_json::from_str(json).expect("rule should parse");
        assert_eq!(rule.meta.id, "r1");
        assert_eq!(rule.action.kind_name(), "url");
        assert_eq!(rule.trigger.extraction_pattern(), Some("https?://\\S+"));

        let back = serde_json::to_string(&rule).expect("rule should serialize");
        let again: Rule = serde_json::from_str(&back).expect("serialized rule should parse");
        assert_eq!(again.meta.id, rule.meta.id);
    }

    #[test]
    fn unknown_action_kind_is_rejected() {
        let json = r#"{
            "meta": {"id": "r2", "name": "Mystery", "version": "1.0.0"},
            "scope": {"include": ["*"], "priority": 10},
            "trigger": {"kind": "keyword", "pattern": "x"},
            "action": {"kind": "ai_hallucinate", "template": ""}
        }"#;

        assert!(serde_json::from_str::<Rule>(json).is_err());
    }

    #[test]
    fn script_action_defaults_optional_fields() {
        let json = r#"{
            "meta": {"id": "r3", "name": "Run script", "version": "1.0.0"},
            "scope": {"include": ["*"], "priority": 10},
            "trigger": {"kind": "keyword", "pattern": "csv"},
            "action": {"kind": "script", "template": "convert.py"}
        }"#;

        let rule: Rule = serde_json::from_str(json).expect("script rule should parse");
        match rule.action {
            ActionSpec::Script {
                script_path,
                template,
                arguments,
            } => {
                assert!(script_path.is_none());
                assert_eq!(template, "convert.py");
                assert!(arguments.is_empty());
            }
            other => panic!("expected script action, got {other:?}"),
        }
    }
}
