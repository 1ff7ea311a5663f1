use std::fs;
use std::path::PathBuf;
use std::sync::RwLock;
use std::time::SystemTime;

use anyhow::{Context, Result};
use log::{info, warn};

use super::matcher::CompiledRule;
use super::types::Rule;

/// Built-in rule set used until the user saves their own.
const DEFAULT_RULES_JSON: &str = r#"[
  {
    "meta": { "id": "builtin-url", "name": "Open link", "version": "1.0.0" },
    "scope": { "include": ["*"], "priority": 90 },
    "trigger": {
      "kind": "regex",
      "pattern": "(https?:\\/\\/|www\\.)([\\w_-]+(?:(?:\\.[\\w_-]+)+))([\\w.,@?^=%&:/~+#-]*[\\w@?^=%&/~+#-])?",
      "extraction_pattern": "(https?://|www\\.)[\\x21-\\x7e]+"
    },
    "action": { "kind": "url", "template": "${0}" }
  },
  {
    "meta": { "id": "builtin-path", "name": "Open path", "version": "1.0.0" },
    "scope": { "include": ["*"], "priority": 90 },
    "trigger": {
      "kind": "regex",
      "pattern": "^\\s*[a-zA-Z]:\\\\(?:[^\\\\/:*?\"<>|\\r\\n]+\\\\)*[^\\\\/:*?\"<>|\\r\\n]*\\s*$"
    },
    "action": { "kind": "path" }
  },
  {
    "meta": { "id": "builtin-translate", "name": "Translate", "version": "1.0.0" },
    "scope": { "include": ["*"], "priority": 50 },
    "trigger": { "kind": "regex", "pattern": ".{5,}" },
    "action": { "kind": "ai_translate" }
  },
  {
    "meta": { "id": "builtin-summarize", "name": "Summarize", "version": "1.0.0" },
    "scope": { "include": ["*"], "priority": 40 },
    "trigger": { "kind": "regex", "pattern": ".{100,}" },
    "action": { "kind": "ai_summarize" }
  },
  {
    "meta": { "id": "builtin-local-format", "name": "Tidy up", "version": "1.0.0" },
    "scope": { "include": ["*"], "priority": 35 },
    "trigger": { "kind": "regex", "pattern": ".{50,}" },
    "action": { "kind": "local_format" }
  },
  {
    "meta": { "id": "builtin-ai-format", "name": "AI format", "version": "1.0.0" },
    "scope": { "include": ["*"], "priority": 30 },
    "trigger": { "kind": "regex", "pattern": ".{50,}" },
    "action": { "kind": "ai_process", "template": "format_text" }
  },
  {
    "meta": { "id": "builtin-web-search", "name": "Web search", "version": "1.0.0" },
    "scope": { "include": ["*"], "priority": 10 },
    "trigger": { "kind": "regex", "pattern": ".+" },
    "action": { "kind": "url", "template": "https://www.google.com/search?q=${0}" }
  }
]"#;

/// Holds the loaded rule set with pre-compiled patterns. The file is re-read
/// whenever its mtime advances, so edits from the settings window or an
/// external editor are picked up on the next trigger.
pub struct RuleStore {
    compiled: RwLock<Vec<CompiledRule>>,
    last_mod: RwLock<SystemTime>,
    path: PathBuf,
}

impl RuleStore {
    pub fn new(path: PathBuf) -> Self {
        let store = Self {
            compiled: RwLock::new(Vec::new()),
            last_mod: RwLock::new(SystemTime::UNIX_EPOCH),
            path,
        };
        store.reload_if_changed();
        store
    }

    pub fn config_path(&self) -> PathBuf {
        self.path.clone()
    }

    /// Latest compiled snapshot. Callers get an owned copy so matching never
    /// holds the store lock across an await point.
    pub fn snapshot(&self) -> Vec<CompiledRule> {
        self.reload_if_changed();
        self.compiled.read().unwrap().clone()
    }

    pub fn rules(&self) -> Vec<Rule> {
        self.snapshot().into_iter().map(|c| c.rule).collect()
    }

    /// Validate and persist a raw JSON rule array, then reload.
    pub fn save_raw(&self, raw: &str) -> Result<()> {
        let parsed: serde_json::Value =
            serde_json::from_str(raw).context("rules payload is not valid JSON")?;
        if !parsed.is_array() {
            anyhow::bail!("rules payload must be a JSON array");
        }

        let pretty = serde_json::to_string_pretty(&parsed)?;
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, pretty)
            .with_context(|| format!("failed to write rules to {}", self.path.display()))?;

        self.force_reload();
        info!("rules saved and reloaded from {}", self.path.display());
        Ok(())
    }

    /// Merge rules from another file into the current set, replacing entries
    /// that share a `meta.id`. Returns how many rules were imported.
    pub fn import(&self, source: &str) -> Result<usize> {
        let content = fs::read_to_string(source)
            .with_context(|| format!("failed to read {source}"))?;

        let incoming: Vec<Rule> = match serde_json::from_str::<Vec<Rule>>(&content) {
            Ok(rules) => rules,
            Err(_) => {
                let single: Rule = serde_json::from_str(&content)
                    .context("file is neither a rule nor a rule array")?;
                vec![single]
            }
        };

        if incoming.is_empty() {
            return Ok(0);
        }

        let mut merged = self.rules();
        let count = incoming.len();
        for rule in incoming {
            merged.retain(|existing| existing.meta.id != rule.meta.id);
            merged.push(rule);
        }

        self.save_raw(&serde_json::to_string(&merged)?)?;
        Ok(count)
    }

    /// Reset the mtime marker so the next read re-parses the file.
    pub fn force_reload(&self) {
        *self.last_mod.write().unwrap() = SystemTime::UNIX_EPOCH;
        self.reload_if_changed();
    }

    fn reload_if_changed(&self) {
        if self.path.exists() {
            let mod_time = fs::metadata(&self.path)
                .and_then(|meta| meta.modified())
                .unwrap_or(SystemTime::UNIX_EPOCH);

            let needs_reload = mod_time > *self.last_mod.read().unwrap();
            if !needs_reload {
                return;
            }

            match fs::read_to_string(&self.path) {
                Ok(content) => {
                    let compiled = parse_and_compile(&content);
                    info!(
                        "loaded {} rules from {}",
                        compiled.len(),
                        self.path.display()
                    );
                    *self.compiled.write().unwrap() = compiled;
                    *self.last_mod.write().unwrap() = mod_time;
                }
                Err(err) => warn!("failed to read {}: {}", self.path.display(), err),
            }
            return;
        }

        // No file on disk yet: fall back to the built-in defaults once.
        if self.compiled.read().unwrap().is_empty() {
            let compiled = parse_and_compile(DEFAULT_RULES_JSON);
            info!("no rules file found, using {} built-in rules", compiled.len());
            *self.compiled.write().unwrap() = compiled;
        }
    }
}

/// Parse entries one by one so a single malformed or unknown-kind rule is
/// dropped with a warning instead of discarding the whole file. Duplicate ids
/// keep the first occurrence.
fn parse_and_compile(content: &str) -> Vec<CompiledRule> {
    let entries: Vec<serde_json::Value> = match serde_json::from_str(content) {
        Ok(entries) => entries,
        Err(err) => {
            warn!("rules file is not a JSON array: {err}");
            return Vec::new();
        }
    };

    let mut seen_ids = std::collections::HashSet::new();
    let mut compiled = Vec::with_capacity(entries.len());
    for (index, entry) in entries.into_iter().enumerate() {
        match serde_json::from_value::<Rule>(entry) {
            Ok(rule) => {
                if !seen_ids.insert(rule.meta.id.clone()) {
                    warn!("duplicate rule id '{}' at index {index}, skipping", rule.meta.id);
                    continue;
                }
                compiled.push(CompiledRule::compile(rule));
            }
            Err(err) => warn!("skipping rule at index {index}: {err}"),
        }
    }
    compiled
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store() -> (tempfile::TempDir, RuleStore) {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = RuleStore::new(dir.path().join("actions.json"));
        (dir, store)
    }

    #[test]
    fn builtin_defaults_load_when_file_is_missing() {
        let (_dir, store) = temp_store();
        let rules = store.rules();
        assert!(!rules.is_empty());
        assert!(rules.iter().any(|r| r.meta.id == "builtin-url"));
        assert!(rules.iter().any(|r| r.meta.id == "builtin-web-search"));
    }

    #[test]
    fn save_raw_replaces_the_loaded_set() {
        let (_dir, store) = temp_store();
        let raw = r#"[{
            "meta": {"id": "only", "name": "Only", "version": "1.0.0"},
            "scope": {"include": ["*"], "priority": 1},
            "trigger": {"kind": "keyword", "pattern": "x"},
            "action": {"kind": "local_format"}
        }]"#;

        store.save_raw(raw).expect("save should succeed");
        let rules = store.rules();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].meta.id, "only");
    }

    #[test]
    fn save_raw_rejects_non_array_payloads() {
        let (_dir, store) = temp_store();
        assert!(store.save_raw(r#"{"not": "an array"}"#).is_err());
        assert!(store.save_raw("definitely not json").is_err());
    }

    #[test]
    fn malformed_entries_are_skipped_not_fatal() {
        let (_dir, store) = temp_store();
        let raw = r#"[
            {"meta": {"id": "good", "name": "Good", "version": "1.0.0"},
             "scope": {"include": ["*"], "priority": 1},
             "trigger": {"kind": "keyword", "pattern": "x"},
             "action": {"kind": "local_format"}},
            {"meta": {"id": "bad", "name": "Bad", "version": "1.0.0"},
             "scope": {"include": ["*"], "priority": 1},
             "trigger": {"kind": "keyword", "pattern": "x"},
             "action": {"kind": "does_not_exist"}}
        ]"#;

        store.save_raw(raw).expect("save should succeed");
        let rules = store.rules();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].meta.id, "good");
    }

    #[test]
    fn import_merges_by_id() {
        let (dir, store) = temp_store();
        let initial = store.rules();
        let initial_len = initial.len();

        let import_path = dir.path().join("shared.json");
        let replacement = r#"{
            "meta": {"id": "builtin-url", "name": "Open link (custom)", "version": "2.0.0"},
            "scope": {"include": ["*"], "priority": 95},
            "trigger": {"kind": "regex", "pattern": "https?://"},
            "action": {"kind": "url", "template": "${0}"}
        }"#;
        fs::write(&import_path, replacement).expect("write import file");

        let count = store
            .import(import_path.to_str().unwrap())
            .expect("import should succeed");
        assert_eq!(count, 1);

        let rules = store.rules();
        assert_eq!(rules.len(), initial_len);
        let url_rule = rules
            .iter()
            .find(|r| r.meta.id == "builtin-url")
            .expect("replaced rule present");
        assert_eq!(url_rule.meta.version, "2.0.0");
    }
}
