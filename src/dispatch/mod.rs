use std::sync::Arc;

use anyhow::Result;
use log::debug;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tauri::AppHandle;
use tauri_plugin_opener::OpenerExt;

use crate::rules::types::{ActionSpec, Rule};
use crate::services::{format, AiClient, ScriptRunner};

/// Placeholder substituted with the effective text in URL templates.
pub const TEXT_PLACEHOLDER: &str = "${0}";

/// Output of a dispatched action as shown in the popup. Failures that should
/// stay readable use `kind = "error"`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionResult {
    pub text: String,
    pub kind: String,
}

impl ActionResult {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            text: message.into(),
            kind: "error".to_string(),
        }
    }
}

/// What the overlay should do once a dispatch settles.
#[derive(Debug)]
pub enum DispatchOutcome {
    /// Show the result text in the popup.
    Display(ActionResult),
    /// Fire-and-forget kinds: the popup closes immediately.
    CloseOverlay,
}

/// Executes one action per Session. All real work is delegated to the opener
/// plugin, the AI client or the script runner; nothing here does I/O itself.
pub struct Dispatcher {
    app: AppHandle,
    ai: Arc<AiClient>,
    scripts: Arc<ScriptRunner>,
}

impl Dispatcher {
    pub fn new(app: AppHandle, ai: Arc<AiClient>, scripts: Arc<ScriptRunner>) -> Self {
        Self { app, ai, scripts }
    }

    pub async fn dispatch(&self, rule: &Rule, captured_text: &str) -> Result<DispatchOutcome> {
        match &rule.action {
            ActionSpec::Url { template } => {
                let effective =
                    effective_text(captured_text, rule.trigger.extraction_pattern());
                let url = build_url(template, &effective);
                debug!("opening url {url}");
                self.app.opener().open_url(&url, None::<&str>)?;
                Ok(DispatchOutcome::CloseOverlay)
            }
            ActionSpec::Path => {
                let path = captured_text.trim();
                debug!("opening path {path}");
                self.app.opener().open_path(path, None::<&str>)?;
                Ok(DispatchOutcome::CloseOverlay)
            }
            ActionSpec::LocalFormat => {
                Ok(DispatchOutcome::Display(format::format_text(captured_text)))
            }
            ActionSpec::AiTranslate => Ok(DispatchOutcome::Display(
                self.ai.translate(captured_text).await?,
            )),
            ActionSpec::AiSummarize => Ok(DispatchOutcome::Display(
                self.ai.summarize(captured_text).await?,
            )),
            ActionSpec::AiProcess { template } => Ok(DispatchOutcome::Display(
                self.ai.process(captured_text, template).await?,
            )),
            ActionSpec::Script {
                script_path,
                template,
                arguments,
            } => {
                let path = script_path
                    .as_deref()
                    .filter(|p| !p.is_empty())
                    .unwrap_or(template);
                // Script failures stay on screen so the user can read the
                // diagnostic, unlike other kinds which quietly retry.
                match self.scripts.run(path, arguments, captured_text).await {
                    Ok(result) => Ok(DispatchOutcome::Display(result)),
                    Err(err) => Ok(DispatchOutcome::Display(ActionResult::error(format!(
                        "{err:#}"
                    )))),
                }
            }
        }
    }
}

/// Apply the rule's extraction pattern to the captured text and keep the
/// first match. A pattern that fails to compile or does not match falls back
/// to the unmodified captured text.
pub fn effective_text(captured: &str, extraction_pattern: Option<&str>) -> String {
    let Some(pattern) = extraction_pattern else {
        return captured.to_string();
    };

    match Regex::new(pattern) {
        Ok(re) => re
            .find(captured)
            .map(|m| m.as_str().to_string())
            .unwrap_or_else(|| captured.to_string()),
        Err(err) => {
            debug!("extraction pattern '{pattern}' failed to compile: {err}");
            captured.to_string()
        }
    }
}

/// A template that is exactly the placeholder takes the effective text
/// verbatim; otherwise the placeholder is replaced with the percent-encoded
/// effective text.
pub fn build_url(template: &str, effective: &str) -> String {
    if template == TEXT_PLACEHOLDER {
        effective.to_string()
    } else {
        template.replace(TEXT_PLACEHOLDER, &urlencoding::encode(effective))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extraction_keeps_first_match() {
        let effective = effective_text("order #4821 ready", Some(r"\d+"));
        assert_eq!(effective, "4821");
    }

    #[test]
    fn bare_placeholder_template_uses_text_verbatim() {
        let effective = effective_text("order #4821 ready", Some(r"\d+"));
        assert_eq!(build_url(TEXT_PLACEHOLDER, &effective), "4821");
    }

    #[test]
    fn templated_url_percent_encodes() {
        let url = build_url("https://x.com/s?q=${0}", "a b");
        assert_eq!(url, "https://x.com/s?q=a%20b");
    }

    #[test]
    fn extraction_no_match_falls_back_to_raw_text() {
        assert_eq!(effective_text("no digits here", Some(r"\d+")), "no digits here");
    }

    #[test]
    fn malformed_extraction_falls_back_to_raw_text() {
        assert_eq!(effective_text("some text", Some("([broken")), "some text");
    }

    #[test]
    fn bare_placeholder_skips_percent_encoding() {
        // A raw URL with spaces stays untouched when the template is ${0}.
        assert_eq!(build_url(TEXT_PLACEHOLDER, "https://a.io/x y"), "https://a.io/x y");
    }
}
