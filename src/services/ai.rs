use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use log::info;
use serde::{Deserialize, Serialize};

use crate::dispatch::ActionResult;
use crate::rules::types::Rule;
use crate::settings::SettingsStore;

const TRANSLATE_PROMPT: &str = "You are a professional translator. Detect the language of the \
input text: translate English input to Chinese, Chinese input to English, and any other \
language to English. Preserve technical terms, product names, numbers and citation markers \
exactly. Keep the original Markdown structure. Respond with ONLY the translation.";

const SUMMARIZE_PROMPT: &str = "You are a text summarization assistant. Provide a concise, \
accurate summary of the input text. Focus on key points and main ideas. Respond with ONLY \
the summary, no explanations.";

const PROCESS_PROMPT: &str = "You are a text processing assistant. Process the input text \
according to the user's intent (for example: format_text, extract_info, rewrite). Respond \
with ONLY the processed result, no explanations.";

const GENERATE_RULE_PROMPT: &str = r#"You are a rule generation assistant for a text action tool.
Based on the user's description, generate one rule as a JSON object with this shape:

{
  "meta": { "id": "unique-id", "name": "Display Name", "version": "1.0.0" },
  "scope": { "include": ["*"], "priority": 80 },
  "trigger": { "kind": "regex", "pattern": "REGEX_PATTERN" },
  "action": { "kind": "url", "template": "https://example.com/${0}" }
}

Action kinds: "url" (template uses ${0} for the selected text), "path", "local_format",
"ai_translate", "ai_summarize", "ai_process" (template is the intent string),
"script" (template is the script file name).
Priority is 10-100; higher matches first. Return ONLY the JSON object, no markdown fences."#;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f64,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

/// Client for an OpenAI-compatible chat endpoint. Settings are re-read per
/// request so key/model edits apply without a restart.
pub struct AiClient {
    http: reqwest::Client,
    settings: Arc<SettingsStore>,
}

impl AiClient {
    pub fn new(settings: Arc<SettingsStore>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .expect("failed to build HTTP client");

        Self { http, settings }
    }

    pub async fn translate(&self, text: &str) -> Result<ActionResult> {
        let user = format!("Translate the following text: {text}");
        let result = self.chat(TRANSLATE_PROMPT, &user, 0.3).await?;
        Ok(ActionResult {
            text: result,
            kind: "translate".to_string(),
        })
    }

    pub async fn summarize(&self, text: &str) -> Result<ActionResult> {
        let user = format!("Summarize the following text: {text}");
        let result = self.chat(SUMMARIZE_PROMPT, &user, 0.4).await?;
        Ok(ActionResult {
            text: result,
            kind: "summarize".to_string(),
        })
    }

    pub async fn process(&self, text: &str, intent: &str) -> Result<ActionResult> {
        let user = format!("Intent: {intent}\nText: {text}");
        let result = self.chat(PROCESS_PROMPT, &user, 0.5).await?;
        Ok(ActionResult {
            text: result,
            kind: "process".to_string(),
        })
    }

    /// Ask the model to draft a rule from a natural-language description.
    pub async fn generate_rule(&self, description: &str) -> Result<Rule> {
        let content = self.chat(GENERATE_RULE_PROMPT, description, 0.2).await?;
        let clean = content
            .trim()
            .trim_start_matches("```json")
            .trim_start_matches("```")
            .trim_end_matches("```")
            .trim();

        let rule: Rule =
            serde_json::from_str(clean).context("model response is not a valid rule")?;
        info!("generated rule '{}'", rule.meta.name);
        Ok(rule)
    }

    async fn chat(&self, system: &str, user: &str, temperature: f64) -> Result<String> {
        let settings = self.settings.ai();
        if !settings.usable() {
            bail!("AI is disabled or the API key is not configured");
        }

        let url = format!("{}/chat/completions", settings.base_url.trim_end_matches('/'));
        let request = ChatRequest {
            model: settings.model,
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: system.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: user.to_string(),
                },
            ],
            temperature,
        };

        let response = self
            .http
            .post(&url)
            .bearer_auth(&settings.api_key)
            .json(&request)
            .send()
            .await
            .context("chat request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("chat request rejected ({status}): {body}");
        }

        let body: ChatResponse = response
            .json()
            .await
            .context("chat response is not valid JSON")?;

        body.choices
            .first()
            .map(|choice| choice.message.content.trim().to_string())
            .ok_or_else(|| anyhow!("chat response contained no choices"))
    }
}
