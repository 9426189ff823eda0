// Copyright (c) 2025 the replypilot authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::Config;
use crate::constants::{
    DEFAULT_TASK_INSTRUCTION, GENERATE_TIMEOUT_SECS, GREETING_PROMPT_TEMPLATE, LANGUAGE_BLOCK_EN,
    LANGUAGE_BLOCK_RU, LANGUAGE_BLOCK_UK, MAX_POST_PROMPT_CHARS, PROMPT_TEMPLATE,
};
use crate::error::AgentError;
use crate::greeting::GreetingKind;

/// Generation backend request/response types (Ollama wire format).
#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: String,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<ModelTag>,
}

#[derive(Debug, Deserialize)]
struct ModelTag {
    name: String,
}

/// The one operation the autopilot loop needs from a text-generation
/// collaborator. Retry policy lives in the caller, never here.
#[async_trait]
pub trait ReplyBackend: Send + Sync {
    async fn generate(
        &self,
        post_text: &str,
        config: &Config,
        greeting: Option<GreetingKind>,
    ) -> Result<String, AgentError>;

    /// Diagnostics only.
    async fn list_models(&self, config: &Config) -> Result<Vec<String>, AgentError>;
}

/// Client for a local or remote Ollama-compatible backend. Model and base
/// URL come from the per-iteration config snapshot, so mid-run settings
/// changes take effect on the next post.
pub struct OllamaClient {
    http: reqwest::Client,
}

impl OllamaClient {
    pub fn new() -> Result<Self, AgentError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(GENERATE_TIMEOUT_SECS))
            .build()
            .map_err(|e| AgentError::Other(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { http })
    }
}

fn language_block(language: &str) -> &'static str {
    match language {
        "uk" => LANGUAGE_BLOCK_UK,
        "ru" => LANGUAGE_BLOCK_RU,
        _ => LANGUAGE_BLOCK_EN,
    }
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max_chars).collect();
        format!("{}…", cut)
    }
}

/// Build the generation prompt. When a greeting category is known but the
/// local shortcut didn't answer (it is disabled), a much shorter
/// category-specific instruction replaces the full template to suppress
/// rambling over a two-word post.
pub fn build_prompt(post_text: &str, config: &Config, greeting: Option<GreetingKind>) -> String {
    let language = language_block(&config.language);

    if let Some(kind) = greeting {
        return GREETING_PROMPT_TEMPLATE
            .replace("{language_block}", language)
            .replace("{category}", kind.name())
            .trim()
            .to_string();
    }

    let task = config
        .prompt_style
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(DEFAULT_TASK_INSTRUCTION);

    PROMPT_TEMPLATE
        .replace("{language_block}", language)
        .replace("{post_text}", &truncate_chars(post_text, MAX_POST_PROMPT_CHARS))
        .replace("{task}", task)
        .trim()
        .to_string()
}

/// Ollama reports a crashed model runner inside the error body; these are the
/// signatures worth telling apart from a plain failure.
fn crash_patterns() -> &'static [&'static str] {
    &[
        "exit status",
        "signal:",
        "terminated",
        "llama runner process",
    ]
}

fn classify_error_body(status: StatusCode, body: &str, model: &str) -> AgentError {
    let lower = body.to_lowercase();

    if crash_patterns().iter().any(|p| lower.contains(p)) {
        return AgentError::ModelCrashed(body.to_string());
    }
    if status == StatusCode::NOT_FOUND || lower.contains("not found") {
        return AgentError::ModelNotFound(model.to_string());
    }
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return AgentError::AuthMissing(body.to_string());
    }
    if status == StatusCode::TOO_MANY_REQUESTS || lower.contains("quota") {
        return AgentError::QuotaExceeded(body.to_string());
    }
    AgentError::Other(format!("backend returned {}: {}", status, body))
}

fn map_transport_error(err: reqwest::Error, base_url: &str) -> AgentError {
    AgentError::BackendUnavailable {
        message: err.to_string(),
        hint: format!(
            "Is the backend running at {}? For a local Ollama, start it with `ollama serve`.",
            base_url
        ),
    }
}

#[async_trait]
impl ReplyBackend for OllamaClient {
    async fn generate(
        &self,
        post_text: &str,
        config: &Config,
        greeting: Option<GreetingKind>,
    ) -> Result<String, AgentError> {
        let prompt = build_prompt(post_text, config, greeting);
        let request = GenerateRequest {
            model: &config.model,
            prompt: &prompt,
            stream: false,
        };

        let url = format!("{}/api/generate", config.base_url.trim_end_matches('/'));
        let mut builder = self.http.post(&url).json(&request);
        if let Some(key) = config.api_key.as_deref().filter(|k| !k.is_empty()) {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| map_transport_error(e, &config.base_url))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<ErrorBody>(&body)
                .map(|b| b.error)
                .ok()
                .filter(|e| !e.is_empty())
                .unwrap_or(body);
            return Err(classify_error_body(status, &detail, &config.model));
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| AgentError::Other(format!("invalid backend response: {}", e)))?;

        if parsed.response.trim().is_empty() {
            return Err(AgentError::Other("backend returned an empty reply".to_string()));
        }
        Ok(parsed.response)
    }

    async fn list_models(&self, config: &Config) -> Result<Vec<String>, AgentError> {
        let url = format!("{}/api/tags", config.base_url.trim_end_matches('/'));
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| map_transport_error(e, &config.base_url))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_error_body(status, &body, &config.model));
        }

        let parsed: TagsResponse = response
            .json()
            .await
            .map_err(|e| AgentError::Other(format!("invalid tags response: {}", e)))?;
        Ok(parsed.models.into_iter().map(|m| m.name).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_for(language: &str) -> Config {
        Config {
            model: "llama3".to_string(),
            language: language.to_string(),
            ..Config::default()
        }
    }

    #[test]
    fn prompt_embeds_language_post_and_negative_constraints() {
        let prompt = build_prompt("interesting take on rollups", &config_for("en"), None);
        assert!(prompt.contains("OUTPUT LANGUAGE: ENGLISH"));
        assert!(prompt.contains("interesting take on rollups"));
        assert!(prompt.contains("Do NOT translate the post."));
        assert!(prompt.contains("under 280 characters"));
        assert!(prompt.contains("No quotes, no preambles."));
    }

    #[test]
    fn prompt_uses_custom_style_when_present() {
        let mut config = config_for("uk");
        config.prompt_style = Some("Reply like a cheerful builder.".to_string());
        let prompt = build_prompt("gm", &config, None);
        assert!(prompt.contains("OUTPUT LANGUAGE: UKRAINIAN"));
        assert!(prompt.contains("Reply like a cheerful builder."));
        assert!(!prompt.contains(DEFAULT_TASK_INSTRUCTION));
    }

    #[test]
    fn greeting_prompt_is_short_and_category_specific() {
        let prompt = build_prompt("gm frens", &config_for("en"), Some(GreetingKind::Morning));
        assert!(prompt.contains("\"morning\" greeting"));
        assert!(!prompt.contains("STRICT RULES"));
        assert!(prompt.len() < 400);
    }

    #[test]
    fn post_text_is_truncated_before_embedding() {
        let long_post = "x".repeat(5000);
        let prompt = build_prompt(&long_post, &config_for("en"), None);
        assert!(!prompt.contains(&"x".repeat(MAX_POST_PROMPT_CHARS + 1)));
    }

    #[test]
    fn error_bodies_map_to_the_taxonomy() {
        let err = classify_error_body(
            StatusCode::NOT_FOUND,
            "model 'llama3:70b' not found",
            "llama3:70b",
        );
        assert!(matches!(err, AgentError::ModelNotFound(_)));

        let err = classify_error_body(
            StatusCode::INTERNAL_SERVER_ERROR,
            "llama runner process has terminated: exit status 2",
            "llama3",
        );
        assert!(matches!(err, AgentError::ModelCrashed(_)));

        let err = classify_error_body(StatusCode::TOO_MANY_REQUESTS, "quota exceeded", "llama3");
        assert!(matches!(err, AgentError::QuotaExceeded(_)));

        let err = classify_error_body(StatusCode::UNAUTHORIZED, "missing key", "llama3");
        assert!(matches!(err, AgentError::AuthMissing(_)));

        let err = classify_error_body(StatusCode::BAD_GATEWAY, "oops", "llama3");
        assert!(matches!(err, AgentError::Other(_)));
    }
}
