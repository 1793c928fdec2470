//! Translation through a locally hosted OpenAI-compatible chat endpoint.

use crate::error::{Result, RevoiceError};
use crate::model::ModelHandle;
use crate::translate::{TranslationContext, Translator};
use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use tracing::debug;

/// Default address of the local inference server.
pub const DEFAULT_TRANSLATOR_URL: &str = "http://127.0.0.1:8080";

/// Translator backed by `/v1/chat/completions`.
pub struct ChatTranslator {
    client: Client,
    base_url: String,
    model: String,
    source_lang: String,
    target_lang: String,
    temperature: f32,
    max_tokens: u32,
    loaded: bool,
}

impl ChatTranslator {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            source_lang: "ru".to_string(),
            target_lang: "en".to_string(),
            temperature: 0.2,
            max_tokens: 512,
            loaded: false,
        }
    }

    pub fn with_languages(mut self, source: impl Into<String>, target: impl Into<String>) -> Self {
        self.source_lang = source.into();
        self.target_lang = target.into();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    fn system_prompt(&self) -> String {
        format!(
            "You are a professional translator from {} to {}. \
Reply with the translation only, without quotes, notes or explanations.",
            language_code_to_name(&self.source_lang),
            language_code_to_name(&self.target_lang)
        )
    }

    /// Build the user message. Context lines are shown for reference and
    /// the model is asked for the target line only.
    fn build_prompt(&self, text: &str, context: &TranslationContext) -> String {
        let target = language_code_to_name(&self.target_lang);
        if context.is_empty() {
            return format!("Translate to {target}:\n{}", text.trim());
        }

        let mut prompt = String::from(
            "The line to translate is part of a longer speech. Surrounding lines are given for context only.\n",
        );
        if !context.before.is_empty() {
            prompt.push_str("\nPrevious lines:\n");
            for line in &context.before {
                prompt.push_str(&format!("- {}\n", line));
            }
        }
        if !context.after.is_empty() {
            prompt.push_str("\nFollowing lines:\n");
            for line in &context.after {
                prompt.push_str(&format!("- {}\n", line));
            }
        }
        prompt.push_str(&format!(
            "\nTranslate ONLY this line to {target}:\n{}",
            text.trim()
        ));
        prompt
    }

    async fn complete(&self, prompt: String) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: self.system_prompt(),
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            stream: false,
        };

        let url = format!("{}/v1/chat/completions", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| RevoiceError::Translation(format!("request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| RevoiceError::Translation(format!("failed to read response: {}", e)))?;

        if !status.is_success() {
            return Err(RevoiceError::Translation(format!(
                "server error ({}): {}",
                status, body
            )));
        }

        let parsed: ChatResponse = serde_json::from_str(&body).map_err(|e| {
            RevoiceError::Translation(format!("failed to parse response: {}", e))
        })?;

        if let Some(error) = parsed.error {
            return Err(RevoiceError::Translation(error.message));
        }

        Ok(parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default())
    }
}

fn cleanup_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            // Leading labels the model sometimes echoes back.
            r"(?i)^\s*(translation|english|line|answer)\s*:\s*",
            // Bullet echoed from the context list.
            r"^\s*-\s+",
        ]
        .iter()
        .filter_map(|p| Regex::new(p).ok())
        .collect()
    })
}

/// Strip labels, wrapping quotes and extra lines from a model reply.
pub fn clean_reply(reply: &str) -> String {
    let first = reply
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or_default();

    let mut cleaned = first.to_string();
    for pattern in cleanup_patterns() {
        cleaned = pattern.replace(&cleaned, "").into_owned();
    }

    let trimmed = cleaned.trim();
    let unquoted = ['"', '\'', '«', '“']
        .iter()
        .zip(['"', '\'', '»', '”'])
        .find_map(|(&open, close)| {
            trimmed
                .strip_prefix(open)
                .and_then(|s| s.strip_suffix(close))
        })
        .unwrap_or(trimmed);
    unquoted.trim().to_string()
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
    stream: bool,
}

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Deserialize, Debug)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    #[serde(default)]
    error: Option<ChatError>,
}

#[derive(Deserialize, Debug)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize, Debug)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize, Debug)]
struct ChatError {
    message: String,
}

#[async_trait]
impl ModelHandle for ChatTranslator {
    fn model_name(&self) -> String {
        format!("translator:{}", self.model)
    }

    async fn load(&mut self) -> Result<()> {
        let url = format!("{}/v1/models", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| RevoiceError::ModelLoad {
                model: self.model_name(),
                reason: format!("translation server unreachable at {}: {}", self.base_url, e),
            })?;

        if !response.status().is_success() {
            return Err(RevoiceError::ModelLoad {
                model: self.model_name(),
                reason: format!("translation server returned {}", response.status()),
            });
        }

        self.loaded = true;
        Ok(())
    }

    fn unload(&mut self) {
        self.loaded = false;
    }

    fn is_loaded(&self) -> bool {
        self.loaded
    }
}

#[async_trait]
impl Translator for ChatTranslator {
    async fn translate(&self, text: &str, context: &TranslationContext) -> Result<String> {
        if !self.loaded {
            return Err(RevoiceError::Translation(format!(
                "{} is not loaded",
                self.model_name()
            )));
        }

        debug!(
            "Translating {} chars ({} context lines)",
            text.len(),
            context.before.len() + context.after.len()
        );

        let reply = self.complete(self.build_prompt(text, context)).await?;
        let cleaned = clean_reply(&reply);
        if cleaned.is_empty() {
            return Err(RevoiceError::Translation(
                "model returned an empty translation".to_string(),
            ));
        }
        Ok(cleaned)
    }
}

/// Convert language code to human-readable name for better prompting.
fn language_code_to_name(code: &str) -> &'static str {
    match code.to_lowercase().as_str() {
        "en" => "English",
        "ru" => "Russian",
        "uk" => "Ukrainian",
        "de" => "German",
        "fr" => "French",
        "es" => "Spanish",
        "it" => "Italian",
        "pt" => "Portuguese",
        _ => "the target language",
    }
}
