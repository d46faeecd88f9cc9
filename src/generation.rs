//! Text-generation adapter.
//!
//! [`GeminiGenerator`] sends an assembled prompt to the `generateContent`
//! endpoint of a Gemini-style REST API. The adapter is fail-soft: any
//! backend error, missing credential, or empty candidate degrades to a
//! fixed apology string, with the failure detail logged at warn level.
//! Callers cannot distinguish "model declined" from "network failure",
//! which keeps the error surface plain text end to end.

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::time::Duration;
use tracing::warn;

use crate::config::{ModelConfig, GEMINI_API_KEY};

/// Fixed reply emitted when the generation backend fails.
pub const GENERATION_APOLOGY: &str =
    "I'm sorry, I encountered an error while generating a response.";

/// Produces an answer for an assembled prompt.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, prompt: &str) -> String;
}

/// Generator backed by the Gemini `generateContent` REST endpoint.
pub struct GeminiGenerator {
    model: String,
    url: String,
    timeout: Duration,
}

impl GeminiGenerator {
    pub fn new(config: &ModelConfig) -> Self {
        Self {
            model: config.chat_model.clone(),
            url: config.url.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    async fn request(&self, prompt: &str) -> Result<String> {
        let api_key = std::env::var(GEMINI_API_KEY)
            .map_err(|_| anyhow::anyhow!("{} not set", GEMINI_API_KEY))?;

        let client = reqwest::Client::builder().timeout(self.timeout).build()?;

        let body = serde_json::json!({
            "contents": [ { "parts": [ { "text": prompt } ] } ],
        });

        let response = client
            .post(format!(
                "{}/models/{}:generateContent?key={}",
                self.url, self.model, api_key
            ))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            bail!("Generation API error {}: {}", status, body_text);
        }

        let json: serde_json::Value = response.json().await?;
        parse_generate_response(&json)
    }
}

#[async_trait]
impl Generator for GeminiGenerator {
    async fn generate(&self, prompt: &str) -> String {
        match self.request(prompt).await {
            Ok(text) => text,
            Err(e) => {
                warn!("generation failed: {:#}", e);
                GENERATION_APOLOGY.to_string()
            }
        }
    }
}

/// Extract the first candidate's text from a `generateContent` response.
fn parse_generate_response(json: &serde_json::Value) -> Result<String> {
    let text = json
        .get("candidates")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
        .and_then(|c| c.get("content"))
        .and_then(|c| c.get("parts"))
        .and_then(|p| p.as_array())
        .and_then(|p| p.first())
        .and_then(|p| p.get("text"))
        .and_then(|t| t.as_str())
        .ok_or_else(|| anyhow::anyhow!("Invalid generation response: missing candidate text"))?;

    if text.trim().is_empty() {
        bail!("Invalid generation response: empty candidate text");
    }

    Ok(text.to_string())
}
