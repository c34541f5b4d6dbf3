use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::warn;

pub const DEFAULT_RECAP_PROMPT: &str = "Summarize this game session.";

/// External summarization collaborator.
#[async_trait]
pub trait Summarizer: Send + Sync {
    /// Summarize one chunk of text under the given prompt
    async fn summarize(&self, prompt: &str, text: &str) -> Result<String>;
}

/// Load the recap prompt template, falling back to the builtin when the
/// file is missing or unreadable.
pub fn load_recap_prompt(path: &Path) -> String {
    match std::fs::read_to_string(path) {
        Ok(text) => text.trim().to_string(),
        Err(e) => {
            warn!(path = %path.display(), "recap prompt unavailable, using builtin: {e}");
            DEFAULT_RECAP_PROMPT.to_string()
        }
    }
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

/// Client for a local Ollama-style `/api/generate` endpoint.
pub struct OllamaSummarizer {
    base_url: String,
    model: String,
    http: reqwest::Client,
}

impl OllamaSummarizer {
    pub fn new(base_url: &str, model: &str, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("build summarizer HTTP client")?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            http,
        })
    }
}

#[async_trait]
impl Summarizer for OllamaSummarizer {
    async fn summarize(&self, prompt: &str, text: &str) -> Result<String> {
        let url = format!("{}/api/generate", self.base_url);

        let resp = self
            .http
            .post(&url)
            .json(&json!({
                "model": self.model,
                "prompt": format!("{prompt}\n\n{text}"),
                "stream": false,
                "options": { "temperature": 0.2 },
            }))
            .send()
            .await
            .context("summarizer request failed")?;

        if !resp.status().is_success() {
            bail!("summarizer returned {}", resp.status());
        }

        let body: GenerateResponse = resp.json().await.context("decode summarizer response")?;
        Ok(body.response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_normalized() {
        let client =
            OllamaSummarizer::new("http://127.0.0.1:11434/", "llama3.1:8b", Duration::from_secs(5))
                .unwrap();
        assert_eq!(client.base_url, "http://127.0.0.1:11434");
        assert_eq!(client.model, "llama3.1:8b");
    }

    #[test]
    fn test_missing_prompt_falls_back() {
        let prompt = load_recap_prompt(Path::new("/nonexistent/recap_prompt.txt"));
        assert_eq!(prompt, DEFAULT_RECAP_PROMPT);
    }
}
