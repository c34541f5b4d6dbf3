use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::info;

/// Output of the transcription collaborator.
#[derive(Debug, Clone, Deserialize)]
pub struct Transcription {
    pub transcript_text: String,
    /// Time-coded caption payload (SRT), when the service produced one
    #[serde(default)]
    pub captions: Option<String>,
}

/// External speech-to-text collaborator.
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(
        &self,
        session_id: &str,
        artifacts: &[PathBuf],
    ) -> Result<Transcription>;
}

/// Session ids are submitted to the transcriber as a path component, so
/// only the fixed `YYYYMMDD_HHMMSS` shape is allowed through.
pub fn is_valid_session_id(session_id: &str) -> bool {
    let bytes = session_id.as_bytes();
    bytes.len() == 15
        && bytes[..8].iter().all(u8::is_ascii_digit)
        && bytes[8] == b'_'
        && bytes[9..].iter().all(u8::is_ascii_digit)
}

/// HTTP client for the transcriber service.
pub struct HttpTranscriber {
    base_url: String,
    http: reqwest::Client,
}

impl HttpTranscriber {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("build transcriber HTTP client")?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        })
    }
}

#[async_trait]
impl Transcriber for HttpTranscriber {
    async fn transcribe(
        &self,
        session_id: &str,
        artifacts: &[PathBuf],
    ) -> Result<Transcription> {
        if !is_valid_session_id(session_id) {
            bail!("refusing to submit malformed session id {session_id:?}");
        }

        let names: Vec<String> = artifacts
            .iter()
            .filter_map(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
            .collect();

        info!(session = session_id, tracks = names.len(), "submitting transcription job");

        let url = format!("{}/transcribe", self.base_url);
        let resp = self
            .http
            .post(&url)
            .json(&json!({ "session_id": session_id, "artifacts": names }))
            .send()
            .await
            .context("transcriber request failed")?;

        if !resp.status().is_success() {
            bail!("transcriber returned {}", resp.status());
        }

        let transcription: Transcription = resp
            .json()
            .await
            .context("decode transcriber response")?;

        info!(
            session = session_id,
            chars = transcription.transcript_text.len(),
            "transcription complete"
        );

        Ok(transcription)
    }
}
