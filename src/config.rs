use anyhow::Result;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    pub storage: StorageConfig,
    pub voice: VoiceConfig,
    pub transcriber: TranscriberConfig,
    pub summarizer: SummarizerConfig,
    pub delivery: DeliveryConfig,
    pub pipeline: PipelineConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Root directory for session artifacts; one subdirectory per session id
    pub sessions_path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VoiceConfig {
    /// Which transport to wire up ("loopback" replays a WAV fixture)
    pub transport: TransportKind,
    /// WAV file replayed by the loopback transport
    pub loopback_fixture: Option<String>,
    /// Handshake attempt timeout
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Retry ceiling for session-invalid rejections
    #[serde(default = "default_handshake_retries")]
    pub handshake_retries: u32,
    /// Settle delay between handshake attempts (kept >= 1s)
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,
    /// Treat an identical re-offered endpoint token as a stuck remote
    /// session and force a teardown before retrying. Heuristic; the remote
    /// contract is undocumented, so this stays tunable.
    #[serde(default = "default_true")]
    pub escalate_on_reissue: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    Gateway,
    Loopback,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TranscriberConfig {
    pub url: String,
    #[serde(default = "default_transcribe_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SummarizerConfig {
    pub url: String,
    pub model: String,
    /// Transcripts longer than this are split before summarization
    #[serde(default = "default_chunk_chars")]
    pub chunk_chars: usize,
    #[serde(default = "default_summarize_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeliveryConfig {
    pub webhook_url: String,
    /// Character ceiling per posted message part
    #[serde(default = "default_message_limit")]
    pub message_limit: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// Recap prompt template; falls back to a builtin when missing
    pub prompt_path: String,
    /// Bound on total post-processing time per job
    #[serde(default = "default_job_timeout_secs")]
    pub job_timeout_secs: u64,
}

fn default_connect_timeout_secs() -> u64 {
    30
}

fn default_handshake_retries() -> u32 {
    2
}

fn default_settle_delay_ms() -> u64 {
    1000
}

fn default_true() -> bool {
    true
}

fn default_transcribe_timeout_secs() -> u64 {
    600
}

fn default_chunk_chars() -> usize {
    12000
}

fn default_summarize_timeout_secs() -> u64 {
    180
}

fn default_message_limit() -> usize {
    1900
}

fn default_job_timeout_secs() -> u64 {
    1800
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}
