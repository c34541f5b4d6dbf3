use thiserror::Error;

/// Domain errors for session lifecycle and post-processing.
///
/// Stage errors (`TranscriptionFailed`, `SummarizationFailed`,
/// `DeliveryFailed`) are captured into the pipeline report and never
/// propagate past the coordinator; `StorageWriteFailed` aborts the
/// pipeline since the artifacts cannot be trusted.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("room {0} already has an active session")]
    AlreadyActive(String),

    #[error("no active session for room {0}")]
    NotActive(String),

    #[error("voice transport unavailable: {0}")]
    TransportUnavailable(String),

    #[error("voice handshake failed after {attempts} attempts (code {code}, endpoint {endpoint:?})")]
    VoiceHandshakeFailed {
        code: u16,
        endpoint: Option<String>,
        attempts: u32,
    },

    #[error("transcription failed: {0}")]
    TranscriptionFailed(String),

    #[error("summarization failed: {0}")]
    SummarizationFailed(String),

    #[error("delivery failed: {0}")]
    DeliveryFailed(String),

    #[error("storage write failed: {0}")]
    StorageWriteFailed(String),
}
