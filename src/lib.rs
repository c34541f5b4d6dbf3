pub mod audio;
pub mod config;
pub mod deliver;
pub mod error;
pub mod http;
pub mod pipeline;
pub mod session;
pub mod summarize;
pub mod transcribe;
pub mod voice;

pub use audio::{ArtifactDescriptor, AudioSink, PerUserRecorder, TaggedFrame};
pub use config::Config;
pub use deliver::{Attachment, RecapPoster, WebhookPoster};
pub use error::SessionError;
pub use http::{create_router, AppState};
pub use pipeline::{
    PipelineCoordinator, PipelineJob, PipelineOutcome, PipelineReport, PipelineSettings,
    StageOutcome, StageState,
};
pub use session::{SessionRegistry, SessionState, SessionStatus, StartedSession};
pub use summarize::{OllamaSummarizer, Summarizer};
pub use transcribe::{HttpTranscriber, Transcriber, Transcription};
pub use voice::{
    ConnectOutcome, LifecycleEvent, LoopbackTransport, RejectionClass, RejectionCode, RetryPolicy,
    VoiceEndpoint, VoiceInbound, VoiceSessionManager, VoiceState, VoiceTransport,
};
