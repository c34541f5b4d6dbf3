use serde::Serialize;

use crate::audio::ArtifactDescriptor;

/// Outcome of one pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StageState {
    Success,
    /// Stage produced a reduced result instead of failing the job
    Degraded,
    Failed,
    Skipped,
}

#[derive(Debug, Clone, Serialize)]
pub struct StageOutcome {
    pub state: StageState,
    /// Attempts actually made (1 = no retry needed)
    pub attempts: u32,
    pub detail: Option<String>,
}

impl StageOutcome {
    pub fn success(attempts: u32) -> Self {
        Self {
            state: StageState::Success,
            attempts,
            detail: None,
        }
    }

    pub fn degraded(attempts: u32, detail: impl Into<String>) -> Self {
        Self {
            state: StageState::Degraded,
            attempts,
            detail: Some(detail.into()),
        }
    }

    pub fn failed(attempts: u32, detail: impl Into<String>) -> Self {
        Self {
            state: StageState::Failed,
            attempts,
            detail: Some(detail.into()),
        }
    }

    pub fn skipped() -> Self {
        Self {
            state: StageState::Skipped,
            attempts: 0,
            detail: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineOutcome {
    Success,
    Partial,
    Failed,
}

/// Full account of one post-processing run. The pipeline never raises past
/// its boundary; every failure lands in here instead.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    pub session_id: String,
    pub flush: StageOutcome,
    pub transcribe: StageOutcome,
    pub summarize: StageOutcome,
    pub deliver: StageOutcome,
    pub artifacts: Vec<ArtifactDescriptor>,
    pub outcome: PipelineOutcome,
}

impl PipelineReport {
    /// Report skeleton with every stage pending-as-skipped
    pub fn new(session_id: String) -> Self {
        Self {
            session_id,
            flush: StageOutcome::skipped(),
            transcribe: StageOutcome::skipped(),
            summarize: StageOutcome::skipped(),
            deliver: StageOutcome::skipped(),
            artifacts: Vec::new(),
            outcome: PipelineOutcome::Failed,
        }
    }

    /// Derive the job outcome from the stage states
    pub fn resolve_outcome(&mut self) {
        let stages = [
            &self.flush,
            &self.transcribe,
            &self.summarize,
            &self.deliver,
        ];

        self.outcome = if self.flush.state == StageState::Failed
            || stages.iter().any(|s| s.state == StageState::Skipped)
        {
            PipelineOutcome::Failed
        } else if stages.iter().all(|s| s.state == StageState::Success) {
            PipelineOutcome::Success
        } else {
            PipelineOutcome::Partial
        };
    }
}
