use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::time::Instant;
use tracing::{error, info, warn};

use crate::audio::{ArtifactDescriptor, PerUserRecorder};
use crate::deliver::{Attachment, RecapPoster};
use crate::pipeline::chunking::split_chunks;
use crate::pipeline::report::{PipelineReport, StageOutcome};
use crate::summarize::Summarizer;
use crate::transcribe::Transcriber;

const EMPTY_TRANSCRIPT_RECAP: &str =
    "No speech was captured in this session, so there is nothing to summarize.";
const SUMMARY_UNAVAILABLE: &str = "The recap could not be generated for this session.";

/// One stopped session handed to the pipeline.
#[derive(Debug, Clone)]
pub struct PipelineJob {
    pub session_id: String,
    pub room: String,
    pub session_dir: PathBuf,
    /// Recap prompt template, already loaded
    pub recap_prompt: String,
}

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Extra attempts per stage beyond the first
    pub stage_retries: u32,
    /// Bound on total post-processing time
    pub job_timeout: Duration,
    /// Transcripts longer than this are summarized in chunks
    pub chunk_chars: usize,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            stage_retries: 1,
            job_timeout: Duration::from_secs(1800),
            chunk_chars: 12000,
        }
    }
}

/// Sequences flush → transcribe → summarize → deliver with per-stage error
/// isolation. A broken collaborator degrades its stage; only a storage
/// failure during flush aborts, since the artifacts cannot be trusted.
pub struct PipelineCoordinator {
    transcriber: Arc<dyn Transcriber>,
    summarizer: Arc<dyn Summarizer>,
    poster: Arc<dyn RecapPoster>,
    settings: PipelineSettings,
}

impl PipelineCoordinator {
    pub fn new(
        transcriber: Arc<dyn Transcriber>,
        summarizer: Arc<dyn Summarizer>,
        poster: Arc<dyn RecapPoster>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            transcriber,
            summarizer,
            poster,
            settings,
        }
    }

    /// Run the full pipeline. Never returns an error: every failure is
    /// captured into the report.
    pub async fn run(&self, job: &PipelineJob, recorder: &mut PerUserRecorder) -> PipelineReport {
        let mut report = PipelineReport::new(job.session_id.clone());
        let deadline = Instant::now() + self.settings.job_timeout;

        info!(session = %job.session_id, room = %job.room, "pipeline started");

        // Stage 1: flush. Retried because flush_all is idempotent; a
        // persistent storage error is fatal to the whole job.
        let artifacts = match self.flush_stage(recorder, &mut report) {
            Some(artifacts) => artifacts,
            None => {
                report.resolve_outcome();
                error!(session = %job.session_id, "pipeline aborted: storage failure");
                return report;
            }
        };
        report.artifacts = artifacts.clone();

        // Stage 2: transcribe
        let transcript = match self
            .transcribe_stage(job, &artifacts, deadline, &mut report)
            .await
        {
            Some(text) => text,
            None => {
                report.resolve_outcome();
                return report;
            }
        };

        // Stage 3: summarize
        let recap = match self
            .summarize_stage(job, &transcript, deadline, &mut report)
            .await
        {
            Some(recap) => recap,
            None => {
                report.resolve_outcome();
                return report;
            }
        };

        // Stage 4: deliver
        self.deliver_stage(job, &recap, deadline, &mut report).await;

        report.resolve_outcome();
        info!(
            session = %job.session_id,
            outcome = ?report.outcome,
            "pipeline finished"
        );
        report
    }

    fn flush_stage(
        &self,
        recorder: &mut PerUserRecorder,
        report: &mut PipelineReport,
    ) -> Option<Vec<ArtifactDescriptor>> {
        let max_attempts = self.settings.stage_retries + 1;
        let mut attempts = 0;

        loop {
            attempts += 1;
            match recorder.flush_all() {
                Ok(artifacts) => {
                    report.flush = StageOutcome::success(attempts);
                    return Some(artifacts);
                }
                Err(e) if attempts < max_attempts => {
                    warn!("flush attempt {attempts} failed: {e}");
                }
                Err(e) => {
                    report.flush = StageOutcome::failed(attempts, e.to_string());
                    return None;
                }
            }
        }
    }

    /// Returns the transcript text, or None when the job deadline expired.
    /// Collaborator failure degrades to an empty transcript so the
    /// recording is never lost just because transcription is down.
    async fn transcribe_stage(
        &self,
        job: &PipelineJob,
        artifacts: &[ArtifactDescriptor],
        deadline: Instant,
        report: &mut PipelineReport,
    ) -> Option<String> {
        if artifacts.is_empty() {
            report.transcribe = StageOutcome::degraded(0, "no audio captured");
            return Some(String::new());
        }

        let paths: Vec<PathBuf> = artifacts.iter().map(|a| a.path.clone()).collect();
        let max_attempts = self.settings.stage_retries + 1;
        let mut attempts = 0;
        let mut last_err = String::new();

        while attempts < max_attempts {
            attempts += 1;
            let call = self.transcriber.transcribe(&job.session_id, &paths);
            match tokio::time::timeout_at(deadline, call).await {
                Ok(Ok(transcription)) => {
                    self.persist_transcript(
                        job,
                        &transcription.transcript_text,
                        transcription.captions.as_deref(),
                    );
                    report.transcribe = StageOutcome::success(attempts);
                    return Some(transcription.transcript_text);
                }
                Ok(Err(e)) => {
                    warn!(session = %job.session_id, "transcription attempt {attempts} failed: {e}");
                    last_err = e.to_string();
                }
                Err(_) => {
                    report.transcribe = StageOutcome::failed(attempts, "job timeout exceeded");
                    return None;
                }
            }
        }

        report.transcribe = StageOutcome::failed(attempts, last_err);
        Some(String::new())
    }

    fn persist_transcript(&self, job: &PipelineJob, text: &str, captions: Option<&str>) {
        // best effort: the recap can still be produced if these writes fail
        let txt_path = job.session_dir.join("transcript.txt");
        if let Err(e) = std::fs::write(&txt_path, text) {
            warn!("could not persist {}: {e}", txt_path.display());
        }
        if let Some(captions) = captions {
            let srt_path = job.session_dir.join("transcript.srt");
            if let Err(e) = std::fs::write(&srt_path, captions) {
                warn!("could not persist {}: {e}", srt_path.display());
            }
        }
    }

    /// Produce the recap text. Long transcripts are split at stable
    /// boundaries, each chunk summarized independently (placeholder on
    /// failure), then folded into one recap.
    async fn summarize_stage(
        &self,
        job: &PipelineJob,
        transcript: &str,
        deadline: Instant,
        report: &mut PipelineReport,
    ) -> Option<String> {
        if transcript.trim().is_empty() {
            report.summarize = StageOutcome::degraded(0, "empty transcript");
            return Some(EMPTY_TRANSCRIPT_RECAP.to_string());
        }

        let chunks = split_chunks(transcript, self.settings.chunk_chars);

        if chunks.len() == 1 {
            let (result, attempts) = self
                .summarize_with_retry(&job.recap_prompt, &chunks[0], deadline)
                .await;
            return match result {
                Ok(Some(recap)) => {
                    report.summarize = StageOutcome::success(attempts);
                    Some(recap)
                }
                Ok(None) => {
                    report.summarize = StageOutcome::failed(attempts, "job timeout exceeded");
                    None
                }
                Err(e) => {
                    report.summarize = StageOutcome::failed(attempts, e);
                    Some(SUMMARY_UNAVAILABLE.to_string())
                }
            };
        }

        // chunk summaries run concurrently; the fold waits for all of them
        let total = chunks.len();
        let calls = chunks.iter().enumerate().map(|(i, chunk)| {
            let prompt = format!(
                "{}\n\n[TRANSCRIPT CHUNK {}/{}]",
                job.recap_prompt,
                i + 1,
                total
            );
            async move {
                let (result, _) = self
                    .summarize_with_retry(
                        &format!("{prompt}\n\nReturn only the requested sections."),
                        chunk,
                        deadline,
                    )
                    .await;
                (i, result)
            }
        });

        let mut timed_out = false;
        let mut placeholders = 0usize;
        let mut outlines: Vec<String> = vec![String::new(); total];

        for (i, result) in join_all(calls).await {
            match result {
                Ok(Some(summary)) => outlines[i] = summary,
                Ok(None) => timed_out = true,
                Err(e) => {
                    warn!(session = %job.session_id, chunk = i + 1, "chunk summary failed: {e}");
                    placeholders += 1;
                    outlines[i] = format!("[Chunk {} summary unavailable]", i + 1);
                }
            }
        }

        if timed_out {
            report.summarize = StageOutcome::failed(1, "job timeout exceeded");
            return None;
        }

        let joined = outlines.join("\n\n");
        let fold_prompt = "Combine the following chunked notes into a single well-structured \
                           session recap with the same sections, removing duplicates and \
                           keeping the best details:";

        let (fold, attempts) = self
            .summarize_with_retry(fold_prompt, &joined, deadline)
            .await;

        match fold {
            Ok(Some(recap)) => {
                if placeholders == 0 {
                    report.summarize = StageOutcome::success(attempts);
                } else {
                    report.summarize = StageOutcome::degraded(
                        attempts,
                        format!("{placeholders}/{total} chunk summaries unavailable"),
                    );
                }
                Some(recap)
            }
            Ok(None) => {
                report.summarize = StageOutcome::failed(attempts, "job timeout exceeded");
                None
            }
            Err(e) => {
                // fall back to the raw chunk notes rather than dropping them
                report.summarize =
                    StageOutcome::degraded(attempts, format!("fold step failed: {e}"));
                Some(joined)
            }
        }
    }

    /// Ok(None) signals the job deadline expired mid-call.
    async fn summarize_with_retry(
        &self,
        prompt: &str,
        text: &str,
        deadline: Instant,
    ) -> (Result<Option<String>, String>, u32) {
        let max_attempts = self.settings.stage_retries + 1;
        let mut attempts = 0;
        let mut last_err = String::new();

        while attempts < max_attempts {
            attempts += 1;
            match tokio::time::timeout_at(deadline, self.summarizer.summarize(prompt, text)).await
            {
                Ok(Ok(summary)) => return (Ok(Some(summary)), attempts),
                Ok(Err(e)) => {
                    warn!("summarization attempt {attempts} failed: {e}");
                    last_err = e.to_string();
                }
                Err(_) => return (Ok(None), attempts),
            }
        }

        (Err(last_err), attempts)
    }

    async fn deliver_stage(
        &self,
        job: &PipelineJob,
        recap: &str,
        deadline: Instant,
        report: &mut PipelineReport,
    ) {
        let mut attachments = Vec::new();
        let srt_path = job.session_dir.join("transcript.srt");
        if srt_path.exists() {
            attachments.push(Attachment {
                path: srt_path,
                file_name: format!("{}_transcript.srt", job.session_id),
            });
        }

        let max_attempts = self.settings.stage_retries + 1;
        let mut attempts = 0;
        let mut last_err = String::new();

        while attempts < max_attempts {
            attempts += 1;
            let call = self.poster.post(&job.room, recap, &attachments);
            match tokio::time::timeout_at(deadline, call).await {
                Ok(Ok(())) => {
                    report.deliver = StageOutcome::success(attempts);
                    return;
                }
                Ok(Err(e)) => {
                    warn!(session = %job.session_id, "delivery attempt {attempts} failed: {e}");
                    last_err = e.to_string();
                }
                Err(_) => {
                    report.deliver = StageOutcome::failed(attempts, "job timeout exceeded");
                    return;
                }
            }
        }

        // artifacts stay on disk for manual recovery; the job is still
        // terminally complete
        report.deliver = StageOutcome::failed(attempts, last_err);
    }
}
