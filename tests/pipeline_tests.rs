// End-to-end pipeline tests with scripted collaborators.
//
// The coordinator must always terminate with a report: collaborator
// failures degrade stages, only storage failure aborts the job.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use tempfile::TempDir;
use vox_scribe::audio::{PerUserRecorder, TaggedFrame};
use vox_scribe::deliver::Attachment;
use vox_scribe::{
    PipelineCoordinator, PipelineJob, PipelineOutcome, PipelineSettings, RecapPoster, StageState,
    Summarizer, Transcriber, Transcription,
};

const SID: &str = "20250817_193042";

fn frame(participant: &str, pcm: Vec<i16>) -> TaggedFrame {
    TaggedFrame {
        participant_id: participant.to_string(),
        pcm,
        sample_rate: 48000,
        channels: 2,
        offset_ms: 0,
    }
}

fn job(dir: &TempDir) -> PipelineJob {
    PipelineJob {
        session_id: SID.to_string(),
        room: "room1".to_string(),
        session_dir: dir.path().to_path_buf(),
        recap_prompt: "Write a recap.".to_string(),
    }
}

fn settings() -> PipelineSettings {
    PipelineSettings {
        stage_retries: 1,
        job_timeout: Duration::from_secs(60),
        chunk_chars: 12000,
    }
}

fn recorder_with_audio(dir: &TempDir) -> PerUserRecorder {
    let mut recorder = PerUserRecorder::new(SID.to_string(), dir.path().to_path_buf());
    recorder.ingest(frame("alice", vec![1, 2, 3, 4]));
    recorder
}

/// Replays a script of transcription results; hangs forever once asked to.
struct FakeTranscriber {
    script: Mutex<VecDeque<Result<Transcription, String>>>,
    hang: bool,
}

impl FakeTranscriber {
    fn scripted(script: Vec<Result<Transcription, String>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            hang: false,
        }
    }

    fn ok(text: &str) -> Result<Transcription, String> {
        Ok(Transcription {
            transcript_text: text.to_string(),
            captions: None,
        })
    }

    fn hanging() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            hang: true,
        }
    }
}

#[async_trait]
impl Transcriber for FakeTranscriber {
    async fn transcribe(&self, _session_id: &str, _artifacts: &[PathBuf]) -> Result<Transcription> {
        if self.hang {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        match self.script.lock().unwrap().pop_front() {
            Some(Ok(t)) => Ok(t),
            Some(Err(e)) => Err(anyhow!(e)),
            None => Err(anyhow!("transcriber script exhausted")),
        }
    }
}

/// Echoes its input text back as the summary; fails on a trigger marker.
struct EchoSummarizer;

#[async_trait]
impl Summarizer for EchoSummarizer {
    async fn summarize(&self, _prompt: &str, text: &str) -> Result<String> {
        if text.contains("FAILME") {
            return Err(anyhow!("model refused"));
        }
        Ok(text.to_string())
    }
}

/// Records every delivery; optionally fails all of them.
struct RecordingPoster {
    posts: Mutex<Vec<(String, String, Vec<String>)>>,
    fail: bool,
}

impl RecordingPoster {
    fn new() -> Self {
        Self {
            posts: Mutex::new(Vec::new()),
            fail: false,
        }
    }

    fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new()
        }
    }

    fn recorded(&self) -> Vec<(String, String, Vec<String>)> {
        self.posts.lock().unwrap().clone()
    }
}

#[async_trait]
impl RecapPoster for RecordingPoster {
    async fn post(&self, room: &str, text: &str, attachments: &[Attachment]) -> Result<()> {
        if self.fail {
            return Err(anyhow!("webhook returned 503"));
        }
        let names = attachments.iter().map(|a| a.file_name.clone()).collect();
        self.posts
            .lock()
            .unwrap()
            .push((room.to_string(), text.to_string(), names));
        Ok(())
    }
}

fn coordinator(
    transcriber: FakeTranscriber,
    poster: Arc<RecordingPoster>,
    settings: PipelineSettings,
) -> PipelineCoordinator {
    PipelineCoordinator::new(
        Arc::new(transcriber),
        Arc::new(EchoSummarizer),
        poster,
        settings,
    )
}

#[tokio::test]
async fn test_happy_path_posts_recap() {
    let dir = TempDir::new().unwrap();
    let mut recorder = recorder_with_audio(&dir);
    let poster = Arc::new(RecordingPoster::new());
    let coord = coordinator(
        FakeTranscriber::scripted(vec![FakeTranscriber::ok("alice: hello everyone")]),
        poster.clone(),
        settings(),
    );

    let report = coord.run(&job(&dir), &mut recorder).await;

    assert_eq!(report.outcome, PipelineOutcome::Success);
    assert_eq!(report.flush.state, StageState::Success);
    assert_eq!(report.transcribe.state, StageState::Success);
    assert_eq!(report.transcribe.attempts, 1);
    assert_eq!(report.summarize.state, StageState::Success);
    assert_eq!(report.deliver.state, StageState::Success);
    assert_eq!(report.artifacts.len(), 1);

    let posts = poster.recorded();
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].0, "room1");
    assert_eq!(posts[0].1, "alice: hello everyone");

    // transcript persisted next to the audio
    let txt = std::fs::read_to_string(dir.path().join("transcript.txt")).unwrap();
    assert_eq!(txt, "alice: hello everyone");
}

#[tokio::test]
async fn test_transcriber_outage_still_delivers_a_recap() {
    let dir = TempDir::new().unwrap();
    let mut recorder = recorder_with_audio(&dir);
    let poster = Arc::new(RecordingPoster::new());
    let coord = coordinator(
        FakeTranscriber::scripted(vec![
            Err("connection refused".to_string()),
            Err("connection refused".to_string()),
        ]),
        poster.clone(),
        settings(),
    );

    let report = coord.run(&job(&dir), &mut recorder).await;

    assert_eq!(report.transcribe.state, StageState::Failed);
    assert_eq!(report.transcribe.attempts, 2);
    assert_eq!(report.summarize.state, StageState::Degraded);
    assert_eq!(report.deliver.state, StageState::Success);
    assert_eq!(report.outcome, PipelineOutcome::Partial);

    // something was still posted so the room is not left silent
    let posts = poster.recorded();
    assert_eq!(posts.len(), 1);
    assert!(posts[0].1.contains("nothing to summarize"));
}

#[tokio::test]
async fn test_transient_transcriber_error_is_retried() {
    let dir = TempDir::new().unwrap();
    let mut recorder = recorder_with_audio(&dir);
    let poster = Arc::new(RecordingPoster::new());
    let coord = coordinator(
        FakeTranscriber::scripted(vec![
            Err("timeout".to_string()),
            FakeTranscriber::ok("bob: we made it"),
        ]),
        poster.clone(),
        settings(),
    );

    let report = coord.run(&job(&dir), &mut recorder).await;

    assert_eq!(report.outcome, PipelineOutcome::Success);
    assert_eq!(report.transcribe.state, StageState::Success);
    assert_eq!(report.transcribe.attempts, 2);
    assert_eq!(poster.recorded()[0].1, "bob: we made it");
}

#[tokio::test]
async fn test_silent_session_posts_stub_recap_without_transcribing() {
    let dir = TempDir::new().unwrap();
    let mut recorder = PerUserRecorder::new(SID.to_string(), dir.path().to_path_buf());
    let poster = Arc::new(RecordingPoster::new());
    let transcriber = FakeTranscriber::scripted(vec![]);
    let coord = coordinator(transcriber, poster.clone(), settings());

    let report = coord.run(&job(&dir), &mut recorder).await;

    assert_eq!(report.transcribe.state, StageState::Degraded);
    assert_eq!(report.transcribe.attempts, 0);
    assert_eq!(report.summarize.state, StageState::Degraded);
    assert_eq!(report.deliver.state, StageState::Success);
    assert_eq!(report.outcome, PipelineOutcome::Partial);
    assert!(report.artifacts.is_empty());
    assert!(poster.recorded()[0].1.contains("nothing to summarize"));
}

#[tokio::test]
async fn test_delivery_failure_is_terminal_but_reported() {
    let dir = TempDir::new().unwrap();
    let mut recorder = recorder_with_audio(&dir);
    let poster = Arc::new(RecordingPoster::failing());
    let coord = coordinator(
        FakeTranscriber::scripted(vec![FakeTranscriber::ok("short talk")]),
        poster.clone(),
        settings(),
    );

    let report = coord.run(&job(&dir), &mut recorder).await;

    assert_eq!(report.deliver.state, StageState::Failed);
    assert_eq!(report.deliver.attempts, 2);
    assert_eq!(report.outcome, PipelineOutcome::Partial);

    // audio artifact stays on disk for manual recovery
    assert!(report.artifacts[0].path.exists());
}

#[tokio::test]
async fn test_storage_failure_aborts_with_remaining_stages_skipped() {
    let dir = TempDir::new().unwrap();
    let blocker = dir.path().join("blocker");
    std::fs::write(&blocker, b"x").unwrap();

    let mut recorder = PerUserRecorder::new(SID.to_string(), blocker.join("nested"));
    recorder.ingest(frame("alice", vec![1]));

    let poster = Arc::new(RecordingPoster::new());
    let coord = coordinator(FakeTranscriber::scripted(vec![]), poster.clone(), settings());

    let report = coord.run(&job(&dir), &mut recorder).await;

    assert_eq!(report.flush.state, StageState::Failed);
    assert_eq!(report.flush.attempts, 2);
    assert_eq!(report.transcribe.state, StageState::Skipped);
    assert_eq!(report.summarize.state, StageState::Skipped);
    assert_eq!(report.deliver.state, StageState::Skipped);
    assert_eq!(report.outcome, PipelineOutcome::Failed);
    assert!(poster.recorded().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_job_deadline_fails_the_stage_in_flight() {
    let dir = TempDir::new().unwrap();
    let mut recorder = recorder_with_audio(&dir);
    let poster = Arc::new(RecordingPoster::new());
    let coord = coordinator(FakeTranscriber::hanging(), poster.clone(), settings());

    let report = coord.run(&job(&dir), &mut recorder).await;

    assert_eq!(report.flush.state, StageState::Success);
    assert_eq!(report.transcribe.state, StageState::Failed);
    assert_eq!(
        report.transcribe.detail.as_deref(),
        Some("job timeout exceeded")
    );
    assert_eq!(report.summarize.state, StageState::Skipped);
    assert_eq!(report.deliver.state, StageState::Skipped);
    assert_eq!(report.outcome, PipelineOutcome::Failed);
    assert!(poster.recorded().is_empty());
}

#[tokio::test]
async fn test_failed_chunk_degrades_with_placeholder_in_recap() {
    let dir = TempDir::new().unwrap();
    let mut recorder = recorder_with_audio(&dir);
    let poster = Arc::new(RecordingPoster::new());

    // three paragraphs, forced into separate chunks; the middle one trips
    // the summarizer
    let transcript = "first part of the session talk.\n\n\
                      middle part FAILME right here.\n\n\
                      closing part of the session talk.";

    let mut s = settings();
    s.chunk_chars = 40;
    let coord = coordinator(
        FakeTranscriber::scripted(vec![FakeTranscriber::ok(transcript)]),
        poster.clone(),
        s,
    );

    let report = coord.run(&job(&dir), &mut recorder).await;

    assert_eq!(report.summarize.state, StageState::Degraded);
    assert!(report
        .summarize
        .detail
        .as_deref()
        .unwrap()
        .contains("chunk summaries unavailable"));
    assert_eq!(report.outcome, PipelineOutcome::Partial);

    let posted = &poster.recorded()[0].1;
    assert!(posted.contains("[Chunk"));
    assert!(posted.contains("first part"));
    assert!(posted.contains("closing part"));
}

#[tokio::test]
async fn test_captions_are_persisted_and_attached() {
    let dir = TempDir::new().unwrap();
    let mut recorder = recorder_with_audio(&dir);
    let poster = Arc::new(RecordingPoster::new());
    let coord = coordinator(
        FakeTranscriber::scripted(vec![Ok(Transcription {
            transcript_text: "alice: hi".to_string(),
            captions: Some("1\n00:00:00,000 --> 00:00:01,000\nhi\n".to_string()),
        })]),
        poster.clone(),
        settings(),
    );

    let report = coord.run(&job(&dir), &mut recorder).await;

    assert_eq!(report.outcome, PipelineOutcome::Success);
    assert!(dir.path().join("transcript.srt").exists());

    let posts = poster.recorded();
    assert_eq!(posts[0].2, vec![format!("{SID}_transcript.srt")]);
}
