use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use serde::Serialize;
use tracing::{info, warn};

use crate::audio::{AudioSink, TaggedFrame};
use crate::error::SessionError;

/// Descriptor for one flushed per-participant artifact.
#[derive(Debug, Clone, Serialize)]
pub struct ArtifactDescriptor {
    pub participant_id: String,
    pub path: PathBuf,
    pub byte_len: u64,
    pub frame_count: usize,
}

/// Demultiplexes a tagged audio stream into per-participant sinks and
/// flushes each to a WAV artifact in the session directory.
///
/// Artifacts are named `user_<participant>.wav`, one directory per session
/// id. A participant who never produced a frame yields no artifact.
pub struct PerUserRecorder {
    session_id: String,
    session_dir: PathBuf,
    sinks: BTreeMap<String, AudioSink>,
    flushed: Option<Vec<ArtifactDescriptor>>,
}

impl PerUserRecorder {
    pub fn new(session_id: String, session_dir: PathBuf) -> Self {
        Self {
            session_id,
            session_dir,
            sinks: BTreeMap::new(),
            flushed: None,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn session_dir(&self) -> &PathBuf {
        &self.session_dir
    }

    /// Append a frame to its participant's sink, creating the sink on the
    /// first frame from a new participant. Frames for sealed sinks are
    /// dropped and counted.
    pub fn ingest(&mut self, frame: TaggedFrame) {
        let sink = self
            .sinks
            .entry(frame.participant_id.clone())
            .or_insert_with(|| AudioSink::new(frame.sample_rate, frame.channels));

        if !sink.push(&frame) {
            warn!(
                participant = %frame.participant_id,
                "dropped frame for sealed track"
            );
        }
    }

    /// Participants seen so far, in stable order
    pub fn participants(&self) -> Vec<String> {
        self.sinks.keys().cloned().collect()
    }

    /// Bytes buffered per participant
    pub fn byte_counts(&self) -> BTreeMap<String, u64> {
        self.sinks
            .iter()
            .map(|(id, sink)| (id.clone(), sink.byte_len()))
            .collect()
    }

    /// Total frames dropped against sealed tracks
    pub fn dropped_frames(&self) -> u64 {
        self.sinks.values().map(|s| s.dropped()).sum()
    }

    /// Seal every sink and write one WAV per participant.
    ///
    /// Idempotent: a second call returns the descriptors from the first
    /// flush without touching the files again. Zero participants is not an
    /// error; the pipeline degrades to an empty transcript.
    pub fn flush_all(&mut self) -> Result<Vec<ArtifactDescriptor>, SessionError> {
        if let Some(descriptors) = &self.flushed {
            return Ok(descriptors.clone());
        }

        fs::create_dir_all(&self.session_dir).map_err(|e| {
            SessionError::StorageWriteFailed(format!(
                "create {}: {}",
                self.session_dir.display(),
                e
            ))
        })?;

        let mut descriptors = Vec::new();

        for (participant_id, sink) in self.sinks.iter_mut() {
            sink.seal();

            let path = self
                .session_dir
                .join(format!("user_{}.wav", participant_id));

            write_track(&path, sink)?;

            descriptors.push(ArtifactDescriptor {
                participant_id: participant_id.clone(),
                path,
                byte_len: sink.byte_len(),
                frame_count: sink.frame_count(),
            });
        }

        info!(
            session = %self.session_id,
            tracks = descriptors.len(),
            "flushed session audio"
        );

        self.flushed = Some(descriptors.clone());
        Ok(descriptors)
    }
}

fn write_track(path: &PathBuf, sink: &AudioSink) -> Result<(), SessionError> {
    let spec = hound::WavSpec {
        channels: sink.channels(),
        sample_rate: sink.sample_rate(),
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = hound::WavWriter::create(path, spec)
        .map_err(|e| SessionError::StorageWriteFailed(format!("{}: {}", path.display(), e)))?;

    for frame in sink.frames() {
        for &sample in &frame.pcm {
            writer
                .write_sample(sample)
                .map_err(|e| SessionError::StorageWriteFailed(format!("{}: {}", path.display(), e)))?;
        }
    }

    writer
        .finalize()
        .map_err(|e| SessionError::StorageWriteFailed(format!("{}: {}", path.display(), e)))?;

    Ok(())
}
