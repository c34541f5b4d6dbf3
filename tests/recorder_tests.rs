// Integration tests for per-participant capture and flushing.
//
// These verify the sealed-buffer invariant, flush idempotency, and that
// frame order survives into the persisted WAV artifacts.

use anyhow::Result;
use tempfile::TempDir;
use vox_scribe::audio::{PerUserRecorder, TaggedFrame};

fn frame(participant: &str, pcm: Vec<i16>, offset_ms: u64) -> TaggedFrame {
    TaggedFrame {
        participant_id: participant.to_string(),
        pcm,
        sample_rate: 48000,
        channels: 2,
        offset_ms,
    }
}

#[test]
fn test_flush_writes_one_artifact_per_speaker() -> Result<()> {
    let temp = TempDir::new()?;
    let mut recorder =
        PerUserRecorder::new("20250817_193042".to_string(), temp.path().join("s1"));

    recorder.ingest(frame("alice", vec![1, 2], 0));
    recorder.ingest(frame("bob", vec![3, 4], 0));
    recorder.ingest(frame("alice", vec![5, 6], 20));

    let artifacts = recorder.flush_all()?;
    assert_eq!(artifacts.len(), 2);

    let alice = artifacts.iter().find(|a| a.participant_id == "alice").unwrap();
    assert_eq!(alice.frame_count, 2);
    assert_eq!(alice.byte_len, 8); // 4 samples * 2 bytes
    assert!(alice.path.ends_with("user_alice.wav"));
    assert!(alice.path.exists());

    let bob = artifacts.iter().find(|a| a.participant_id == "bob").unwrap();
    assert_eq!(bob.frame_count, 1);
    assert!(bob.path.ends_with("user_bob.wav"));

    Ok(())
}

#[test]
fn test_frame_order_is_preserved_in_artifact() -> Result<()> {
    let temp = TempDir::new()?;
    let mut recorder =
        PerUserRecorder::new("20250817_193042".to_string(), temp.path().join("s1"));

    recorder.ingest(frame("alice", vec![10], 0));
    recorder.ingest(frame("alice", vec![20, 30], 20));
    recorder.ingest(frame("alice", vec![40], 40));

    let artifacts = recorder.flush_all()?;
    let reader = hound::WavReader::open(&artifacts[0].path)?;
    let samples: Vec<i16> = reader.into_samples::<i16>().collect::<Result<_, _>>()?;

    assert_eq!(samples, vec![10, 20, 30, 40]);
    Ok(())
}

#[test]
fn test_flush_is_idempotent() -> Result<()> {
    let temp = TempDir::new()?;
    let mut recorder =
        PerUserRecorder::new("20250817_193042".to_string(), temp.path().join("s1"));

    recorder.ingest(frame("alice", vec![1, 2, 3], 0));

    let first = recorder.flush_all()?;
    let second = recorder.flush_all()?;

    assert_eq!(first.len(), second.len());
    assert_eq!(first[0].participant_id, second[0].participant_id);
    assert_eq!(first[0].path, second[0].path);
    assert_eq!(first[0].byte_len, second[0].byte_len);
    assert_eq!(first[0].frame_count, second[0].frame_count);

    Ok(())
}

#[test]
fn test_late_frames_for_sealed_buffer_are_dropped_and_counted() -> Result<()> {
    let temp = TempDir::new()?;
    let mut recorder =
        PerUserRecorder::new("20250817_193042".to_string(), temp.path().join("s1"));

    recorder.ingest(frame("alice", vec![1], 0));
    let first = recorder.flush_all()?;
    assert_eq!(first[0].frame_count, 1);

    // late arrival after flush: dropped, never merged
    recorder.ingest(frame("alice", vec![2], 100));
    assert_eq!(recorder.dropped_frames(), 1);

    let second = recorder.flush_all()?;
    assert_eq!(second[0].frame_count, 1);
    assert_eq!(second[0].byte_len, first[0].byte_len);

    let reader = hound::WavReader::open(&second[0].path)?;
    let samples: Vec<i16> = reader.into_samples::<i16>().collect::<Result<_, _>>()?;
    assert_eq!(samples, vec![1]);

    Ok(())
}

#[test]
fn test_silent_session_flushes_zero_artifacts() -> Result<()> {
    let temp = TempDir::new()?;
    let mut recorder =
        PerUserRecorder::new("20250817_193042".to_string(), temp.path().join("s1"));

    let artifacts = recorder.flush_all()?;
    assert!(artifacts.is_empty());

    Ok(())
}

#[test]
fn test_storage_failure_is_reported() {
    let temp = TempDir::new().unwrap();
    // a regular file where the session directory should go
    let blocker = temp.path().join("blocker");
    std::fs::write(&blocker, b"x").unwrap();

    let mut recorder =
        PerUserRecorder::new("20250817_193042".to_string(), blocker.join("nested"));
    recorder.ingest(frame("alice", vec![1], 0));

    let err = recorder.flush_all().unwrap_err();
    assert!(matches!(err, vox_scribe::SessionError::StorageWriteFailed(_)));
}
