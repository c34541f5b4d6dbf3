use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Coarse lifecycle state reported to the command surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    /// Voice handshake in progress
    Connecting,
    /// Connected and capturing audio
    Recording,
    /// Transport invalidated, handshake being retried
    Reconnecting,
    /// Stopped; post-processing pipeline running
    Processing,
    /// Voice connection lost permanently; captured audio retained
    Failed,
    Closed,
}

/// Snapshot of a live session for the status surface.
#[derive(Debug, Clone, Serialize)]
pub struct SessionStatus {
    pub session_id: String,
    pub room: String,
    pub state: SessionState,
    pub started_at: DateTime<Utc>,
    /// Participants that produced at least one frame
    pub participants: Vec<String>,
    pub bytes_by_participant: BTreeMap<String, u64>,
    /// Frames dropped against sealed tracks
    pub dropped_frames: u64,
}

impl SessionStatus {
    pub fn new(session_id: String, room: String, started_at: DateTime<Utc>) -> Self {
        Self {
            session_id,
            room,
            state: SessionState::Connecting,
            started_at,
            participants: Vec::new(),
            bytes_by_participant: BTreeMap::new(),
            dropped_frames: 0,
        }
    }
}
