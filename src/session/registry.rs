use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use serde::Serialize;
use tokio::sync::{mpsc, oneshot, watch, RwLock};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::audio::PerUserRecorder;
use crate::config::Config;
use crate::deliver::RecapPoster;
use crate::error::SessionError;
use crate::pipeline::{PipelineCoordinator, PipelineJob, PipelineReport, PipelineSettings};
use crate::session::session::{SessionActor, SessionCommand};
use crate::session::stats::{SessionState, SessionStatus};
use crate::summarize::{load_recap_prompt, Summarizer};
use crate::transcribe::Transcriber;
use crate::voice::{RetryPolicy, VoiceSessionManager, VoiceTransport};

/// Builds a fresh transport for each new session.
pub type TransportFactory =
    Arc<dyn Fn(&str) -> Result<Box<dyn VoiceTransport>> + Send + Sync>;

#[derive(Debug, Clone, Serialize)]
pub struct StartedSession {
    pub session_id: String,
    pub room: String,
    pub state: SessionState,
}

struct SessionHandle {
    session_id: String,
    commands: mpsc::Sender<SessionCommand>,
    status_rx: watch::Receiver<SessionStatus>,
    task: JoinHandle<()>,
}

/// Process-wide map from room id to its single active session.
///
/// Entry presence here is the sole source of truth for "is this room
/// recording"; nothing else probes the voice transport to find out. All
/// mutations of one room's session flow through that session's own task.
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, SessionHandle>>,
    transports: TransportFactory,
    transcriber: Arc<dyn Transcriber>,
    summarizer: Arc<dyn Summarizer>,
    poster: Arc<dyn RecapPoster>,
    sessions_path: PathBuf,
    prompt_path: PathBuf,
    retry_policy: RetryPolicy,
    pipeline_settings: PipelineSettings,
}

impl SessionRegistry {
    pub fn new(
        cfg: &Config,
        transports: TransportFactory,
        transcriber: Arc<dyn Transcriber>,
        summarizer: Arc<dyn Summarizer>,
        poster: Arc<dyn RecapPoster>,
    ) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            transports,
            transcriber,
            summarizer,
            poster,
            sessions_path: PathBuf::from(&cfg.storage.sessions_path),
            prompt_path: PathBuf::from(&cfg.pipeline.prompt_path),
            retry_policy: RetryPolicy::from_config(&cfg.voice),
            pipeline_settings: PipelineSettings {
                stage_retries: 1,
                job_timeout: Duration::from_secs(cfg.pipeline.job_timeout_secs),
                chunk_chars: cfg.summarizer.chunk_chars,
            },
        }
    }

    /// Start a session for a room; at most one may be active per room.
    /// Connecting continues in the session's own task after this returns.
    pub async fn start(&self, room: &str) -> Result<StartedSession, SessionError> {
        let mut sessions = self.sessions.write().await;

        if sessions.contains_key(room) {
            return Err(SessionError::AlreadyActive(room.to_string()));
        }

        let session_id = allocate_session_id(&sessions);
        let session_dir = self.sessions_path.join(&session_id);

        let transport = (self.transports)(room)
            .map_err(|e| SessionError::TransportUnavailable(e.to_string()))?;
        let (manager, events) = VoiceSessionManager::new(transport, self.retry_policy.clone());

        let recorder = PerUserRecorder::new(session_id.clone(), session_dir.clone());
        let coordinator = PipelineCoordinator::new(
            self.transcriber.clone(),
            self.summarizer.clone(),
            self.poster.clone(),
            self.pipeline_settings.clone(),
        );
        let job = PipelineJob {
            session_id: session_id.clone(),
            room: room.to_string(),
            session_dir,
            recap_prompt: load_recap_prompt(&self.prompt_path),
        };

        let (commands, status_rx, task) =
            SessionActor::spawn(room.to_string(), job, manager, events, recorder, coordinator);

        sessions.insert(
            room.to_string(),
            SessionHandle {
                session_id: session_id.clone(),
                commands,
                status_rx,
                task,
            },
        );

        info!(room, session = %session_id, "session started");

        Ok(StartedSession {
            session_id,
            room: room.to_string(),
            state: SessionState::Connecting,
        })
    }

    /// Stop the room's session and run post-processing. The registry entry
    /// is removed once the pipeline completed (or the session had nothing
    /// to process), so a new session can only start after that.
    pub async fn stop(&self, room: &str) -> Result<Option<PipelineReport>, SessionError> {
        let commands = {
            let sessions = self.sessions.read().await;
            match sessions.get(room) {
                Some(handle) => handle.commands.clone(),
                None => return Err(SessionError::NotActive(room.to_string())),
            }
        };

        let (reply_tx, reply_rx) = oneshot::channel();
        if commands
            .send(SessionCommand::Stop { reply: reply_tx })
            .await
            .is_err()
        {
            // session task is gone; drop the stale entry
            self.remove(room).await;
            return Err(SessionError::NotActive(room.to_string()));
        }

        match reply_rx.await {
            Ok(report) => {
                self.remove(room).await;
                info!(room, "session stopped");
                Ok(report)
            }
            Err(_) => {
                self.remove(room).await;
                Err(SessionError::NotActive(room.to_string()))
            }
        }
    }

    /// Current status snapshot for a room, if a session exists
    pub async fn get(&self, room: &str) -> Option<SessionStatus> {
        let sessions = self.sessions.read().await;
        sessions.get(room).map(|h| h.status_rx.borrow().clone())
    }

    /// Administrative override for a session believed stuck: drops the
    /// entry and aborts its task. Captured artifacts stay on disk.
    pub async fn force_clear(&self, room: &str) -> bool {
        let mut sessions = self.sessions.write().await;
        match sessions.remove(room) {
            Some(handle) => {
                handle.task.abort();
                warn!(room, session = %handle.session_id, "session force-cleared");
                true
            }
            None => false,
        }
    }

    async fn remove(&self, room: &str) {
        self.sessions.write().await.remove(room);
    }
}

/// Timestamp-derived session id, unique within the registry. A same-second
/// collision bumps forward one second so the id keeps the shape the
/// transcriber validates.
fn allocate_session_id(sessions: &HashMap<String, SessionHandle>) -> String {
    let mut t = Utc::now();
    loop {
        let sid = t.format("%Y%m%d_%H%M%S").to_string();
        if !sessions.values().any(|h| h.session_id == sid) {
            return sid;
        }
        t += chrono::Duration::seconds(1);
    }
}
