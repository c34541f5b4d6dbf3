use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::audio::PerUserRecorder;
use crate::error::SessionError;
use crate::pipeline::{PipelineCoordinator, PipelineJob, PipelineReport};
use crate::session::stats::{SessionState, SessionStatus};
use crate::voice::{LifecycleEvent, VoiceInbound, VoiceSessionManager};

const COMMAND_BUFFER: usize = 8;

/// Commands accepted by a running session task. External callers queue
/// behind in-flight transitions through this mailbox instead of racing
/// the state machine.
#[derive(Debug)]
pub enum SessionCommand {
    /// Stop recording; the reply carries the pipeline report, or None when
    /// the stop landed before anything was captured.
    Stop {
        reply: oneshot::Sender<Option<PipelineReport>>,
    },
}

/// The task owning one session end to end: voice manager, recorder and
/// pipeline all live here, so everything within a session is serialized
/// while separate rooms run independently.
pub struct SessionActor {
    room: String,
    job: PipelineJob,
    manager: VoiceSessionManager,
    events: mpsc::UnboundedReceiver<LifecycleEvent>,
    recorder: PerUserRecorder,
    coordinator: PipelineCoordinator,
    commands: mpsc::Receiver<SessionCommand>,
    status: watch::Sender<SessionStatus>,
    state: SessionState,
    started_at: DateTime<Utc>,
}

impl SessionActor {
    pub fn spawn(
        room: String,
        job: PipelineJob,
        manager: VoiceSessionManager,
        events: mpsc::UnboundedReceiver<LifecycleEvent>,
        recorder: PerUserRecorder,
        coordinator: PipelineCoordinator,
    ) -> (
        mpsc::Sender<SessionCommand>,
        watch::Receiver<SessionStatus>,
        JoinHandle<()>,
    ) {
        let (commands_tx, commands_rx) = mpsc::channel(COMMAND_BUFFER);
        let started_at = Utc::now();
        let (status_tx, status_rx) = watch::channel(SessionStatus::new(
            job.session_id.clone(),
            room.clone(),
            started_at,
        ));

        let actor = Self {
            room,
            job,
            manager,
            events,
            recorder,
            coordinator,
            commands: commands_rx,
            status: status_tx,
            state: SessionState::Connecting,
            started_at,
        };

        let task = tokio::spawn(actor.run());
        (commands_tx, status_rx, task)
    }

    async fn run(mut self) {
        enum ConnectWait {
            Done(Result<(), SessionError>),
            Stopped(oneshot::Sender<Option<PipelineReport>>),
            Detached,
        }

        let room = self.room.clone();

        // Handshake phase. A stop arriving here cancels the attempt and
        // closes without a pipeline job: nothing has been captured yet.
        let wait = {
            let connect = self.manager.connect(&room);
            tokio::pin!(connect);
            loop {
                tokio::select! {
                    res = &mut connect => break ConnectWait::Done(res),
                    cmd = self.commands.recv() => match cmd {
                        Some(SessionCommand::Stop { reply }) => break ConnectWait::Stopped(reply),
                        None => break ConnectWait::Detached,
                    },
                }
            }
        };

        match wait {
            ConnectWait::Done(Ok(())) => {
                self.set_state(SessionState::Recording);
            }
            ConnectWait::Done(Err(e)) => {
                error!(room, "voice handshake failed: {e}");
                self.set_state(SessionState::Failed);
                self.await_stop_while_failed().await;
                return;
            }
            ConnectWait::Stopped(reply) => {
                info!(room, "stop received mid-handshake, closing without pipeline");
                self.manager.close_now().await;
                self.set_state(SessionState::Closed);
                let _ = reply.send(None);
                return;
            }
            ConnectWait::Detached => {
                self.manager.close_now().await;
                return;
            }
        }

        let mut inbound = self.manager.take_inbound();

        loop {
            tokio::select! {
                cmd = self.commands.recv() => match cmd {
                    Some(SessionCommand::Stop { reply }) => {
                        self.stop_and_report(reply).await;
                        return;
                    }
                    None => {
                        self.manager.close_now().await;
                        return;
                    }
                },

                ev = self.events.recv() => {
                    if let Some(ev) = ev {
                        self.on_lifecycle_event(ev);
                    }
                }

                item = async { inbound.as_mut().unwrap().recv().await }, if inbound.is_some() => {
                    match item {
                        Some(VoiceInbound::Frame(frame)) => {
                            self.recorder.ingest(frame);
                            self.publish_status();
                        }
                        Some(VoiceInbound::Invalidated(code)) => {
                            warn!(room, code = code.0, "voice transport invalidated");
                            match self.manager.handle_invalidation(&room).await {
                                Ok(()) => {
                                    inbound = self.manager.take_inbound();
                                    self.set_state(SessionState::Recording);
                                }
                                Err(e) => {
                                    error!(room, "reconnect failed, keeping captured audio: {e}");
                                    inbound = None;
                                    self.set_state(SessionState::Failed);
                                }
                            }
                        }
                        Some(VoiceInbound::Closed) | None => {
                            info!(room, "voice frame stream ended");
                            inbound = None;
                        }
                    }
                }
            }
        }
    }

    /// After a terminal handshake failure the session stays addressable so
    /// the failure is reported explicitly, never left "maybe running".
    async fn await_stop_while_failed(&mut self) {
        while let Some(cmd) = self.commands.recv().await {
            match cmd {
                SessionCommand::Stop { reply } => {
                    self.set_state(SessionState::Closed);
                    let _ = reply.send(None);
                    return;
                }
            }
        }
    }

    async fn stop_and_report(&mut self, reply: oneshot::Sender<Option<PipelineReport>>) {
        info!(room = %self.room, session = %self.job.session_id, "stopping session");

        self.manager.drain().await;
        self.set_state(SessionState::Processing);

        let report = self.coordinator.run(&self.job, &mut self.recorder).await;

        self.set_state(SessionState::Closed);
        let _ = reply.send(Some(report));
    }

    fn on_lifecycle_event(&mut self, ev: LifecycleEvent) {
        match ev {
            LifecycleEvent::Connected { endpoint } => {
                info!(room = %self.room, endpoint = %endpoint.describe(), "voice connected");
                self.set_state(SessionState::Recording);
            }
            LifecycleEvent::Reconnecting { attempt } => {
                warn!(room = %self.room, attempt, "voice reconnecting");
                self.set_state(SessionState::Reconnecting);
            }
            LifecycleEvent::Closed => {}
        }
    }

    fn set_state(&mut self, state: SessionState) {
        self.state = state;
        self.publish_status();
    }

    fn publish_status(&self) {
        self.status.send_replace(SessionStatus {
            session_id: self.job.session_id.clone(),
            room: self.room.clone(),
            state: self.state,
            started_at: self.started_at,
            participants: self.recorder.participants(),
            bytes_by_participant: self.recorder.byte_counts(),
            dropped_frames: self.recorder.dropped_frames(),
        });
    }
}
