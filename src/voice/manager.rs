use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::config::VoiceConfig;
use crate::error::SessionError;
use crate::voice::transport::{
    ConnectOutcome, RejectionClass, VoiceEndpoint, VoiceInbound, VoiceTransport,
};

/// Lifecycle state of the voice connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceState {
    Idle,
    Connecting,
    Connected,
    Reconnecting,
    Draining,
    Closed,
}

impl VoiceState {
    pub fn as_str(&self) -> &'static str {
        match self {
            VoiceState::Idle => "idle",
            VoiceState::Connecting => "connecting",
            VoiceState::Connected => "connected",
            VoiceState::Reconnecting => "reconnecting",
            VoiceState::Draining => "draining",
            VoiceState::Closed => "closed",
        }
    }
}

/// Handshake retry policy. The settle delay is clamped to at least one
/// second; retrying faster reliably hits the same stale remote session.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub settle_delay: Duration,
    pub connect_timeout: Duration,
    pub escalate_on_reissue: bool,
}

impl RetryPolicy {
    pub fn from_config(cfg: &VoiceConfig) -> Self {
        Self {
            max_retries: cfg.handshake_retries,
            settle_delay: Duration::from_millis(cfg.settle_delay_ms.max(1000)),
            connect_timeout: Duration::from_secs(cfg.connect_timeout_secs),
            escalate_on_reissue: cfg.escalate_on_reissue,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            settle_delay: Duration::from_secs(1),
            connect_timeout: Duration::from_secs(30),
            escalate_on_reissue: true,
        }
    }
}

/// Events emitted as the connection moves through its lifecycle, consumed
/// by the owning session task for its status surface.
#[derive(Debug, Clone)]
pub enum LifecycleEvent {
    Connected { endpoint: VoiceEndpoint },
    Reconnecting { attempt: u32 },
    Closed,
}

/// Drives the voice handshake to a terminal connected/closed outcome and
/// reacts to transport invalidation with bounded, escalating retries.
///
/// A manager is exclusively owned by one session task; that ownership
/// serializes all state transitions.
pub struct VoiceSessionManager {
    transport: Box<dyn VoiceTransport>,
    policy: RetryPolicy,
    state: VoiceState,
    endpoint: Option<VoiceEndpoint>,
    events: mpsc::UnboundedSender<LifecycleEvent>,
}

impl VoiceSessionManager {
    pub fn new(
        transport: Box<dyn VoiceTransport>,
        policy: RetryPolicy,
    ) -> (Self, mpsc::UnboundedReceiver<LifecycleEvent>) {
        let (events, events_rx) = mpsc::unbounded_channel();
        (
            Self {
                transport,
                policy,
                state: VoiceState::Idle,
                endpoint: None,
                events,
            },
            events_rx,
        )
    }

    pub fn state(&self) -> VoiceState {
        self.state
    }

    pub fn endpoint(&self) -> Option<&VoiceEndpoint> {
        self.endpoint.as_ref()
    }

    /// Take the inbound frame/event stream of the established connection
    pub fn take_inbound(&mut self) -> Option<mpsc::Receiver<VoiceInbound>> {
        self.transport.take_inbound()
    }

    /// Drive the handshake until connected or the retry budget is spent.
    ///
    /// Idempotent when already connected. Session-invalid rejections are
    /// retried after the settle delay; if the platform re-offers an
    /// identical endpoint token, a forced teardown is issued before the
    /// next attempt instead of retrying blindly against the same token.
    pub async fn connect(&mut self, room: &str) -> Result<(), SessionError> {
        if self.state == VoiceState::Connected {
            return Ok(());
        }
        if self.state != VoiceState::Reconnecting {
            self.state = VoiceState::Connecting;
        }

        let mut attempt: u32 = 0;
        let mut last_offered: Option<VoiceEndpoint> = None;

        loop {
            attempt += 1;
            info!(room, attempt, "voice handshake attempt");

            let outcome =
                tokio::time::timeout(self.policy.connect_timeout, self.transport.connect(room))
                    .await;

            match outcome {
                Ok(Ok(ConnectOutcome::Ready { endpoint })) => {
                    if let Err(e) = self.transport.send_audio_ready_ack().await {
                        warn!(room, "audio-ready ack failed: {e}");
                    }
                    info!(room, endpoint = %endpoint.describe(), "voice connected");
                    self.endpoint = Some(endpoint.clone());
                    self.state = VoiceState::Connected;
                    let _ = self.events.send(LifecycleEvent::Connected { endpoint });
                    return Ok(());
                }
                Ok(Ok(ConnectOutcome::Rejected { code, offered })) => {
                    warn!(room, code = code.0, attempt, "voice handshake rejected");

                    let retryable = code.class() == RejectionClass::SessionInvalid
                        && attempt <= self.policy.max_retries;

                    if !retryable {
                        return self.fail_handshake(code.0, offered, attempt);
                    }

                    // Identical endpoint re-offer: strong signal the remote
                    // session is stuck. Tear it down explicitly before the
                    // next attempt.
                    let reissued = offered.is_some() && offered == last_offered;
                    if reissued && self.policy.escalate_on_reissue {
                        warn!(room, "endpoint re-issued unchanged, forcing teardown");
                        if let Err(e) = self.transport.disconnect(true).await {
                            warn!(room, "forced teardown failed: {e}");
                        }
                    }
                    last_offered = offered;

                    tokio::time::sleep(self.policy.settle_delay).await;
                }
                Ok(Err(e)) => {
                    warn!(room, "voice transport error during handshake: {e}");
                    // code 0: local transport failure, no remote close code
                    return self.fail_handshake(0, None, attempt);
                }
                Err(_) => {
                    warn!(room, "voice handshake timed out");
                    return self.fail_handshake(0, None, attempt);
                }
            }
        }
    }

    /// React to a transport invalidation observed while connected:
    /// re-enter the handshake with the same bounded retry budget.
    pub async fn handle_invalidation(&mut self, room: &str) -> Result<(), SessionError> {
        if self.state != VoiceState::Connected {
            return Err(SessionError::NotActive(room.to_string()));
        }

        self.state = VoiceState::Reconnecting;
        self.endpoint = None;
        let _ = self.events.send(LifecycleEvent::Reconnecting { attempt: 1 });
        info!(room, "voice session invalidated, reconnecting");

        self.connect(room).await
    }

    /// Orderly stop: drain and close the transport
    pub async fn drain(&mut self) {
        if self.state == VoiceState::Closed {
            return;
        }
        self.state = VoiceState::Draining;
        if let Err(e) = self.transport.disconnect(true).await {
            warn!("voice disconnect failed: {e}");
        }
        self.state = VoiceState::Closed;
        let _ = self.events.send(LifecycleEvent::Closed);
    }

    /// Immediate teardown, used when a stop lands mid-handshake
    pub async fn close_now(&mut self) {
        if let Err(e) = self.transport.disconnect(true).await {
            warn!("voice disconnect failed: {e}");
        }
        self.state = VoiceState::Closed;
        let _ = self.events.send(LifecycleEvent::Closed);
    }

    fn fail_handshake(
        &mut self,
        code: u16,
        offered: Option<VoiceEndpoint>,
        attempts: u32,
    ) -> Result<(), SessionError> {
        self.state = VoiceState::Closed;
        let _ = self.events.send(LifecycleEvent::Closed);
        Err(SessionError::VoiceHandshakeFailed {
            code,
            endpoint: offered.map(|e| e.describe()),
            attempts,
        })
    }
}
