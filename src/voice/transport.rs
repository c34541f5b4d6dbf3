use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::audio::TaggedFrame;

/// Connection target issued by the platform for one handshake attempt.
///
/// The fields are opaque capability tokens; the only interpretation the
/// session layer applies is equality, to detect the platform re-offering
/// the same endpoint across retries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceEndpoint {
    pub host: String,
    pub port: u16,
    pub token: String,
}

impl VoiceEndpoint {
    pub fn describe(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Opaque rejection code from the voice transport.
///
/// Close codes 4006 and 4009 mean the remote considers the voice session
/// no longer valid; those drive the retry/escalation policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RejectionCode(pub u16);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectionClass {
    SessionInvalid,
    Other,
}

impl RejectionCode {
    pub fn class(&self) -> RejectionClass {
        match self.0 {
            4006 | 4009 => RejectionClass::SessionInvalid,
            _ => RejectionClass::Other,
        }
    }
}

/// Result of one handshake attempt.
#[derive(Debug, Clone)]
pub enum ConnectOutcome {
    Ready {
        endpoint: VoiceEndpoint,
    },
    /// Handshake rejected. `offered` carries the endpoint the platform
    /// handed out before the handshake failed, when one was seen.
    Rejected {
        code: RejectionCode,
        offered: Option<VoiceEndpoint>,
    },
}

/// Inbound events from an established voice connection, delivered in order
/// on a single channel so the session loop observes invalidation at the
/// right point in the frame stream.
#[derive(Debug)]
pub enum VoiceInbound {
    Frame(TaggedFrame),
    Invalidated(RejectionCode),
    Closed,
}

/// The voice transport collaborator. The wire protocol lives behind this
/// trait; the session layer only drives handshakes and consumes frames.
#[async_trait]
pub trait VoiceTransport: Send {
    /// Run one handshake attempt against the room's voice server
    async fn connect(&mut self, room: &str) -> Result<ConnectOutcome>;

    /// Acknowledge readiness to receive audio after a successful handshake
    async fn send_audio_ready_ack(&mut self) -> Result<()>;

    /// Take the inbound event stream for the current connection.
    /// Returns None if no connection is established or it was already taken.
    fn take_inbound(&mut self) -> Option<mpsc::Receiver<VoiceInbound>>;

    /// Tear the connection down. `force` requests an explicit remote
    /// session teardown rather than a polite close.
    async fn disconnect(&mut self, force: bool) -> Result<()>;
}
