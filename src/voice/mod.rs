pub mod loopback;
pub mod manager;
pub mod transport;

pub use loopback::LoopbackTransport;
pub use manager::{LifecycleEvent, RetryPolicy, VoiceSessionManager, VoiceState};
pub use transport::{
    ConnectOutcome, RejectionClass, RejectionCode, VoiceEndpoint, VoiceInbound, VoiceTransport,
};
