pub mod registry;
pub mod session;
pub mod stats;

pub use registry::{SessionRegistry, StartedSession, TransportFactory};
pub use session::{SessionActor, SessionCommand};
pub use stats::{SessionState, SessionStatus};
