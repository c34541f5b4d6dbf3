pub mod frame;
pub mod recorder;
pub mod sink;

pub use frame::TaggedFrame;
pub use recorder::{ArtifactDescriptor, PerUserRecorder};
pub use sink::AudioSink;
