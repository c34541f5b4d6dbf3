pub mod chunking;
pub mod coordinator;
pub mod report;

pub use chunking::split_chunks;
pub use coordinator::{PipelineCoordinator, PipelineJob, PipelineSettings};
pub use report::{PipelineOutcome, PipelineReport, StageOutcome, StageState};
