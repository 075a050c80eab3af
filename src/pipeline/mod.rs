//! Pattern-to-product pipeline.

pub mod coordinator;
pub mod messages;

pub use coordinator::{
    Collaborators, OrchestratorSettings, PipelineOrchestrator, RUN_FOLDER_FORMAT, Storage,
    TextRenderer,
};
pub use messages::{FailureStage, PatternFailure, QueueRequest, QueueRun, RunReport, RunRequest};
