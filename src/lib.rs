pub mod audio;
pub mod config;
pub mod error;
pub mod executor;
pub mod export;
pub mod interactive;
pub mod model;
pub mod pipeline;
pub mod progress;
pub mod recognize;
pub mod reconcile;
pub mod segment;
pub mod stage;
pub mod synthesize;
pub mod timeline;
pub mod translate;

pub use config::Config;
pub use error::{Result, RevoiceError};
pub use executor::{RunExecutor, RunHandle};
pub use pipeline::{
    print_summary, Collaborators, PipelineFailure, PipelineOrchestrator, PipelineResult,
    PipelineStats, RunOutcome, RunRequest,
};
pub use progress::{CancelFlag, ProgressEvent, RunContext, RunStage};
pub use segment::{AudioClip, Segment};
