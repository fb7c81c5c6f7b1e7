pub mod context;
pub mod engine;
pub mod skip;
pub mod stage;
pub mod trigger;

pub use crate::domain::model::{ImageRef, RunReport, StageResult, TriggerContext};
pub use crate::domain::ports::CommandRunner;
pub use crate::utils::error::Result;
pub use context::PipelineContext;
pub use engine::{PipelineEngine, RunResult};
pub use stage::{Stage, StageOutcome};
