pub mod adapters;
pub mod app;
pub mod commands;
pub mod config;
pub mod core;
pub mod domain;
pub mod gitops;
pub mod utils;

pub use adapters::{RecordingRunner, ShellRunner};
pub use app::standard_pipeline;
pub use config::{toml_config::PipelineFile, CliConfig};
pub use self::core::{PipelineContext, PipelineEngine};
pub use utils::error::{Result, ShipError};
