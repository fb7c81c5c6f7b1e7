pub mod stages;

use crate::config::toml_config::PipelineFile;
use crate::core::PipelineEngine;
use stages::{BuildStage, CheckoutStage, DeployStage, ScanStage, SkipCheckStage, TestStage};
use std::time::Duration;

/// skip-check -> checkout -> test -> build -> scan -> deploy
pub fn standard_pipeline(config: &PipelineFile) -> PipelineEngine {
    let timeout = Duration::from_secs(config.timeout_minutes().saturating_mul(60));
    let mut engine = PipelineEngine::new(timeout);
    engine.add_stage(Box::new(SkipCheckStage));
    engine.add_stage(Box::new(CheckoutStage));
    engine.add_stage(Box::new(TestStage));
    engine.add_stage(Box::new(BuildStage));
    engine.add_stage(Box::new(ScanStage));
    engine.add_stage(Box::new(DeployStage));
    engine
}
