use crate::core::skip::skip_reason;
use crate::core::{PipelineContext, Result, Stage, StageOutcome};

pub struct SkipCheckStage;

#[async_trait::async_trait]
impl Stage for SkipCheckStage {
    fn name(&self) -> &str {
        "skip-check"
    }

    async fn execute(&self, context: &mut PipelineContext) -> Result<StageOutcome> {
        let config = &context.config;
        let reason = skip_reason(
            &context.trigger.commit_message,
            &context.trigger.changed_paths,
            &config.skip_markers(),
            &config.ignore_paths(),
        );

        Ok(match reason {
            Some(reason) => StageOutcome::StopRun { reason },
            None => StageOutcome::completed(Vec::new()),
        })
    }
}
