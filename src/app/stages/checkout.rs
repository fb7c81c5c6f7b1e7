use crate::commands::{git, Params};
use crate::core::{PipelineContext, Result, Stage, StageOutcome};

/// 把 workspace 切到觸發的 commit
pub struct CheckoutStage;

#[async_trait::async_trait]
impl Stage for CheckoutStage {
    fn name(&self) -> &str {
        "checkout"
    }

    async fn execute(&self, context: &mut PipelineContext) -> Result<StageOutcome> {
        let params = Params::new()
            .with("branch", context.trigger.branch.clone())
            .with("sha", context.trigger.commit_sha.clone());

        let commands = vec![git::fetch_command(&params)?, git::checkout_command(&params)?];
        for command in &commands {
            context.exec(self.name(), command).await?;
        }

        Ok(StageOutcome::completed(commands))
    }
}
