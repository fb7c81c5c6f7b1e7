use super::environment_gate;
use crate::commands::trivy;
use crate::core::{PipelineContext, Result, Stage, StageOutcome};

/// 依序掃描 build 產出的映像；Trivy 的 exit code 讓嚴重漏洞直接中止流水線
pub struct ScanStage;

#[async_trait::async_trait]
impl Stage for ScanStage {
    fn name(&self) -> &str {
        "scan"
    }

    fn skip_reason(&self, context: &PipelineContext) -> Option<String> {
        environment_gate(context)
    }

    async fn execute(&self, context: &mut PipelineContext) -> Result<StageOutcome> {
        let base = context.config.scan_params();

        let mut commands = Vec::new();
        for image in context.images.values() {
            let params = base.clone().with("image", image.to_string());
            commands.push(trivy::scan_command(&params)?);
        }

        for command in &commands {
            context.exec(self.name(), command).await?;
        }

        Ok(StageOutcome::completed(commands))
    }
}
