use super::environment_gate;
use crate::commands::kaniko;
use crate::core::context::exec_in;
use crate::core::{ImageRef, PipelineContext, Result, Stage, StageOutcome};
use crate::utils::error::ShipError;
use std::collections::BTreeMap;
use tokio::task::JoinSet;

/// 每個服務一個 Kaniko 建置，同時執行，全部結束後才進入下一階段
pub struct BuildStage;

#[async_trait::async_trait]
impl Stage for BuildStage {
    fn name(&self) -> &str {
        "build"
    }

    fn skip_reason(&self, context: &PipelineContext) -> Option<String> {
        environment_gate(context)
    }

    async fn execute(&self, context: &mut PipelineContext) -> Result<StageOutcome> {
        let tag = context.image_tag();

        // 先把所有指令組好，參數錯誤時不啟動任何建置
        let mut planned = Vec::new();
        for service in &context.config.services {
            let command = kaniko::build_command(&context.config.kaniko_params(service, &tag))?;
            let image = ImageRef::new(context.config.image_repository(service), tag.clone());
            planned.push((service.name.clone(), image, command));
        }

        let mut tasks = JoinSet::new();
        for (service, image, command) in planned.iter().cloned() {
            let runner = context.runner.clone();
            let workspace = context.workspace.clone();
            tasks.spawn(async move {
                tracing::info!("🔨 Building {} -> {}", service, image);
                let stage = format!("build:{}", service);
                let result = exec_in(runner.as_ref(), &stage, &command, &workspace).await;
                (service, image, result)
            });
        }

        let mut built = BTreeMap::new();
        let mut failures = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((service, image, Ok(_))) => {
                    tracing::info!("📦 Built {}", image);
                    built.insert(service, image);
                }
                Ok((service, _, Err(e))) => {
                    tracing::error!("❌ Build failed for {}: {}", service, e);
                    failures.push((service, e));
                }
                Err(join_error) => {
                    failures.push((
                        "<task>".to_string(),
                        ShipError::StageFailed {
                            stage: self.name().to_string(),
                            details: join_error.to_string(),
                        },
                    ));
                }
            }
        }

        if !failures.is_empty() {
            failures.sort_by(|a, b| a.0.cmp(&b.0));
            if failures.len() == 1 {
                return Err(failures.remove(0).1);
            }
            let details = failures
                .iter()
                .map(|(service, e)| format!("{}: {}", service, e))
                .collect::<Vec<_>>()
                .join("; ");
            return Err(ShipError::StageFailed {
                stage: self.name().to_string(),
                details,
            });
        }

        context.images = built;
        Ok(StageOutcome::completed(
            planned.into_iter().map(|(_, _, command)| command).collect(),
        ))
    }
}
