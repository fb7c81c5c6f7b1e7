use crate::config::toml_config::PipelineFile;
use crate::domain::model::{CommandOutput, Environment, ImageRef, TriggerContext};
use crate::domain::ports::CommandRunner;
use crate::utils::error::{Result, ShipError};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// 流水線執行上下文，在各 stage 之間傳遞
#[derive(Clone)]
pub struct PipelineContext {
    pub execution_id: String,
    pub config: Arc<PipelineFile>,
    pub trigger: TriggerContext,
    pub environment: Option<Environment>,
    pub workspace: PathBuf,
    pub runner: Arc<dyn CommandRunner>,
    pub dry_run: bool,
    /// build stage 產出的映像，依服務名稱
    pub images: BTreeMap<String, ImageRef>,
}

impl PipelineContext {
    pub fn new(
        config: Arc<PipelineFile>,
        trigger: TriggerContext,
        workspace: PathBuf,
        runner: Arc<dyn CommandRunner>,
    ) -> Self {
        let environment = config.environment_for_branch(&trigger.branch);
        let execution_id = format!(
            "{}-{}-{}",
            config.pipeline.name,
            chrono::Utc::now().format("%Y%m%d%H%M%S"),
            trigger.short_sha(config.image_tag_length())
        );

        Self {
            execution_id,
            config,
            trigger,
            environment,
            workspace,
            runner,
            dry_run: false,
            images: BTreeMap::new(),
        }
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// 映像 tag 取 commit sha 前幾碼
    pub fn image_tag(&self) -> String {
        self.trigger
            .short_sha(self.config.image_tag_length())
            .to_string()
    }

    pub async fn exec(&self, stage: &str, command: &str) -> Result<CommandOutput> {
        exec_in(self.runner.as_ref(), stage, command, &self.workspace).await
    }
}

/// Runs a command and turns a nonzero exit into `CommandFailed`.
pub async fn exec_in(
    runner: &dyn CommandRunner,
    stage: &str,
    command: &str,
    workdir: &Path,
) -> Result<CommandOutput> {
    let output = runner.run(command, workdir).await?;
    if !output.is_success() {
        tracing::error!("❌ [{}] {} exited with {:?}", stage, command, output.exit_code);
        return Err(ShipError::CommandFailed {
            stage: stage.to_string(),
            command: command.to_string(),
            exit_code: output.exit_code,
            stderr: output.error_text(),
        });
    }
    Ok(output)
}
