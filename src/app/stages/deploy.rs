use super::environment_gate;
use crate::commands::{kustomize, Params};
use crate::config::toml_config::{DEFAULT_COMMIT_MESSAGE, DEFAULT_GITOPS_CHECKOUT};
use crate::core::{PipelineContext, Result, Stage, StageOutcome};
use crate::gitops::{render_commit_message, update_image_tags, TagUpdateOutcome, TagUpdateRequest};
use crate::utils::error::ShipError;

/// 更新 GitOps 清單中的映像 tag，提交並視設定推送
pub struct DeployStage;

impl DeployStage {
    fn build_request(&self, context: &PipelineContext) -> Result<TagUpdateRequest> {
        let environment = context
            .environment
            .as_ref()
            .ok_or_else(|| ShipError::missing("environment"))?;
        let gitops = &context.config.gitops;

        let workdir = match (&gitops.workdir, &gitops.repo) {
            (Some(dir), _) => context.workspace.join(dir),
            (None, Some(_)) => context.workspace.join(DEFAULT_GITOPS_CHECKOUT),
            (None, None) => context.workspace.clone(),
        };
        let manifest = gitops.manifest.replace("{env}", &environment.name);

        let template = gitops.commit_message.as_deref().unwrap_or(DEFAULT_COMMIT_MESSAGE);
        let mut git = Params::new()
            .with("message", render_commit_message(template, &environment.name, &context.images))
            .with("branch", gitops.branch.clone().unwrap_or_else(|| "main".to_string()));
        if let Some(remote) = &gitops.remote {
            git.set("remote", remote.clone());
        }
        if let Some(name) = &gitops.author_name {
            git.set("author_name", name.clone());
        }
        if let Some(email) = &gitops.author_email {
            git.set("author_email", email.clone());
        }

        // overlay 存在時，同步更新 kustomization.yaml
        let mut pre_commit = Vec::new();
        let mut extra_paths = Vec::new();
        if let Some(overlay) = &environment.overlay {
            for service in &context.config.services {
                let Some(image) = context.images.get(&service.name) else {
                    continue;
                };
                let params = Params::new()
                    .with("overlay_dir", overlay.clone())
                    .with("image_name", service.image.clone().unwrap_or_else(|| service.name.clone()))
                    .with("new_image", image.to_string());
                pre_commit.push(kustomize::set_image_command(&params)?);
            }
            extra_paths.push(overlay.clone());
        }

        Ok(TagUpdateRequest {
            workdir,
            manifest,
            images: context.images.clone(),
            pre_commit,
            extra_paths,
            git,
            repo: gitops.repo.clone(),
            push: gitops.push.unwrap_or(true),
            dry_run: context.dry_run,
        })
    }
}

#[async_trait::async_trait]
impl Stage for DeployStage {
    fn name(&self) -> &str {
        "deploy"
    }

    fn skip_reason(&self, context: &PipelineContext) -> Option<String> {
        environment_gate(context)
    }

    async fn execute(&self, context: &mut PipelineContext) -> Result<StageOutcome> {
        if context.images.is_empty() {
            return Ok(StageOutcome::Completed {
                commands: Vec::new(),
                note: Some("no images were built".to_string()),
            });
        }

        let request = self.build_request(context)?;
        match update_image_tags(context.runner.as_ref(), &request).await? {
            TagUpdateOutcome::NoChanges => Ok(StageOutcome::Completed {
                commands: Vec::new(),
                note: Some("image tags unchanged, nothing committed".to_string()),
            }),
            TagUpdateOutcome::Committed {
                changed,
                pushed,
                commands,
            } => Ok(StageOutcome::Completed {
                commands,
                note: Some(format!(
                    "updated {} ({})",
                    changed.join(", "),
                    if pushed { "pushed" } else { "not pushed" }
                )),
            }),
        }
    }
}
