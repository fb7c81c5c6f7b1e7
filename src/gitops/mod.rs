//! GitOps image-tag promotion.
//!
//! The manifest in the GitOps checkout is the only deployment state this
//! crate writes. A controller such as ArgoCD reconciles the cluster from it.

pub mod manifest;

use crate::commands::{git, Params};
use crate::core::context::exec_in;
use crate::domain::model::ImageRef;
use crate::domain::ports::CommandRunner;
use crate::utils::error::{Result, ShipError};
use manifest::{image_key, read_manifest, ImageManifest};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

const STAGE: &str = "deploy";

#[derive(Debug, Clone)]
pub struct TagUpdateRequest {
    /// GitOps 倉庫的工作目錄
    pub workdir: PathBuf,
    /// 相對於 workdir
    pub manifest: String,
    pub images: BTreeMap<String, ImageRef>,
    /// 在 git add 之前執行的指令 (例如 kustomize edit)
    pub pre_commit: Vec<String>,
    pub extra_paths: Vec<String>,
    /// message / author_name / author_email / remote / branch
    pub git: Params,
    /// 設定時由此 clone，或在編輯前同步到遠端分支
    pub repo: Option<String>,
    pub push: bool,
    /// 只計算變更，不寫檔
    pub dry_run: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagUpdateOutcome {
    NoChanges,
    Committed {
        changed: Vec<String>,
        pushed: bool,
        commands: Vec<String>,
    },
}

/// Rewrites the image entries, then commits and optionally pushes.
/// Identical tags leave the manifest alone and issue no commit or push.
///
/// When a git step fails, the local commit is undone and the manifest is
/// restored, so a retry in the same checkout still sees the old tags.
pub async fn update_image_tags(
    runner: &dyn CommandRunner,
    request: &TagUpdateRequest,
) -> Result<TagUpdateOutcome> {
    let fresh_clone = match &request.repo {
        Some(repo) => prepare_checkout(runner, request, repo).await?,
        None => false,
    };

    let manifest_path = request.workdir.join(&request.manifest);
    let original = if fresh_clone && request.dry_run && !manifest_path.exists() {
        tracing::info!("🔸 [dry-run] {} not cloned yet, treating as empty", request.manifest);
        String::new()
    } else {
        read_manifest(&manifest_path)?
    };
    let mut manifest = ImageManifest::parse(&original);

    let mut changed = Vec::new();
    for (service, image) in &request.images {
        let key = image_key(service);
        let previous = manifest.get(&key).map(str::to_string);
        if manifest.set(&key, &image.to_string()) {
            tracing::info!(
                "📝 {}: {} -> {}",
                key,
                previous.as_deref().unwrap_or("<absent>"),
                image
            );
            changed.push(service.clone());
        }
    }

    if changed.is_empty() {
        tracing::info!("⏭️ Image tags already up to date in {}, nothing to commit", request.manifest);
        return Ok(TagUpdateOutcome::NoChanges);
    }

    let mut commands = request.pre_commit.clone();
    commands.push(git::add_command(&Params::new().with("path", request.manifest.clone()))?);
    for path in &request.extra_paths {
        commands.push(git::add_command(&Params::new().with("path", path.clone()))?);
    }
    let commit_index = commands.len();
    commands.push(git::commit_command(&request.git)?);
    if request.push {
        commands.push(git::push_command(&request.git)?);
    }

    // 指令全部組好後才寫檔
    if !request.dry_run {
        std::fs::write(&manifest_path, manifest.render()).map_err(|e| ShipError::ManifestError {
            path: manifest_path.display().to_string(),
            message: e.to_string(),
        })?;
    }

    for (index, command) in commands.iter().enumerate() {
        if let Err(e) = exec_in(runner, STAGE, command, &request.workdir).await {
            roll_back(runner, request, &manifest_path, &original, index > commit_index).await;
            return Err(e);
        }
    }

    if request.push {
        tracing::info!("🚀 Pushed image tag update for {}", changed.join(", "));
    } else {
        tracing::info!("📦 Committed image tag update for {} (push disabled)", changed.join(", "));
    }

    Ok(TagUpdateOutcome::Committed {
        changed,
        pushed: request.push,
        commands,
    })
}

/// Clones `repo` into the workdir when it is not a checkout yet, otherwise
/// hard-resets it to the fetched remote branch. Returns `true` after a clone.
async fn prepare_checkout(
    runner: &dyn CommandRunner,
    request: &TagUpdateRequest,
    repo: &str,
) -> Result<bool> {
    if request.workdir.join(".git").exists() {
        let fetch = git::fetch_command(&request.git)?;
        let reset = git::reset_command(
            &Params::new()
                .with("target", "FETCH_HEAD")
                .with("hard", "true"),
        )?;
        for command in [fetch, reset] {
            exec_in(runner, STAGE, &command, &request.workdir).await?;
        }
        return Ok(false);
    }

    let dir = request
        .workdir
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| {
            ShipError::invalid(
                "gitops.workdir",
                request.workdir.display().to_string(),
                "Clone target must end in a directory name",
            )
        })?;
    let parent = request
        .workdir
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    if !request.dry_run {
        std::fs::create_dir_all(parent)?;
    }

    let mut params = Params::new().with("repo", repo).with("dir", dir);
    if let Some(branch) = request.git.get("branch") {
        params.set("branch", branch);
    }
    tracing::info!("📥 Cloning {} into {}", repo, request.workdir.display());
    exec_in(runner, STAGE, &git::clone_command(&params)?, parent).await?;
    Ok(true)
}

/// 失敗後的清理只記錄警告，原本的錯誤才是回報給呼叫者的
async fn roll_back(
    runner: &dyn CommandRunner,
    request: &TagUpdateRequest,
    manifest_path: &Path,
    original: &str,
    committed: bool,
) {
    if request.dry_run {
        return;
    }

    let target = if committed { "HEAD^" } else { "HEAD" };
    let mut commands = vec![git::reset_command(&Params::new().with("target", target))];
    for path in &request.extra_paths {
        commands.push(git::restore_command(&Params::new().with("path", path.clone())));
    }

    for command in commands {
        let outcome = match command {
            Ok(command) => exec_in(runner, STAGE, &command, &request.workdir).await.map(|_| ()),
            Err(e) => Err(e),
        };
        if let Err(e) = outcome {
            tracing::warn!("⚠️ Rollback step failed: {}", e);
        }
    }

    if let Err(e) = std::fs::write(manifest_path, original) {
        tracing::warn!("⚠️ Could not restore {}: {}", manifest_path.display(), e);
    } else {
        tracing::info!("↩️ Restored {} after failed update", manifest_path.display());
    }
}

/// `{services}`, `{tag}` 與 `{env}` 佔位符
pub fn render_commit_message(
    template: &str,
    environment: &str,
    images: &BTreeMap<String, ImageRef>,
) -> String {
    let services = images.keys().cloned().collect::<Vec<_>>().join(", ");
    let mut tags: Vec<&str> = images.values().map(|i| i.tag.as_str()).collect();
    tags.sort_unstable();
    tags.dedup();
    template
        .replace("{services}", &services)
        .replace("{tag}", &tags.join(","))
        .replace("{env}", environment)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_commit_message() {
        let mut images = BTreeMap::new();
        images.insert("backend".to_string(), ImageRef::new("r/backend", "abc1234"));
        images.insert("frontend".to_string(), ImageRef::new("r/frontend", "abc1234"));

        let message = render_commit_message(
            "ci: update {env} images ({services}) to {tag} [skip ci]",
            "production",
            &images,
        );
        assert_eq!(
            message,
            "ci: update production images (backend, frontend) to abc1234 [skip ci]"
        );
    }
}
