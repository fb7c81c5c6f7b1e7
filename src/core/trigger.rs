use crate::commands::git;
use crate::domain::model::TriggerContext;
use crate::domain::ports::CommandRunner;
use crate::utils::error::{Result, ShipError};
use std::path::Path;

/// 由 webhook / CLI 提供的觸發資訊，缺的部分再用 git 補上
#[derive(Debug, Clone, Default)]
pub struct TriggerOverrides {
    pub branch: Option<String>,
    pub commit: Option<String>,
    pub message: Option<String>,
    pub changed: Option<Vec<String>>,
}

pub async fn discover(
    runner: &dyn CommandRunner,
    workspace: &Path,
    overrides: TriggerOverrides,
) -> Result<TriggerContext> {
    let branch = match non_empty(overrides.branch) {
        Some(branch) => branch,
        None => git_output(runner, workspace, &git::current_branch_command()).await?,
    };
    let branch = branch
        .strip_prefix("origin/")
        .unwrap_or(&branch)
        .to_string();
    if branch.is_empty() || branch == "HEAD" {
        return Err(ShipError::missing("branch"));
    }

    let commit_sha = match non_empty(overrides.commit) {
        Some(sha) => sha,
        None => git_output(runner, workspace, &git::rev_parse_command()).await?,
    };
    if commit_sha.is_empty() {
        return Err(ShipError::missing("commit"));
    }

    let commit_message = match overrides.message {
        Some(message) => message,
        None => git_output(runner, workspace, &git::last_message_command()).await?,
    };

    let changed_paths = match overrides.changed {
        Some(paths) => paths,
        None => {
            let output = runner.run(&git::changed_paths_command(), workspace).await?;
            if output.is_success() {
                output
                    .stdout
                    .lines()
                    .map(str::trim)
                    .filter(|l| !l.is_empty())
                    .map(String::from)
                    .collect()
            } else {
                // 第一個 commit 沒有 HEAD~1
                tracing::warn!("⚠️ Could not list changed paths: {}", output.error_text());
                Vec::new()
            }
        }
    };

    Ok(TriggerContext {
        branch,
        commit_sha,
        commit_message,
        changed_paths,
    })
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

async fn git_output(runner: &dyn CommandRunner, workspace: &Path, command: &str) -> Result<String> {
    let output = runner.run(command, workspace).await?;
    if !output.is_success() {
        return Err(ShipError::CommandFailed {
            stage: "trigger".to_string(),
            command: command.to_string(),
            exit_code: output.exit_code,
            stderr: output.error_text(),
        });
    }
    Ok(output.stdout.trim().to_string())
}
