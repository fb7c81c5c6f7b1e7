use super::Params;
use crate::utils::error::Result;
use crate::utils::shell::quote_arg;

pub const DEFAULT_REMOTE: &str = "origin";
pub const DEFAULT_AUTHOR_NAME: &str = "CI Bot";
pub const DEFAULT_AUTHOR_EMAIL: &str = "ci@localhost";

/// Required: `branch`.
pub fn fetch_command(params: &Params) -> Result<String> {
    let branch = params.require("branch")?;
    let remote = params.get_or("remote", DEFAULT_REMOTE);
    Ok(format!("git fetch {} {}", quote_arg(remote), quote_arg(branch)))
}

/// Required: `sha`.
pub fn checkout_command(params: &Params) -> Result<String> {
    let sha = params.require("sha")?;
    Ok(format!("git checkout --force {}", quote_arg(sha)))
}

/// Required: `repo`, `dir`.
pub fn clone_command(params: &Params) -> Result<String> {
    let repo = params.require("repo")?;
    let dir = params.require("dir")?;
    let mut parts = vec!["git clone".to_string()];
    if let Some(branch) = params.get("branch") {
        parts.push(format!("--branch {}", quote_arg(branch)));
    }
    parts.push(format!("-- {} {}", quote_arg(repo), quote_arg(dir)));
    Ok(parts.join(" "))
}

/// `target` defaults to `HEAD`; `hard` also resets the working tree.
pub fn reset_command(params: &Params) -> Result<String> {
    let target = params.get_or("target", "HEAD");
    let hard = params.flag_or("hard", false)?;
    Ok(format!(
        "git reset -q {}{}",
        if hard { "--hard " } else { "" },
        quote_arg(target)
    ))
}

/// Required: `path`. Restores the working tree copy from the index.
pub fn restore_command(params: &Params) -> Result<String> {
    let path = params.require("path")?;
    Ok(format!("git checkout -- {}", quote_arg(path)))
}

/// Required: `path`.
pub fn add_command(params: &Params) -> Result<String> {
    let path = params.require("path")?;
    Ok(format!("git add -- {}", quote_arg(path)))
}

/// Required: `message`.
pub fn commit_command(params: &Params) -> Result<String> {
    let message = params.require("message")?;
    let name = params.get_or("author_name", DEFAULT_AUTHOR_NAME);
    let email = params.get_or("author_email", DEFAULT_AUTHOR_EMAIL);
    Ok(format!(
        "git -c {} -c {} commit -m {}",
        quote_arg(&format!("user.name={}", name)),
        quote_arg(&format!("user.email={}", email)),
        quote_arg(message)
    ))
}

/// Required: `branch`.
pub fn push_command(params: &Params) -> Result<String> {
    let branch = params.require("branch")?;
    let remote = params.get_or("remote", DEFAULT_REMOTE);
    Ok(format!(
        "git push {} {}",
        quote_arg(remote),
        quote_arg(&format!("HEAD:{}", branch))
    ))
}

pub fn rev_parse_command() -> String {
    "git rev-parse HEAD".to_string()
}

pub fn current_branch_command() -> String {
    "git rev-parse --abbrev-ref HEAD".to_string()
}

pub fn last_message_command() -> String {
    "git log -1 --pretty=%B".to_string()
}

pub fn changed_paths_command() -> String {
    "git diff --name-only HEAD~1 HEAD".to_string()
}
