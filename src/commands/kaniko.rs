use super::Params;
use crate::utils::error::{Result, ShipError};
use crate::utils::shell::{flag, quote_arg};

pub const DEFAULT_EXECUTOR: &str = "/kaniko/executor";
pub const DEFAULT_CONTEXT: &str = ".";
pub const DEFAULT_DOCKERFILE: &str = "Dockerfile";

/// Kaniko 建置指令
///
/// Required: `image`, `tag`.
pub fn build_command(params: &Params) -> Result<String> {
    let image = params.require("image")?;
    let tag = params.require("tag")?;

    let executor = params.get_or("executor", DEFAULT_EXECUTOR);
    let context = params.get_or("context", DEFAULT_CONTEXT);
    let dockerfile = params.get_or("dockerfile", DEFAULT_DOCKERFILE);
    let cache = params.flag_or("cache", true)?;
    let push_latest = params.flag_or("push_latest", false)?;
    let no_push = params.flag_or("no_push", false)?;

    let mut parts = vec![
        quote_arg(executor),
        flag("context", context),
        flag("dockerfile", dockerfile),
        flag("destination", &format!("{}:{}", image, tag)),
    ];

    if push_latest && tag != "latest" {
        parts.push(flag("destination", &format!("{}:latest", image)));
    }

    for build_arg in params.list("build_args") {
        if !build_arg.contains('=') {
            return Err(ShipError::invalid(
                "build_args",
                build_arg,
                "Build args must be KEY=VALUE",
            ));
        }
        parts.push(flag("build-arg", &build_arg));
    }

    if cache {
        let default_cache_repo = format!("{}/cache", image);
        let cache_repo = params.get("cache_repo").unwrap_or(&default_cache_repo);
        parts.push("--cache=true".to_string());
        parts.push(flag("cache-repo", cache_repo));
    }

    if no_push {
        parts.push("--no-push".to_string());
    }

    Ok(parts.join(" "))
}
