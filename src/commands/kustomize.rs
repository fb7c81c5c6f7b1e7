use super::Params;
use crate::utils::error::Result;
use crate::utils::shell::quote_arg;

pub const DEFAULT_BINARY: &str = "kustomize";

/// Required: `overlay_dir`, `image_name`, `new_image`.
pub fn set_image_command(params: &Params) -> Result<String> {
    let overlay_dir = params.require("overlay_dir")?;
    let image_name = params.require("image_name")?;
    let new_image = params.require("new_image")?;

    let binary = params.get_or("binary", DEFAULT_BINARY);
    let target = match params.get("new_tag") {
        Some(tag) => format!("{}={}:{}", image_name, new_image, tag),
        None => format!("{}={}", image_name, new_image),
    };

    Ok(format!(
        "cd {} && {} edit set image {}",
        quote_arg(overlay_dir),
        quote_arg(binary),
        quote_arg(&target)
    ))
}
