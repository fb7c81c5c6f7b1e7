use super::Params;
use crate::utils::error::{Result, ShipError};
use crate::utils::shell::quote_arg;

pub const DEFAULT_SEVERITY: &str = "CRITICAL";
pub const DEFAULT_EXIT_CODE: &str = "1";
pub const DEFAULT_FORMAT: &str = "table";
pub const DEFAULT_TIMEOUT: &str = "5m";

const SEVERITIES: [&str; 5] = ["UNKNOWN", "LOW", "MEDIUM", "HIGH", "CRITICAL"];
const FORMATS: [&str; 5] = ["table", "json", "sarif", "template", "cyclonedx"];

/// Trivy 映像掃描指令。`exit_code` 非零時，符合嚴重度的漏洞會讓指令失敗
///
/// Required: `image`.
pub fn scan_command(params: &Params) -> Result<String> {
    let image = params.require("image")?;

    let severity = params.get_or("severity", DEFAULT_SEVERITY).to_ascii_uppercase();
    for level in severity.split(',') {
        if !SEVERITIES.contains(&level.trim()) {
            return Err(ShipError::invalid(
                "severity",
                severity.clone(),
                format!("Valid severities: {}", SEVERITIES.join(", ")),
            ));
        }
    }

    let exit_code = params.get_or("exit_code", DEFAULT_EXIT_CODE);
    if exit_code.parse::<u8>().is_err() {
        return Err(ShipError::invalid(
            "exit_code",
            exit_code,
            "Exit code must be an integer between 0 and 255",
        ));
    }

    let format = params.get_or("format", DEFAULT_FORMAT);
    if !FORMATS.contains(&format) {
        return Err(ShipError::invalid(
            "format",
            format,
            format!("Valid formats: {}", FORMATS.join(", ")),
        ));
    }

    let ignore_unfixed = params.flag_or("ignore_unfixed", true)?;
    let timeout = params.get_or("timeout", DEFAULT_TIMEOUT);

    let mut parts = vec![
        "trivy image".to_string(),
        format!("--severity {}", quote_arg(&severity)),
        format!("--exit-code {}", exit_code),
        "--no-progress".to_string(),
    ];
    if ignore_unfixed {
        parts.push("--ignore-unfixed".to_string());
    }
    parts.push(format!("--timeout {}", quote_arg(timeout)));
    parts.push(format!("--format {}", format));
    if let Some(output) = params.get("output") {
        parts.push(format!("--output {}", quote_arg(output)));
    }
    parts.push(quote_arg(image));

    Ok(parts.join(" "))
}
