use crate::utils::error::{Result, ShipError};
use url::Url;

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

/// 驗證 git 遠端位址，接受 https/http/ssh/git/file 與 scp 形式 (git@host:org/repo.git)
pub fn validate_repo_url(field_name: &str, url_str: &str) -> Result<()> {
    if url_str.is_empty() {
        return Err(ShipError::invalid(field_name, url_str, "URL cannot be empty"));
    }

    if is_scp_like(url_str) {
        return Ok(());
    }

    match Url::parse(url_str) {
        Ok(url) => match url.scheme() {
            "http" | "https" | "ssh" | "git" | "file" => Ok(()),
            scheme => Err(ShipError::invalid(
                field_name,
                url_str,
                format!("Unsupported URL scheme: {}", scheme),
            )),
        },
        Err(e) => Err(ShipError::invalid(
            field_name,
            url_str,
            format!("Invalid URL format: {}", e),
        )),
    }
}

fn is_scp_like(url_str: &str) -> bool {
    match url_str.split_once(':') {
        Some((host, path)) => {
            !host.is_empty()
                && !host.contains('/')
                && host.contains('@')
                && !path.is_empty()
                && !path.starts_with("//")
        }
        None => false,
    }
}

pub fn validate_path(field_name: &str, path: &str) -> Result<()> {
    if path.is_empty() {
        return Err(ShipError::invalid(field_name, path, "Path cannot be empty"));
    }

    if path.contains('\0') {
        return Err(ShipError::invalid(field_name, path, "Path contains null bytes"));
    }

    Ok(())
}

pub fn validate_positive_number(field_name: &str, value: u64, min_value: u64) -> Result<()> {
    if value < min_value {
        return Err(ShipError::invalid(
            field_name,
            value.to_string(),
            format!("Value must be at least {}", min_value),
        ));
    }
    Ok(())
}

pub fn validate_max_number(field_name: &str, value: u64, max_value: u64) -> Result<()> {
    if value > max_value {
        return Err(ShipError::invalid(
            field_name,
            value.to_string(),
            format!("Value must be at most {}", max_value),
        ));
    }
    Ok(())
}

pub fn validate_non_empty_string(field_name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(ShipError::invalid(
            field_name,
            value,
            "Value cannot be empty or whitespace-only",
        ));
    }
    Ok(())
}

/// 未被環境變數替換的 ${VAR} 佔位符視為設定錯誤
pub fn validate_resolved(field_name: &str, value: &str) -> Result<()> {
    if let Some(start) = value.find("${") {
        let rest = &value[start..];
        let placeholder = rest.split('}').next().unwrap_or(rest);
        return Err(ShipError::ConfigValidationError {
            field: field_name.to_string(),
            message: format!("unresolved environment placeholder {}}}", placeholder),
        });
    }
    Ok(())
}

pub fn parse_bool(field_name: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(ShipError::invalid(
            field_name,
            value,
            "Expected a boolean (true/false, yes/no, 1/0)",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_repo_url() {
        assert!(validate_repo_url("gitops.repo", "https://github.com/acme/deploy.git").is_ok());
        assert!(validate_repo_url("gitops.repo", "ssh://git@github.com/acme/deploy.git").is_ok());
        assert!(validate_repo_url("gitops.repo", "git@github.com:acme/deploy.git").is_ok());
        assert!(validate_repo_url("gitops.repo", "").is_err());
        assert!(validate_repo_url("gitops.repo", "not a url").is_err());
        assert!(validate_repo_url("gitops.repo", "ftp://example.com/repo").is_err());
    }

    #[test]
    fn test_validate_positive_number() {
        assert!(validate_positive_number("pipeline.timeout_minutes", 30, 1).is_ok());
        assert!(validate_positive_number("pipeline.timeout_minutes", 0, 1).is_err());
        assert!(validate_max_number("pipeline.timeout_minutes", 1440, 1440).is_ok());
        assert!(validate_max_number("pipeline.timeout_minutes", u64::MAX, 1440).is_err());
    }

    #[test]
    fn test_validate_resolved() {
        assert!(validate_resolved("registry.url", "registry.example.com").is_ok());
        let err = validate_resolved("registry.url", "${REGISTRY}/apps").unwrap_err();
        assert!(err.to_string().contains("${REGISTRY}"));
    }

    #[test]
    fn test_parse_bool() {
        assert!(parse_bool("cache", "TRUE").unwrap());
        assert!(parse_bool("cache", "yes").unwrap());
        assert!(!parse_bool("cache", "0").unwrap());
        assert!(parse_bool("cache", "maybe").is_err());
    }
}
