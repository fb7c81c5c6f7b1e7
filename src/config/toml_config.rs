use crate::commands::Params;
use crate::domain::model::Environment;
use crate::utils::error::{Result, ShipError};
use crate::utils::validation::{
    validate_max_number, validate_non_empty_string, validate_path, validate_positive_number,
    validate_repo_url, validate_resolved, Validate,
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::OnceLock;

pub const DEFAULT_TIMEOUT_MINUTES: u64 = 30;
pub const MAX_TIMEOUT_MINUTES: u64 = 24 * 60;
/// 設定 gitops.repo 但未指定 workdir 時的 clone 目錄
pub const DEFAULT_GITOPS_CHECKOUT: &str = "gitops";
pub const DEFAULT_TAG_LENGTH: usize = 7;
pub const DEFAULT_COMMIT_MESSAGE: &str = "ci: update {env} images to {tag} [skip ci]";
pub const DEFAULT_SKIP_MARKERS: [&str; 4] = ["[skip ci]", "[ci skip]", "[no ci]", "[skip pipeline]"];
pub const DEFAULT_IGNORE_PATHS: [&str; 3] = ["*.md", "docs/**", "terraform/**"];

/// 工具參數表：值可以是字串、布林、數字或字串陣列
pub type ParamTable = BTreeMap<String, toml::Value>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineFile {
    pub pipeline: PipelineSection,
    pub registry: RegistryConfig,
    pub services: Vec<ServiceConfig>,
    pub test: Option<TestConfig>,
    pub scan: Option<ParamTable>,
    pub skip: Option<SkipConfig>,
    pub environments: Option<Vec<EnvironmentConfig>>,
    pub gitops: GitOpsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSection {
    pub name: String,
    pub description: Option<String>,
    pub timeout_minutes: Option<u64>,
    pub image_tag_length: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// e.g. `registry.example.com/shop`
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    pub image: Option<String>,
    pub context: Option<String>,
    pub dockerfile: Option<String>,
    /// 額外的 Kaniko 參數，覆蓋預設值
    pub kaniko: Option<ParamTable>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestConfig {
    pub enabled: Option<bool>,
    #[serde(flatten)]
    pub params: ParamTable,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SkipConfig {
    pub markers: Option<Vec<String>>,
    pub ignore_paths: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvironmentConfig {
    pub branch: String,
    pub name: String,
    pub overlay: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitOpsConfig {
    /// 設定時由部署階段 clone 或同步
    pub repo: Option<String>,
    /// GitOps 倉庫在 workspace 中的路徑
    pub workdir: Option<String>,
    /// 支援 {env} 佔位符
    pub manifest: String,
    pub branch: Option<String>,
    pub remote: Option<String>,
    pub push: Option<bool>,
    pub commit_message: Option<String>,
    pub author_name: Option<String>,
    pub author_email: Option<String>,
}

impl PipelineFile {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(ShipError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = substitute_env_vars(content);

        toml::from_str(&processed_content).map_err(|e| ShipError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    pub fn timeout_minutes(&self) -> u64 {
        self.pipeline.timeout_minutes.unwrap_or(DEFAULT_TIMEOUT_MINUTES)
    }

    pub fn image_tag_length(&self) -> usize {
        self.pipeline.image_tag_length.unwrap_or(DEFAULT_TAG_LENGTH)
    }

    pub fn test_enabled(&self) -> bool {
        self.test
            .as_ref()
            .map(|t| t.enabled.unwrap_or(true))
            .unwrap_or(false)
    }

    pub fn test_params(&self) -> Params {
        self.test
            .as_ref()
            .map(|t| to_params(&t.params))
            .unwrap_or_default()
    }

    pub fn scan_params(&self) -> Params {
        self.scan.as_ref().map(to_params).unwrap_or_default()
    }

    pub fn skip_markers(&self) -> Vec<String> {
        self.skip
            .as_ref()
            .and_then(|s| s.markers.clone())
            .unwrap_or_else(|| DEFAULT_SKIP_MARKERS.iter().map(|m| m.to_string()).collect())
    }

    pub fn ignore_paths(&self) -> Vec<String> {
        self.skip
            .as_ref()
            .and_then(|s| s.ignore_paths.clone())
            .unwrap_or_else(|| DEFAULT_IGNORE_PATHS.iter().map(|p| p.to_string()).collect())
    }

    /// 未設定時使用 main -> production, develop -> staging
    pub fn environments(&self) -> Vec<Environment> {
        match &self.environments {
            Some(envs) => envs
                .iter()
                .map(|e| Environment {
                    name: e.name.clone(),
                    branch: e.branch.clone(),
                    overlay: e.overlay.clone(),
                })
                .collect(),
            None => vec![
                Environment {
                    name: "production".to_string(),
                    branch: "main".to_string(),
                    overlay: None,
                },
                Environment {
                    name: "staging".to_string(),
                    branch: "develop".to_string(),
                    overlay: None,
                },
            ],
        }
    }

    pub fn environment_for_branch(&self, branch: &str) -> Option<Environment> {
        let branch = branch.strip_prefix("origin/").unwrap_or(branch);
        self.environments().into_iter().find(|e| e.branch == branch)
    }

    /// Full repository for a service image, `<registry>/<image or name>`.
    pub fn image_repository(&self, service: &ServiceConfig) -> String {
        let image = service.image.as_deref().unwrap_or(&service.name);
        format!("{}/{}", self.registry.url.trim_end_matches('/'), image)
    }

    /// Kaniko 參數：服務設定的 context/dockerfile 加上額外參數表
    pub fn kaniko_params(&self, service: &ServiceConfig, tag: &str) -> Params {
        let mut base = Params::new()
            .with("image", self.image_repository(service))
            .with("tag", tag);
        if let Some(context) = &service.context {
            base.set("context", context.clone());
        }
        if let Some(dockerfile) = &service.dockerfile {
            base.set("dockerfile", dockerfile.clone());
        }
        match &service.kaniko {
            Some(extra) => base.merged(&to_params(extra)),
            None => base,
        }
    }

    pub fn validate_config(&self) -> Result<()> {
        validate_non_empty_string("pipeline.name", &self.pipeline.name)?;
        validate_positive_number("pipeline.timeout_minutes", self.timeout_minutes(), 1)?;
        validate_max_number("pipeline.timeout_minutes", self.timeout_minutes(), MAX_TIMEOUT_MINUTES)?;
        validate_positive_number("pipeline.image_tag_length", self.image_tag_length() as u64, 4)?;

        validate_non_empty_string("registry.url", &self.registry.url)?;
        validate_resolved("registry.url", &self.registry.url)?;

        if self.services.is_empty() {
            return Err(ShipError::ConfigValidationError {
                field: "services".to_string(),
                message: "At least one service must be configured".to_string(),
            });
        }
        let mut seen = HashSet::new();
        for service in &self.services {
            validate_non_empty_string("services.name", &service.name)?;
            if !seen.insert(service.name.as_str()) {
                return Err(ShipError::invalid(
                    "services.name",
                    service.name.clone(),
                    "Service names must be unique",
                ));
            }
            for (field, value) in [
                ("services.image", &service.image),
                ("services.context", &service.context),
                ("services.dockerfile", &service.dockerfile),
            ] {
                if let Some(value) = value {
                    validate_resolved(field, value)?;
                }
            }
            if let Some(kaniko) = &service.kaniko {
                validate_params_resolved("services.kaniko", &to_params(kaniko))?;
            }
        }

        // 工具參數會原樣進入指令字串
        validate_params_resolved("test", &self.test_params())?;
        validate_params_resolved("scan", &self.scan_params())?;

        let mut branches = HashSet::new();
        for env in self.environments() {
            validate_non_empty_string("environments.branch", &env.branch)?;
            validate_non_empty_string("environments.name", &env.name)?;
            if !branches.insert(env.branch.clone()) {
                return Err(ShipError::invalid(
                    "environments.branch",
                    env.branch,
                    "A branch can map to only one environment",
                ));
            }
            if let Some(overlay) = &env.overlay {
                validate_resolved("environments.overlay", overlay)?;
            }
        }

        validate_path("gitops.manifest", &self.gitops.manifest)?;
        validate_resolved("gitops.manifest", &self.gitops.manifest)?;
        for (field, value) in [
            ("gitops.workdir", &self.gitops.workdir),
            ("gitops.branch", &self.gitops.branch),
            ("gitops.remote", &self.gitops.remote),
        ] {
            if let Some(value) = value {
                validate_resolved(field, value)?;
            }
        }
        if let Some(repo) = &self.gitops.repo {
            validate_resolved("gitops.repo", repo)?;
            validate_repo_url("gitops.repo", repo)?;
        }

        Ok(())
    }
}

impl Validate for PipelineFile {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}

fn validate_params_resolved(section: &str, params: &Params) -> Result<()> {
    for (key, value) in params.iter() {
        validate_resolved(&format!("{}.{}", section, key), value)?;
    }
    Ok(())
}

/// 替換環境變數 (例如 ${REGISTRY_URL})，找不到的變數保留原樣
pub fn substitute_env_vars(content: &str) -> String {
    static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
    let re = PLACEHOLDER.get_or_init(|| {
        Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("placeholder regex is valid")
    });

    re.replace_all(content, |caps: &regex::Captures| {
        let var_name = &caps[1];
        std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
    })
    .into_owned()
}

/// TOML 值轉成指令參數；陣列以逗號連接，表格會被忽略
pub fn to_params(table: &ParamTable) -> Params {
    table
        .iter()
        .filter_map(|(key, value)| {
            let rendered = match value {
                toml::Value::String(s) => s.clone(),
                toml::Value::Integer(i) => i.to_string(),
                toml::Value::Float(f) => f.to_string(),
                toml::Value::Boolean(b) => b.to_string(),
                toml::Value::Array(items) => items
                    .iter()
                    .map(|item| match item {
                        toml::Value::String(s) => s.clone(),
                        other => other.to_string(),
                    })
                    .collect::<Vec<_>>()
                    .join(","),
                _ => return None,
            };
            Some((key.clone(), rendered))
        })
        .collect()
}
