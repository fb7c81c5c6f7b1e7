use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// 映像位址 registry/name:tag
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRef {
    pub repository: String,
    pub tag: String,
}

impl ImageRef {
    pub fn new(repository: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            repository: repository.into(),
            tag: tag.into(),
        }
    }

    /// Splits on the last `:` after the last `/`, so registry ports survive.
    /// A reference without a tag parses as `latest`.
    pub fn parse(reference: &str) -> Option<Self> {
        let reference = reference.trim();
        if reference.is_empty() {
            return None;
        }

        let name_start = reference.rfind('/').map(|i| i + 1).unwrap_or(0);
        match reference[name_start..].rfind(':') {
            Some(offset) => {
                let split = name_start + offset;
                let (repository, tag) = (&reference[..split], &reference[split + 1..]);
                if repository.is_empty() || tag.is_empty() {
                    return None;
                }
                Some(Self::new(repository, tag))
            }
            None => Some(Self::new(reference, "latest")),
        }
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.repository, self.tag)
    }
}

/// 觸發此次執行的 git 事件
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TriggerContext {
    pub branch: String,
    pub commit_sha: String,
    pub commit_message: String,
    pub changed_paths: Vec<String>,
}

impl TriggerContext {
    pub fn short_sha(&self, length: usize) -> &str {
        let end = self
            .commit_sha
            .char_indices()
            .nth(length)
            .map(|(i, _)| i)
            .unwrap_or(self.commit_sha.len());
        &self.commit_sha[..end]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environment {
    pub name: String,
    pub branch: String,
    pub overlay: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Succeeded,
    Skipped,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageResult {
    pub stage: String,
    pub status: StageStatus,
    #[serde(with = "duration_ms")]
    pub duration: Duration,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub commands: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl StageResult {
    pub fn skipped(stage: &str, reason: impl Into<String>) -> Self {
        Self {
            stage: stage.to_string(),
            status: StageStatus::Skipped,
            duration: Duration::ZERO,
            commands: Vec::new(),
            note: Some(reason.into()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Succeeded,
    Skipped,
    Failed,
}

/// 整體執行報告，可寫成 JSON 供 CI 保存
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub pipeline: String,
    pub trigger: TriggerContext,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,
    pub status: RunStatus,
    pub stages: Vec<StageResult>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RunReport {
    pub fn stage(&self, name: &str) -> Option<&StageResult> {
        self.stages.iter().find(|s| s.stage == name)
    }

    pub fn executed_stages(&self) -> Vec<&str> {
        self.stages
            .iter()
            .filter(|s| s.status != StageStatus::Skipped)
            .map(|s| s.stage.as_str())
            .collect()
    }
}

/// 外部工具的執行結果
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            exit_code: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// stderr first, stdout as fallback
    pub fn error_text(&self) -> String {
        if !self.stderr.trim().is_empty() {
            self.stderr.trim().to_string()
        } else {
            self.stdout.trim().to_string()
        }
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}
