use crate::domain::model::CommandOutput;
use crate::utils::error::Result;
use async_trait::async_trait;
use std::path::Path;

/// 執行 shell 指令的抽象，真實環境用 sh -c，測試與 dry-run 用記錄器
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, command: &str, workdir: &Path) -> Result<CommandOutput>;
}
