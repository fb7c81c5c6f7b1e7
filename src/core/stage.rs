use crate::core::context::PipelineContext;
use crate::utils::error::Result;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageOutcome {
    Completed {
        commands: Vec<String>,
        note: Option<String>,
    },
    /// 結束整個流水線，不視為失敗 (例如 skip ci)
    StopRun { reason: String },
}

impl StageOutcome {
    pub fn completed(commands: Vec<String>) -> Self {
        StageOutcome::Completed {
            commands,
            note: None,
        }
    }
}

/// 流水線中的單一階段
#[async_trait::async_trait]
pub trait Stage: Send + Sync {
    fn name(&self) -> &str;

    /// `Some(reason)` 表示此階段在目前上下文中不執行
    fn skip_reason(&self, _context: &PipelineContext) -> Option<String> {
        None
    }

    async fn execute(&self, context: &mut PipelineContext) -> Result<StageOutcome>;
}
