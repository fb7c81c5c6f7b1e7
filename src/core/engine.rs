use crate::core::context::PipelineContext;
use crate::core::stage::{Stage, StageOutcome};
use crate::domain::model::{RunReport, RunStatus, StageResult, StageStatus};
use crate::utils::error::{Result, ShipError};
use crate::utils::monitor::ResourceMonitor;
use chrono::Utc;
use std::time::{Duration, Instant};

/// 一次執行的結果：報告永遠存在，失敗時另附錯誤
pub struct RunResult {
    pub report: RunReport,
    pub error: Option<ShipError>,
}

impl RunResult {
    pub fn into_result(self) -> Result<RunReport> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(self.report),
        }
    }
}

/// 依序執行各 stage，任一失敗即中止 (fail-fast)，整體受單一逾時限制
pub struct PipelineEngine {
    stages: Vec<Box<dyn Stage>>,
    monitor: ResourceMonitor,
    timeout: Duration,
}

impl PipelineEngine {
    pub fn new(timeout: Duration) -> Self {
        Self {
            stages: Vec::new(),
            monitor: ResourceMonitor::default(),
            timeout,
        }
    }

    /// 啟用或禁用資源監控
    pub fn with_monitoring(mut self, enabled: bool) -> Self {
        self.monitor = ResourceMonitor::new(enabled);
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn add_stage(&mut self, stage: Box<dyn Stage>) {
        self.stages.push(stage);
    }

    pub async fn run(&self, context: &mut PipelineContext) -> RunResult {
        let started_at = Utc::now();
        let mut results = Vec::new();

        tracing::info!(
            "🚀 Pipeline {} started (branch: {}, commit: {}, environment: {})",
            context.execution_id,
            context.trigger.branch,
            context.image_tag(),
            context
                .environment
                .as_ref()
                .map(|e| e.name.as_str())
                .unwrap_or("none")
        );

        let outcome = tokio::time::timeout(self.timeout, self.run_stages(context, &mut results)).await;
        let (status, error) = match outcome {
            Ok(Ok(status)) => (status, None),
            Ok(Err(e)) => (RunStatus::Failed, Some(e)),
            Err(_) => {
                tracing::error!("⏰ Pipeline timed out after {:?}", self.timeout);
                (
                    RunStatus::Failed,
                    Some(ShipError::TimeoutError {
                        timeout: self.timeout,
                    }),
                )
            }
        };

        match status {
            RunStatus::Succeeded => tracing::info!("✅ Pipeline {} succeeded", context.execution_id),
            RunStatus::Skipped => tracing::info!("⏭️ Pipeline {} skipped", context.execution_id),
            RunStatus::Failed => tracing::error!("❌ Pipeline {} failed", context.execution_id),
        }

        RunResult {
            report: RunReport {
                pipeline: context.config.pipeline.name.clone(),
                trigger: context.trigger.clone(),
                environment: context.environment.as_ref().map(|e| e.name.clone()),
                status,
                stages: results,
                started_at,
                finished_at: Utc::now(),
                error: error.as_ref().map(|e| e.to_string()),
            },
            error,
        }
    }

    async fn run_stages(
        &self,
        context: &mut PipelineContext,
        results: &mut Vec<StageResult>,
    ) -> Result<RunStatus> {
        for (index, stage) in self.stages.iter().enumerate() {
            if let Some(reason) = stage.skip_reason(context) {
                tracing::info!("⏭️ Skipping stage: {} ({})", stage.name(), reason);
                results.push(StageResult::skipped(stage.name(), reason));
                continue;
            }

            tracing::info!("▶️ Stage: {}", stage.name());
            let start_time = Instant::now();

            match stage.execute(context).await {
                Ok(StageOutcome::Completed { commands, note }) => {
                    let duration = start_time.elapsed();
                    tracing::info!("✅ Stage {} completed in {:?}", stage.name(), duration);
                    results.push(StageResult {
                        stage: stage.name().to_string(),
                        status: StageStatus::Succeeded,
                        duration,
                        commands,
                        note,
                    });
                }
                Ok(StageOutcome::StopRun { reason }) => {
                    tracing::info!("⏭️ Stopping pipeline at {}: {}", stage.name(), reason);
                    results.push(StageResult {
                        stage: stage.name().to_string(),
                        status: StageStatus::Succeeded,
                        duration: start_time.elapsed(),
                        commands: Vec::new(),
                        note: Some(reason.clone()),
                    });
                    for rest in &self.stages[index + 1..] {
                        results.push(StageResult::skipped(rest.name(), "pipeline skipped"));
                    }
                    return Ok(RunStatus::Skipped);
                }
                Err(e) => {
                    tracing::error!("❌ Stage {} failed: {}", stage.name(), e);
                    results.push(StageResult {
                        stage: stage.name().to_string(),
                        status: StageStatus::Failed,
                        duration: start_time.elapsed(),
                        commands: Vec::new(),
                        note: Some(e.to_string()),
                    });
                    return Err(e);
                }
            }

            self.monitor.log_stats(stage.name());
        }

        Ok(RunStatus::Succeeded)
    }
}
