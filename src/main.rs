use clap::Parser;
use kube_ship::core::trigger::{self, TriggerOverrides};
use kube_ship::domain::ports::CommandRunner;
use kube_ship::utils::error::{ErrorSeverity, ShipError};
use kube_ship::utils::{logger, validation::Validate};
use kube_ship::{standard_pipeline, CliConfig, PipelineContext, PipelineFile, RecordingRunner, ShellRunner};
use std::path::PathBuf;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = CliConfig::parse();

    // 初始化日誌
    if cli.log_json {
        logger::init_json_logger(cli.verbose);
    } else {
        logger::init_cli_logger(cli.verbose);
    }

    tracing::info!("Starting kube-ship");
    tracing::debug!("CLI config: {:?}", cli);

    if let Err(e) = cli.validate() {
        exit_with(&e);
    }

    // 載入並驗證流水線設定
    let config = match PipelineFile::from_file(&cli.config).and_then(|c| c.validate().map(|_| c)) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("❌ Configuration from '{}' rejected: {}", cli.config, e);
            exit_with(&e);
        }
    };

    let workspace = PathBuf::from(&cli.workspace);

    // 觸發資訊的 git 查詢是唯讀的，dry-run 也照常執行
    let overrides = TriggerOverrides {
        branch: cli.branch.clone(),
        commit: cli.commit.clone(),
        message: cli.message.clone(),
        changed: cli.changed.clone(),
    };
    let trigger = match trigger::discover(&ShellRunner::new(), &workspace, overrides).await {
        Ok(trigger) => trigger,
        Err(e) => exit_with(&e),
    };

    let runner: Arc<dyn CommandRunner> = if cli.dry_run {
        tracing::info!("🔸 Dry run: commands are printed, not executed");
        Arc::new(RecordingRunner::new())
    } else {
        Arc::new(ShellRunner::new())
    };

    let mut context = PipelineContext::new(Arc::new(config), trigger, workspace, runner)
        .with_dry_run(cli.dry_run);
    let engine = standard_pipeline(&context.config).with_monitoring(cli.monitor);
    tracing::debug!("Pipeline timeout: {:?}", engine.timeout());

    let result = engine.run(&mut context).await;

    if let Some(path) = &cli.report {
        let json = serde_json::to_string_pretty(&result.report)?;
        std::fs::write(path, json)?;
        tracing::info!("📁 Run report saved to: {}", path);
    }

    match result.error {
        None => {
            println!(
                "✅ Pipeline {} finished: {:?}",
                context.execution_id, result.report.status
            );
            Ok(())
        }
        Some(e) => exit_with(&e),
    }
}

fn exit_with(e: &ShipError) -> ! {
    tracing::error!(
        "❌ Pipeline failed: {} (Category: {:?}, Severity: {:?})",
        e,
        e.category(),
        e.severity()
    );
    tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 建議: {}", e.recovery_suggestion());

    // 根據錯誤嚴重程度決定退出碼
    let exit_code = match e.severity() {
        ErrorSeverity::Low => 1,
        ErrorSeverity::Medium => 2,
        ErrorSeverity::High => 1,
        ErrorSeverity::Critical => 3,
    };
    std::process::exit(exit_code);
}
