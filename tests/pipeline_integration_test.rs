use async_trait::async_trait;
use kube_ship::core::stage::{Stage, StageOutcome};
use kube_ship::domain::model::{CommandOutput, RunStatus, StageStatus, TriggerContext};
use kube_ship::domain::ports::CommandRunner;
use kube_ship::{standard_pipeline, PipelineContext, PipelineEngine, PipelineFile, RecordingRunner, ShipError};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

const MANIFEST: &str = "# images promoted by CI\nBACKEND_IMAGE=registry.example.com/shop/backend:old0000\nFRONTEND_IMAGE=registry.example.com/shop/frontend:old0000\n";

fn create_test_config(extra: &str) -> PipelineFile {
    let content = format!(
        r#"
[pipeline]
name = "shop"
timeout_minutes = 5

[registry]
url = "registry.example.com/shop"

[[services]]
name = "backend"
context = "backend"
dockerfile = "backend/Dockerfile"

[[services]]
name = "frontend"
context = "frontend"
dockerfile = "frontend/Dockerfile"

[test]
working_dir = "backend"

[scan]
severity = "CRITICAL"

[gitops]
workdir = "deploy"
manifest = "overlays/{{env}}/images.env"
branch = "main"
push = true
{}
"#,
        extra
    );
    PipelineFile::from_toml_str(&content).unwrap()
}

fn setup_workspace() -> TempDir {
    let temp_dir = TempDir::new().unwrap();
    for env in ["production", "staging"] {
        let dir = temp_dir.path().join("deploy/overlays").join(env);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("images.env"), MANIFEST).unwrap();
    }
    temp_dir
}

fn trigger(branch: &str, message: &str, changed: &[&str]) -> TriggerContext {
    TriggerContext {
        branch: branch.to_string(),
        commit_sha: "abc1234def5678".to_string(),
        commit_message: message.to_string(),
        changed_paths: changed.iter().map(|s| s.to_string()).collect(),
    }
}

fn read_manifest(workspace: &Path, env: &str) -> String {
    std::fs::read_to_string(workspace.join("deploy/overlays").join(env).join("images.env")).unwrap()
}

#[tokio::test]
async fn test_main_branch_runs_all_stages_and_promotes() {
    let workspace = setup_workspace();
    let config = Arc::new(create_test_config(""));
    let runner = Arc::new(RecordingRunner::new());

    let mut context = PipelineContext::new(
        config.clone(),
        trigger("main", "feat: checkout flow", &["backend/main.py"]),
        workspace.path().to_path_buf(),
        runner.clone(),
    );
    let result = standard_pipeline(&config).run(&mut context).await;

    assert!(result.error.is_none(), "{:?}", result.error);
    let report = result.report;
    assert_eq!(report.status, RunStatus::Succeeded);
    assert_eq!(report.environment.as_deref(), Some("production"));
    assert_eq!(
        report.executed_stages(),
        vec!["skip-check", "checkout", "test", "build", "scan", "deploy"]
    );

    let commands = runner.commands();
    assert_eq!(commands[0], "git fetch origin main");
    assert_eq!(commands[1], "git checkout --force abc1234def5678");
    assert!(commands[2].contains("-m pytest tests/"));

    // 兩個建置都在任何掃描之前
    let last_build = commands.iter().rposition(|c| c.starts_with("/kaniko/executor")).unwrap();
    let first_scan = commands.iter().position(|c| c.starts_with("trivy image")).unwrap();
    assert!(last_build < first_scan);
    assert_eq!(commands.iter().filter(|c| c.starts_with("/kaniko/executor")).count(), 2);
    assert!(commands.iter().any(|c| c.contains("--destination=registry.example.com/shop/backend:abc1234")));
    assert!(commands.iter().any(|c| c.ends_with("registry.example.com/shop/frontend:abc1234")));

    assert!(commands.iter().any(|c| c.starts_with("git -c") && c.contains("update production images to abc1234")));
    assert_eq!(commands.last().unwrap(), "git push origin HEAD:main");

    let manifest = read_manifest(workspace.path(), "production");
    assert!(manifest.contains("BACKEND_IMAGE=registry.example.com/shop/backend:abc1234"));
    assert!(manifest.contains("FRONTEND_IMAGE=registry.example.com/shop/frontend:abc1234"));
    assert!(manifest.starts_with("# images promoted by CI\n"));
    assert_eq!(read_manifest(workspace.path(), "staging"), MANIFEST);
}

#[tokio::test]
async fn test_git_commands_run_in_gitops_workdir() {
    let workspace = setup_workspace();
    let config = Arc::new(create_test_config(""));
    let runner = Arc::new(RecordingRunner::new());

    let mut context = PipelineContext::new(
        config.clone(),
        trigger("develop", "fix: totals", &[]),
        workspace.path().to_path_buf(),
        runner.clone(),
    );
    standard_pipeline(&config).run(&mut context).await.into_result().unwrap();

    let recorded = runner.recorded();
    let push = recorded.iter().find(|r| r.command.starts_with("git push")).unwrap();
    assert_eq!(push.workdir, workspace.path().join("deploy"));
    let checkout = recorded.iter().find(|r| r.command.starts_with("git checkout")).unwrap();
    assert_eq!(checkout.workdir, workspace.path());
    assert!(read_manifest(workspace.path(), "staging").contains("backend:abc1234"));
}

#[tokio::test]
async fn test_feature_branch_stops_after_test() {
    let workspace = setup_workspace();
    let config = Arc::new(create_test_config(""));
    let runner = Arc::new(RecordingRunner::new());

    let mut context = PipelineContext::new(
        config.clone(),
        trigger("feature/cart", "wip", &["backend/cart.py"]),
        workspace.path().to_path_buf(),
        runner.clone(),
    );
    let report = standard_pipeline(&config).run(&mut context).await.into_result().unwrap();

    assert_eq!(report.status, RunStatus::Succeeded);
    assert!(report.environment.is_none());
    assert_eq!(report.executed_stages(), vec!["skip-check", "checkout", "test"]);
    for stage in ["build", "scan", "deploy"] {
        assert_eq!(report.stage(stage).unwrap().status, StageStatus::Skipped);
    }
    assert!(!runner.commands().iter().any(|c| c.contains("kaniko") || c.contains("trivy")));
    assert_eq!(read_manifest(workspace.path(), "production"), MANIFEST);
}

#[tokio::test]
async fn test_skip_marker_skips_whole_run() {
    let workspace = setup_workspace();
    let config = Arc::new(create_test_config(""));
    let runner = Arc::new(RecordingRunner::new());

    let mut context = PipelineContext::new(
        config.clone(),
        trigger("main", "ci: update production images [skip ci]", &["deploy/overlays/production/images.env"]),
        workspace.path().to_path_buf(),
        runner.clone(),
    );
    let report = standard_pipeline(&config).run(&mut context).await.into_result().unwrap();

    assert_eq!(report.status, RunStatus::Skipped);
    assert_eq!(report.executed_stages(), vec!["skip-check"]);
    assert!(runner.commands().is_empty());
}

#[tokio::test]
async fn test_docs_only_change_skips_run() {
    let workspace = setup_workspace();
    let config = Arc::new(create_test_config(""));
    let runner = Arc::new(RecordingRunner::new());

    let mut context = PipelineContext::new(
        config.clone(),
        trigger("main", "docs: explain rollout", &["README.md", "docs/rollout.md"]),
        workspace.path().to_path_buf(),
        runner.clone(),
    );
    let report = standard_pipeline(&config).run(&mut context).await.into_result().unwrap();

    assert_eq!(report.status, RunStatus::Skipped);
    assert!(runner.commands().is_empty());
}

#[tokio::test]
async fn test_critical_finding_aborts_before_deploy() {
    let workspace = setup_workspace();
    let config = Arc::new(create_test_config(""));
    let runner = Arc::new(
        RecordingRunner::new().fail_on(
            "table registry.example.com/shop/frontend:abc1234",
            1,
            "Total: 1 (CRITICAL: 1)",
        ),
    );

    let mut context = PipelineContext::new(
        config.clone(),
        trigger("main", "feat: new ui", &["frontend/src/App.tsx"]),
        workspace.path().to_path_buf(),
        runner.clone(),
    );
    let result = standard_pipeline(&config).run(&mut context).await;

    let err = result.error.expect("scan should fail");
    match err {
        ShipError::CommandFailed { stage, exit_code, stderr, .. } => {
            assert_eq!(stage, "scan");
            assert_eq!(exit_code, Some(1));
            assert!(stderr.contains("CRITICAL"));
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(result.report.status, RunStatus::Failed);
    assert_eq!(result.report.stage("scan").unwrap().status, StageStatus::Failed);
    assert!(result.report.stage("deploy").is_none());
    assert!(!runner.commands().iter().any(|c| c.starts_with("git push")));
    assert_eq!(read_manifest(workspace.path(), "production"), MANIFEST);
}

#[tokio::test]
async fn test_build_failure_after_join() {
    let workspace = setup_workspace();
    let config = Arc::new(create_test_config(""));
    let runner = Arc::new(RecordingRunner::new().fail_on("--context=backend", 1, "error building image"));

    let mut context = PipelineContext::new(
        config.clone(),
        trigger("main", "feat: api", &["backend/api.py"]),
        workspace.path().to_path_buf(),
        runner.clone(),
    );
    let result = standard_pipeline(&config).run(&mut context).await;

    assert!(matches!(
        result.error,
        Some(ShipError::CommandFailed { ref stage, .. }) if stage == "build:backend"
    ));
    // 另一個建置仍然被執行完畢
    assert!(runner.commands().iter().any(|c| c.contains("--context=frontend")));
    assert!(!runner.commands().iter().any(|c| c.starts_with("trivy")));
}

#[tokio::test]
async fn test_missing_test_field_fails_fast() {
    let workspace = setup_workspace();
    let content = r#"
[pipeline]
name = "shop"

[registry]
url = "registry.example.com/shop"

[[services]]
name = "backend"

[test]
test_path = "tests/"

[gitops]
manifest = "images.env"
"#;
    let config = Arc::new(PipelineFile::from_toml_str(content).unwrap());
    let runner = Arc::new(RecordingRunner::new());

    let mut context = PipelineContext::new(
        config.clone(),
        trigger("main", "feat", &[]),
        workspace.path().to_path_buf(),
        runner.clone(),
    );
    let result = standard_pipeline(&config).run(&mut context).await;

    let err = result.error.unwrap();
    assert_eq!(err.to_string(), "Missing required configuration field: working_dir");
    assert_eq!(result.report.executed_stages(), vec!["skip-check", "checkout", "test"]);
    assert!(!runner.commands().iter().any(|c| c.contains("kaniko")));
}

#[tokio::test]
async fn test_push_disabled_commits_only() {
    let workspace = setup_workspace();
    let mut config = create_test_config("");
    config.gitops.push = Some(false);
    let config = Arc::new(config);
    let runner = Arc::new(RecordingRunner::new());

    let mut context = PipelineContext::new(
        config.clone(),
        trigger("main", "feat", &[]),
        workspace.path().to_path_buf(),
        runner.clone(),
    );
    let report = standard_pipeline(&config).run(&mut context).await.into_result().unwrap();

    assert!(runner.commands().iter().any(|c| c.starts_with("git -c")));
    assert!(!runner.commands().iter().any(|c| c.starts_with("git push")));
    assert!(report.stage("deploy").unwrap().note.as_deref().unwrap().contains("not pushed"));
}

#[tokio::test]
async fn test_rerun_with_same_sha_has_nothing_to_commit() {
    let workspace = setup_workspace();
    let config = Arc::new(create_test_config(""));

    let first = Arc::new(RecordingRunner::new());
    let mut context = PipelineContext::new(
        config.clone(),
        trigger("main", "feat", &[]),
        workspace.path().to_path_buf(),
        first.clone(),
    );
    standard_pipeline(&config).run(&mut context).await.into_result().unwrap();

    let second = Arc::new(RecordingRunner::new());
    let mut context = PipelineContext::new(
        config.clone(),
        trigger("main", "feat", &[]),
        workspace.path().to_path_buf(),
        second.clone(),
    );
    let report = standard_pipeline(&config).run(&mut context).await.into_result().unwrap();

    assert!(!second.commands().iter().any(|c| c.starts_with("git -c") || c.starts_with("git push")));
    assert!(report.stage("deploy").unwrap().note.as_deref().unwrap().contains("unchanged"));
}

#[tokio::test]
async fn test_dry_run_leaves_manifest_untouched() {
    let workspace = setup_workspace();
    let config = Arc::new(create_test_config(""));
    let runner = Arc::new(RecordingRunner::new());

    let mut context = PipelineContext::new(
        config.clone(),
        trigger("main", "feat", &[]),
        workspace.path().to_path_buf(),
        runner.clone(),
    )
    .with_dry_run(true);
    standard_pipeline(&config).run(&mut context).await.into_result().unwrap();

    assert!(runner.commands().iter().any(|c| c == "git push origin HEAD:main"));
    assert_eq!(read_manifest(workspace.path(), "production"), MANIFEST);
}

#[tokio::test]
async fn test_overlay_runs_kustomize_before_commit() {
    let workspace = setup_workspace();
    let config = Arc::new(create_test_config(
        r#"
[[environments]]
branch = "main"
name = "production"
overlay = "overlays/production"
"#,
    ));
    let runner = Arc::new(RecordingRunner::new());

    let mut context = PipelineContext::new(
        config.clone(),
        trigger("main", "feat", &[]),
        workspace.path().to_path_buf(),
        runner.clone(),
    );
    standard_pipeline(&config).run(&mut context).await.into_result().unwrap();

    let commands = runner.commands();
    let kustomize = commands
        .iter()
        .position(|c| c.contains("kustomize edit set image backend=registry.example.com/shop/backend:abc1234"))
        .unwrap();
    let commit = commands.iter().position(|c| c.starts_with("git -c")).unwrap();
    assert!(kustomize < commit);
    assert!(commands.iter().any(|c| c == "git add -- overlays/production"));
}

/// 記錄同時執行中的建置數量
struct ConcurrencyProbe {
    active: AtomicUsize,
    peak: AtomicUsize,
    delay: Duration,
    seen: Mutex<Vec<String>>,
}

#[async_trait]
impl CommandRunner for ConcurrencyProbe {
    async fn run(&self, command: &str, _workdir: &Path) -> kube_ship::Result<CommandOutput> {
        self.seen.lock().unwrap().push(command.to_string());
        if command.starts_with("/kaniko/executor") {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.active.fetch_sub(1, Ordering::SeqCst);
        } else if command.starts_with("sleep") {
            tokio::time::sleep(self.delay).await;
        }
        Ok(CommandOutput::success(""))
    }
}

#[tokio::test]
async fn test_builds_run_concurrently() {
    let workspace = setup_workspace();
    let config = Arc::new(create_test_config(""));
    let probe = Arc::new(ConcurrencyProbe {
        active: AtomicUsize::new(0),
        peak: AtomicUsize::new(0),
        delay: Duration::from_millis(100),
        seen: Mutex::new(Vec::new()),
    });

    let mut context = PipelineContext::new(
        config.clone(),
        trigger("main", "feat", &[]),
        workspace.path().to_path_buf(),
        probe.clone(),
    );
    standard_pipeline(&config).run(&mut context).await.into_result().unwrap();

    assert_eq!(probe.peak.load(Ordering::SeqCst), 2);
    assert_eq!(context.images.len(), 2);
}

struct SleepStage;

#[async_trait]
impl Stage for SleepStage {
    fn name(&self) -> &str {
        "sleep"
    }

    async fn execute(&self, context: &mut PipelineContext) -> kube_ship::Result<StageOutcome> {
        context.exec(self.name(), "sleep 10").await?;
        Ok(StageOutcome::completed(vec!["sleep 10".to_string()]))
    }
}

#[tokio::test]
async fn test_timeout_fails_run() {
    let workspace = setup_workspace();
    let config = Arc::new(create_test_config(""));
    let probe = Arc::new(ConcurrencyProbe {
        active: AtomicUsize::new(0),
        peak: AtomicUsize::new(0),
        delay: Duration::from_secs(5),
        seen: Mutex::new(Vec::new()),
    });

    let mut engine = PipelineEngine::new(Duration::from_millis(50));
    engine.add_stage(Box::new(SleepStage));

    let mut context = PipelineContext::new(
        config,
        trigger("main", "feat", &[]),
        workspace.path().to_path_buf(),
        probe,
    );
    let result = engine.run(&mut context).await;

    assert!(matches!(result.error, Some(ShipError::TimeoutError { .. })));
    assert_eq!(result.report.status, RunStatus::Failed);
    assert_eq!(
        result.report.error.as_deref(),
        Some("Pipeline exceeded its timeout of 50ms")
    );
}
