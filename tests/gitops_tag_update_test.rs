use kube_ship::commands::Params;
use kube_ship::domain::model::ImageRef;
use kube_ship::gitops::{update_image_tags, TagUpdateOutcome, TagUpdateRequest};
use kube_ship::{RecordingRunner, ShipError};
use std::collections::BTreeMap;
use tempfile::TempDir;
use tokio_test::assert_ok;

fn request(dir: &TempDir, images: &[(&str, &str)], push: bool) -> TagUpdateRequest {
    let images: BTreeMap<String, ImageRef> = images
        .iter()
        .map(|(service, image)| (service.to_string(), ImageRef::parse(image).unwrap()))
        .collect();

    TagUpdateRequest {
        workdir: dir.path().to_path_buf(),
        manifest: "images.env".to_string(),
        images,
        pre_commit: Vec::new(),
        extra_paths: Vec::new(),
        git: Params::new()
            .with("message", "ci: bump images [skip ci]")
            .with("branch", "main"),
        repo: None,
        push,
        dry_run: false,
    }
}

fn write_manifest(dir: &TempDir, content: &str) {
    std::fs::write(dir.path().join("images.env"), content).unwrap();
}

#[tokio::test]
async fn test_identical_tag_skips_commit_and_push() {
    let dir = TempDir::new().unwrap();
    write_manifest(&dir, "BACKEND_IMAGE=registry/backend:abc1234\n");
    let runner = RecordingRunner::new();

    let outcome = update_image_tags(&runner, &request(&dir, &[("backend", "registry/backend:abc1234")], true))
        .await
        .unwrap();

    assert_eq!(outcome, TagUpdateOutcome::NoChanges);
    assert!(runner.commands().is_empty());
}

#[tokio::test]
async fn test_changed_tag_commits_and_pushes() {
    let dir = TempDir::new().unwrap();
    write_manifest(
        &dir,
        "BACKEND_IMAGE=registry/backend:old\nFRONTEND_IMAGE=registry/frontend:abc1234\n",
    );
    let runner = RecordingRunner::new();

    let outcome = assert_ok!(
        update_image_tags(
            &runner,
            &request(
                &dir,
                &[
                    ("backend", "registry/backend:abc1234"),
                    ("frontend", "registry/frontend:abc1234"),
                ],
                true,
            ),
        )
        .await
    );

    match outcome {
        TagUpdateOutcome::Committed { changed, pushed, .. } => {
            assert_eq!(changed, vec!["backend"]);
            assert!(pushed);
        }
        other => panic!("expected commit, got {:?}", other),
    }

    assert_eq!(
        runner.commands(),
        vec![
            "git add -- images.env".to_string(),
            "git -c 'user.name=CI Bot' -c user.email=ci@localhost commit -m 'ci: bump images [skip ci]'".to_string(),
            "git push origin HEAD:main".to_string(),
        ]
    );
    let manifest = std::fs::read_to_string(dir.path().join("images.env")).unwrap();
    assert_eq!(
        manifest,
        "BACKEND_IMAGE=registry/backend:abc1234\nFRONTEND_IMAGE=registry/frontend:abc1234\n"
    );
}

#[tokio::test]
async fn test_push_disabled() {
    let dir = TempDir::new().unwrap();
    write_manifest(&dir, "BACKEND_IMAGE=registry/backend:old\n");
    let runner = RecordingRunner::new();

    let outcome = update_image_tags(&runner, &request(&dir, &[("backend", "registry/backend:new")], false))
        .await
        .unwrap();

    assert!(matches!(outcome, TagUpdateOutcome::Committed { pushed: false, .. }));
    assert!(!runner.commands().iter().any(|c| c.starts_with("git push")));
}

#[tokio::test]
async fn test_new_service_is_appended() {
    let dir = TempDir::new().unwrap();
    write_manifest(&dir, "# images\nBACKEND_IMAGE=registry/backend:abc1234\n");
    let runner = RecordingRunner::new();

    update_image_tags(&runner, &request(&dir, &[("web-ui", "registry/web-ui:abc1234")], false))
        .await
        .unwrap();

    let manifest = std::fs::read_to_string(dir.path().join("images.env")).unwrap();
    assert_eq!(
        manifest,
        "# images\nBACKEND_IMAGE=registry/backend:abc1234\nWEB_UI_IMAGE=registry/web-ui:abc1234\n"
    );
}

#[tokio::test]
async fn test_failed_push_is_reported() {
    let dir = TempDir::new().unwrap();
    write_manifest(&dir, "BACKEND_IMAGE=registry/backend:old\n");
    let runner = RecordingRunner::new().fail_on("git push", 1, "rejected: non-fast-forward");

    let err = update_image_tags(&runner, &request(&dir, &[("backend", "registry/backend:new")], true))
        .await
        .unwrap_err();

    match err {
        ShipError::CommandFailed { stage, stderr, .. } => {
            assert_eq!(stage, "deploy");
            assert!(stderr.contains("non-fast-forward"));
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_missing_manifest_fails() {
    let dir = TempDir::new().unwrap();
    let runner = RecordingRunner::new();

    let err = update_image_tags(&runner, &request(&dir, &[("backend", "registry/backend:new")], true))
        .await
        .unwrap_err();

    assert!(matches!(err, ShipError::ManifestError { .. }));
    assert!(runner.commands().is_empty());
}

#[tokio::test]
async fn test_missing_commit_message_fails_before_any_git_command() {
    let dir = TempDir::new().unwrap();
    write_manifest(&dir, "BACKEND_IMAGE=registry/backend:old\n");
    let runner = RecordingRunner::new();

    let mut req = request(&dir, &[("backend", "registry/backend:new")], true);
    req.git = Params::new().with("branch", "main");

    let err = update_image_tags(&runner, &req).await.unwrap_err();
    assert_eq!(err.to_string(), "Missing required configuration field: message");
    assert!(runner.commands().is_empty());
    let manifest = std::fs::read_to_string(dir.path().join("images.env")).unwrap();
    assert_eq!(manifest, "BACKEND_IMAGE=registry/backend:old\n");
}

#[tokio::test]
async fn test_retry_after_failed_push_still_pushes() {
    let dir = TempDir::new().unwrap();
    write_manifest(&dir, "BACKEND_IMAGE=registry/backend:old\n");
    let req = request(&dir, &[("backend", "registry/backend:new")], true);

    let failing = RecordingRunner::new().fail_on("git push", 1, "rejected: non-fast-forward");
    assert!(update_image_tags(&failing, &req).await.is_err());

    // 本地 commit 被撤銷，清單回到原本的 tag
    assert_eq!(
        failing.commands().last().map(String::as_str),
        Some("git reset -q HEAD^")
    );
    let manifest = std::fs::read_to_string(dir.path().join("images.env")).unwrap();
    assert_eq!(manifest, "BACKEND_IMAGE=registry/backend:old\n");

    let runner = RecordingRunner::new();
    let outcome = assert_ok!(update_image_tags(&runner, &req).await);
    assert!(matches!(outcome, TagUpdateOutcome::Committed { pushed: true, .. }));
    assert!(runner.commands().contains(&"git push origin HEAD:main".to_string()));
}

#[tokio::test]
async fn test_failed_commit_unstages_without_dropping_a_commit() {
    let dir = TempDir::new().unwrap();
    write_manifest(&dir, "BACKEND_IMAGE=registry/backend:old\n");
    let runner = RecordingRunner::new().fail_on(" commit -m ", 1, "nothing to commit");

    let mut req = request(&dir, &[("backend", "registry/backend:new")], true);
    req.extra_paths = vec!["overlays/production".to_string()];
    assert!(update_image_tags(&runner, &req).await.is_err());

    let commands = runner.commands();
    let tail: Vec<&str> = commands.iter().rev().take(2).rev().map(String::as_str).collect();
    assert_eq!(tail, vec!["git reset -q HEAD", "git checkout -- overlays/production"]);
    assert!(!commands.iter().any(|c| c.starts_with("git push")));
}

#[tokio::test]
async fn test_existing_checkout_is_synced_before_editing() {
    let dir = TempDir::new().unwrap();
    std::fs::create_dir(dir.path().join(".git")).unwrap();
    write_manifest(&dir, "BACKEND_IMAGE=registry/backend:abc1234\n");
    let runner = RecordingRunner::new();

    let mut req = request(&dir, &[("backend", "registry/backend:abc1234")], true);
    req.repo = Some("git@github.com:acme/deploy.git".to_string());

    let outcome = update_image_tags(&runner, &req).await.unwrap();
    assert_eq!(outcome, TagUpdateOutcome::NoChanges);
    assert_eq!(
        runner.commands(),
        vec![
            "git fetch origin main".to_string(),
            "git reset -q --hard FETCH_HEAD".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_missing_checkout_is_cloned() {
    let root = TempDir::new().unwrap();
    let runner = RecordingRunner::new();

    let mut req = request(&root, &[("backend", "registry/backend:abc1234")], true);
    req.workdir = root.path().join("gitops");
    req.repo = Some("https://github.com/acme/deploy.git".to_string());
    req.dry_run = true;

    let outcome = update_image_tags(&runner, &req).await.unwrap();
    assert!(matches!(outcome, TagUpdateOutcome::Committed { .. }));

    let recorded = runner.recorded();
    assert_eq!(
        recorded[0].command,
        "git clone --branch main -- https://github.com/acme/deploy.git gitops"
    );
    assert_eq!(recorded[0].workdir, root.path().to_path_buf());
    assert!(!root.path().join("gitops").exists());
}
