use clap::Parser;
use kube_ship::commands::Params;
use kube_ship::config::toml_config::DEFAULT_COMMIT_MESSAGE;
use kube_ship::domain::model::ImageRef;
use kube_ship::domain::ports::CommandRunner;
use kube_ship::gitops::{render_commit_message, update_image_tags, TagUpdateOutcome, TagUpdateRequest};
use kube_ship::utils::logger;
use kube_ship::{RecordingRunner, ShellRunner};
use std::collections::BTreeMap;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "update-tag")]
#[command(about = "Update image tags in a GitOps manifest, commit and push")]
struct Args {
    /// Manifest file, relative to --repo
    #[arg(short, long)]
    manifest: String,

    /// GitOps repository checkout
    #[arg(long, default_value = ".")]
    repo: String,

    /// Clone this repository into --repo when it is not a checkout yet,
    /// otherwise reset --repo to the remote branch before editing
    #[arg(long = "clone")]
    clone_url: Option<String>,

    /// Service image as NAME=REGISTRY/IMAGE:TAG, repeatable
    #[arg(short, long = "service", value_parser = parse_service, required = true)]
    services: Vec<(String, ImageRef)>,

    /// Environment name used in the commit message
    #[arg(long, default_value = "production")]
    env: String,

    /// Branch to push to
    #[arg(long, default_value = "main")]
    branch: String,

    #[arg(long, default_value = "origin")]
    remote: String,

    #[arg(long, default_value = DEFAULT_COMMIT_MESSAGE)]
    message: String,

    /// Push after committing
    #[arg(long)]
    push: bool,

    /// Show the git commands without touching the repository
    #[arg(long)]
    dry_run: bool,

    #[arg(short, long)]
    verbose: bool,
}

fn parse_service(value: &str) -> Result<(String, ImageRef), String> {
    let (name, image) = value
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=IMAGE, got '{}'", value))?;
    let image = ImageRef::parse(image).ok_or_else(|| format!("invalid image reference '{}'", image))?;
    if name.trim().is_empty() {
        return Err(format!("missing service name in '{}'", value));
    }
    Ok((name.trim().to_string(), image))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    logger::init_cli_logger(args.verbose);

    let images: BTreeMap<String, ImageRef> = args.services.into_iter().collect();
    let git = Params::new()
        .with("message", render_commit_message(&args.message, &args.env, &images))
        .with("branch", args.branch)
        .with("remote", args.remote);

    let request = TagUpdateRequest {
        workdir: PathBuf::from(&args.repo),
        manifest: args.manifest,
        images,
        pre_commit: Vec::new(),
        extra_paths: Vec::new(),
        git,
        repo: args.clone_url,
        push: args.push,
        dry_run: args.dry_run,
    };

    let runner: Box<dyn CommandRunner> = if args.dry_run {
        Box::new(RecordingRunner::new())
    } else {
        Box::new(ShellRunner::new())
    };

    match update_image_tags(runner.as_ref(), &request).await? {
        TagUpdateOutcome::NoChanges => println!("⏭️ No changes: image tags already up to date"),
        TagUpdateOutcome::Committed { changed, pushed, .. } => println!(
            "✅ Updated {}{}",
            changed.join(", "),
            if pushed { " and pushed" } else { "" }
        ),
    }

    Ok(())
}
