use crate::domain::model::CommandOutput;
use crate::domain::ports::CommandRunner;
use crate::utils::error::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Mutex;
use tokio::process::Command;

/// 透過 `sh -c` 執行指令並擷取輸出
#[derive(Debug, Clone)]
pub struct ShellRunner {
    shell: String,
}

impl Default for ShellRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl ShellRunner {
    pub fn new() -> Self {
        Self {
            shell: "sh".to_string(),
        }
    }
}

#[async_trait]
impl CommandRunner for ShellRunner {
    async fn run(&self, command: &str, workdir: &Path) -> Result<CommandOutput> {
        tracing::debug!("$ {} (in {})", command, workdir.display());

        let output = Command::new(&self.shell)
            .arg("-c")
            .arg(command)
            .current_dir(workdir)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await?;

        let result = CommandOutput {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };

        for line in result.stdout.lines() {
            tracing::debug!("  {}", line);
        }

        Ok(result)
    }
}

/// A command the recorder saw, with the directory it was issued in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCommand {
    pub command: String,
    pub workdir: PathBuf,
}

/// 不執行任何程序，只記錄指令；用於 --dry-run 與測試
///
/// Responses are matched by substring, first match wins; unmatched commands
/// succeed with empty output.
#[derive(Debug, Default)]
pub struct RecordingRunner {
    recorded: Mutex<Vec<RecordedCommand>>,
    responses: Vec<(String, CommandOutput)>,
}

impl RecordingRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(mut self, pattern: &str, output: CommandOutput) -> Self {
        self.responses.push((pattern.to_string(), output));
        self
    }

    pub fn fail_on(self, pattern: &str, exit_code: i32, stderr: &str) -> Self {
        self.respond(
            pattern,
            CommandOutput {
                exit_code: Some(exit_code),
                stdout: String::new(),
                stderr: stderr.to_string(),
            },
        )
    }

    pub fn recorded(&self) -> Vec<RecordedCommand> {
        self.recorded
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    pub fn commands(&self) -> Vec<String> {
        self.recorded().into_iter().map(|r| r.command).collect()
    }
}

#[async_trait]
impl CommandRunner for RecordingRunner {
    async fn run(&self, command: &str, workdir: &Path) -> Result<CommandOutput> {
        tracing::info!("🔸 [dry-run] $ {}", command);

        if let Ok(mut recorded) = self.recorded.lock() {
            recorded.push(RecordedCommand {
                command: command.to_string(),
                workdir: workdir.to_path_buf(),
            });
        }

        let output = self
            .responses
            .iter()
            .find(|(pattern, _)| command.contains(pattern.as_str()))
            .map(|(_, output)| output.clone())
            .unwrap_or_else(|| CommandOutput::success(""));
        Ok(output)
    }
}
