//! Script runner shared by the subprocess-backed tools.
//!
//! Spawns `{program} {scripts_dir}/{script} args...`, optionally writes a
//! request to stdin, and collects stdout/stderr under a deadline. The child
//! is killed if the deadline passes or the future is dropped.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use anyhow::{anyhow, Context};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use reportmind_core::config::ToolsConfig;
use reportmind_core::utils::{expand_home, truncate_string};

/// Captured result of one script run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScriptOutput {
    pub stdout: String,
    pub stderr: String,
    /// `-1` when the process was terminated by a signal.
    pub exit_code: i32,
}

impl ScriptOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Best explanation of a failed run: stderr, then stdout, then the exit code.
    pub fn failure_reason(&self) -> String {
        if !self.stderr.trim().is_empty() {
            self.stderr.trim().to_string()
        } else if !self.stdout.trim().is_empty() {
            self.stdout.trim().to_string()
        } else {
            format!("Process finished with code {}", self.exit_code)
        }
    }
}

/// Runs tool scripts with a fixed interpreter and directory.
#[derive(Clone, Debug)]
pub struct ScriptRunner {
    program: String,
    scripts_dir: PathBuf,
    data_dir: PathBuf,
    timeout: Duration,
    max_output_chars: usize,
}

impl ScriptRunner {
    pub fn new(program: impl Into<String>, scripts_dir: impl Into<PathBuf>) -> Self {
        let defaults = ToolsConfig::default();
        Self {
            program: program.into(),
            scripts_dir: scripts_dir.into(),
            data_dir: expand_home(&defaults.data_dir),
            timeout: Duration::from_secs(defaults.timeout_secs),
            max_output_chars: defaults.max_output_chars,
        }
    }

    pub fn from_config(config: &ToolsConfig) -> Self {
        Self {
            program: config.python.clone(),
            scripts_dir: expand_home(&config.scripts_dir),
            data_dir: expand_home(&config.data_dir),
            timeout: Duration::from_secs(config.timeout_secs),
            max_output_chars: config.max_output_chars,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_data_dir(mut self, data_dir: impl Into<PathBuf>) -> Self {
        self.data_dir = data_dir.into();
        self
    }

    /// Cap on captured stdout/stderr; `usize::MAX` disables truncation.
    pub fn with_max_output_chars(mut self, max_output_chars: usize) -> Self {
        self.max_output_chars = max_output_chars;
        self
    }

    pub fn scripts_dir(&self) -> &Path {
        &self.scripts_dir
    }

    pub fn script_path(&self, script: &str) -> PathBuf {
        self.scripts_dir.join(script)
    }

    /// Run `script` with `args`, feeding `stdin` if given.
    ///
    /// A non-zero exit is not an error here; callers decide what counts as
    /// success. Spawn failures and timeouts are errors.
    pub async fn run(
        &self,
        script: &str,
        args: &[String],
        stdin: Option<&str>,
    ) -> anyhow::Result<ScriptOutput> {
        let script_path = self.script_path(script);
        debug!(script = %script_path.display(), args = ?args, "spawning tool script");

        let mut command = Command::new(&self.program);
        command
            .arg(&script_path)
            .args(args)
            .env("REPORTMIND_DATA_DIR", &self.data_dir)
            .stdin(if stdin.is_some() { Stdio::piped() } else { Stdio::null() })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if self.scripts_dir.is_dir() {
            command.current_dir(&self.scripts_dir);
        }

        let mut child = command
            .spawn()
            .with_context(|| format!("failed to spawn {} {}", self.program, script))?;

        if let (Some(input), Some(mut pipe)) = (stdin, child.stdin.take()) {
            pipe.write_all(input.as_bytes()).await?;
            pipe.write_all(b"\n").await?;
            pipe.flush().await?;
            drop(pipe);
        }

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| anyhow!("{} timed out after {}s", script, self.timeout.as_secs()))??;

        let result = ScriptOutput {
            stdout: truncate_string(&String::from_utf8_lossy(&output.stdout), self.max_output_chars),
            stderr: truncate_string(&String::from_utf8_lossy(&output.stderr), self.max_output_chars),
            exit_code: output.status.code().unwrap_or(-1),
        };
        debug!(
            script = %script,
            exit_code = result.exit_code,
            stdout_len = result.stdout.len(),
            "tool script finished"
        );
        Ok(result)
    }
}
