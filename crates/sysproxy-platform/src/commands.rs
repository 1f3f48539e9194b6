use async_trait::async_trait;
use log::{debug, trace};

#[cfg(windows)]
use std::os::windows::process::CommandExt;

#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x08000000;

pub trait HideWindow {
    fn hide_window(&mut self) -> &mut Self;
}

impl HideWindow for tokio::process::Command {
    #[cfg(windows)]
    fn hide_window(&mut self) -> &mut Self {
        self.creation_flags(CREATE_NO_WINDOW)
    }

    #[cfg(not(windows))]
    fn hide_window(&mut self) -> &mut Self {
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    #[must_use]
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            success: true,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    #[must_use]
    pub fn failed(stderr: impl Into<String>) -> Self {
        Self {
            success: false,
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    /// Trimmed stderr, or a generic message when the command printed nothing.
    #[must_use]
    pub fn failure_details(&self) -> String {
        let stderr = self.stderr.trim();
        if stderr.is_empty() {
            "command exited unsuccessfully".to_string()
        } else {
            stderr.to_string()
        }
    }
}

/// Runs external programs. Backends only talk to the OS through this seam.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, program: &str, args: &[String]) -> std::io::Result<CommandOutput>;

    fn is_installed(&self, program: &str) -> bool;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

#[async_trait]
impl CommandRunner for SystemRunner {
    async fn run(&self, program: &str, args: &[String]) -> std::io::Result<CommandOutput> {
        debug!("Running: {program} {}", args.join(" "));

        let output = tokio::process::Command::new(program)
            .args(args)
            .hide_window()
            .output()
            .await?;

        let result = CommandOutput {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        };

        debug!("{program} exit status: {:?}", output.status);
        trace!("{program} stdout: {}", result.stdout);
        if !result.stderr.is_empty() {
            trace!("{program} stderr: {}", result.stderr);
        }

        Ok(result)
    }

    fn is_installed(&self, program: &str) -> bool {
        which::which(program).is_ok()
    }
}

/// Converts owned-or-borrowed argument lists into the runner's `&[String]`.
#[must_use]
pub fn args<I, S>(items: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    items.into_iter().map(Into::into).collect()
}

#[cfg(test)]
mod tests {
    use super::{CommandOutput, CommandRunner, HideWindow, SystemRunner, args};

    #[test]
    fn tokio_command_hide_window_is_chainable() {
        let mut cmd = tokio::process::Command::new("echo");
        let before = &raw mut cmd;
        let after = std::ptr::from_mut(cmd.hide_window());
        assert_eq!(before, after);
    }

    #[test]
    fn failure_details_falls_back_when_stderr_is_blank() {
        assert_eq!(
            CommandOutput::failed("  \n").failure_details(),
            "command exited unsuccessfully"
        );
        assert_eq!(
            CommandOutput::failed("No such key\n").failure_details(),
            "No such key"
        );
    }

    #[test]
    fn args_collects_mixed_inputs() {
        let list = args(["--file", "kioslaverc"]);
        assert_eq!(list, vec!["--file".to_string(), "kioslaverc".to_string()]);
    }

    #[test]
    fn unknown_program_is_not_installed() {
        assert!(!SystemRunner.is_installed("sysproxy-definitely-missing-binary"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn system_runner_captures_stdout() {
        let output = SystemRunner
            .run("sh", &args(["-c", "printf hello"]))
            .await
            .expect("sh should run");

        assert!(output.success);
        assert_eq!(output.stdout, "hello");
    }
}
