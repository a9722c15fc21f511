/// Subprocess boundary for metrics that have no native source
///
/// Every pipeline runs through `sh -c` and blocks until it exits. There is
/// no timeout: a hung command hangs the run.

use std::io;
use std::process::{Command, Stdio};

/// Captured result of one shell pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, `None` when the process was killed by a signal
    pub status: Option<i32>,
    pub stdout: String,
}

#[cfg_attr(test, mockall::automock)]
pub trait CommandRunner {
    fn run(&self, script: &str) -> io::Result<CommandOutput>;
}

/// Runs pipelines with the system shell
#[derive(Debug, Default, Clone, Copy)]
pub struct ShellRunner;

impl CommandRunner for ShellRunner {
    fn run(&self, script: &str) -> io::Result<CommandOutput> {
        let output = Command::new("sh")
            .arg("-c")
            .arg(script)
            .stdin(Stdio::null())
            .stderr(Stdio::inherit())
            .output()?;

        Ok(CommandOutput {
            status: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shell_runner_captures_stdout() {
        let output = ShellRunner.run("echo 37%").unwrap();
        assert_eq!(output.status, Some(0));
        assert_eq!(output.stdout, "37%\n");
    }

    #[test]
    fn test_shell_runner_reports_exit_code() {
        let output = ShellRunner.run("exit 3").unwrap();
        assert_eq!(output.status, Some(3));
    }
}
