use std::path::Path;

use assert_cmd::Command;
use tempfile::TempDir;

/// An isolated working directory for exercising the `rrcore` binary,
/// mirroring the teacher's `TestWorld` process harness.
pub struct CliWorld {
    temp_dir: TempDir,
}

impl Default for CliWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl CliWorld {
    pub fn new() -> Self {
        Self {
            temp_dir: TempDir::new().expect("failed to create temp dir"),
        }
    }

    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Runs `rrcore` with `args`, cwd'd into this world's root.
    #[allow(deprecated)]
    pub fn run(&self, args: &[&str]) -> CliResult {
        let mut cmd = Command::cargo_bin("rrcore").expect("rrcore binary not found");
        cmd.args(args);
        cmd.current_dir(self.root());
        let output = cmd.output().expect("failed to execute rrcore");
        CliResult {
            status: output.status,
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        }
    }
}

/// Result of a CLI invocation under a `CliWorld`.
#[derive(Debug)]
pub struct CliResult {
    pub status: std::process::ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

impl CliResult {
    pub fn success(&self) -> bool {
        self.status.success()
    }

    pub fn stdout(&self) -> &str {
        &self.stdout
    }

    pub fn stderr(&self) -> &str {
        &self.stderr
    }
}
