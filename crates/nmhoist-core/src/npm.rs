//! Package-manager process adapter.

use crate::apply::Installer;
use crate::error::{Error, Result};
use crate::listing::parse_listing;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

/// Captured result of one package-manager invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecResult {
    /// Exit code; -1 when the process was terminated by a signal.
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ExecResult {
    #[must_use]
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Runs an npm-compatible package manager.
#[derive(Debug, Clone)]
pub struct PackageManager {
    program: String,
}

impl PackageManager {
    /// `program` is looked up on `PATH`. On Windows a bare name gets the
    /// `.cmd` suffix npm installs its shim under.
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    fn executable(&self) -> PathBuf {
        let program = PathBuf::from(&self.program);
        if cfg!(windows) && program.extension().is_none() {
            program.with_extension("cmd")
        } else {
            program
        }
    }

    /// Run the package manager with `args` in `dir`, capturing its output.
    ///
    /// # Errors
    /// Returns [`Error::Io`] if the process cannot be started.
    pub async fn exec(&self, args: &[&str], dir: &Path) -> Result<ExecResult> {
        debug!(program = %self.program, ?args, dir = %dir.display(), "running package manager");
        let output = Command::new(self.executable())
            .args(args)
            .current_dir(dir)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await?;

        Ok(ExecResult {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).trim().to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }

    /// The installed tree of `dir` as printed by `ls --json --long`.
    ///
    /// npm exits non-zero for extraneous or missing packages but still prints
    /// the tree, so only an empty stdout counts as failure.
    ///
    /// # Errors
    /// Returns [`Error::PackageManager`] when nothing was printed, or
    /// [`Error::ListingParse`] when the output is not JSON.
    pub async fn list(&self, dir: &Path) -> Result<Value> {
        let args = ["ls", "--json", "--long"];
        let result = self.exec(&args, dir).await?;
        if result.stdout.is_empty() {
            return Err(self.failure(&args, result));
        }
        parse_listing(&result.stdout)
    }

    /// Run `dedupe` in `dir`, letting the package manager flatten what it can
    /// before the tree is listed.
    ///
    /// # Errors
    /// Returns [`Error::PackageManager`] on a non-zero exit.
    pub async fn dedupe(&self, dir: &Path) -> Result<()> {
        let args = ["dedupe"];
        let result = self.exec(&args, dir).await?;
        if result.success() {
            Ok(())
        } else {
            Err(self.failure(&args, result))
        }
    }

    fn failure(&self, args: &[&str], result: ExecResult) -> Error {
        Error::PackageManager {
            command: format!("{} {}", self.program, args.join(" ")),
            code: result.exit_code,
            stderr: result.stderr,
        }
    }
}

impl Installer for PackageManager {
    async fn install(&self, dir: &Path, spec: &str) -> Result<()> {
        let args = ["install", "--no-save", spec];
        let result = self.exec(&args, dir).await?;
        if result.success() {
            Ok(())
        } else {
            Err(self.failure(&args, result))
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_exec_captures_output() {
        let dir = tempfile::tempdir().unwrap();
        let result = PackageManager::new("echo")
            .exec(&["hello", "world"], dir.path())
            .await
            .unwrap();
        assert!(result.success());
        assert_eq!(result.stdout, "hello world");
        assert_eq!(result.stderr, "");
    }

    #[tokio::test]
    async fn test_failed_install_reports_command() {
        let dir = tempfile::tempdir().unwrap();
        let err = PackageManager::new("false")
            .install(dir.path(), "left-pad@1.0.0")
            .await
            .unwrap_err();
        match err {
            Error::PackageManager { command, code, .. } => {
                assert_eq!(command, "false install --no-save left-pad@1.0.0");
                assert_eq!(code, 1);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_dedupe_runs_in_project_dir() {
        let dir = tempfile::tempdir().unwrap();
        PackageManager::new("true").dedupe(dir.path()).await.unwrap();

        let err = PackageManager::new("false").dedupe(dir.path()).await.unwrap_err();
        match err {
            Error::PackageManager { command, .. } => assert_eq!(command, "false dedupe"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_list_rejects_non_json_output() {
        let dir = tempfile::tempdir().unwrap();
        let err = PackageManager::new("echo").list(dir.path()).await.unwrap_err();
        assert!(matches!(err, Error::ListingParse(_)));
    }

    #[tokio::test]
    async fn test_missing_program_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = PackageManager::new("nmhoist-no-such-program")
            .exec(&[], dir.path())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }
}
