use std::path::{Path, PathBuf};
use std::process::Stdio;
use log::{debug, info};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use which::which;

use crate::config::DatabaseConfig;
use crate::error::BackupError;

/// Outcome of the external mysqldump strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolOutcome {
    /// A candidate passed the health check and wrote the dump file.
    Ran,
    /// No candidate passed the health check; the caller falls back to the
    /// built-in dumper.
    Unavailable,
}

/// Locates and drives a native `mysqldump` binary. Preferred over the
/// built-in dumper because it also covers views, triggers and routines.
pub struct MysqldumpTool {
    candidates: Vec<PathBuf>,
}

impl Default for MysqldumpTool {
    fn default() -> MysqldumpTool {
        MysqldumpTool::new()
    }
}

impl MysqldumpTool {
    pub fn new() -> MysqldumpTool {
        MysqldumpTool {
            candidates: default_candidates(),
        }
    }

    /// Probe list override, used by tests.
    pub fn with_candidates(candidates: Vec<PathBuf>) -> MysqldumpTool {
        MysqldumpTool { candidates }
    }

    async fn probe(&self) -> Option<&Path> {
        for candidate in &self.candidates {
            let healthy = Command::new(candidate)
                .arg("--version")
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
                .await
                .map(|status| status.success())
                .unwrap_or(false);
            if healthy {
                return Some(candidate);
            }
            debug!("mysqldump candidate {} failed the health check", candidate.display());
        }
        None
    }

    /// Dumps the configured database to `destination`. Credentials and paths
    /// are passed as individual argv elements, never through a shell, so no
    /// part of the connection descriptor can be parsed as shell syntax.
    pub async fn run(
        &self,
        config: &DatabaseConfig,
        destination: &Path,
        cancel: &CancellationToken,
    ) -> Result<ToolOutcome, BackupError> {
        let Some(command_path) = self.probe().await else {
            info!("mysqldump not found, falling back to the built-in dumper");
            return Ok(ToolOutcome::Unavailable);
        };

        info!("Dumping {} with {}", config.database, command_path.display());
        let mut cmd = Command::new(command_path);
        cmd.arg(format!("--host={}", config.host));
        cmd.arg(format!("--port={}", config.port));
        cmd.arg(format!("--user={}", config.username));
        cmd.arg(format!("--password={}", config.password));
        cmd.arg("--quick");
        cmd.arg("--single-transaction");
        cmd.arg(format!("--result-file={}", destination.display()));
        cmd.arg(&config.database);

        let mut child = cmd
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|_| BackupError::ExternalToolFailed)?;

        let status = tokio::select! {
            status = child.wait() => status.map_err(|_| BackupError::ExternalToolFailed)?,
            _ = cancel.cancelled() => {
                let _ = child.kill().await;
                return Err(BackupError::Cancelled);
            }
        };

        // `destination` may be a pre-created staging file, so existence alone
        // proves nothing; a dump that produced no output is a failure.
        let produced = std::fs::metadata(destination)
            .map(|m| m.len() > 0)
            .unwrap_or(false);
        if status.success() && produced {
            Ok(ToolOutcome::Ran)
        } else {
            Err(BackupError::ExternalToolFailed)
        }
    }
}

fn default_candidates() -> Vec<PathBuf> {
    let mut candidates = Vec::new();
    // A PATH hit comes first, then the usual install locations.
    if let Ok(found) = which("mysqldump") {
        candidates.push(found);
    }
    candidates.push(PathBuf::from("/usr/bin/mysqldump"));
    candidates.push(PathBuf::from("/usr/local/bin/mysqldump"));
    candidates.push(PathBuf::from("/usr/local/mysql/bin/mysqldump"));
    if cfg!(windows) {
        candidates.push(PathBuf::from(r"C:\xampp\mysql\bin\mysqldump.exe"));
        candidates.push(PathBuf::from(
            r"C:\Program Files\MySQL\MySQL Server 8.0\bin\mysqldump.exe",
        ));
    }
    candidates
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    #[cfg(unix)]
    use tempfile::TempDir;

    /// Writes an executable stand-in for mysqldump that answers the
    /// `--version` health check but exits non-zero when invoked for a dump.
    #[cfg(unix)]
    pub(crate) fn stub_tool_failing_invocation(dir: &Path) -> PathBuf {
        write_stub(
            dir,
            "#!/bin/sh\ncase \"$1\" in --version) exit 0 ;; esac\nexit 1\n",
        )
    }

    /// Stand-in that exits zero for everything but never writes a dump.
    #[cfg(unix)]
    pub(crate) fn stub_tool_writing_nothing(dir: &Path) -> PathBuf {
        write_stub(dir, "#!/bin/sh\nexit 0\n")
    }

    #[cfg(unix)]
    fn write_stub(dir: &Path, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;
        let path = dir.join("mysqldump");
        std::fs::write(&path, body).unwrap();
        let mut perms = std::fs::metadata(&path).unwrap().permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&path, perms).unwrap();
        path
    }

    fn descriptor() -> DatabaseConfig {
        DatabaseConfig {
            host: "127.0.0.1".to_string(),
            port: 3306,
            database: "mydb".to_string(),
            username: "root".to_string(),
            password: "123456".to_string(),
        }
    }

    #[tokio::test]
    async fn test_unavailable_when_no_candidate_passes_health_check() {
        let tool = MysqldumpTool::with_candidates(vec![
            PathBuf::from("/nonexistent/mysqldump"),
            PathBuf::from("/also/nonexistent/mysqldump"),
        ]);
        let dest = std::env::temp_dir().join("never-written.sql");
        let outcome = tool
            .run(&descriptor(), &dest, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(outcome, ToolOutcome::Unavailable);
        assert!(!dest.exists());
    }

    #[tokio::test]
    #[cfg(unix)]
    async fn test_failed_invocation_is_an_error() {
        let dir = TempDir::new().unwrap();
        let tool =
            MysqldumpTool::with_candidates(vec![stub_tool_failing_invocation(dir.path())]);
        let dest = dir.path().join("out.sql");
        let err = tool
            .run(&descriptor(), &dest, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, BackupError::ExternalToolFailed));
    }

    #[tokio::test]
    #[cfg(unix)]
    async fn test_successful_exit_without_output_is_an_error() {
        let dir = TempDir::new().unwrap();
        let tool = MysqldumpTool::with_candidates(vec![stub_tool_writing_nothing(dir.path())]);

        // Pre-created staging file stays empty, as in the create path.
        let dest = dir.path().join("staged.sql");
        std::fs::write(&dest, b"").unwrap();

        let err = tool
            .run(&descriptor(), &dest, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, BackupError::ExternalToolFailed));
    }

    #[tokio::test]
    async fn test_empty_candidate_list_is_unavailable() {
        let tool = MysqldumpTool::with_candidates(vec![]);
        let outcome = tool
            .run(
                &descriptor(),
                Path::new("/tmp/unused.sql"),
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(outcome, ToolOutcome::Unavailable);
    }
}
