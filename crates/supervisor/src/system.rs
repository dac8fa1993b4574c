//! Host operating system access
//!
//! Everything the installer and service manager do to the machine goes
//! through [`System`], so the reconciliation logic can be exercised against
//! a scripted implementation.

use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::{Result, SupervisorError};

/// File and command access on the host
///
/// Commands are single shell command lines. Every `exec*` call resolves with
/// the command's stdout; a non-zero exit status is an error.
#[async_trait]
pub trait System: Send + Sync {
    /// `Ok(None)` when the file does not exist
    async fn read_file(&self, path: &Path) -> Result<Option<String>>;

    async fn write_file(&self, path: &Path, content: &str) -> Result<()>;

    async fn exec(&self, command: &str) -> Result<String>;

    /// Run with administrator rights, prompting the user if the OS requires it
    async fn exec_elevated(&self, command: &str) -> Result<String>;

    /// Run as the interactive user, dropping privileges gained through sudo
    async fn exec_as_user(&self, command: &str) -> Result<String>;
}

/// [`System`] backed by the real filesystem and process table
#[derive(Debug, Clone, Default)]
pub struct OsSystem;

impl OsSystem {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl System for OsSystem {
    async fn read_file(&self, path: &Path) -> Result<Option<String>> {
        match tokio::fs::read_to_string(path).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(SupervisorError::io(path, e)),
        }
    }

    async fn write_file(&self, path: &Path, content: &str) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| SupervisorError::io(parent, e))?;
            }
        }
        tokio::fs::write(path, content)
            .await
            .map_err(|e| SupervisorError::io(path, e))
    }

    async fn exec(&self, command: &str) -> Result<String> {
        run(command, shell(command)).await
    }

    async fn exec_elevated(&self, command: &str) -> Result<String> {
        run(command, elevated(command)).await
    }

    async fn exec_as_user(&self, command: &str) -> Result<String> {
        run(command, as_user(command)).await
    }
}

async fn run(command: &str, mut cmd: Command) -> Result<String> {
    debug!("Running `{}`", command);

    let output = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|source| SupervisorError::CommandSpawn {
            command: command.to_string(),
            source,
        })?;

    if !output.status.success() {
        return Err(SupervisorError::CommandFailed {
            command: command.to_string(),
            code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// `cmd` arguments running `command` verbatim
///
/// With `/S` and the whole line quoted, `cmd` strips exactly the outer pair
/// of quotes, so quoted paths with spaces and `&&` chains survive.
#[cfg(any(windows, test))]
fn cmd_line(command: &str) -> String {
    format!("/D /S /C \"{}\"", command)
}

#[cfg(windows)]
fn shell(command: &str) -> Command {
    let mut cmd = Command::new("cmd");
    cmd.raw_arg(cmd_line(command));
    cmd
}

#[cfg(not(windows))]
fn shell(command: &str) -> Command {
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(command);
    cmd
}

/// PowerShell script raising a UAC prompt for `command`
///
/// `-ArgumentList` gets the whole `cmd` line as one single-quoted string, so
/// PowerShell passes it through untouched; only `'` needs doubling.
#[cfg(any(windows, test))]
fn elevated_script(command: &str) -> String {
    format!(
        "$p = Start-Process -FilePath cmd -ArgumentList '{}' -Verb RunAs -Wait -PassThru -WindowStyle Hidden; exit $p.ExitCode",
        cmd_line(command).replace('\'', "''")
    )
}

/// The elevated process's stdout is not observable, only its exit code
#[cfg(windows)]
fn elevated(command: &str) -> Command {
    let mut cmd = Command::new("powershell");
    cmd.args(["-NoProfile", "-NonInteractive", "-Command"])
        .arg(elevated_script(command));
    cmd
}

#[cfg(target_os = "macos")]
fn elevated(command: &str) -> Command {
    let escaped = command.replace('\\', "\\\\").replace('"', "\\\"");
    let script = format!("do shell script \"{}\" with administrator privileges", escaped);
    let mut cmd = Command::new("osascript");
    cmd.arg("-e").arg(script);
    cmd
}

#[cfg(all(unix, not(target_os = "macos")))]
fn elevated(command: &str) -> Command {
    let mut cmd = Command::new("pkexec");
    cmd.args(["sh", "-c", command]);
    cmd
}

#[cfg(windows)]
fn as_user(command: &str) -> Command {
    shell(command)
}

/// Under sudo, run as the invoking user so created files are not root-owned
#[cfg(not(windows))]
fn as_user(command: &str) -> Command {
    match std::env::var("SUDO_USER") {
        Ok(user) if !user.is_empty() && user != "root" => {
            let mut cmd = Command::new("sudo");
            cmd.args(["-u", &user, "sh", "-c", command]);
            cmd
        }
        _ => shell(command),
    }
}


#[cfg(all(test, unix))]
mod unix_tests {
    use super::*;

    #[tokio::test]
    async fn test_read_missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let system = OsSystem::new();
        let content = system.read_file(&dir.path().join("absent.json")).await.unwrap();
        assert!(content.is_none());
    }

    #[tokio::test]
    async fn test_write_creates_parent_and_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("servicemanager.json");
        let system = OsSystem::new();

        system.write_file(&path, "{\"Name\":\"x\"}").await.unwrap();
        let content = system.read_file(&path).await.unwrap();
        assert_eq!(content.as_deref(), Some("{\"Name\":\"x\"}"));
    }

    #[tokio::test]
    async fn test_exec_returns_stdout() {
        let output = OsSystem::new().exec("echo RUNNING").await.unwrap();
        assert_eq!(output.trim(), "RUNNING");
    }

    #[tokio::test]
    async fn test_exec_nonzero_exit_is_error() {
        let err = OsSystem::new()
            .exec("echo broken >&2; exit 3")
            .await
            .unwrap_err();
        match err {
            SupervisorError::CommandFailed { code, stderr, .. } => {
                assert_eq!(code, Some(3));
                assert_eq!(stderr, "broken");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_exec_as_user_without_sudo_runs_directly() {
        if std::env::var("SUDO_USER").is_ok() {
            return;
        }
        let output = OsSystem::new().exec_as_user("echo hello").await.unwrap();
        assert_eq!(output.trim(), "hello");
    }
}
