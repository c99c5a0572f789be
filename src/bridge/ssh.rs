//! READY bridge over the system ssh client
//!
//! One interactive `ssh -T` session is opened lazily and reused for every job
//! submitted during a run. After each command the bridge echoes a sentinel
//! carrying `$?` on both output streams, which is how it knows the remote job
//! finished and with which exit status. Output that does not end in a newline
//! shares its last line with the sentinel; that text is kept.
//!
//! File retrieval goes through a separate one-shot `ssh <host> cat <path>` so
//! fetching golden artifacts never disturbs the interactive session.

use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};

use super::{BridgeError, RemoteFileStore, RemoteShell, ShellOutput};
use crate::runs::config::ReadyConfig;

const SENTINEL: &str = "__YEMATCH_DONE__";

struct Session {
    // Held so the remote shell is torn down with the session
    _child: Child,
    stdin: ChildStdin,
    stdout: Lines<BufReader<ChildStdout>>,
    stderr: mpsc::UnboundedReceiver<String>,
}

pub struct SshBridge {
    config: ReadyConfig,
    program: PathBuf,
    session: Mutex<Option<Session>>,
}

impl SshBridge {
    pub fn new(config: ReadyConfig) -> Result<Self, BridgeError> {
        if config.host.trim().is_empty() {
            return Err(BridgeError::ConfigError(
                "ready.host is not set (or YEMATCH_READY_HOST)".to_string(),
            ));
        }
        let program = which::which(&config.ssh_binary).map_err(|e| {
            BridgeError::StartupFailed(format!("cannot locate {}: {}", config.ssh_binary, e))
        })?;

        Ok(Self {
            config,
            program,
            session: Mutex::new(None),
        })
    }

    fn base_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        if let Some(port) = self.config.port {
            cmd.arg("-p").arg(port.to_string());
        }
        cmd.args(&self.config.ssh_options);
        cmd
    }

    async fn open_session(&self) -> Result<Session, BridgeError> {
        info!("Opening READY session to {}", self.config.destination());

        let mut cmd = self.base_command();
        cmd.arg("-T")
            .arg(self.config.destination())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd
            .spawn()
            .map_err(|e| BridgeError::StartupFailed(format!("failed to spawn ssh: {}", e)))?;

        let stdin = child.stdin.take().ok_or(BridgeError::Disconnected)?;
        let stdout = child.stdout.take().ok_or(BridgeError::Disconnected)?;
        let stderr = child.stderr.take().ok_or(BridgeError::Disconnected)?;

        // Drain stderr continuously so a chatty job cannot block on a full pipe
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if tx.send(line).is_err() {
                    break;
                }
            }
        });

        Ok(Session {
            _child: child,
            stdin,
            stdout: BufReader::new(stdout).lines(),
            stderr: rx,
        })
    }

    async fn run_in_session(
        session: &mut Session,
        command: &str,
    ) -> Result<ShellOutput, BridgeError> {
        let script = format!(
            "{command}\n__rc=$?; echo \"{SENTINEL}:$__rc\"; echo \"{SENTINEL}:$__rc\" 1>&2\n"
        );
        session.stdin.write_all(script.as_bytes()).await?;
        session.stdin.flush().await?;

        let mut stdout = String::new();
        let mut exit_code = None;
        while let Some(line) = session.stdout.next_line().await? {
            if let Some((before, code)) = split_sentinel(&line) {
                push_line(&mut stdout, before);
                exit_code = code;
                break;
            }
            push_line(&mut stdout, &line);
        }
        if exit_code.is_none() && stdout.is_empty() {
            return Err(BridgeError::Disconnected);
        }

        let mut stderr = String::new();
        if exit_code.is_some() {
            while let Some(line) = session.stderr.recv().await {
                if let Some((before, _)) = split_sentinel(&line) {
                    push_line(&mut stderr, before);
                    break;
                }
                push_line(&mut stderr, &line);
            }
        } else {
            // Session ended mid-job; keep whatever already arrived
            while let Ok(line) = session.stderr.try_recv() {
                push_line(&mut stderr, &line);
            }
        }

        Ok(ShellOutput {
            stdout,
            stderr,
            exit_code,
        })
    }
}

/// Split a line at the sentinel into the output before it and the exit code,
/// which is `None` if unparsable
fn split_sentinel(line: &str) -> Option<(&str, Option<i32>)> {
    let at = line.rfind(SENTINEL)?;
    let rest = line[at + SENTINEL.len()..].strip_prefix(':')?;
    Some((&line[..at], rest.trim().parse().ok()))
}

fn push_line(buffer: &mut String, line: &str) {
    if !line.is_empty() {
        buffer.push_str(line);
        buffer.push('\n');
    }
}

/// Single-quote a path for the remote shell
fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

#[async_trait]
impl RemoteShell for SshBridge {
    async fn submit(&self, command: &str) -> Result<ShellOutput, BridgeError> {
        let mut guard = self.session.lock().await;
        if guard.is_none() {
            *guard = Some(self.open_session().await?);
        }
        let Some(session) = guard.as_mut() else {
            return Err(BridgeError::Disconnected);
        };

        debug!("READY <- {}", command);
        let result = Self::run_in_session(session, command).await;

        // A session that lost its sentinel cannot be trusted for the next job
        let broken = match &result {
            Ok(output) => output.exit_code.is_none(),
            Err(_) => true,
        };
        if broken {
            warn!("READY session closed; the next command reconnects");
            *guard = None;
        }
        result
    }
}

#[async_trait]
impl RemoteFileStore for SshBridge {
    async fn fetch(&self, path: &str) -> Result<Vec<u8>, BridgeError> {
        let mut cmd = self.base_command();
        cmd.arg(self.config.destination())
            .arg(format!("cat {}", shell_quote(path)))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let output = cmd.output().await?;
        if output.status.success() {
            debug!("Fetched {} ({} bytes)", path, output.stdout.len());
            return Ok(output.stdout);
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        if stderr.contains("No such file") {
            Err(BridgeError::NotFound(path.to_string()))
        } else {
            Err(BridgeError::ServerError(format!(
                "cat {} exited with {}: {}",
                path,
                output.status.code().unwrap_or(-1),
                stderr.trim()
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_sentinel() {
        assert_eq!(split_sentinel("__YEMATCH_DONE__:0"), Some(("", Some(0))));
        assert_eq!(split_sentinel("__YEMATCH_DONE__:127 "), Some(("", Some(127))));
        assert_eq!(split_sentinel("__YEMATCH_DONE__:x"), Some(("", None)));
        assert_eq!(
            split_sentinel("EJR COMPLETED__YEMATCH_DONE__:0"),
            Some(("EJR COMPLETED", Some(0)))
        );
        assert_eq!(split_sentinel("EJR COMPLETED"), None);
        assert_eq!(split_sentinel("__YEMATCH_DONE__"), None);
    }

    #[test]
    fn test_shell_quote() {
        assert_eq!(shell_quote("/PVTSYSOUT/QPAY066-1"), "'/PVTSYSOUT/QPAY066-1'");
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
    }

    #[test]
    fn test_requires_host() {
        let err = SshBridge::new(ReadyConfig::default()).err().unwrap();
        assert!(matches!(err, BridgeError::ConfigError(_)));
    }

    // A local `sh` speaks the same line protocol as the remote shell
    #[cfg(unix)]
    fn local_session() -> Session {
        let mut child = Command::new("sh")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .unwrap();
        let stdin = child.stdin.take().unwrap();
        let stdout = child.stdout.take().unwrap();
        let stderr = child.stderr.take().unwrap();
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                let _ = tx.send(line);
            }
        });
        Session {
            _child: child,
            stdin,
            stdout: BufReader::new(stdout).lines(),
            stderr: rx,
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_session_protocol_over_local_shell() {
        let mut session = local_session();

        let out = SshBridge::run_in_session(&mut session, "echo hello; echo oops 1>&2")
            .await
            .unwrap();
        assert_eq!(out.stdout, "hello\n");
        assert_eq!(out.stderr, "oops\n");
        assert_eq!(out.exit_code, Some(0));

        let out = SshBridge::run_in_session(&mut session, "false").await.unwrap();
        assert_eq!(out.exit_code, Some(1));
        assert!(!out.success());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_output_without_trailing_newline() {
        let mut session = local_session();

        let out = tokio::time::timeout(
            std::time::Duration::from_secs(5),
            SshBridge::run_in_session(&mut session, "printf 'EJR COMPLETED'; printf 'warn' 1>&2"),
        )
        .await
        .expect("sentinel not recognised")
        .unwrap();
        assert_eq!(out.stdout, "EJR COMPLETED\n");
        assert_eq!(out.stderr, "warn\n");
        assert_eq!(out.exit_code, Some(0));

        // The session stays usable for the next job
        let out = SshBridge::run_in_session(&mut session, "echo next").await.unwrap();
        assert_eq!(out.stdout, "next\n");
        assert_eq!(out.stderr, "");
    }
}
