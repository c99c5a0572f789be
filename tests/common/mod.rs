#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use yematch::bridge::{
    ApiRequest, ApiResponse, AppVersion, BridgeError, RemoteFileStore, RemoteShell, ShellOutput,
    SmartApi,
};
use yematch::engine::{
    Activity, ActivityKind, Outcome, OutcomeStatus, RunContext, RunLog, SharedBuffer, StopSignal,
};

pub fn create_test_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp directory")
}

pub fn write_definition(dir: &Path, filename: &str, content: &str) {
    fs::write(dir.join(filename), content).expect("Failed to write definition file");
}

/// A context logging into `data_dir`, with the console captured in memory
pub fn test_context(data_dir: &Path) -> (RunContext, SharedBuffer) {
    fs::create_dir_all(data_dir).expect("Failed to create data dir");
    let console = SharedBuffer::new();
    let log = RunLog::with_console(Box::new(console.clone()), data_dir)
        .expect("Failed to create run log");
    (RunContext::new(data_dir, Arc::new(log)), console)
}

/// Activity with a fixed result
pub struct FakeActivity {
    name: String,
    kind: ActivityKind,
    status: OutcomeStatus,
    stdout: String,
    delay: Duration,
    calls: Arc<AtomicUsize>,
    stop_after: Option<StopSignal>,
}

impl FakeActivity {
    pub fn job(name: &str, status: OutcomeStatus) -> Self {
        Self {
            name: name.to_string(),
            kind: ActivityKind::RemoteJob,
            status,
            stdout: String::new(),
            delay: Duration::ZERO,
            calls: Arc::new(AtomicUsize::new(0)),
            stop_after: None,
        }
    }

    pub fn api(name: &str, status: OutcomeStatus) -> Self {
        Self {
            kind: ActivityKind::ApiCall,
            ..Self::job(name, status)
        }
    }

    pub fn with_stdout(mut self, stdout: &str) -> Self {
        self.stdout = stdout.to_string();
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Press the stop key while this activity runs
    pub fn stopping(mut self, signal: StopSignal) -> Self {
        self.stop_after = Some(signal);
        self
    }

    pub fn calls(&self) -> Arc<AtomicUsize> {
        self.calls.clone()
    }

    pub fn into_arc(self) -> Arc<dyn Activity> {
        Arc::new(self)
    }
}

#[async_trait]
impl Activity for FakeActivity {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ActivityKind {
        self.kind
    }

    async fn execute(&self, signal: &StopSignal) -> Outcome {
        if signal.is_cancelled() {
            return Outcome::cancelled(&self.name);
        }
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if let Some(stop) = &self.stop_after {
            stop.request_stop();
        }
        Outcome::new(&self.name, self.status, "")
            .with_output(self.stdout.clone(), "")
            .with_took(self.delay)
    }
}

/// Remote file store backed by a map, recording every path requested
#[derive(Default)]
pub struct MemoryStore {
    files: HashMap<String, Vec<u8>>,
    requests: Mutex<Vec<String>>,
}

impl MemoryStore {
    pub fn with_file(mut self, path: &str, content: &str) -> Self {
        self.files.insert(path.to_string(), content.as_bytes().to_vec());
        self
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl RemoteFileStore for MemoryStore {
    async fn fetch(&self, path: &str) -> Result<Vec<u8>, BridgeError> {
        self.requests.lock().unwrap().push(path.to_string());
        self.files
            .get(path)
            .cloned()
            .ok_or_else(|| BridgeError::NotFound(path.to_string()))
    }
}

/// Remote shell that replays canned output by command
#[derive(Default)]
pub struct ScriptedShell {
    replies: HashMap<String, ShellOutput>,
    submitted: Mutex<Vec<String>>,
}

impl ScriptedShell {
    pub fn reply(mut self, command: &str, stdout: &str, exit_code: i32) -> Self {
        self.replies.insert(
            command.to_string(),
            ShellOutput {
                stdout: stdout.to_string(),
                stderr: String::new(),
                exit_code: Some(exit_code),
            },
        );
        self
    }

    pub fn submitted(&self) -> Vec<String> {
        self.submitted.lock().unwrap().clone()
    }
}

#[async_trait]
impl RemoteShell for ScriptedShell {
    async fn submit(&self, command: &str) -> Result<ShellOutput, BridgeError> {
        self.submitted.lock().unwrap().push(command.to_string());
        self.replies
            .get(command)
            .cloned()
            .ok_or(BridgeError::Disconnected)
    }
}

/// SMART stand-in answering every call with the same status
pub struct StubApi {
    pub reachable: bool,
    pub status: u16,
}

#[async_trait]
impl SmartApi for StubApi {
    async fn app_version(&self) -> Result<AppVersion, BridgeError> {
        if self.reachable {
            Ok(AppVersion {
                build_number: "1234".to_string(),
                short_git_hash: "abc1234".to_string(),
            })
        } else {
            Err(BridgeError::Disconnected)
        }
    }

    async fn invoke(&self, _request: &ApiRequest) -> Result<ApiResponse, BridgeError> {
        if !self.reachable {
            return Err(BridgeError::Disconnected);
        }
        Ok(ApiResponse {
            status: self.status,
            body: serde_json::json!({ "results": [] }),
            elapsed_ms: 1,
        })
    }
}
