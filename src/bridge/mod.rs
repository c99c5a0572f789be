//! Bridge modules for the two systems under comparison
//!
//! This module provides the remote collaborators the engine talks to:
//! - `ssh`: READY, the legacy batch system, reached over a persistent remote shell
//! - `web`: SMART, the modern system, reached over its HTTP API
//!
//! The engine only depends on the traits defined here so activities can be
//! exercised against in-memory fakes.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub mod ssh;
pub mod web;

pub use ssh::SshBridge;
pub use web::SmartApiBridge;

/// Common error type for bridge operations
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("Failed to start session: {0}")]
    StartupFailed(String),

    #[error("Session disconnected")]
    Disconnected,

    #[error("Request timed out")]
    Timeout,

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Unsupported method: {0}")]
    UnsupportedMethod(String),

    #[error("HTTP error: {status} - {message}")]
    HttpError { status: u16, message: String },

    #[error("Remote file not found: {0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Text captured from one command submitted to a remote shell
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShellOutput {
    pub stdout: String,
    pub stderr: String,
    /// Exit status reported by the remote side, `None` when it never reported one
    pub exit_code: Option<i32>,
}

impl ShellOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// One call against the SMART HTTP interface
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiRequest {
    pub method: String,
    pub path: String,
    #[serde(default)]
    pub query: Vec<(String, String)>,
    #[serde(default)]
    pub body: Option<Value>,
    /// Role to impersonate for this call, overriding the configured default
    #[serde(default)]
    pub role: Option<String>,
}

impl ApiRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: "GET".to_string(),
            path: path.into(),
            query: Vec::new(),
            body: None,
            role: None,
        }
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self {
            method: "POST".to_string(),
            path: path.into(),
            query: Vec::new(),
            body: Some(body),
            role: None,
        }
    }

    pub fn query(mut self, key: &str, value: impl ToString) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    pub fn as_role(mut self, role: &str) -> Self {
        self.role = Some(role.to_string());
        self
    }

    /// `GET api/x` style label used in outcome messages
    pub fn label(&self) -> String {
        format!("{} {}", self.method, self.path)
    }
}

/// API response from HTTP requests
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
    pub elapsed_ms: u64,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Build identifiers reported by SMART
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppVersion {
    #[serde(default)]
    pub build_number: String,
    #[serde(default)]
    pub short_git_hash: String,
}

/// A shell session that accepts one command line at a time
#[async_trait]
pub trait RemoteShell: Send + Sync {
    /// Submit a command and wait until the remote side reports it finished
    async fn submit(&self, command: &str) -> Result<ShellOutput, BridgeError>;
}

/// Get-by-path access to the legacy file store
#[async_trait]
pub trait RemoteFileStore: Send + Sync {
    async fn fetch(&self, path: &str) -> Result<Vec<u8>, BridgeError>;
}

/// Typed access to the SMART HTTP interface
#[async_trait]
pub trait SmartApi: Send + Sync {
    /// Connectivity check, invoked once per run
    async fn app_version(&self) -> Result<AppVersion, BridgeError>;

    async fn invoke(&self, request: &ApiRequest) -> Result<ApiResponse, BridgeError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_builders() {
        let req = ApiRequest::get("api/yearend/wages-current-year")
            .query("profitYear", 2024)
            .as_role("Finance-Manager");
        assert_eq!(req.method, "GET");
        assert_eq!(req.query, vec![("profitYear".to_string(), "2024".to_string())]);
        assert_eq!(req.role.as_deref(), Some("Finance-Manager"));
        assert_eq!(req.label(), "GET api/yearend/wages-current-year");

        let req = ApiRequest::post("api/yearend/final", json!({"profitYear": 2024}));
        assert_eq!(req.body, Some(json!({"profitYear": 2024})));
    }

    #[test]
    fn test_response_success_range() {
        let mut resp = ApiResponse {
            status: 200,
            body: Value::Null,
            elapsed_ms: 1,
        };
        assert!(resp.is_success());
        resp.status = 204;
        assert!(resp.is_success());
        resp.status = 404;
        assert!(!resp.is_success());
    }

    #[test]
    fn test_app_version_parses_camel_case() {
        let v: AppVersion =
            serde_json::from_value(json!({"buildNumber": "1.4.2", "shortGitHash": "abc123"}))
                .unwrap();
        assert_eq!(v.build_number, "1.4.2");
        assert_eq!(v.short_git_hash, "abc123");
    }

    #[test]
    fn test_shell_output_success() {
        let out = ShellOutput {
            exit_code: Some(0),
            ..Default::default()
        };
        assert!(out.success());
        assert!(!ShellOutput::default().success());
    }
}
