//! Runner configuration
//!
//! Configuration for the harness, loaded from `yematch.yaml`:
//!
//! ```yaml
//! data_root: data
//! golden_dir: golden
//!
//! ready:
//!   host: ready.qa.internal
//!   user: yerunner
//!   ssh_options: ["-o", "BatchMode=yes"]
//!   scramble: latest
//!
//! smart:
//!   base_url: https://ps.qa.internal:8443
//!   impersonation: Executive-Administrator
//!   retry:
//!     max_attempts: 3
//! ```
//!
//! `YEMATCH_SMART_URL`, `YEMATCH_SMART_TOKEN` and `YEMATCH_READY_HOST` override
//! the file.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::loader::LoadError;

pub const CONFIG_FILE: &str = "yematch.yaml";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// Parent of the per-run data directories
    #[serde(default = "default_data_root")]
    pub data_root: PathBuf,

    /// Baseline `run.txt` and golden artifacts
    #[serde(default = "default_golden_dir")]
    pub golden_dir: PathBuf,

    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval_secs: u64,

    #[serde(default)]
    pub ready: ReadyConfig,

    #[serde(default)]
    pub smart: SmartConfig,
}

fn default_data_root() -> PathBuf {
    PathBuf::from("data")
}

fn default_golden_dir() -> PathBuf {
    PathBuf::from("golden")
}

fn default_heartbeat_interval() -> u64 {
    15
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            data_root: default_data_root(),
            golden_dir: default_golden_dir(),
            heartbeat_interval_secs: default_heartbeat_interval(),
            ready: ReadyConfig::default(),
            smart: SmartConfig::default(),
        }
    }
}

/// Which obfuscated dataset R00 rebuilds READY from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scramble {
    /// The job's built-in schema
    Classic,
    /// The PROFITSHARE schema
    #[default]
    Latest,
}

impl Scramble {
    pub fn build_args(&self) -> Option<&'static str> {
        match self {
            Scramble::Classic => None,
            Scramble::Latest => Some("profitshare"),
        }
    }
}

/// Connection and job-control settings for READY
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadyConfig {
    #[serde(default)]
    pub host: String,

    #[serde(default)]
    pub user: Option<String>,

    #[serde(default)]
    pub port: Option<u16>,

    /// ssh client, resolved through `PATH` when not absolute
    #[serde(default = "default_ssh_binary")]
    pub ssh_binary: String,

    #[serde(default)]
    pub ssh_options: Vec<String>,

    /// Template rendered with `job` and `args`
    #[serde(default = "default_job_command")]
    pub job_command: String,

    #[serde(default = "default_completion_marker")]
    pub completion_marker: String,

    #[serde(default = "default_no_op_marker")]
    pub no_op_marker: String,

    /// Directory the batch jobs spool their reports into
    #[serde(default = "default_report_dir")]
    pub report_dir: String,

    #[serde(default = "default_reseed_command")]
    pub reseed_command: String,

    #[serde(default)]
    pub scramble: Scramble,
}

fn default_ssh_binary() -> String {
    "ssh".to_string()
}

fn default_job_command() -> String {
    "EJR {{job}}{{#if args}} {{args}}{{/if}}".to_string()
}

fn default_completion_marker() -> String {
    "EJR COMPLETED".to_string()
}

fn default_no_op_marker() -> String {
    "NOTHING TO PROCESS".to_string()
}

fn default_report_dir() -> String {
    "/PVTSYSOUT".to_string()
}

fn default_reseed_command() -> String {
    "EJR YE-BUILD-DB profitshare".to_string()
}

impl Default for ReadyConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            user: None,
            port: None,
            ssh_binary: default_ssh_binary(),
            ssh_options: Vec::new(),
            job_command: default_job_command(),
            completion_marker: default_completion_marker(),
            no_op_marker: default_no_op_marker(),
            report_dir: default_report_dir(),
            reseed_command: default_reseed_command(),
            scramble: Scramble::default(),
        }
    }
}

impl ReadyConfig {
    /// `user@host` or just `host`
    pub fn destination(&self) -> String {
        match &self.user {
            Some(user) => format!("{}@{}", user, self.host),
            None => self.host.clone(),
        }
    }
}

/// HTTP settings for SMART
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmartConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Default headers to include in all requests
    #[serde(default)]
    pub headers: HashMap<String, String>,

    /// Year-end endpoints can run for a long time
    #[serde(default = "default_smart_timeout")]
    pub timeout_ms: u64,

    #[serde(default)]
    pub token: Option<String>,

    /// Role sent in the impersonation header when a call names none
    #[serde(default = "default_impersonation")]
    pub impersonation: Option<String>,

    #[serde(default = "default_impersonation_header")]
    pub impersonation_header: String,

    pub retry: Option<RetryConfig>,

    #[serde(default = "default_validate_ssl")]
    pub validate_ssl: bool,

    #[serde(default = "default_profit_year")]
    pub profit_year: u16,
}

fn default_base_url() -> String {
    "https://localhost:8443".to_string()
}

fn default_smart_timeout() -> u64 {
    2 * 60 * 60 * 1000
}

fn default_impersonation() -> Option<String> {
    Some("Executive-Administrator".to_string())
}

fn default_impersonation_header() -> String {
    "impersonation".to_string()
}

fn default_validate_ssl() -> bool {
    true
}

fn default_profit_year() -> u16 {
    2024
}

impl Default for SmartConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            headers: HashMap::new(),
            timeout_ms: default_smart_timeout(),
            token: None,
            impersonation: default_impersonation(),
            impersonation_header: default_impersonation_header(),
            retry: None,
            validate_ssl: default_validate_ssl(),
            profit_year: default_profit_year(),
        }
    }
}

/// Retry configuration for SMART requests
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of attempts
    #[serde(default = "default_max_retries")]
    pub max_attempts: u32,

    /// Initial delay between retries in milliseconds
    #[serde(default = "default_retry_initial_delay")]
    pub initial_delay: u64,

    /// Maximum delay between retries in milliseconds
    #[serde(default = "default_retry_max_delay")]
    pub max_delay: u64,

    /// HTTP status codes that should trigger a retry
    #[serde(default = "default_retry_status_codes")]
    pub retry_on_status: Vec<u16>,
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_initial_delay() -> u64 {
    1000
}

fn default_retry_max_delay() -> u64 {
    10000
}

fn default_retry_status_codes() -> Vec<u16> {
    vec![429, 500, 502, 503, 504]
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_retries(),
            initial_delay: default_retry_initial_delay(),
            max_delay: default_retry_max_delay(),
            retry_on_status: default_retry_status_codes(),
        }
    }
}

impl RunnerConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let config: RunnerConfig = serde_yaml::from_str(&content).map_err(|e| LoadError::Yaml {
            file: path.display().to_string(),
            error: e,
        })?;
        config.validate().map_err(|message| LoadError::Config {
            file: path.display().to_string(),
            message,
        })?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), String> {
        if self.heartbeat_interval_secs == 0 {
            return Err("heartbeat_interval_secs must be at least 1".to_string());
        }
        if self.smart.retry.as_ref().is_some_and(|r| r.max_attempts == 0) {
            return Err("smart.retry.max_attempts must be at least 1".to_string());
        }
        Ok(())
    }

    /// Load the explicit path, else `./yematch.yaml` when present, else defaults.
    /// Environment overrides are applied in every case.
    pub fn discover(explicit: Option<&Path>) -> Result<Self, LoadError> {
        let mut config = match explicit {
            Some(path) => Self::load(path)?,
            None if Path::new(CONFIG_FILE).is_file() => Self::load(CONFIG_FILE)?,
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("YEMATCH_SMART_URL") {
            self.smart.base_url = url;
        }
        if let Some(token) = lookup("YEMATCH_SMART_TOKEN") {
            self.smart.token = Some(token);
        }
        if let Some(host) = lookup("YEMATCH_READY_HOST") {
            self.ready.host = host;
        }
    }
}
