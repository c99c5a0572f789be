//! SMART HTTP bridge
//!
//! Executes calls against the modern system directly using reqwest. It supports:
//! - GET, POST, PUT, PATCH, DELETE methods
//! - Bearer token plus a per-call impersonated role
//! - Retry with exponential backoff on retryable status codes. POST and PATCH
//!   change year-end state, so they are only re-sent when the connection was
//!   never established
//! - Default headers from the configuration

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{ApiRequest, ApiResponse, AppVersion, BridgeError, SmartApi};
use crate::runs::config::SmartConfig;

const APP_VERSION_PATH: &str = "api/common/app-version-info";

#[derive(Debug)]
pub struct SmartApiBridge {
    config: SmartConfig,
    client: reqwest::Client,
}

impl SmartApiBridge {
    pub fn new(config: SmartConfig) -> Result<Self, BridgeError> {
        let mut client_builder =
            reqwest::Client::builder().timeout(Duration::from_millis(config.timeout_ms));

        if !config.validate_ssl {
            client_builder = client_builder.danger_accept_invalid_certs(true);
        }

        let client = client_builder
            .build()
            .map_err(|e| BridgeError::StartupFailed(e.to_string()))?;

        Ok(Self { config, client })
    }

    pub fn from_config(config: &SmartConfig) -> Result<Self, BridgeError> {
        Self::new(config.clone())
    }

    fn build_url(&self, path: &str) -> String {
        let base = self.config.base_url.trim_end_matches('/');
        let path = if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{}", path)
        };
        format!("{}{}", base, path)
    }

    fn apply_auth(
        &self,
        mut request: reqwest::RequestBuilder,
        role: Option<&str>,
    ) -> reqwest::RequestBuilder {
        if let Some(token) = &self.config.token {
            request = request.header("Authorization", format!("Bearer {}", token));
        }
        if let Some(role) = role.or(self.config.impersonation.as_deref()) {
            request = request.header(self.config.impersonation_header.as_str(), role);
        }
        request
    }

    fn apply_headers(&self, mut request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        for (key, value) in &self.config.headers {
            request = request.header(key, value);
        }
        request
    }

    fn should_retry(&self, method: &str, status: u16, attempt: u32) -> bool {
        if !is_idempotent(method) {
            return false;
        }
        if let Some(ref retry) = self.config.retry {
            if attempt + 1 < retry.max_attempts {
                return retry.retry_on_status.contains(&status);
            }
        }
        false
    }

    fn get_retry_delay(&self, attempt: u32) -> Duration {
        if let Some(ref retry) = self.config.retry {
            let delay = retry.initial_delay * 2u64.pow(attempt.saturating_sub(1));
            let delay = delay.min(retry.max_delay);
            Duration::from_millis(delay)
        } else {
            Duration::from_millis(1000)
        }
    }

    async fn execute_with_retry(&self, req: &ApiRequest) -> Result<ApiResponse, BridgeError> {
        let url = self.build_url(&req.path);
        let max_attempts = self
            .config
            .retry
            .as_ref()
            .map(|r| r.max_attempts.max(1))
            .unwrap_or(1);

        let mut last_error = None;

        for attempt in 0..max_attempts {
            if attempt > 0 {
                let delay = self.get_retry_delay(attempt);
                warn!(
                    "Retrying {} (attempt {}/{}) after {:?}",
                    req.label(),
                    attempt + 1,
                    max_attempts,
                    delay
                );
                tokio::time::sleep(delay).await;
            }

            let start = std::time::Instant::now();

            let mut request = match req.method.to_uppercase().as_str() {
                "GET" => self.client.get(&url),
                "POST" => self.client.post(&url),
                "PUT" => self.client.put(&url),
                "PATCH" => self.client.patch(&url),
                "DELETE" => self.client.delete(&url),
                _ => return Err(BridgeError::UnsupportedMethod(req.method.clone())),
            };

            if !req.query.is_empty() {
                request = request.query(&req.query);
            }

            request = self.apply_auth(request, req.role.as_deref());
            request = self.apply_headers(request);

            if let Some(ref body_value) = req.body {
                request = request.json(body_value);
            }

            debug!("Executing {} {}", req.method, url);

            match request.send().await {
                Ok(response) => {
                    let status = response.status().as_u16();
                    let elapsed_ms = start.elapsed().as_millis() as u64;

                    if self.should_retry(&req.method, status, attempt) {
                        last_error = Some(BridgeError::HttpError {
                            status,
                            message: format!("Retryable status code: {}", status),
                        });
                        continue;
                    }

                    let body_text = response
                        .text()
                        .await
                        .map_err(|e| BridgeError::ServerError(e.to_string()))?;

                    info!("{} {} -> {} ({}ms)", req.method, url, status, elapsed_ms);

                    return Ok(ApiResponse {
                        status,
                        body: parse_body(body_text),
                        elapsed_ms,
                    });
                }
                Err(e) => {
                    warn!("Request failed: {}", e);

                    if e.is_timeout() {
                        if !is_idempotent(&req.method) {
                            return Err(BridgeError::Timeout);
                        }
                        last_error = Some(BridgeError::Timeout);
                        continue;
                    }
                    if e.is_connect() {
                        last_error = Some(BridgeError::ServerError(e.to_string()));
                        continue;
                    }

                    return Err(BridgeError::ServerError(e.to_string()));
                }
            }
        }

        Err(last_error.unwrap_or_else(|| BridgeError::ServerError("Request failed".to_string())))
    }
}

fn is_idempotent(method: &str) -> bool {
    matches!(
        method.to_uppercase().as_str(),
        "GET" | "HEAD" | "PUT" | "DELETE" | "OPTIONS"
    )
}

fn parse_body(text: String) -> Value {
    if text.trim().is_empty() {
        Value::Null
    } else {
        serde_json::from_str(&text).unwrap_or(Value::String(text))
    }
}

#[async_trait]
impl SmartApi for SmartApiBridge {
    async fn app_version(&self) -> Result<AppVersion, BridgeError> {
        let response = self.execute_with_retry(&ApiRequest::get(APP_VERSION_PATH)).await?;
        if !response.is_success() {
            return Err(BridgeError::HttpError {
                status: response.status,
                message: response.body.to_string(),
            });
        }
        Ok(serde_json::from_value(response.body)?)
    }

    async fn invoke(&self, request: &ApiRequest) -> Result<ApiResponse, BridgeError> {
        self.execute_with_retry(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runs::config::RetryConfig;

    fn make_test_config() -> SmartConfig {
        SmartConfig {
            base_url: "https://smart.example.com".to_string(),
            ..SmartConfig::default()
        }
    }

    #[test]
    fn test_build_url() {
        let bridge = SmartApiBridge::new(make_test_config()).unwrap();

        assert_eq!(
            bridge.build_url("/api/yearend/final"),
            "https://smart.example.com/api/yearend/final"
        );
        assert_eq!(
            bridge.build_url("api/yearend/final"),
            "https://smart.example.com/api/yearend/final"
        );
    }

    #[test]
    fn test_build_url_with_trailing_slash() {
        let mut config = make_test_config();
        config.base_url = "https://smart.example.com/".to_string();
        let bridge = SmartApiBridge::new(config).unwrap();

        assert_eq!(
            bridge.build_url("/api/x"),
            "https://smart.example.com/api/x"
        );
    }

    #[test]
    fn test_no_retry_without_config() {
        let bridge = SmartApiBridge::new(make_test_config()).unwrap();
        assert!(!bridge.should_retry("GET", 503, 0));
    }

    #[test]
    fn test_config_with_retry() {
        let mut config = make_test_config();
        config.retry = Some(RetryConfig::default());
        let bridge = SmartApiBridge::new(config).unwrap();

        assert!(bridge.should_retry("GET", 429, 0));
        assert!(bridge.should_retry("get", 500, 1));
        assert!(!bridge.should_retry("GET", 404, 0));
        // The third attempt is the last one
        assert!(!bridge.should_retry("GET", 500, 2));
    }

    #[test]
    fn test_state_changing_calls_are_not_resent() {
        let mut config = make_test_config();
        config.retry = Some(RetryConfig::default());
        let bridge = SmartApiBridge::new(config).unwrap();

        assert!(!bridge.should_retry("POST", 500, 0));
        assert!(!bridge.should_retry("PATCH", 503, 0));
        assert!(bridge.should_retry("PUT", 503, 0));
        assert!(!is_idempotent("post"));
        assert!(is_idempotent("DELETE"));
    }

    #[tokio::test]
    async fn test_post_timeout_is_not_retried() {
        // Accepts the connection but never answers
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let accepted = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let counter = accepted.clone();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                held.push(socket);
            }
        });

        let config = SmartConfig {
            base_url: format!("http://{}", addr),
            timeout_ms: 200,
            retry: Some(RetryConfig {
                max_attempts: 3,
                initial_delay: 10,
                max_delay: 10,
                retry_on_status: vec![500],
            }),
            ..SmartConfig::default()
        };
        let bridge = SmartApiBridge::new(config).unwrap();

        let err = bridge
            .invoke(&ApiRequest::post("api/yearend/final", serde_json::json!({})))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, BridgeError::Timeout));
        assert_eq!(accepted.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[test]
    fn test_retry_delay_exponential() {
        let mut config = make_test_config();
        config.retry = Some(RetryConfig {
            max_attempts: 5,
            initial_delay: 1000,
            max_delay: 10000,
            retry_on_status: vec![500],
        });
        let bridge = SmartApiBridge::new(config).unwrap();

        assert_eq!(bridge.get_retry_delay(1), Duration::from_millis(1000));
        assert_eq!(bridge.get_retry_delay(2), Duration::from_millis(2000));
        assert_eq!(bridge.get_retry_delay(3), Duration::from_millis(4000));
        assert_eq!(bridge.get_retry_delay(4), Duration::from_millis(8000));
        assert_eq!(bridge.get_retry_delay(5), Duration::from_millis(10000));
    }

    #[test]
    fn test_parse_body() {
        assert_eq!(parse_body(String::new()), Value::Null);
        assert_eq!(parse_body("{\"a\":1}".to_string())["a"], 1);
        assert_eq!(
            parse_body("plain text".to_string()),
            Value::String("plain text".to_string())
        );
    }
}
