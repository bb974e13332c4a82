//! Push notification delivery
//!
//! Provides a unified interface over push providers:
//! - FCM HTTP v1 (one request per device token)
//! - An in-process mock used by tests and local runs

use crate::config::{PushConfig, PushProvider};
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Notification payload shared by every token of a multicast
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PushMessage {
    pub title: String,
    pub body: String,
    pub link: String,
}

/// Why delivery to a single token failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushErrorCode {
    /// The provider rejected the token as malformed
    InvalidToken,
    /// The token was valid once but the app instance is gone
    Unregistered,
    /// Anything else; the token is kept
    Other(String),
}

impl PushErrorCode {
    /// Tokens failing with these codes will never succeed again
    pub fn is_permanent(&self) -> bool {
        matches!(self, PushErrorCode::InvalidToken | PushErrorCode::Unregistered)
    }
}

/// Result of delivering to one token
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    Delivered,
    Failed(PushErrorCode),
}

/// Trait for push delivery
#[async_trait]
pub trait PushSender: Send + Sync {
    /// Send one message to many tokens. The returned outcomes are in token
    /// order. An `Err` means nothing could be attempted at all.
    async fn send_multicast(&self, tokens: &[String], message: &PushMessage) -> Result<Vec<SendOutcome>>;

    /// Provider name for logs
    fn provider_name(&self) -> &str;
}

/// FCM HTTP v1 client
pub struct FcmPushSender {
    client: reqwest::Client,
    project_id: String,
    access_token: String,
    base_url: String,
}

#[derive(Serialize)]
struct FcmRequest<'a> {
    message: FcmMessage<'a>,
}

#[derive(Serialize)]
struct FcmMessage<'a> {
    token: &'a str,
    notification: FcmNotification<'a>,
    webpush: FcmWebpush<'a>,
}

#[derive(Serialize)]
struct FcmNotification<'a> {
    title: &'a str,
    body: &'a str,
}

#[derive(Serialize)]
struct FcmWebpush<'a> {
    fcm_options: FcmOptions<'a>,
}

#[derive(Serialize)]
struct FcmOptions<'a> {
    link: &'a str,
}

#[derive(Deserialize)]
struct FcmErrorResponse {
    error: FcmErrorBody,
}

#[derive(Deserialize)]
struct FcmErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: String,
    #[serde(default)]
    details: Vec<FcmErrorDetail>,
}

#[derive(Deserialize)]
struct FcmErrorDetail {
    #[serde(rename = "errorCode", default)]
    error_code: Option<String>,
}

impl FcmPushSender {
    pub fn new(config: &PushConfig) -> Result<Self> {
        let project_id = config.project_id.clone().ok_or_else(|| AppError::Configuration {
            message: "push.project_id is required for the fcm provider".to_string(),
        })?;
        let access_token = config.access_token.clone().ok_or_else(|| AppError::Configuration {
            message: "push.access_token is required for the fcm provider".to_string(),
        })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            project_id,
            access_token,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn send_one(&self, token: &str, message: &PushMessage) -> SendOutcome {
        let url = format!("{}/v1/projects/{}/messages:send", self.base_url, self.project_id);

        let request = FcmRequest {
            message: FcmMessage {
                token,
                notification: FcmNotification {
                    title: &message.title,
                    body: &message.body,
                },
                webpush: FcmWebpush {
                    fcm_options: FcmOptions { link: &message.link },
                },
            },
        };

        let response = match self
            .client
            .post(&url)
            .bearer_auth(&self.access_token)
            .json(&request)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => return SendOutcome::Failed(PushErrorCode::Other(e.to_string())),
        };

        if response.status().is_success() {
            return SendOutcome::Delivered;
        }

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        SendOutcome::Failed(classify_fcm_error(status.as_u16(), &body))
    }
}

/// Map an FCM v1 error response onto a per-token error code
pub fn classify_fcm_error(http_status: u16, body: &str) -> PushErrorCode {
    let Ok(parsed) = serde_json::from_str::<FcmErrorResponse>(body) else {
        return PushErrorCode::Other(format!("HTTP {}", http_status));
    };
    let error = parsed.error;

    let detail_code = error.details.iter().find_map(|d| d.error_code.as_deref());

    if detail_code == Some("UNREGISTERED") || error.status == "UNREGISTERED" {
        return PushErrorCode::Unregistered;
    }

    let invalid_argument = detail_code == Some("INVALID_ARGUMENT") || error.status == "INVALID_ARGUMENT";
    if invalid_argument && error.message.to_lowercase().contains("registration token") {
        return PushErrorCode::InvalidToken;
    }

    let code = detail_code.unwrap_or(error.status.as_str());
    if code.is_empty() {
        PushErrorCode::Other(format!("HTTP {}", http_status))
    } else {
        PushErrorCode::Other(code.to_string())
    }
}

#[async_trait]
impl PushSender for FcmPushSender {
    async fn send_multicast(&self, tokens: &[String], message: &PushMessage) -> Result<Vec<SendOutcome>> {
        let sends = tokens.iter().map(|token| self.send_one(token, message));
        Ok(join_all(sends).await)
    }

    fn provider_name(&self) -> &str {
        "fcm"
    }
}

/// Mock sender for testing. Records every multicast; tokens can be marked
/// invalid, unregistered or transiently failing.
#[derive(Default)]
pub struct MockPushSender {
    invalid: HashSet<String>,
    unregistered: HashSet<String>,
    flaky: HashSet<String>,
    unavailable: bool,
    sent: Mutex<Vec<(Vec<String>, PushMessage)>>,
}

impl MockPushSender {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_invalid(mut self, token: &str) -> Self {
        self.invalid.insert(token.to_string());
        self
    }

    pub fn with_unregistered(mut self, token: &str) -> Self {
        self.unregistered.insert(token.to_string());
        self
    }

    /// Token fails with a non-permanent error
    pub fn with_flaky(mut self, token: &str) -> Self {
        self.flaky.insert(token.to_string());
        self
    }

    /// Every multicast fails before any token is attempted
    pub fn unavailable(mut self) -> Self {
        self.unavailable = true;
        self
    }

    /// Multicasts received so far
    pub fn sent(&self) -> Vec<(Vec<String>, PushMessage)> {
        self.sent.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }
}

#[async_trait]
impl PushSender for MockPushSender {
    async fn send_multicast(&self, tokens: &[String], message: &PushMessage) -> Result<Vec<SendOutcome>> {
        if self.unavailable {
            return Err(AppError::PushService {
                message: "mock push service unavailable".to_string(),
            });
        }

        self.sent
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push((tokens.to_vec(), message.clone()));

        Ok(tokens
            .iter()
            .map(|token| {
                if self.invalid.contains(token) {
                    SendOutcome::Failed(PushErrorCode::InvalidToken)
                } else if self.unregistered.contains(token) {
                    SendOutcome::Failed(PushErrorCode::Unregistered)
                } else if self.flaky.contains(token) {
                    SendOutcome::Failed(PushErrorCode::Other("UNAVAILABLE".to_string()))
                } else {
                    SendOutcome::Delivered
                }
            })
            .collect())
    }

    fn provider_name(&self) -> &str {
        "mock"
    }
}

/// Create a push sender based on configuration
pub fn create_push_sender(config: &PushConfig) -> Result<Arc<dyn PushSender>> {
    match config.provider {
        PushProvider::Fcm => Ok(Arc::new(FcmPushSender::new(config)?)),
        PushProvider::Mock => {
            tracing::warn!("Using mock push sender; notifications are not delivered");
            Ok(Arc::new(MockPushSender::new()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message() -> PushMessage {
        PushMessage {
            title: "Overdue Tenant Balances".into(),
            body: "You have 1 tenant(s) with overdue balances: Jane.".into(),
            link: "/payments".into(),
        }
    }

    #[test]
    fn test_classify_unregistered() {
        let body = r#"{"error":{"code":404,"message":"Requested entity was not found.","status":"NOT_FOUND",
            "details":[{"@type":"type.googleapis.com/google.firebase.fcm.v1.FcmError","errorCode":"UNREGISTERED"}]}}"#;
        assert_eq!(classify_fcm_error(404, body), PushErrorCode::Unregistered);
    }

    #[test]
    fn test_classify_invalid_token() {
        let body = r#"{"error":{"code":400,"message":"The registration token is not a valid FCM registration token","status":"INVALID_ARGUMENT",
            "details":[{"@type":"type.googleapis.com/google.firebase.fcm.v1.FcmError","errorCode":"INVALID_ARGUMENT"}]}}"#;
        assert_eq!(classify_fcm_error(400, body), PushErrorCode::InvalidToken);
    }

    #[test]
    fn test_classify_other_errors_are_kept() {
        let body = r#"{"error":{"code":400,"message":"Invalid JSON payload","status":"INVALID_ARGUMENT"}}"#;
        let code = classify_fcm_error(400, body);
        assert_eq!(code, PushErrorCode::Other("INVALID_ARGUMENT".into()));
        assert!(!code.is_permanent());

        assert_eq!(classify_fcm_error(503, "oops"), PushErrorCode::Other("HTTP 503".into()));
    }

    #[tokio::test]
    async fn test_mock_outcomes_in_token_order() {
        let sender = MockPushSender::new().with_invalid("bad").with_flaky("slow");
        let tokens = vec!["good".to_string(), "bad".to_string(), "slow".to_string()];

        let outcomes = sender.send_multicast(&tokens, &message()).await.unwrap();
        assert_eq!(outcomes[0], SendOutcome::Delivered);
        assert_eq!(outcomes[1], SendOutcome::Failed(PushErrorCode::InvalidToken));
        assert!(matches!(outcomes[2], SendOutcome::Failed(PushErrorCode::Other(_))));
        assert_eq!(sender.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_mock_unavailable() {
        let sender = MockPushSender::new().unavailable();
        let err = sender.send_multicast(&["t".into()], &message()).await.unwrap_err();
        assert!(matches!(err, AppError::PushService { .. }));
        assert!(sender.sent().is_empty());
    }

    #[test]
    fn test_fcm_requires_credentials() {
        let config = PushConfig {
            provider: PushProvider::Fcm,
            project_id: None,
            ..PushConfig::default()
        };
        assert!(matches!(create_push_sender(&config), Err(AppError::Configuration { .. })));
    }
}
