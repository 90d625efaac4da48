//! Delivery of one notification to one device through the FCM HTTP v1 API.
//!
//! Every failure mode is folded into a [`Classification`]; a delivery never
//! returns an error to its caller, so one bad token cannot abort a batch.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize, Serializer};

use crate::error::DeliveryError;

/// Outcome tag of a single delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Classification {
    /// Gateway accepted the message (HTTP 2xx)
    Success,
    /// Transport-level failure: connection, timeout, unreadable response
    SendError,
    /// Non-2xx response without any error code in the body
    UnknownError,
    /// Non-2xx response carrying an FCM error code (e.g. `UNREGISTERED`) or
    /// the coarse RPC status (e.g. `INVALID_ARGUMENT`)
    Gateway(String),
}

impl Classification {
    pub fn as_str(&self) -> &str {
        match self {
            Classification::Success => "SUCCESS",
            Classification::SendError => "SEND_ERROR",
            Classification::UnknownError => "UNKNOWN_ERROR",
            Classification::Gateway(code) => code,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Classification::Success)
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Classification {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Classification of one token, as reported back to the webhook caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeliveryOutcome {
    pub token: String,
    #[serde(rename = "status")]
    pub classification: Classification,
    /// HTTP status returned by the gateway, if a response was received
    #[serde(skip)]
    pub http_status: Option<u16>,
}

impl DeliveryOutcome {
    pub fn new(token: impl Into<String>, classification: Classification) -> Self {
        Self {
            token: token.into(),
            classification,
            http_status: None,
        }
    }

    pub fn with_http_status(mut self, status: u16) -> Self {
        self.http_status = Some(status);
        self
    }

    /// The gateway rejected our bearer token.
    pub fn is_unauthorized(&self) -> bool {
        self.http_status == Some(401)
    }
}

/// What gets shown on the device.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

impl PushPayload {
    pub fn new(title: Option<String>, body: Option<String>) -> Self {
        Self { title, body }
    }
}

/// A push gateway that can deliver to a single device token.
#[async_trait]
pub trait PushGateway: Send + Sync {
    /// Perform exactly one delivery attempt and classify its outcome.
    async fn deliver(
        &self,
        token: &str,
        payload: &PushPayload,
        credential: &str,
    ) -> DeliveryOutcome;
}

/// FCM HTTP v1 request body.
#[derive(Debug, Serialize)]
struct FcmMessage<'a> {
    message: FcmMessageContent<'a>,
}

#[derive(Debug, Serialize)]
struct FcmMessageContent<'a> {
    token: &'a str,
    notification: &'a PushPayload,
}

/// Classify a gateway response from its status and JSON body.
///
/// 2xx is `SUCCESS`. Otherwise the first non-empty `errorCode` in
/// `error.details` wins, then a non-empty `error.status`, then
/// `UNKNOWN_ERROR`, e.g.
/// `{"error": {"status": "NOT_FOUND", "details": [{"errorCode": "UNREGISTERED"}]}}`.
/// Fields of an unexpected shape are skipped individually.
pub fn classify_response(status: u16, body: &serde_json::Value) -> Classification {
    if (200..300).contains(&status) {
        return Classification::Success;
    }

    let non_empty = |v: &serde_json::Value| {
        v.as_str()
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };

    let error_code = body
        .pointer("/error/details")
        .and_then(serde_json::Value::as_array)
        .and_then(|details| {
            details
                .iter()
                .find_map(|d| d.get("errorCode").and_then(non_empty))
        });

    error_code
        .or_else(|| body.pointer("/error/status").and_then(non_empty))
        .map(Classification::Gateway)
        .unwrap_or(Classification::UnknownError)
}

/// `PushGateway` backed by `https://fcm.googleapis.com/v1/projects/{id}/messages:send`.
pub struct FcmGateway {
    send_url: String,
    http: reqwest::Client,
}

impl FcmGateway {
    pub fn new(
        base_url: &str,
        project_id: &str,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            send_url: format!(
                "{}/v1/projects/{}/messages:send",
                base_url.trim_end_matches('/'),
                project_id
            ),
            http,
        })
    }

    pub fn send_url(&self) -> &str {
        &self.send_url
    }

    async fn send(
        &self,
        token: &str,
        payload: &PushPayload,
        credential: &str,
    ) -> Result<(u16, serde_json::Value), DeliveryError> {
        let message = FcmMessage {
            message: FcmMessageContent {
                token,
                notification: payload,
            },
        };

        let response = self
            .http
            .post(&self.send_url)
            .bearer_auth(credential)
            .json(&message)
            .send()
            .await
            .map_err(|e| DeliveryError::Request(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .json::<serde_json::Value>()
            .await
            .map_err(|e| DeliveryError::Response {
                status,
                reason: e.to_string(),
            })?;

        Ok((status, body))
    }
}

#[async_trait]
impl PushGateway for FcmGateway {
    async fn deliver(
        &self,
        token: &str,
        payload: &PushPayload,
        credential: &str,
    ) -> DeliveryOutcome {
        match self.send(token, payload, credential).await {
            Ok((status, body)) => {
                let classification = classify_response(status, &body);
                if !classification.is_success() {
                    tracing::warn!(
                        token = %token,
                        status,
                        error_code = %classification,
                        "FCM rejected message"
                    );
                }
                DeliveryOutcome::new(token, classification).with_http_status(status)
            }
            Err(e) => {
                tracing::error!(token = %token, error = %e, "Error sending FCM message");
                let outcome = DeliveryOutcome::new(token, Classification::SendError);
                match e.http_status() {
                    Some(status) => outcome.with_http_status(status),
                    None => outcome,
                }
            }
        }
    }
}
