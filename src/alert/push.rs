/// Remote push relay client
///
/// The relay owns device tokens and fan-out; this service only registers a
/// device and asks for test broadcasts. Responses are never interpreted
/// beyond diagnostic display.
///
/// Endpoints (relative to the configured base URL):
///   POST {base}/register   { token, device }
///   POST {base}/send-test  { title, body }

use serde::{Deserialize, Serialize};
use std::time::Duration;

// ============================================================================
// Payloads
// ============================================================================

/// Device metadata sent alongside a push token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    pub platform: String,
    pub model_name: Option<String>,
    pub os_version: Option<String>,
}

#[derive(Debug, Serialize)]
struct RegisterRequest<'a> {
    token: &'a str,
    device: &'a DeviceInfo,
}

#[derive(Debug, Serialize)]
struct BroadcastRequest<'a> {
    title: &'a str,
    body: &'a str,
}

/// Diagnostic summary returned by the relay after a broadcast.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct PushReport {
    pub success: bool,
    pub message: String,
    pub total_tokens: u32,
    pub valid_tokens: u32,
    pub sent: u32,
}

impl std::fmt::Display for PushReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {} | tokens: {} | valid: {} | sent: {}",
            if self.success { "✓" } else { "✗" },
            self.message,
            self.total_tokens,
            self.valid_tokens,
            self.sent
        )
    }
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, PartialEq)]
pub enum PushError {
    /// Non-2xx HTTP response from the relay.
    HttpError(u16),
    /// The request never produced a response.
    Transport(String),
    /// The relay answered with something other than a report.
    ParseError(String),
}

impl std::fmt::Display for PushError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PushError::HttpError(code) => write!(f, "HTTP error: {}", code),
            PushError::Transport(msg) => write!(f, "Transport error: {}", msg),
            PushError::ParseError(msg) => write!(f, "Parse error: {}", msg),
        }
    }
}

impl std::error::Error for PushError {}

// ============================================================================
// Transport
// ============================================================================

pub trait PushTransport {
    fn register(&self, token: &str, device: &DeviceInfo) -> Result<(), PushError>;
    fn broadcast(&self, title: &str, body: &str) -> Result<PushReport, PushError>;
}

/// JSON-over-HTTPS relay client.
pub struct HttpPushTransport {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl HttpPushTransport {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, PushError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PushError::Transport(e.to_string()))?;

        Ok(HttpPushTransport {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    fn post<T: Serialize>(&self, path: &str, payload: &T) -> Result<String, PushError> {
        let response = self
            .client
            .post(self.endpoint(path))
            .json(payload)
            .send()
            .map_err(|e| PushError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(PushError::HttpError(response.status().as_u16()));
        }

        response.text().map_err(|e| PushError::Transport(e.to_string()))
    }
}

impl PushTransport for HttpPushTransport {
    fn register(&self, token: &str, device: &DeviceInfo) -> Result<(), PushError> {
        self.post("register", &RegisterRequest { token, device })?;
        Ok(())
    }

    fn broadcast(&self, title: &str, body: &str) -> Result<PushReport, PushError> {
        let text = self.post("send-test", &BroadcastRequest { title, body })?;
        parse_push_report(&text)
    }
}

/// Decodes the relay's broadcast summary. Missing fields default to zero.
pub fn parse_push_report(body: &str) -> Result<PushReport, PushError> {
    serde_json::from_str(body).map_err(|e| PushError::ParseError(e.to_string()))
}

// ============================================================================
// Tests
// ============================================================================
