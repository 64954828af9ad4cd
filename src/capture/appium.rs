//! Appium HTTP driver.
//!
//! Implements the three diagnostics commands against a running Appium
//! session using the W3C WebDriver wire format. Binary payloads travel as
//! base64 strings in the `value` field of the response.

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::debug;

use super::driver::{DeviceDriver, DriverError, DriverResult};
use super::types::{Platform, RecordingConfig};
use crate::config;

/// Driver bound to one Appium session
#[derive(Debug, Clone)]
pub struct AppiumDriver {
    client: reqwest::Client,
    base_url: String,
    session_id: String,
    platform: Option<Platform>,
}

impl AppiumDriver {
    /// Create a driver using the configured HTTP timeout
    pub fn new(
        base_url: impl Into<String>,
        session_id: impl Into<String>,
        platform: Option<Platform>,
    ) -> DriverResult<Self> {
        let timeout = Duration::from_secs(config::get().driver.http_timeout);
        Self::with_timeout(base_url, session_id, platform, timeout)
    }

    pub fn with_timeout(
        base_url: impl Into<String>,
        session_id: impl Into<String>,
        platform: Option<Platform>,
        timeout: Duration,
    ) -> DriverResult<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            session_id: session_id.into(),
            platform,
        })
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// URL of a session-scoped endpoint
    pub fn session_url(&self, path: &str) -> String {
        format!(
            "{}/session/{}/{}",
            self.base_url.trim_end_matches('/'),
            self.session_id,
            path.trim_start_matches('/')
        )
    }

    /// Send a request and unwrap the `value` field of the response
    async fn execute(&self, request: reqwest::RequestBuilder) -> DriverResult<Value> {
        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;
        let body: Option<Value> = serde_json::from_str(&text).ok();

        if !status.is_success() {
            return Err(protocol_error(status.as_u16(), body.as_ref(), &text));
        }

        let body = body.ok_or_else(|| {
            DriverError::InvalidResponse(format!("expected JSON body, got {} bytes", text.len()))
        })?;
        Ok(body.get("value").cloned().unwrap_or(Value::Null))
    }
}

#[async_trait]
impl DeviceDriver for AppiumDriver {
    async fn start_recording(&self, config: &RecordingConfig) -> DriverResult<()> {
        let url = self.session_url("appium/start_recording_screen");
        debug!(%url, options = %config.options(), "starting screen recording");
        self.execute(self.client.post(url).json(&json!({ "options": config.options() })))
            .await?;
        Ok(())
    }

    async fn stop_recording(&self) -> DriverResult<Vec<u8>> {
        let url = self.session_url("appium/stop_recording_screen");
        let value = self
            .execute(self.client.post(url).json(&json!({ "options": {} })))
            .await?;
        decode_base64_value(&value)
    }

    async fn take_screenshot(&self) -> DriverResult<Vec<u8>> {
        let url = self.session_url("screenshot");
        let value = self.execute(self.client.get(url)).await?;
        decode_base64_value(&value)
    }

    fn platform(&self) -> Option<Platform> {
        self.platform
    }
}

fn protocol_error(status: u16, body: Option<&Value>, raw: &str) -> DriverError {
    let detail = body.and_then(|b| b.get("value"));
    let field = |name: &str| {
        detail
            .and_then(|d| d.get(name))
            .and_then(Value::as_str)
            .map(str::to_string)
    };
    DriverError::Protocol {
        status,
        error: field("error").unwrap_or_else(|| "unknown error".to_string()),
        message: field("message").unwrap_or_else(|| raw.trim().to_string()),
    }
}

/// Decode a base64 `value`; `null` and the empty string mean no payload
pub fn decode_base64_value(value: &Value) -> DriverResult<Vec<u8>> {
    let encoded = match value {
        Value::Null => return Ok(Vec::new()),
        Value::String(s) => s,
        other => {
            return Err(DriverError::InvalidResponse(format!(
                "expected base64 string, got {}",
                other
            )));
        }
    };
    let cleaned: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
    Ok(STANDARD.decode(cleaned)?)
}
