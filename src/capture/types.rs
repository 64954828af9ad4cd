// Core types for recording and diagnostics capture

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use super::driver::DriverError;

/// Mobile platform under test
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Android,
    Ios,
}

impl Platform {
    /// Resolve a platform name as it appears in capabilities ("Android", "iOS").
    ///
    /// Anything else (browsers, desktop, empty) has no recording support and
    /// resolves to `None` rather than an error.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "android" => Some(Platform::Android),
            "ios" => Some(Platform::Ios),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Android => "android",
            Platform::Ios => "ios",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Android screen recording options (Appium `mobile: startRecordingScreen`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AndroidRecording {
    /// Video dimensions, e.g. "720x1280"
    pub video_size: String,
    /// Bits per second
    pub bit_rate: u32,
    /// Hard cap in seconds, enforced on the device
    pub time_limit: u32,
}

/// iOS screen recording options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IosRecording {
    /// Codec, e.g. "mpeg4"
    pub video_type: String,
    /// "low", "medium", "high" or "photo"
    pub video_quality: String,
    /// Hard cap in seconds, enforced on the device
    pub time_limit: u32,
}

/// Platform-specific recording configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordingConfig {
    Android(AndroidRecording),
    Ios(IosRecording),
}

impl RecordingConfig {
    pub fn platform(&self) -> Platform {
        match self {
            RecordingConfig::Android(_) => Platform::Android,
            RecordingConfig::Ios(_) => Platform::Ios,
        }
    }

    pub fn time_limit(&self) -> u32 {
        match self {
            RecordingConfig::Android(opts) => opts.time_limit,
            RecordingConfig::Ios(opts) => opts.time_limit,
        }
    }

    /// Recording options keyed by their Appium names
    pub fn options(&self) -> serde_json::Value {
        let value = match self {
            RecordingConfig::Android(opts) => serde_json::to_value(opts),
            RecordingConfig::Ios(opts) => serde_json::to_value(opts),
        };
        // Both option structs are plain strings and integers.
        value.unwrap_or(serde_json::Value::Null)
    }
}

/// Configuration for the diagnostics pipeline
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Recording options used for Android devices
    pub android: AndroidRecording,
    /// Recording options used for iOS devices
    pub ios: IosRecording,
    /// Server log tailed on failure
    pub log_path: PathBuf,
    /// Number of trailing log lines to keep
    pub log_tail_lines: usize,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        crate::config::CaptureSettings::defaults().to_capture_config()
    }
}

impl CaptureConfig {
    /// Recording configuration for the given platform
    pub fn recording_for(&self, platform: Platform) -> RecordingConfig {
        match platform {
            Platform::Android => RecordingConfig::Android(self.android.clone()),
            Platform::Ios => RecordingConfig::Ios(self.ios.clone()),
        }
    }

    pub fn log_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_path = path.into();
        self
    }

    pub fn log_tail_lines(mut self, lines: usize) -> Self {
        self.log_tail_lines = lines;
        self
    }
}

/// An in-progress device screen recording
#[derive(Debug, Clone)]
pub struct RecordingSession {
    pub platform: Platform,
    pub started_at: DateTime<Utc>,
    pub config: RecordingConfig,
}

impl RecordingSession {
    pub fn new(config: RecordingConfig) -> Self {
        Self {
            platform: config.platform(),
            started_at: Utc::now(),
            config,
        }
    }

    /// Whether the device has already ended the recording on its own
    pub fn exceeded_time_limit(&self, now: DateTime<Utc>) -> bool {
        let elapsed = now.signed_duration_since(self.started_at);
        elapsed.num_seconds() >= i64::from(self.config.time_limit())
    }
}

/// The capture steps that may fail without affecting the test outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureStep {
    StartRecording,
    StopRecording,
    Screenshot,
    LogRead,
}

impl fmt::Display for CaptureStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CaptureStep::StartRecording => "start recording",
            CaptureStep::StopRecording => "stop recording",
            CaptureStep::Screenshot => "screenshot",
            CaptureStep::LogRead => "log read",
        };
        f.write_str(name)
    }
}

/// Result type for capture steps
pub type CaptureResult<T> = Result<T, CaptureFailure>;

/// A best-effort capture step that failed; the artifact is omitted
#[derive(Debug, thiserror::Error)]
pub enum CaptureFailure {
    #[error("could not start screen recording: {0}")]
    StartRecording(#[source] DriverError),

    #[error("could not stop screen recording: {0}")]
    StopRecording(#[source] DriverError),

    #[error("could not take screenshot: {0}")]
    Screenshot(#[source] DriverError),

    #[error("could not read log {}: {source}", .path.display())]
    LogRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl CaptureFailure {
    pub fn step(&self) -> CaptureStep {
        match self {
            CaptureFailure::StartRecording(_) => CaptureStep::StartRecording,
            CaptureFailure::StopRecording(_) => CaptureStep::StopRecording,
            CaptureFailure::Screenshot(_) => CaptureStep::Screenshot,
            CaptureFailure::LogRead { .. } => CaptureStep::LogRead,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_platform_from_name() {
        assert_eq!(Platform::from_name("Android"), Some(Platform::Android));
        assert_eq!(Platform::from_name("iOS"), Some(Platform::Ios));
        assert_eq!(Platform::from_name(" IOS "), Some(Platform::Ios));
        assert_eq!(Platform::from_name("chrome"), None);
        assert_eq!(Platform::from_name(""), None);
    }

    #[test]
    fn test_android_options_use_appium_names() {
        let config = CaptureConfig::default().recording_for(Platform::Android);
        assert_eq!(
            config.options(),
            serde_json::json!({
                "videoSize": "720x1280",
                "bitRate": 3_000_000,
                "timeLimit": 180,
            })
        );
    }

    #[test]
    fn test_ios_options_use_appium_names() {
        let config = CaptureConfig::default().recording_for(Platform::Ios);
        assert_eq!(
            config.options(),
            serde_json::json!({
                "videoType": "mpeg4",
                "videoQuality": "medium",
                "timeLimit": 180,
            })
        );
        assert_eq!(config.platform(), Platform::Ios);
    }

    #[test]
    fn test_session_time_limit() {
        let session = RecordingSession::new(CaptureConfig::default().recording_for(Platform::Android));
        assert!(!session.exceeded_time_limit(session.started_at + Duration::seconds(179)));
        assert!(session.exceeded_time_limit(session.started_at + Duration::seconds(180)));
    }

    #[test]
    fn test_failure_step() {
        let failure = CaptureFailure::LogRead {
            path: PathBuf::from("logs/appium.log"),
            source: std::io::Error::other("denied"),
        };
        assert_eq!(failure.step(), CaptureStep::LogRead);
        assert_eq!(failure.to_string(), "could not read log logs/appium.log: denied");
    }
}
