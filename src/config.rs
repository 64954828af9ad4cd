//! Configuration management with environment variable support.
//!
//! This module provides centralized configuration for the sidecar, supporting:
//! - Environment variables for all configurable values
//! - Defaults that match the shared WebdriverIO hook configuration
//! - Conversion into the [`CaptureConfig`] consumed by the pipeline
//!
//! # Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `SIDECAR_LOG_PATH` | Appium server log file | `<cwd>/logs/appium.log` |
//! | `SIDECAR_LOG_TAIL_LINES` | Lines kept from the end of the log | `500` |
//! | `SIDECAR_RECORDING_TIME_LIMIT` | Recording cap in seconds | `180` |
//! | `SIDECAR_ANDROID_VIDEO_SIZE` | Android recording size (`WxH`) | `720x1280` |
//! | `SIDECAR_ANDROID_BIT_RATE` | Android recording bit rate (bps) | `3000000` |
//! | `SIDECAR_IOS_VIDEO_TYPE` | iOS recording codec | `mpeg4` |
//! | `SIDECAR_IOS_VIDEO_QUALITY` | iOS recording quality | `medium` |
//! | `SIDECAR_REPORT_DIR` | Allure results directory | `allure-results` |
//! | `SIDECAR_APPIUM_URL` | Appium server base URL | `http://127.0.0.1:4723` |
//! | `SIDECAR_HTTP_TIMEOUT` | Driver HTTP timeout in seconds | `120` |
//!
//! # Example
//!
//! ```bash
//! # Collect a shorter log excerpt from a custom location
//! export SIDECAR_LOG_PATH="/var/log/appium/server.log"
//! export SIDECAR_LOG_TAIL_LINES=200
//! ```

use serde::Serialize;
use std::env;
use std::path::PathBuf;
use std::sync::OnceLock;

use crate::capture::types::{AndroidRecording, CaptureConfig, IosRecording};

// ============================================================================
// Default Values
// ============================================================================

/// Default number of log lines attached on failure
pub const DEFAULT_LOG_TAIL_LINES: usize = 500;

/// Default log file location, relative to the working directory
pub const DEFAULT_LOG_RELATIVE_PATH: &str = "logs/appium.log";

/// Default recording time limit (seconds)
pub const DEFAULT_TIME_LIMIT_SECS: u32 = 180;

/// Default Android recording size
pub const DEFAULT_ANDROID_VIDEO_SIZE: &str = "720x1280";

/// Default Android recording bit rate (bits per second)
pub const DEFAULT_ANDROID_BIT_RATE: u32 = 3_000_000;

/// Default iOS recording codec
pub const DEFAULT_IOS_VIDEO_TYPE: &str = "mpeg4";

/// Default iOS recording quality
pub const DEFAULT_IOS_VIDEO_QUALITY: &str = "medium";

/// Default Allure results directory
pub const DEFAULT_REPORT_DIR: &str = "allure-results";

/// Default Appium server URL
pub const DEFAULT_APPIUM_URL: &str = "http://127.0.0.1:4723";

/// Default HTTP timeout for driver calls (seconds)
pub const DEFAULT_HTTP_TIMEOUT: u64 = 120;

// ============================================================================
// Environment Variable Names
// ============================================================================

pub const ENV_LOG_PATH: &str = "SIDECAR_LOG_PATH";
pub const ENV_LOG_TAIL_LINES: &str = "SIDECAR_LOG_TAIL_LINES";
pub const ENV_TIME_LIMIT: &str = "SIDECAR_RECORDING_TIME_LIMIT";
pub const ENV_ANDROID_VIDEO_SIZE: &str = "SIDECAR_ANDROID_VIDEO_SIZE";
pub const ENV_ANDROID_BIT_RATE: &str = "SIDECAR_ANDROID_BIT_RATE";
pub const ENV_IOS_VIDEO_TYPE: &str = "SIDECAR_IOS_VIDEO_TYPE";
pub const ENV_IOS_VIDEO_QUALITY: &str = "SIDECAR_IOS_VIDEO_QUALITY";
pub const ENV_REPORT_DIR: &str = "SIDECAR_REPORT_DIR";
pub const ENV_APPIUM_URL: &str = "SIDECAR_APPIUM_URL";
pub const ENV_HTTP_TIMEOUT: &str = "SIDECAR_HTTP_TIMEOUT";

// ============================================================================
// Configuration Getters (with caching)
// ============================================================================

static CONFIG: OnceLock<Config> = OnceLock::new();

/// Get the global configuration (initialized from environment on first access)
pub fn get() -> &'static Config {
    CONFIG.get_or_init(Config::from_env)
}

/// Centralized configuration for the sidecar
#[derive(Debug, Clone, Serialize)]
pub struct Config {
    /// Recording and log capture settings
    pub capture: CaptureSettings,
    /// Report output settings
    pub report: ReportSettings,
    /// Appium connection settings
    pub driver: DriverSettings,
}

/// Recording and log capture settings
#[derive(Debug, Clone, Serialize)]
pub struct CaptureSettings {
    /// Appium server log file
    pub log_path: PathBuf,
    /// Number of trailing log lines to attach
    pub log_tail_lines: usize,
    /// Recording hard cap enforced by the device (seconds)
    pub time_limit_secs: u32,
    /// Android `videoSize` as (width, height)
    pub android_video_size: (u32, u32),
    /// Android `bitRate`
    pub android_bit_rate: u32,
    /// iOS `videoType`
    pub ios_video_type: String,
    /// iOS `videoQuality`
    pub ios_video_quality: String,
}

/// Report output settings
#[derive(Debug, Clone, Serialize)]
pub struct ReportSettings {
    /// Directory receiving Allure result and attachment files
    pub output_dir: PathBuf,
}

/// Appium connection settings
#[derive(Debug, Clone, Serialize)]
pub struct DriverSettings {
    /// Base URL of the Appium server
    pub appium_url: String,
    /// Per-request timeout (seconds)
    pub http_timeout: u64,
}

impl Config {
    /// Create configuration from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        Self {
            capture: CaptureSettings::from_env(),
            report: ReportSettings::from_env(),
            driver: DriverSettings::from_env(),
        }
    }

    /// Create configuration with all defaults (ignoring environment)
    pub fn defaults() -> Self {
        Self {
            capture: CaptureSettings::defaults(),
            report: ReportSettings::defaults(),
            driver: DriverSettings::defaults(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

impl CaptureSettings {
    /// Create capture settings from environment variables
    pub fn from_env() -> Self {
        let android_video_size = env::var(ENV_ANDROID_VIDEO_SIZE)
            .ok()
            .and_then(|s| parse_video_size(&s))
            .unwrap_or_else(default_video_size);

        Self {
            log_path: env::var(ENV_LOG_PATH)
                .map(PathBuf::from)
                .unwrap_or_else(|_| default_log_path()),
            log_tail_lines: parse_env(ENV_LOG_TAIL_LINES).unwrap_or(DEFAULT_LOG_TAIL_LINES),
            time_limit_secs: parse_env(ENV_TIME_LIMIT).unwrap_or(DEFAULT_TIME_LIMIT_SECS),
            android_video_size,
            android_bit_rate: parse_env(ENV_ANDROID_BIT_RATE).unwrap_or(DEFAULT_ANDROID_BIT_RATE),
            ios_video_type: env::var(ENV_IOS_VIDEO_TYPE)
                .unwrap_or_else(|_| DEFAULT_IOS_VIDEO_TYPE.to_string()),
            ios_video_quality: env::var(ENV_IOS_VIDEO_QUALITY)
                .unwrap_or_else(|_| DEFAULT_IOS_VIDEO_QUALITY.to_string()),
        }
    }

    /// Create capture settings with defaults
    pub fn defaults() -> Self {
        Self {
            log_path: default_log_path(),
            log_tail_lines: DEFAULT_LOG_TAIL_LINES,
            time_limit_secs: DEFAULT_TIME_LIMIT_SECS,
            android_video_size: default_video_size(),
            android_bit_rate: DEFAULT_ANDROID_BIT_RATE,
            ios_video_type: DEFAULT_IOS_VIDEO_TYPE.to_string(),
            ios_video_quality: DEFAULT_IOS_VIDEO_QUALITY.to_string(),
        }
    }

    /// Build the pipeline's capture configuration from these settings
    pub fn to_capture_config(&self) -> CaptureConfig {
        let (width, height) = self.android_video_size;
        CaptureConfig {
            android: AndroidRecording {
                video_size: format!("{}x{}", width, height),
                bit_rate: self.android_bit_rate,
                time_limit: self.time_limit_secs,
            },
            ios: IosRecording {
                video_type: self.ios_video_type.clone(),
                video_quality: self.ios_video_quality.clone(),
                time_limit: self.time_limit_secs,
            },
            log_path: self.log_path.clone(),
            log_tail_lines: self.log_tail_lines,
        }
    }
}

impl ReportSettings {
    /// Create report settings from environment variables
    pub fn from_env() -> Self {
        Self {
            output_dir: env::var(ENV_REPORT_DIR)
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_REPORT_DIR)),
        }
    }

    /// Create report settings with defaults
    pub fn defaults() -> Self {
        Self {
            output_dir: PathBuf::from(DEFAULT_REPORT_DIR),
        }
    }
}

impl DriverSettings {
    /// Create driver settings from environment variables
    pub fn from_env() -> Self {
        Self {
            appium_url: env::var(ENV_APPIUM_URL).unwrap_or_else(|_| DEFAULT_APPIUM_URL.to_string()),
            http_timeout: parse_env(ENV_HTTP_TIMEOUT).unwrap_or(DEFAULT_HTTP_TIMEOUT),
        }
    }

    /// Create driver settings with defaults
    pub fn defaults() -> Self {
        Self {
            appium_url: DEFAULT_APPIUM_URL.to_string(),
            http_timeout: DEFAULT_HTTP_TIMEOUT,
        }
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

fn parse_env<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|s| s.trim().parse().ok())
}

fn default_log_path() -> PathBuf {
    env::current_dir()
        .unwrap_or_default()
        .join(DEFAULT_LOG_RELATIVE_PATH)
}

fn default_video_size() -> (u32, u32) {
    parse_video_size(DEFAULT_ANDROID_VIDEO_SIZE).unwrap_or((720, 1280))
}

/// Parse a video size string such as "720x1280" into (width, height)
pub fn parse_video_size(size: &str) -> Option<(u32, u32)> {
    let lower = size.trim().to_lowercase();
    let (w, h) = lower.split_once('x')?;
    let w: u32 = w.trim().parse().ok()?;
    let h: u32 = h.trim().parse().ok()?;
    if w == 0 || h == 0 {
        return None;
    }
    Some((w, h))
}

/// Get the default capture configuration from the environment (convenience function)
pub fn capture_config() -> CaptureConfig {
    get().capture.to_capture_config()
}

/// Get the Allure results directory (convenience function)
pub fn report_dir() -> PathBuf {
    get().report.output_dir.clone()
}
