//! Device driver abstraction for recording and screenshots.
//!
//! The pipeline only needs three device commands, so the driver seam is a
//! small trait:
//! - `AppiumDriver` talks to a live Appium session over HTTP
//! - `ScriptedDriver` answers in-process, with failure injection for testing

use async_trait::async_trait;
use image::{ImageBuffer, Rgb};
use std::collections::HashSet;
use std::io::Cursor;
use std::sync::{Mutex, MutexGuard};

use super::types::{Platform, RecordingConfig};

/// Result type for driver calls
pub type DriverResult<T> = Result<T, DriverError>;

/// Errors returned by device drivers
#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    /// Transport failure talking to the automation server
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The automation server answered with a W3C error
    #[error("{error} (HTTP {status}): {message}")]
    Protocol {
        status: u16,
        error: String,
        message: String,
    },

    /// The response did not have the expected shape
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// A base64 payload could not be decoded
    #[error("invalid base64 payload: {0}")]
    Decode(#[from] base64::DecodeError),

    /// The device refused or could not perform the command
    #[error("device unavailable: {0}")]
    Unavailable(String),
}

/// Trait for device drivers
///
/// Implementations must be shareable across tasks; each concurrently running
/// test owns its device, so calls on one driver are never interleaved by the
/// pipeline.
#[async_trait]
pub trait DeviceDriver: Send + Sync {
    /// Begin a screen recording with platform-specific options
    async fn start_recording(&self, config: &RecordingConfig) -> DriverResult<()>;

    /// End the current recording and return the encoded video.
    /// An empty buffer means nothing was recorded.
    async fn stop_recording(&self) -> DriverResult<Vec<u8>>;

    /// Capture the current screen as PNG
    async fn take_screenshot(&self) -> DriverResult<Vec<u8>>;

    /// Platform reported by the driver, if it is a mobile one
    fn platform(&self) -> Option<Platform>;
}

/// Device commands issued to a `ScriptedDriver`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DriverCall {
    StartRecording,
    StopRecording,
    TakeScreenshot,
}

#[derive(Debug, Default)]
struct ScriptState {
    calls: Vec<DriverCall>,
    recording: bool,
    last_config: Option<RecordingConfig>,
}

/// An in-process driver for tests and dry runs
///
/// Every call is journaled; any call can be made to fail. Without an explicit
/// screenshot it renders a flat PNG sized for the platform.
#[derive(Debug)]
pub struct ScriptedDriver {
    platform: Option<Platform>,
    video: Vec<u8>,
    screenshot: Option<Vec<u8>>,
    failing: HashSet<DriverCall>,
    state: Mutex<ScriptState>,
}

impl ScriptedDriver {
    pub fn new(platform: Option<Platform>) -> Self {
        Self {
            platform,
            video: b"\x00\x00\x00\x18ftypmp42scripted".to_vec(),
            screenshot: None,
            failing: HashSet::new(),
            state: Mutex::new(ScriptState::default()),
        }
    }

    /// Make every call of the given kind fail
    pub fn fail_on(mut self, call: DriverCall) -> Self {
        self.failing.insert(call);
        self
    }

    /// Set the bytes returned when a recording is stopped
    pub fn with_video(mut self, video: Vec<u8>) -> Self {
        self.video = video;
        self
    }

    /// Set the bytes returned for screenshots
    pub fn with_screenshot(mut self, png: Vec<u8>) -> Self {
        self.screenshot = Some(png);
        self
    }

    /// All calls received so far, in order
    pub fn calls(&self) -> Vec<DriverCall> {
        self.lock().calls.clone()
    }

    /// Whether a recording was started and not yet stopped
    pub fn is_recording(&self) -> bool {
        self.lock().recording
    }

    /// Options passed to the most recent start call
    pub fn last_recording_config(&self) -> Option<RecordingConfig> {
        self.lock().last_config.clone()
    }

    fn lock(&self) -> MutexGuard<'_, ScriptState> {
        // The state stays consistent even if a holder panicked.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn record(&self, call: DriverCall) -> DriverResult<MutexGuard<'_, ScriptState>> {
        let mut state = self.lock();
        state.calls.push(call);
        if self.failing.contains(&call) {
            return Err(DriverError::Unavailable(format!("scripted failure on {:?}", call)));
        }
        Ok(state)
    }

    fn placeholder_png(&self) -> DriverResult<Vec<u8>> {
        let (width, height) = match self.platform {
            Some(Platform::Android) => (72, 128),
            Some(Platform::Ios) => (66, 143),
            None => (128, 72),
        };
        let img = ImageBuffer::from_pixel(width, height, Rgb([32u8, 32, 32]));
        let mut bytes = Vec::new();
        img.write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
            .map_err(|e| DriverError::Unavailable(format!("Failed to encode PNG: {}", e)))?;
        Ok(bytes)
    }
}

#[async_trait]
impl DeviceDriver for ScriptedDriver {
    async fn start_recording(&self, config: &RecordingConfig) -> DriverResult<()> {
        let mut state = self.record(DriverCall::StartRecording)?;
        state.recording = true;
        state.last_config = Some(config.clone());
        Ok(())
    }

    async fn stop_recording(&self) -> DriverResult<Vec<u8>> {
        let mut state = self.record(DriverCall::StopRecording)?;
        if !state.recording {
            return Ok(Vec::new());
        }
        state.recording = false;
        Ok(self.video.clone())
    }

    async fn take_screenshot(&self) -> DriverResult<Vec<u8>> {
        drop(self.record(DriverCall::TakeScreenshot)?);
        match &self.screenshot {
            Some(png) => Ok(png.clone()),
            None => self.placeholder_png(),
        }
    }

    fn platform(&self) -> Option<Platform> {
        self.platform
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::CaptureConfig;

    #[tokio::test]
    async fn test_scripted_recording_cycle() {
        let driver = ScriptedDriver::new(Some(Platform::Android)).with_video(vec![1, 2, 3]);
        let config = CaptureConfig::default().recording_for(Platform::Android);

        driver.start_recording(&config).await.unwrap();
        assert!(driver.is_recording());
        assert_eq!(driver.last_recording_config(), Some(config));

        assert_eq!(driver.stop_recording().await.unwrap(), vec![1, 2, 3]);
        assert!(!driver.is_recording());
        assert_eq!(
            driver.calls(),
            vec![DriverCall::StartRecording, DriverCall::StopRecording]
        );
    }

    #[tokio::test]
    async fn test_scripted_stop_without_recording_is_empty() {
        let driver = ScriptedDriver::new(Some(Platform::Ios));
        assert!(driver.stop_recording().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_scripted_failure_is_journaled() {
        let driver = ScriptedDriver::new(None).fail_on(DriverCall::TakeScreenshot);
        let err = driver.take_screenshot().await.unwrap_err();
        assert!(matches!(err, DriverError::Unavailable(_)));
        assert_eq!(driver.calls(), vec![DriverCall::TakeScreenshot]);
    }

    #[tokio::test]
    async fn test_placeholder_screenshot_is_png() {
        let driver = ScriptedDriver::new(Some(Platform::Android));
        let png = driver.take_screenshot().await.unwrap();
        assert_eq!(&png[0..4], &[0x89, 0x50, 0x4E, 0x47]);
        let img = image::load_from_memory(&png).unwrap();
        assert_eq!((img.width(), img.height()), (72, 128));
    }
}
