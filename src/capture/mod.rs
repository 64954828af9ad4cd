pub mod appium;
pub mod artifact;
pub mod driver;
pub mod logs;
pub mod types;

pub use appium::AppiumDriver;
pub use artifact::{Artifact, ArtifactKind, Payload, SCREENSHOT_NAME, VIDEO_NAME, log_excerpt_name};
pub use driver::{DeviceDriver, DriverCall, DriverError, DriverResult, ScriptedDriver};
pub use logs::{LogSource, tail_lines};
pub use types::{
    AndroidRecording, CaptureConfig, CaptureFailure, CaptureResult, CaptureStep, IosRecording,
    Platform, RecordingConfig, RecordingSession,
};
