//! Device Sidecar - diagnostics capture for mobile end-to-end UI tests.
//!
//! This crate provides:
//! - A per-test pipeline that records the device screen and, when a test
//!   fails, attaches a screenshot, the recording and the Appium server log
//! - A `DeviceDriver` seam with an Appium HTTP implementation and a scripted
//!   in-process one
//! - Report sinks (in-memory and Allure results directory)
//! - Environment-driven configuration
//!
//! Diagnostics never decide pass or fail: every capture step is best-effort
//! and a failure only removes its own attachment.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use device_sidecar::{
//!     AllureSink, AppiumDriver, DiagnosticsPipeline, Platform, TestContext, TestError,
//!     run_with_diagnostics,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let driver = Arc::new(AppiumDriver::new("http://127.0.0.1:4723", "session-id", Some(Platform::Android))?);
//! let sink = Arc::new(AllureSink::new("allure-results")?);
//! let mut pipeline = DiagnosticsPipeline::new(driver, sink.clone(), device_sidecar::config::capture_config());
//!
//! let ctx = TestContext::new("login shows an error for a bad password", Some(Platform::Android));
//! sink.begin_test();
//! let outcome = run_with_diagnostics(&mut pipeline, &ctx, 0, async {
//!     Err(TestError::new("expected error banner"))
//! })
//! .await;
//! sink.finish_test(&ctx, &outcome)?;
//! # Ok(())
//! # }
//! ```

pub mod capture;
pub mod config;
pub mod pipeline;
pub mod report;
pub mod runner;

// Re-export runner types
pub use runner::{TestContext, TestError, TestOutcome, run_with_diagnostics};

// Re-export the pipeline
pub use pipeline::{CaptureSummary, DiagnosticsPipeline, PipelineState};

// Re-export capture types and drivers
pub use capture::{
    AppiumDriver, Artifact, ArtifactKind, CaptureConfig, CaptureFailure, CaptureStep,
    DeviceDriver, DriverCall, DriverError, LogSource, Payload, Platform, RecordingConfig,
    RecordingSession, ScriptedDriver,
};

// Re-export report sinks
pub use report::{AllureSink, MemorySink, ReportError, ReportSink};
