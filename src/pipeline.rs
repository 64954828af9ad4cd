//! Per-test diagnostics capture.
//!
//! `DiagnosticsPipeline` wraps one test at a time:
//! - `on_test_start` starts a device screen recording
//! - `on_test_end` stops it and, for failed tests, attaches a screenshot, the
//!   recording and the tail of the Appium server log to the report sink
//!
//! Every device or filesystem call is best-effort. A failure is logged and
//! only omits the matching artifact; nothing is ever returned as an error to
//! the test runner.

use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::capture::{
    Artifact, ArtifactKind, CaptureConfig, CaptureFailure, CaptureResult, CaptureStep,
    DeviceDriver, LogSource, RecordingSession,
};
use crate::report::ReportSink;
use crate::runner::{TestContext, TestOutcome};

/// Pipeline state for the current test
#[derive(Debug, Clone, Default)]
pub enum PipelineState {
    /// No recording; initial and terminal state of every test
    #[default]
    Idle,
    /// A recording was started successfully
    Recording(RecordingSession),
    /// Stop was attempted; artifacts are being collected
    Stopped,
}

/// What `on_test_end` produced
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CaptureSummary {
    /// Kinds handed to the report sink, in attachment order
    pub attached: Vec<ArtifactKind>,
    /// Steps that failed and were skipped
    pub failures: Vec<CaptureStep>,
}

impl CaptureSummary {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Diagnostics sidecar for one test at a time
///
/// Holds no memory of previous tests. Run one pipeline per concurrently
/// executing test; the driver and sink handles may be shared.
pub struct DiagnosticsPipeline {
    driver: Arc<dyn DeviceDriver>,
    sink: Arc<dyn ReportSink>,
    config: CaptureConfig,
    log_source: LogSource,
    state: PipelineState,
}

impl DiagnosticsPipeline {
    pub fn new(
        driver: Arc<dyn DeviceDriver>,
        sink: Arc<dyn ReportSink>,
        config: CaptureConfig,
    ) -> Self {
        let log_source = LogSource::new(config.log_path.clone(), config.log_tail_lines);
        Self {
            driver,
            sink,
            config,
            log_source,
            state: PipelineState::Idle,
        }
    }

    pub fn state(&self) -> &PipelineState {
        &self.state
    }

    pub fn is_recording(&self) -> bool {
        matches!(self.state, PipelineState::Recording(_))
    }

    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    /// Start recording for the test about to run.
    ///
    /// Tests without a mobile platform are not recorded. A failed start is
    /// logged and leaves the pipeline idle.
    pub async fn on_test_start(&mut self, ctx: &TestContext) {
        if let PipelineState::Recording(stale) = std::mem::take(&mut self.state) {
            warn!(
                test = %ctx.name,
                started_at = %stale.started_at,
                "previous recording was never stopped; discarding it"
            );
            if let Err(failure) = self.stop_recording(&stale).await {
                warn!(test = %ctx.name, error = %failure, "could not stop previous recording");
            }
        }

        let Some(platform) = ctx.platform else {
            debug!(test = %ctx.name, "no mobile platform; screen recording skipped");
            return;
        };

        let config = self.config.recording_for(platform);
        match self.driver.start_recording(&config).await {
            Ok(()) => {
                debug!(test = %ctx.name, %platform, "screen recording started");
                self.state = PipelineState::Recording(RecordingSession::new(config));
            }
            Err(err) => {
                let failure = CaptureFailure::StartRecording(err);
                warn!(test = %ctx.name, error = %failure, "screen recording unavailable");
            }
        }
    }

    /// Stop recording and attach diagnostics if the test failed.
    ///
    /// Always returns the pipeline to `Idle`.
    pub async fn on_test_end(&mut self, ctx: &TestContext, outcome: &TestOutcome) -> CaptureSummary {
        let mut summary = CaptureSummary::default();

        let video = match std::mem::replace(&mut self.state, PipelineState::Stopped) {
            PipelineState::Recording(session) => match self.stop_recording(&session).await {
                Ok(video) => video,
                Err(failure) => {
                    Self::note_failure(ctx, &mut summary, failure);
                    None
                }
            },
            _ => None,
        };

        if outcome.passed {
            if video.is_some() {
                debug!(test = %ctx.name, "test passed; discarding recording");
            }
            self.state = PipelineState::Idle;
            return summary;
        }

        let (screenshot, log_excerpt) =
            tokio::join!(self.capture_screenshot(), self.capture_log_excerpt());
        let video = Ok(video.map(Artifact::video));

        for result in [screenshot.map(Some), video, log_excerpt] {
            match result {
                Ok(Some(artifact)) => {
                    info!(
                        test = %ctx.name,
                        name = artifact.name(),
                        bytes = artifact.payload().len(),
                        "attaching diagnostics"
                    );
                    summary.attached.push(artifact.kind());
                    self.sink.add_attachment(artifact);
                }
                Ok(None) => {}
                Err(failure) => Self::note_failure(ctx, &mut summary, failure),
            }
        }

        self.state = PipelineState::Idle;
        summary
    }

    /// Stop the device recording; an empty payload means no video
    async fn stop_recording(&self, session: &RecordingSession) -> CaptureResult<Option<Vec<u8>>> {
        if session.exceeded_time_limit(Utc::now()) {
            debug!(
                limit_secs = session.config.time_limit(),
                "recording reached the device time limit; video is truncated"
            );
        }

        let video = self
            .driver
            .stop_recording()
            .await
            .map_err(CaptureFailure::StopRecording)?;
        Ok((!video.is_empty()).then_some(video))
    }

    async fn capture_screenshot(&self) -> CaptureResult<Artifact> {
        let png = self
            .driver
            .take_screenshot()
            .await
            .map_err(CaptureFailure::Screenshot)?;
        Ok(Artifact::screenshot(png))
    }

    async fn capture_log_excerpt(&self) -> CaptureResult<Option<Artifact>> {
        let excerpt = self.log_source.read_tail().await?;
        if excerpt.is_none() {
            debug!(path = %self.log_source.path().display(), "no server log; skipping excerpt");
        }
        Ok(excerpt.map(|text| Artifact::log_excerpt(text, self.log_source.tail_lines())))
    }

    fn note_failure(ctx: &TestContext, summary: &mut CaptureSummary, failure: CaptureFailure) {
        warn!(test = %ctx.name, step = %failure.step(), error = %failure, "diagnostics capture failed");
        summary.failures.push(failure.step());
    }
}

impl std::fmt::Debug for DiagnosticsPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiagnosticsPipeline")
            .field("config", &self.config)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{DriverCall, Platform, ScriptedDriver};
    use crate::report::MemorySink;
    use std::time::Duration;

    fn pipeline(driver: Arc<ScriptedDriver>, sink: Arc<MemorySink>) -> DiagnosticsPipeline {
        let config = CaptureConfig::default().log_path("/nonexistent/appium.log");
        DiagnosticsPipeline::new(driver, sink, config)
    }

    #[tokio::test]
    async fn test_state_transitions() {
        let driver = Arc::new(ScriptedDriver::new(Some(Platform::Android)));
        let sink = Arc::new(MemorySink::new());
        let mut pipeline = pipeline(driver.clone(), sink);
        let ctx = TestContext::new("t", Some(Platform::Android));

        assert!(matches!(pipeline.state(), PipelineState::Idle));
        pipeline.on_test_start(&ctx).await;
        assert!(pipeline.is_recording());

        pipeline
            .on_test_end(&ctx, &TestOutcome::passed(Duration::ZERO))
            .await;
        assert!(matches!(pipeline.state(), PipelineState::Idle));
        assert!(!driver.is_recording());
    }

    #[tokio::test]
    async fn test_unsupported_platform_is_noop() {
        let driver = Arc::new(ScriptedDriver::new(None));
        let sink = Arc::new(MemorySink::new());
        let mut pipeline = pipeline(driver.clone(), sink);
        let ctx = TestContext::new("web test", None);

        pipeline.on_test_start(&ctx).await;
        assert!(!pipeline.is_recording());
        assert!(driver.calls().is_empty());
    }

    #[tokio::test]
    async fn test_start_failure_leaves_idle() {
        let driver =
            Arc::new(ScriptedDriver::new(Some(Platform::Ios)).fail_on(DriverCall::StartRecording));
        let sink = Arc::new(MemorySink::new());
        let mut pipeline = pipeline(driver.clone(), sink);
        let ctx = TestContext::new("t", Some(Platform::Ios));

        pipeline.on_test_start(&ctx).await;
        assert!(matches!(pipeline.state(), PipelineState::Idle));

        // Nothing to stop at the end
        pipeline
            .on_test_end(&ctx, &TestOutcome::passed(Duration::ZERO))
            .await;
        assert_eq!(driver.calls(), vec![DriverCall::StartRecording]);
    }

    #[tokio::test]
    async fn test_stale_recording_is_stopped_on_next_start() {
        let driver = Arc::new(ScriptedDriver::new(Some(Platform::Android)));
        let sink = Arc::new(MemorySink::new());
        let mut pipeline = pipeline(driver.clone(), sink.clone());
        let ctx = TestContext::new("t", Some(Platform::Android));

        pipeline.on_test_start(&ctx).await;
        pipeline.on_test_start(&ctx).await;

        assert_eq!(
            driver.calls(),
            vec![
                DriverCall::StartRecording,
                DriverCall::StopRecording,
                DriverCall::StartRecording
            ]
        );
        assert!(pipeline.is_recording());
        assert!(sink.is_empty());
    }
}
