//! Types for test outcomes and the glue that wraps a test body in the
//! diagnostics hooks.

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::{Duration, Instant};

use crate::capture::{DeviceDriver, Platform};
use crate::pipeline::DiagnosticsPipeline;

/// Identity of the test being run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestContext {
    /// Full test title
    pub name: String,

    /// Platform under test; `None` disables recording
    pub platform: Option<Platform>,
}

impl TestContext {
    pub fn new(name: impl Into<String>, platform: Option<Platform>) -> Self {
        Self {
            name: name.into(),
            platform,
        }
    }

    /// Take the platform from what the driver reports
    pub fn for_driver(name: impl Into<String>, driver: &dyn DeviceDriver) -> Self {
        Self::new(name, driver.platform())
    }
}

/// Structured error of a failed test
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestError {
    pub message: String,
    pub stack: Option<String>,
}

impl TestError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stack: None,
        }
    }

    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }
}

impl std::fmt::Display for TestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for TestError {}

/// Result of one test execution, as reported by the runner
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestOutcome {
    /// Whether the test passed
    pub passed: bool,

    /// Error if the test failed
    pub error: Option<TestError>,

    /// Wall-clock duration of the test body
    pub duration_ms: u64,

    /// How many times the test has been retried before this run
    pub retry_count: u32,
}

impl TestOutcome {
    pub fn passed(duration: Duration) -> Self {
        Self {
            passed: true,
            error: None,
            duration_ms: duration.as_millis() as u64,
            retry_count: 0,
        }
    }

    pub fn failed(error: TestError, duration: Duration) -> Self {
        Self {
            passed: false,
            error: Some(error),
            duration_ms: duration.as_millis() as u64,
            retry_count: 0,
        }
    }

    pub fn from_result(result: Result<(), TestError>, duration: Duration, retry_count: u32) -> Self {
        let outcome = match result {
            Ok(()) => Self::passed(duration),
            Err(error) => Self::failed(error, duration),
        };
        Self {
            retry_count,
            ..outcome
        }
    }
}

/// Run a test body between the pipeline's hooks.
///
/// The returned outcome is exactly what the body produced; diagnostics never
/// change it.
pub async fn run_with_diagnostics<F>(
    pipeline: &mut DiagnosticsPipeline,
    ctx: &TestContext,
    retry_count: u32,
    body: F,
) -> TestOutcome
where
    F: Future<Output = Result<(), TestError>>,
{
    pipeline.on_test_start(ctx).await;

    let started = Instant::now();
    let result = body.await;
    let outcome = TestOutcome::from_result(result, started.elapsed(), retry_count);

    pipeline.on_test_end(ctx, &outcome).await;
    outcome
}
