//! Allure results directory sink.
//!
//! Attachments are written next to the result files as
//! `<id>-attachment.<ext>`; `finish_test` writes `<id>-result.json`
//! referencing them. The directory can be rendered by any Allure 2 report
//! generator.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};

use super::ReportSink;
use crate::capture::Artifact;
use crate::runner::{TestContext, TestOutcome};

/// Result type for report writing
pub type ReportResult<T> = Result<T, ReportError>;

/// Errors raised while writing report files
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Attachment entry of an Allure result
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AllureAttachment {
    pub name: String,
    pub source: String,
    #[serde(rename = "type")]
    pub mime_type: String,
}

#[derive(Debug, Serialize)]
struct AllureLabel {
    name: &'static str,
    value: String,
}

#[derive(Debug, Serialize)]
struct AllureParameter {
    name: &'static str,
    value: String,
}

#[derive(Debug, Serialize)]
struct StatusDetails {
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    trace: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AllureResult<'a> {
    uuid: String,
    name: &'a str,
    full_name: &'a str,
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    status_details: Option<StatusDetails>,
    stage: &'static str,
    start: i64,
    stop: i64,
    labels: Vec<AllureLabel>,
    parameters: Vec<AllureParameter>,
    attachments: Vec<AllureAttachment>,
}

#[derive(Debug, Default)]
struct PendingTest {
    started_at: Option<DateTime<Utc>>,
    attachments: Vec<AllureAttachment>,
}

/// Sink writing an Allure results directory
///
/// Holds the attachments of one test at a time; use one sink per
/// concurrently running test.
#[derive(Debug)]
pub struct AllureSink {
    output_dir: PathBuf,
    host: String,
    pending: Mutex<PendingTest>,
}

impl AllureSink {
    /// Create the sink, creating the output directory if needed
    pub fn new(output_dir: impl Into<PathBuf>) -> ReportResult<Self> {
        let output_dir = output_dir.into();
        fs::create_dir_all(&output_dir)?;

        let host = hostname::get()
            .map(|h| h.to_string_lossy().to_string())
            .unwrap_or_else(|_| "unknown".to_string());

        Ok(Self {
            output_dir,
            host,
            pending: Mutex::new(PendingTest::default()),
        })
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Mark the start of a test and forget attachments of any previous one
    pub fn begin_test(&self) {
        let mut pending = self.lock();
        *pending = PendingTest {
            started_at: Some(Utc::now()),
            attachments: Vec::new(),
        };
    }

    /// Attachments collected for the current test
    pub fn pending_attachments(&self) -> Vec<AllureAttachment> {
        self.lock().attachments.clone()
    }

    /// Write the result file for the current test and reset the sink
    pub fn finish_test(&self, ctx: &TestContext, outcome: &TestOutcome) -> ReportResult<PathBuf> {
        let pending = std::mem::take(&mut *self.lock());
        let stop = Utc::now();
        let start = pending
            .started_at
            .unwrap_or_else(|| stop - chrono::Duration::milliseconds(outcome.duration_ms as i64));

        let mut labels = vec![
            AllureLabel {
                name: "host",
                value: self.host.clone(),
            },
            AllureLabel {
                name: "framework",
                value: env!("CARGO_PKG_NAME").to_string(),
            },
        ];
        if let Some(platform) = ctx.platform {
            labels.push(AllureLabel {
                name: "platform",
                value: platform.to_string(),
            });
        }

        let mut parameters = Vec::new();
        if outcome.retry_count > 0 {
            parameters.push(AllureParameter {
                name: "retry",
                value: outcome.retry_count.to_string(),
            });
        }

        let id = generate_id();
        let result = AllureResult {
            uuid: id.clone(),
            name: &ctx.name,
            full_name: &ctx.name,
            status: if outcome.passed { "passed" } else { "failed" },
            status_details: outcome.error.as_ref().map(|err| StatusDetails {
                message: err.message.clone(),
                trace: err.stack.clone(),
            }),
            stage: "finished",
            start: start.timestamp_millis(),
            stop: stop.timestamp_millis(),
            labels,
            parameters,
            attachments: pending.attachments,
        };

        let path = self.output_dir.join(format!("{}-result.json", id));
        fs::write(&path, serde_json::to_string_pretty(&result)?)?;
        debug!(path = %path.display(), status = result.status, "wrote allure result");
        Ok(path)
    }

    fn write_attachment(&self, artifact: &Artifact) -> ReportResult<AllureAttachment> {
        let source = format!("{}-attachment.{}", generate_id(), artifact.kind().extension());
        fs::write(self.output_dir.join(&source), artifact.payload().as_bytes())?;
        Ok(AllureAttachment {
            name: artifact.name().to_string(),
            source,
            mime_type: artifact.mime_type().to_string(),
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, PendingTest> {
        self.pending.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl ReportSink for AllureSink {
    fn add_attachment(&self, artifact: Artifact) {
        match self.write_attachment(&artifact) {
            Ok(entry) => self.lock().attachments.push(entry),
            Err(err) => warn!(
                name = artifact.name(),
                error = %err,
                "could not write attachment; dropping it"
            ),
        }
    }
}

/// Generate a unique, UUID-shaped identifier
fn generate_id() -> String {
    static COUNTER: AtomicU64 = AtomicU64::new(0);

    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0);
    let seq = COUNTER.fetch_add(1, Ordering::Relaxed) & 0xffff_ffff;
    let low = (u64::from(std::process::id()) << 32) | seq;

    let hex = format!("{:016x}{:016x}", nanos, low);
    format!(
        "{}-{}-{}-{}-{}",
        &hex[0..8],
        &hex[8..12],
        &hex[12..16],
        &hex[16..20],
        &hex[20..32]
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::Platform;
    use crate::runner::TestError;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_generate_id_is_unique_and_shaped() {
        let a = generate_id();
        let b = generate_id();
        assert_ne!(a, b);
        assert_eq!(a.len(), 36);
        assert_eq!(a.matches('-').count(), 4);
    }

    #[test]
    fn test_attachment_written_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let sink = AllureSink::new(dir.path()).unwrap();
        sink.begin_test();
        sink.add_attachment(Artifact::log_excerpt("L1\nL2".to_string(), 500));

        let entries = sink.pending_attachments();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "Appium Server Logs (last 500 lines)");
        assert_eq!(entries[0].mime_type, "text/plain");
        assert!(entries[0].source.ends_with("-attachment.txt"));

        let content = fs::read_to_string(dir.path().join(&entries[0].source)).unwrap();
        assert_eq!(content, "L1\nL2");
    }

    #[test]
    fn test_finish_test_writes_result() {
        let dir = tempfile::tempdir().unwrap();
        let sink = AllureSink::new(dir.path()).unwrap();
        sink.begin_test();
        sink.add_attachment(Artifact::video(vec![0, 1, 2]));

        let ctx = TestContext::new("login fails", Some(Platform::Android));
        let outcome = TestOutcome {
            passed: false,
            error: Some(TestError::new("element not found")),
            duration_ms: 1200,
            retry_count: 1,
        };
        let path = sink.finish_test(&ctx, &outcome).unwrap();

        let json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(json["name"], "login fails");
        assert_eq!(json["status"], "failed");
        assert_eq!(json["stage"], "finished");
        assert_eq!(json["statusDetails"]["message"], "element not found");
        assert_eq!(json["attachments"][0]["type"], "video/mp4");
        assert_eq!(json["parameters"][0]["value"], "1");
        assert!(
            json["labels"]
                .as_array()
                .unwrap()
                .iter()
                .any(|l| l["name"] == "platform" && l["value"] == "android")
        );

        // Sink is reset for the next test
        assert!(sink.pending_attachments().is_empty());
    }

    #[test]
    fn test_unwritable_attachment_is_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let sink = AllureSink::new(dir.path().join("results")).unwrap();
        fs::remove_dir_all(dir.path().join("results")).unwrap();

        sink.add_attachment(Artifact::video(vec![1]));
        assert!(sink.pending_attachments().is_empty());
    }
}
