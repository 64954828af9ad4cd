//! Report sinks receiving diagnostic attachments.

pub mod allure;

use std::sync::Mutex;

use crate::capture::Artifact;

pub use allure::{AllureAttachment, AllureSink, ReportError, ReportResult};

/// Destination for named attachments of the current test report
///
/// Attaching is infallible from the caller's point of view: sinks that can
/// fail internally log and drop the artifact.
pub trait ReportSink: Send + Sync {
    /// Take ownership of an artifact and attach it to the active report
    fn add_attachment(&self, artifact: Artifact);
}

/// A sink that keeps attachments in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    attachments: Mutex<Vec<Artifact>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copies of everything attached so far, in order
    pub fn attachments(&self) -> Vec<Artifact> {
        self.attachments
            .lock()
            .map(|a| a.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    /// Remove and return everything attached so far
    pub fn take(&self) -> Vec<Artifact> {
        match self.attachments.lock() {
            Ok(mut a) => std::mem::take(&mut *a),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        }
    }

    pub fn len(&self) -> usize {
        self.attachments().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ReportSink for MemorySink {
    fn add_attachment(&self, artifact: Artifact) {
        match self.attachments.lock() {
            Ok(mut a) => a.push(artifact),
            Err(poisoned) => poisoned.into_inner().push(artifact),
        }
    }
}
