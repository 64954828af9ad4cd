//! Tailing of the Appium server log.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use super::types::{CaptureFailure, CaptureResult};

/// An append-only log file the sidecar reads but never writes
#[derive(Debug, Clone)]
pub struct LogSource {
    path: PathBuf,
    tail_lines: usize,
}

impl LogSource {
    pub fn new(path: impl Into<PathBuf>, tail_lines: usize) -> Self {
        Self {
            path: path.into(),
            tail_lines,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn tail_lines(&self) -> usize {
        self.tail_lines
    }

    /// Read the file and keep its last lines.
    ///
    /// Returns `Ok(None)` when the file does not exist. Invalid UTF-8 is
    /// replaced rather than rejected.
    pub async fn read_tail(&self) -> CaptureResult<Option<String>> {
        let exists = tokio::fs::try_exists(&self.path)
            .await
            .map_err(|source| self.failure(source))?;
        if !exists {
            return Ok(None);
        }

        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            // Rotated away between the check and the read.
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(self.failure(err)),
        };

        let content = String::from_utf8_lossy(&bytes);
        Ok(Some(tail_lines(&content, self.tail_lines)))
    }

    fn failure(&self, source: std::io::Error) -> CaptureFailure {
        CaptureFailure::LogRead {
            path: self.path.clone(),
            source,
        }
    }
}

/// Keep the last `max_lines` lines of `content`.
///
/// Lines are separated by `\n`. A single trailing newline terminates the last
/// line instead of starting an empty one, and is preserved in the output.
/// Content with at most `max_lines` lines is returned unchanged.
pub fn tail_lines(content: &str, max_lines: usize) -> String {
    if max_lines == 0 {
        return String::new();
    }

    let (body, terminator) = match content.strip_suffix('\n') {
        Some(body) => (body, "\n"),
        None => (content, ""),
    };

    let start = body
        .rmatch_indices('\n')
        .nth(max_lines - 1)
        .map(|(idx, _)| idx + 1)
        .unwrap_or(0);

    let mut excerpt = String::with_capacity(body.len() - start + terminator.len());
    excerpt.push_str(&body[start..]);
    excerpt.push_str(terminator);
    excerpt
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn numbered(count: usize) -> Vec<String> {
        (1..=count).map(|i| format!("L{}", i)).collect()
    }

    #[test]
    fn test_tail_keeps_short_content() {
        let content = numbered(3).join("\n");
        assert_eq!(tail_lines(&content, 500), content);
    }

    #[test]
    fn test_tail_exact_limit() {
        let content = numbered(500).join("\n");
        assert_eq!(tail_lines(&content, 500), content);
    }

    #[test]
    fn test_tail_truncates_long_content() {
        let content = numbered(600).join("\n");
        let expected = numbered(600)[100..].join("\n");
        assert_eq!(tail_lines(&content, 500), expected);
        assert!(tail_lines(&content, 500).starts_with("L101\n"));
    }

    #[test]
    fn test_tail_preserves_trailing_newline() {
        let content = format!("{}\n", numbered(600).join("\n"));
        let expected = format!("{}\n", numbered(600)[100..].join("\n"));
        assert_eq!(tail_lines(&content, 500), expected);

        let short = "a\nb\n";
        assert_eq!(tail_lines(short, 500), short);
    }

    #[test]
    fn test_tail_edge_cases() {
        assert_eq!(tail_lines("", 500), "");
        assert_eq!(tail_lines("\n", 500), "\n");
        assert_eq!(tail_lines("a\nb\nc", 1), "c");
        assert_eq!(tail_lines("a\nb\nc", 0), "");
        assert_eq!(tail_lines("a\n\n\nb", 2), "\nb");
    }

    #[tokio::test]
    async fn test_read_tail_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let source = LogSource::new(dir.path().join("absent.log"), 500);
        assert!(source.read_tail().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_read_tail_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("appium.log");
        std::fs::write(&path, numbered(10).join("\n")).unwrap();

        let source = LogSource::new(&path, 4);
        let excerpt = source.read_tail().await.unwrap().unwrap();
        assert_eq!(excerpt, "L7\nL8\nL9\nL10");
    }

    #[tokio::test]
    async fn test_read_tail_lossy_utf8() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("appium.log");
        std::fs::write(&path, b"ok\n\xffbad").unwrap();

        let excerpt = LogSource::new(&path, 500).read_tail().await.unwrap().unwrap();
        assert_eq!(excerpt, "ok\n\u{fffd}bad");
    }

    #[tokio::test]
    async fn test_read_tail_directory_is_failure() {
        let dir = tempfile::tempdir().unwrap();
        let source = LogSource::new(dir.path(), 500);
        let err = source.read_tail().await.unwrap_err();
        assert_eq!(err.step(), crate::capture::CaptureStep::LogRead);
    }
}
