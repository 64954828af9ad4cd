//! Diagnostic artifacts handed to a report sink.

use serde::Serialize;
use std::io::Cursor;

/// Attachment name used for the failure screenshot
pub const SCREENSHOT_NAME: &str = "Screenshot on Failure";

/// Attachment name used for the screen recording
pub const VIDEO_NAME: &str = "Video Recording";

/// Kind of diagnostic artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Screenshot,
    Video,
    LogExcerpt,
}

impl ArtifactKind {
    pub fn mime_type(&self) -> &'static str {
        match self {
            ArtifactKind::Screenshot => "image/png",
            ArtifactKind::Video => "video/mp4",
            ArtifactKind::LogExcerpt => "text/plain",
        }
    }

    /// File extension used when the artifact is written to disk
    pub fn extension(&self) -> &'static str {
        match self {
            ArtifactKind::Screenshot => "png",
            ArtifactKind::Video => "mp4",
            ArtifactKind::LogExcerpt => "txt",
        }
    }
}

/// Artifact content
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Binary(Vec<u8>),
    Text(String),
}

impl Payload {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Payload::Binary(bytes) => bytes,
            Payload::Text(text) => text.as_bytes(),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Payload::Text(text) => Some(text),
            Payload::Binary(_) => None,
        }
    }

    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A named, immutable diagnostic payload
#[derive(Debug, Clone, PartialEq)]
pub struct Artifact {
    name: String,
    kind: ArtifactKind,
    payload: Payload,
    metadata: Option<serde_json::Value>,
}

impl Artifact {
    /// Wrap PNG bytes from the driver.
    ///
    /// When the bytes decode as an image its dimensions are kept as metadata;
    /// undecodable bytes are still attached as-is.
    pub fn screenshot(png: Vec<u8>) -> Self {
        let metadata = png_dimensions(&png).map(|(width, height)| {
            serde_json::json!({
                "width": width,
                "height": height,
            })
        });
        Self {
            name: SCREENSHOT_NAME.to_string(),
            kind: ArtifactKind::Screenshot,
            payload: Payload::Binary(png),
            metadata,
        }
    }

    /// Wrap a stopped screen recording
    pub fn video(mp4: Vec<u8>) -> Self {
        Self {
            name: VIDEO_NAME.to_string(),
            kind: ArtifactKind::Video,
            payload: Payload::Binary(mp4),
            metadata: None,
        }
    }

    /// Wrap the tail of the server log
    pub fn log_excerpt(text: String, tail_lines: usize) -> Self {
        let line_count = text.lines().count();
        Self {
            name: log_excerpt_name(tail_lines),
            kind: ArtifactKind::LogExcerpt,
            payload: Payload::Text(text),
            metadata: Some(serde_json::json!({ "lines": line_count })),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ArtifactKind {
        self.kind
    }

    pub fn mime_type(&self) -> &'static str {
        self.kind.mime_type()
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn metadata(&self) -> Option<&serde_json::Value> {
        self.metadata.as_ref()
    }

    pub fn into_payload(self) -> Payload {
        self.payload
    }
}

/// Attachment name for the log excerpt, e.g. "Appium Server Logs (last 500 lines)"
pub fn log_excerpt_name(tail_lines: usize) -> String {
    format!("Appium Server Logs (last {} lines)", tail_lines)
}

fn png_dimensions(data: &[u8]) -> Option<(u32, u32)> {
    image::io::Reader::new(Cursor::new(data))
        .with_guessed_format()
        .ok()?
        .into_dimensions()
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb};

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = ImageBuffer::from_pixel(width, height, Rgb([10u8, 20, 30]));
        let mut bytes = Vec::new();
        img.write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        bytes
    }

    #[test]
    fn test_kind_mime_types() {
        assert_eq!(ArtifactKind::Screenshot.mime_type(), "image/png");
        assert_eq!(ArtifactKind::Video.mime_type(), "video/mp4");
        assert_eq!(ArtifactKind::LogExcerpt.mime_type(), "text/plain");
    }

    #[test]
    fn test_screenshot_records_dimensions() {
        let artifact = Artifact::screenshot(png_bytes(12, 7));
        assert_eq!(artifact.name(), "Screenshot on Failure");
        assert_eq!(artifact.mime_type(), "image/png");
        let meta = artifact.metadata().unwrap();
        assert_eq!(meta["width"], 12);
        assert_eq!(meta["height"], 7);
    }

    #[test]
    fn test_screenshot_with_garbage_bytes() {
        let artifact = Artifact::screenshot(vec![1, 2, 3]);
        assert!(artifact.metadata().is_none());
        assert_eq!(artifact.payload().len(), 3);
    }

    #[test]
    fn test_log_excerpt_name() {
        let artifact = Artifact::log_excerpt("a\nb".to_string(), 500);
        assert_eq!(artifact.name(), "Appium Server Logs (last 500 lines)");
        assert_eq!(artifact.payload().as_text(), Some("a\nb"));
        assert_eq!(artifact.metadata().unwrap()["lines"], 2);
    }
}
