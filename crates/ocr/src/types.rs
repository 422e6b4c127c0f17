use scanocr_core::{BinarizationDecision, ComputeDevice, ComputeMode, LanguageSet};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Where the image of a request comes from.
#[derive(Debug, Clone)]
pub enum ImageSource {
    /// Encoded image bytes (PNG, JPEG, TIFF, …) supplied by the caller.
    Bytes(Vec<u8>),
    /// A file the service reads itself.
    Path(PathBuf),
}

impl fmt::Display for ImageSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageSource::Bytes(b) => write!(f, "<{} bytes>", b.len()),
            ImageSource::Path(p) => write!(f, "{}", p.display()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RecognitionRequest {
    pub source: ImageSource,
    pub languages: LanguageSet,
    pub compute: ComputeMode,
}

impl RecognitionRequest {
    pub fn from_bytes(data: Vec<u8>, languages: LanguageSet, compute: ComputeMode) -> Self {
        Self { source: ImageSource::Bytes(data), languages, compute }
    }

    pub fn from_path(path: impl Into<PathBuf>, languages: LanguageSet, compute: ComputeMode) -> Self {
        Self { source: ImageSource::Path(path.into()), languages, compute }
    }
}

/// One piece of text returned by an engine, in reading order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TextSpan {
    pub text: String,
    /// Engine confidence (0.0 to 1.0), when the engine reports one.
    pub confidence: Option<f32>,
    /// `[x, y, width, height]` in binary-image pixels.
    pub bbox: Option<[u32; 4]>,
}

impl TextSpan {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into(), confidence: None, bbox: None }
    }

    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = Some(confidence.clamp(0.0, 1.0));
        self
    }

    pub fn with_bbox(mut self, bbox: [u32; 4]) -> Self {
        self.bbox = Some(bbox);
        self
    }
}

/// Join span strings in engine order with no separator.
pub fn concat_spans(spans: &[TextSpan]) -> String {
    spans.iter().map(|s| s.text.as_str()).collect()
}

/// A successful recognition.
#[derive(Debug, Clone, PartialEq)]
pub struct Recognized {
    pub text: String,
    pub decision: BinarizationDecision,
    pub compute: ComputeDevice,
    pub span_count: usize,
}

/// Lifecycle of one request inside the service, used for tracing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Received,
    Preprocessed,
    Recognized,
    Responded,
    Failed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Received => write!(f, "received"),
            Stage::Preprocessed => write!(f, "preprocessed"),
            Stage::Recognized => write!(f, "recognized"),
            Stage::Responded => write!(f, "responded"),
            Stage::Failed => write!(f, "failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn span_clamps_confidence() {
        assert_eq!(TextSpan::new("a").with_confidence(1.5).confidence, Some(1.0));
        assert_eq!(TextSpan::new("a").with_confidence(-0.1).confidence, Some(0.0));
    }

    #[test]
    fn concat_has_no_separator() {
        let spans = vec![TextSpan::new("영수증"), TextSpan::new("Total"), TextSpan::new(" 5.50")];
        assert_eq!(concat_spans(&spans), "영수증Total 5.50");
        assert_eq!(concat_spans(&[]), "");
    }

    #[test]
    fn source_display() {
        assert_eq!(ImageSource::Bytes(vec![0; 3]).to_string(), "<3 bytes>");
        assert_eq!(ImageSource::Path("/scans/a.png".into()).to_string(), "/scans/a.png");
    }
}
