use scanocr_core::{ComputeDevice, LanguageSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use thiserror::Error;

use crate::binarize::BinaryImage;
use crate::types::TextSpan;

#[derive(Debug, Error)]
pub enum OcrError {
    #[error("Image encode error: {0}")]
    ImageEncode(String),
    #[error("OCR engine error: {0}")]
    Engine(String),
    #[error("Engine does not support {0} compute")]
    Unsupported(ComputeDevice),
    #[error("Tesseract not available; build with `tesseract` feature")]
    NotAvailable,
}

/// One live instance of a text-recognition engine.
///
/// Instances are held exclusively for the duration of a call (see
/// [`crate::pool::EngineLease`]), hence `&mut self`.
pub trait TextRecognizer: Send {
    /// Recognize text spans in reading order.
    fn recognize(
        &mut self,
        image: &BinaryImage,
        languages: &LanguageSet,
    ) -> Result<Vec<TextSpan>, OcrError>;
}

/// Builds engine instances; one factory serves the whole process.
pub trait RecognizerFactory: Send + Sync {
    fn name(&self) -> &str;

    fn supports(&self, device: ComputeDevice) -> bool;

    /// Create an engine for `languages` on `device`. May be slow (model
    /// loading), so callers invoke it off the async runtime.
    fn create(
        &self,
        languages: &LanguageSet,
        device: ComputeDevice,
    ) -> Result<Box<dyn TextRecognizer>, OcrError>;
}

// ── Mock backend (always available, used for tests) ───────────────────────────

/// Returns pre-set spans. Useful for exercising the service and batch
/// layers without an OCR engine installed.
pub struct MockRecognizer {
    pub spans: Vec<String>,
}

impl MockRecognizer {
    pub fn new(text: impl Into<String>) -> Self {
        Self { spans: vec![text.into()] }
    }

    pub fn with_spans<I, S>(spans: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { spans: spans.into_iter().map(Into::into).collect() }
    }
}

impl TextRecognizer for MockRecognizer {
    fn recognize(
        &mut self,
        _image: &BinaryImage,
        _languages: &LanguageSet,
    ) -> Result<Vec<TextSpan>, OcrError> {
        Ok(self.spans.iter().map(TextSpan::new).collect())
    }
}

/// Factory for [`MockRecognizer`]s that counts how many engines it built.
pub struct MockFactory {
    spans: Vec<String>,
    gpu: bool,
    created: AtomicUsize,
}

impl MockFactory {
    pub fn new(text: impl Into<String>) -> Self {
        Self::with_spans([text.into()])
    }

    pub fn with_spans<I, S>(spans: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            spans: spans.into_iter().map(Into::into).collect(),
            gpu: false,
            created: AtomicUsize::new(0),
        }
    }

    /// Claim GPU support, so GPU requests resolve when devices exist.
    pub fn with_gpu_support(mut self) -> Self {
        self.gpu = true;
        self
    }

    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }
}

impl RecognizerFactory for MockFactory {
    fn name(&self) -> &str {
        "mock"
    }

    fn supports(&self, device: ComputeDevice) -> bool {
        match device {
            ComputeDevice::Cpu => true,
            ComputeDevice::Gpu => self.gpu,
        }
    }

    fn create(
        &self,
        _languages: &LanguageSet,
        device: ComputeDevice,
    ) -> Result<Box<dyn TextRecognizer>, OcrError> {
        if !self.supports(device) {
            return Err(OcrError::Unsupported(device));
        }
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockRecognizer::with_spans(self.spans.clone())))
    }
}

/// Map a recognition language code onto Tesseract's traineddata name.
pub fn tesseract_language(code: &str) -> &str {
    match code {
        "en" => "eng",
        "ko" => "kor",
        "ja" => "jpn",
        "ch_sim" => "chi_sim",
        "ch_tra" => "chi_tra",
        "de" => "deu",
        "fr" => "fra",
        "es" => "spa",
        "it" => "ita",
        "pt" => "por",
        "ru" => "rus",
        "ar" => "ara",
        "th" => "tha",
        "vi" => "vie",
        other => other,
    }
}

/// Tesseract's `lang` argument for a language set, e.g. `eng+kor`.
pub fn tesseract_languages(languages: &LanguageSet) -> String {
    languages
        .iter()
        .map(|l| tesseract_language(l.as_str()))
        .collect::<Vec<_>>()
        .join("+")
}

// ── Tesseract backend (optional, gated behind `tesseract` feature) ─────────────

#[cfg(feature = "tesseract")]
pub mod tesseract_backend {
    use super::{tesseract_languages, OcrError, RecognizerFactory, TextRecognizer};
    use crate::binarize::BinaryImage;
    use crate::preprocess::encode_png;
    use crate::types::TextSpan;
    use leptess::LepTess;
    use scanocr_core::{ComputeDevice, LanguageSet};

    /// CPU-only factory over libtesseract.
    pub struct TesseractFactory {
        data_path: Option<String>,
    }

    impl TesseractFactory {
        pub fn new(data_path: Option<String>) -> Self {
            Self { data_path }
        }
    }

    impl RecognizerFactory for TesseractFactory {
        fn name(&self) -> &str {
            "tesseract"
        }

        fn supports(&self, device: ComputeDevice) -> bool {
            device == ComputeDevice::Cpu
        }

        fn create(
            &self,
            languages: &LanguageSet,
            device: ComputeDevice,
        ) -> Result<Box<dyn TextRecognizer>, OcrError> {
            if device != ComputeDevice::Cpu {
                return Err(OcrError::Unsupported(device));
            }
            let lt = LepTess::new(self.data_path.as_deref(), &tesseract_languages(languages))
                .map_err(|e| OcrError::Engine(e.to_string()))?;
            Ok(Box::new(TesseractRecognizer { lt }))
        }
    }

    pub struct TesseractRecognizer {
        lt: LepTess,
    }

    impl TextRecognizer for TesseractRecognizer {
        fn recognize(
            &mut self,
            image: &BinaryImage,
            _languages: &LanguageSet,
        ) -> Result<Vec<TextSpan>, OcrError> {
            let png = encode_png(image.as_gray()).map_err(|e| OcrError::ImageEncode(e.to_string()))?;
            self.lt
                .set_image_from_mem(&png)
                .map_err(|e| OcrError::Engine(e.to_string()))?;
            let text = self
                .lt
                .get_utf8_text()
                .map_err(|e| OcrError::Engine(e.to_string()))?;
            let confidence = self.lt.mean_text_conf() as f32 / 100.0;
            Ok(vec![TextSpan::new(text).with_confidence(confidence)])
        }
    }
}
