pub mod binarize;
pub mod device;
pub mod histogram;
pub mod pool;
pub mod preprocess;
pub mod recognizer;
pub mod service;
pub mod types;

pub use binarize::{binarize, otsu_level, BinarizeOptions, Binarized, BinaryImage};
pub use device::{ComputeDevices, ComputePolicy};
pub use histogram::{Histogram, PeakSet};
pub use pool::{EngineLease, EnginePool};
pub use preprocess::{decode_grayscale, prepare_for_ocr, PreprocessError};
pub use recognizer::{MockFactory, MockRecognizer, OcrError, RecognizerFactory, TextRecognizer};
pub use service::{RecognitionService, ServiceOptions};
pub use types::{ImageSource, RecognitionRequest, Recognized, TextSpan};
