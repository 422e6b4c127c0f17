use scanocr_core::{ComputeDevice, Failure, LanguageSet};
use std::any::Any;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::binarize::{BinarizeOptions, Binarized, BinaryImage};
use crate::device::{resolve, ComputeDevices, ComputePolicy};
use crate::pool::{EnginePool, DEFAULT_MAX_IDLE_ENGINES};
use crate::preprocess::{prepare_for_ocr, PreprocessError};
use crate::recognizer::{OcrError, RecognizerFactory};
use crate::types::{concat_spans, ImageSource, RecognitionRequest, Recognized, Stage, TextSpan};

#[derive(Debug, Clone)]
pub struct ServiceOptions {
    pub binarize: BinarizeOptions,
    /// Pages larger than this on either side are scaled down before binarizing.
    pub max_dimension: Option<u32>,
    pub policy: ComputePolicy,
    /// Bound on reading a path-based request's file.
    pub io_timeout: Duration,
    /// Bound on waiting for an engine plus running it.
    pub inference_timeout: Duration,
    /// Idle engines kept in the pool across all language sets.
    pub max_idle_engines: usize,
}

impl Default for ServiceOptions {
    fn default() -> Self {
        Self {
            binarize: BinarizeOptions::default(),
            max_dimension: None,
            policy: ComputePolicy::default(),
            io_timeout: Duration::from_secs(30),
            inference_timeout: Duration::from_secs(120),
            max_idle_engines: DEFAULT_MAX_IDLE_ENGINES,
        }
    }
}

/// Orchestrates: resolve compute → load → decode + binarize → lease engine →
/// recognize → concatenate. Every error leaves as a [`Failure`].
pub struct RecognitionService {
    pool: Arc<EnginePool>,
    devices: ComputeDevices,
    options: ServiceOptions,
}

impl RecognitionService {
    pub fn new(factory: Arc<dyn RecognizerFactory>, devices: ComputeDevices, options: ServiceOptions) -> Self {
        Self {
            pool: Arc::new(EnginePool::new(factory, &devices).with_max_idle(options.max_idle_engines)),
            devices,
            options,
        }
    }

    pub fn devices(&self) -> ComputeDevices {
        self.devices
    }

    pub fn engine_name(&self) -> &str {
        self.pool.factory().name()
    }

    pub fn pool(&self) -> &Arc<EnginePool> {
        &self.pool
    }

    pub fn options(&self) -> &ServiceOptions {
        &self.options
    }

    /// Recognize the text of one image.
    #[tracing::instrument(
        name = "recognize",
        skip_all,
        fields(request_id = %uuid::Uuid::new_v4(), source = %req.source, mode = %req.compute)
    )]
    pub async fn recognize(&self, req: RecognitionRequest) -> Result<Recognized, Failure> {
        debug!(stage = %Stage::Received, languages = %req.languages);

        let result = self.run(req).await;
        match &result {
            Ok(done) => debug!(
                stage = %Stage::Responded,
                decision = %done.decision,
                compute = %done.compute,
                spans = done.span_count,
            ),
            Err(failure) => {
                warn!(stage = %Stage::Failed, kind = %failure.kind, reason = %failure.reason);
                debug!(stage = %Stage::Responded);
            }
        }
        result
    }

    async fn run(&self, req: RecognitionRequest) -> Result<Recognized, Failure> {
        let RecognitionRequest { source, languages, compute } = req;

        let engine_gpu = self.pool.factory().supports(ComputeDevice::Gpu);
        let device = resolve(compute, &self.devices, engine_gpu, &self.options.policy)?;

        let data = self.load(source).await?;
        let binarized = self.preprocess(data).await?;
        debug!(
            stage = %Stage::Preprocessed,
            decision = %binarized.decision,
            peaks = binarized.peaks.len(),
            threshold = ?binarized.threshold,
        );

        let decision = binarized.decision;
        let spans = self.infer(device, languages, binarized.image).await?;
        debug!(stage = %Stage::Recognized, spans = spans.len());

        Ok(Recognized {
            text: concat_spans(&spans),
            decision,
            compute: device,
            span_count: spans.len(),
        })
    }

    async fn load(&self, source: ImageSource) -> Result<Vec<u8>, Failure> {
        let path = match source {
            ImageSource::Bytes(data) => return Ok(data),
            ImageSource::Path(path) => path,
        };
        match tokio::time::timeout(self.options.io_timeout, tokio::fs::read(&path)).await {
            Ok(Ok(data)) => Ok(data),
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(Failure::not_found(format!("no such file: {}", path.display())))
            }
            Ok(Err(e)) => Err(Failure::recognition(format!("cannot read {}: {e}", path.display()))),
            Err(_) => Err(Failure::timeout(format!(
                "reading {} took longer than {}s",
                path.display(),
                self.options.io_timeout.as_secs_f32()
            ))),
        }
    }

    async fn preprocess(&self, data: Vec<u8>) -> Result<Binarized, Failure> {
        let max_dimension = self.options.max_dimension;
        let options = self.options.binarize.clone();
        let outcome = tokio::task::spawn_blocking(move || prepare_for_ocr(&data, max_dimension, &options))
            .await
            .map_err(|e| Failure::recognition(format!("preprocessing aborted: {e}")))?;
        outcome.map_err(|e| match e {
            PreprocessError::Decode(err) => Failure::decode(err.to_string()),
            other => Failure::recognition(other.to_string()),
        })
    }

    async fn infer(
        &self,
        device: ComputeDevice,
        languages: LanguageSet,
        image: BinaryImage,
    ) -> Result<Vec<TextSpan>, Failure> {
        let inference = async {
            let mut lease = self.pool.acquire(device, &languages).await.map_err(engine_failure)?;
            tokio::task::spawn_blocking(move || lease.recognize(&image))
                .await
                .map_err(|e| match e.try_into_panic() {
                    Ok(payload) => Failure::recognition(format!("engine panicked: {}", panic_message(payload.as_ref()))),
                    Err(e) => Failure::recognition(format!("engine task aborted: {e}")),
                })?
                .map_err(engine_failure)
        };

        match tokio::time::timeout(self.options.inference_timeout, inference).await {
            Ok(result) => result,
            Err(_) => Err(Failure::timeout(format!(
                "no result within {}s",
                self.options.inference_timeout.as_secs_f32()
            ))),
        }
    }
}

fn engine_failure(e: OcrError) -> Failure {
    match e {
        OcrError::Unsupported(_) | OcrError::NotAvailable => Failure::compute_unavailable(e.to_string()),
        other => Failure::recognition(other.to_string()),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s
    } else {
        "unknown panic"
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
