use scanocr_core::{ComputeDevice, LanguageSet};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::binarize::BinaryImage;
use crate::device::ComputeDevices;
use crate::recognizer::{OcrError, RecognizerFactory, TextRecognizer};
use crate::types::TextSpan;

/// Idle engines kept across all keys unless configured otherwise.
pub const DEFAULT_MAX_IDLE_ENGINES: usize = 8;

type EngineKey = (ComputeDevice, LanguageSet);
type Engine = Box<dyn TextRecognizer>;

/// Parked engines plus the order they were parked in, one `order` entry per
/// engine. The front of `order` is the least recently used.
#[derive(Default)]
struct IdleEngines {
    by_key: HashMap<EngineKey, Vec<Engine>>,
    order: VecDeque<EngineKey>,
}

impl IdleEngines {
    fn take(&mut self, key: &EngineKey) -> Option<Engine> {
        let engines = self.by_key.get_mut(key)?;
        let engine = engines.pop()?;
        if engines.is_empty() {
            self.by_key.remove(key);
        }
        if let Some(pos) = self.order.iter().rposition(|k| k == key) {
            self.order.remove(pos);
        }
        Some(engine)
    }

    /// Park `engine` and hand back whatever no longer fits under `cap`.
    fn put(&mut self, key: EngineKey, engine: Engine, cap: usize) -> Vec<(EngineKey, Engine)> {
        self.by_key.entry(key.clone()).or_default().push(engine);
        self.order.push_back(key);

        let mut evicted = Vec::new();
        while self.order.len() > cap {
            let Some(oldest) = self.order.pop_front() else { break };
            let Some(engines) = self.by_key.get_mut(&oldest) else { continue };
            let engine = engines.remove(0);
            if engines.is_empty() {
                self.by_key.remove(&oldest);
            }
            evicted.push((oldest, engine));
        }
        evicted
    }

    fn len(&self) -> usize {
        self.order.len()
    }
}

/// Long-lived engines keyed by `(device, languages)`, behind one gate per
/// device class. GPU permits equal the GPU count; CPU permits equal the
/// configured worker count. At most `max_idle` engines stay parked; the
/// least recently used one is dropped first.
pub struct EnginePool {
    factory: Arc<dyn RecognizerFactory>,
    gpu_slots: usize,
    gpu_gate: Arc<Semaphore>,
    cpu_gate: Arc<Semaphore>,
    max_idle: usize,
    idle: Mutex<IdleEngines>,
}

impl EnginePool {
    pub fn new(factory: Arc<dyn RecognizerFactory>, devices: &ComputeDevices) -> Self {
        Self {
            factory,
            gpu_slots: devices.gpus,
            gpu_gate: Arc::new(Semaphore::new(devices.gpus)),
            cpu_gate: Arc::new(Semaphore::new(devices.cpu_workers.max(1))),
            max_idle: DEFAULT_MAX_IDLE_ENGINES,
            idle: Mutex::new(IdleEngines::default()),
        }
    }

    pub fn with_max_idle(mut self, max_idle: usize) -> Self {
        self.max_idle = max_idle;
        self
    }

    pub fn factory(&self) -> &dyn RecognizerFactory {
        self.factory.as_ref()
    }

    pub fn max_idle(&self) -> usize {
        self.max_idle
    }

    /// Wait for a permit on `device` and hand out a cached engine when one is
    /// idle. The engine itself is created on first use by the lease.
    pub async fn acquire(
        self: &Arc<Self>,
        device: ComputeDevice,
        languages: &LanguageSet,
    ) -> Result<EngineLease, OcrError> {
        let gate = match device {
            ComputeDevice::Gpu => &self.gpu_gate,
            ComputeDevice::Cpu => &self.cpu_gate,
        };
        if device == ComputeDevice::Gpu && self.gpu_slots == 0 {
            return Err(OcrError::Unsupported(device));
        }
        let permit = Arc::clone(gate)
            .acquire_owned()
            .await
            .map_err(|_| OcrError::Engine("engine pool closed".into()))?;

        let key = (device, languages.clone());
        let engine = self.lock_idle().take(&key);

        Ok(EngineLease {
            pool: Arc::clone(self),
            key,
            engine,
            _permit: permit,
        })
    }

    /// Engines currently parked in the pool, across all keys.
    pub fn idle_count(&self) -> usize {
        self.lock_idle().len()
    }

    fn lock_idle(&self) -> std::sync::MutexGuard<'_, IdleEngines> {
        self.idle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn park(&self, key: EngineKey, engine: Engine) {
        let evicted = self.lock_idle().put(key, engine, self.max_idle);
        // The guard is gone by now, so evicted engines drop unlocked.
        for ((device, languages), _engine) in evicted {
            tracing::debug!(device = %device, languages = %languages, "evicting idle engine");
        }
    }
}

/// Exclusive use of one engine plus one device permit. Dropping the lease
/// returns both, unless the engine panicked, in which case it is discarded.
pub struct EngineLease {
    pool: Arc<EnginePool>,
    key: EngineKey,
    engine: Option<Engine>,
    _permit: OwnedSemaphorePermit,
}

impl EngineLease {
    pub fn device(&self) -> ComputeDevice {
        self.key.0
    }

    /// Run the engine, creating it first if this key had none idle. Blocking.
    pub fn recognize(&mut self, image: &BinaryImage) -> Result<Vec<TextSpan>, OcrError> {
        let engine = match self.engine.take() {
            Some(engine) => engine,
            None => {
                let (device, languages) = &self.key;
                let engine = self.pool.factory.create(languages, *device)?;
                tracing::debug!(
                    engine = self.pool.factory.name(),
                    device = %device,
                    languages = %languages,
                    "engine created"
                );
                engine
            }
        };
        let engine = self.engine.insert(engine);
        engine.recognize(image, &self.key.1)
    }
}

impl Drop for EngineLease {
    fn drop(&mut self) {
        let Some(engine) = self.engine.take() else { return };
        if std::thread::panicking() {
            tracing::warn!(device = %self.key.0, "discarding engine after panic");
            return;
        }
        self.pool.park(self.key.clone(), engine);
    }
}
