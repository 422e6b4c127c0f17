use scanocr_core::{ComputeDevice, ComputeMode, Failure};
use std::path::Path;

const NVIDIA_PROC_DIR: &str = "/proc/driver/nvidia/gpus";

/// Devices available to the engine pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComputeDevices {
    pub gpus: usize,
    pub cpu_workers: usize,
}

impl ComputeDevices {
    /// Probe the host. `gpu_override` replaces the GPU probe and
    /// `cpu_workers` replaces the default worker count.
    pub fn detect(gpu_override: Option<usize>, cpu_workers: Option<usize>) -> Self {
        let gpus = gpu_override.unwrap_or_else(probe_gpu_count);
        let cpu_workers = cpu_workers.unwrap_or_else(default_cpu_workers).max(1);
        Self { gpus, cpu_workers }
    }

    pub fn cpu_only(cpu_workers: usize) -> Self {
        Self { gpus: 0, cpu_workers: cpu_workers.max(1) }
    }

    pub fn has_gpu(&self) -> bool {
        self.gpus > 0
    }
}

/// Half the available parallelism, at least one.
pub fn default_cpu_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get() / 2)
        .unwrap_or(1)
        .max(1)
}

/// Count visible CUDA devices. `CUDA_VISIBLE_DEVICES` wins when set; else the
/// NVIDIA driver's proc entries are counted.
pub fn probe_gpu_count() -> usize {
    match std::env::var("CUDA_VISIBLE_DEVICES") {
        Ok(list) => parse_visible_devices(&list),
        Err(_) => count_dir_entries(Path::new(NVIDIA_PROC_DIR)),
    }
}

fn parse_visible_devices(list: &str) -> usize {
    let list = list.trim();
    if list.is_empty() || list == "-1" {
        return 0;
    }
    list.split(',')
        .map(str::trim)
        .take_while(|id| !id.is_empty() && !id.starts_with('-'))
        .count()
}

fn count_dir_entries(dir: &Path) -> usize {
    std::fs::read_dir(dir)
        .map(|entries| entries.filter_map(Result::ok).count())
        .unwrap_or(0)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ComputePolicy {
    /// Run `gpu` requests on the CPU when no GPU can serve them.
    pub allow_cpu_fallback: bool,
}

/// Resolve a requested mode to the device the request will run on.
pub fn resolve(
    mode: ComputeMode,
    devices: &ComputeDevices,
    engine_gpu: bool,
    policy: &ComputePolicy,
) -> Result<ComputeDevice, Failure> {
    let gpu_ready = devices.has_gpu() && engine_gpu;
    match mode {
        ComputeMode::Cpu => Ok(ComputeDevice::Cpu),
        ComputeMode::Auto if gpu_ready => Ok(ComputeDevice::Gpu),
        ComputeMode::Auto => Ok(ComputeDevice::Cpu),
        ComputeMode::Gpu if gpu_ready => Ok(ComputeDevice::Gpu),
        ComputeMode::Gpu => {
            let reason = if devices.has_gpu() {
                "engine has no GPU support"
            } else {
                "no GPU device present"
            };
            if policy.allow_cpu_fallback {
                tracing::warn!(reason, "GPU requested, falling back to CPU");
                Ok(ComputeDevice::Cpu)
            } else {
                Err(Failure::compute_unavailable(format!("GPU requested but {reason}")))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scanocr_core::FailureKind;

    const NO_GPU: ComputeDevices = ComputeDevices { gpus: 0, cpu_workers: 2 };
    const ONE_GPU: ComputeDevices = ComputeDevices { gpus: 1, cpu_workers: 2 };
    const STRICT: ComputePolicy = ComputePolicy { allow_cpu_fallback: false };
    const LENIENT: ComputePolicy = ComputePolicy { allow_cpu_fallback: true };

    #[test]
    fn cpu_always_resolves_to_cpu() {
        assert_eq!(resolve(ComputeMode::Cpu, &ONE_GPU, true, &STRICT).unwrap(), ComputeDevice::Cpu);
    }

    #[test]
    fn auto_prefers_gpu_when_usable() {
        assert_eq!(resolve(ComputeMode::Auto, &ONE_GPU, true, &STRICT).unwrap(), ComputeDevice::Gpu);
        assert_eq!(resolve(ComputeMode::Auto, &ONE_GPU, false, &STRICT).unwrap(), ComputeDevice::Cpu);
        assert_eq!(resolve(ComputeMode::Auto, &NO_GPU, true, &STRICT).unwrap(), ComputeDevice::Cpu);
    }

    #[test]
    fn gpu_without_device_is_unavailable() {
        let err = resolve(ComputeMode::Gpu, &NO_GPU, true, &STRICT).unwrap_err();
        assert_eq!(err.kind, FailureKind::ComputeUnavailable);
        let err = resolve(ComputeMode::Gpu, &ONE_GPU, false, &STRICT).unwrap_err();
        assert_eq!(err.kind, FailureKind::ComputeUnavailable);
    }

    #[test]
    fn gpu_falls_back_when_allowed() {
        assert_eq!(resolve(ComputeMode::Gpu, &NO_GPU, true, &LENIENT).unwrap(), ComputeDevice::Cpu);
        assert_eq!(resolve(ComputeMode::Gpu, &ONE_GPU, true, &LENIENT).unwrap(), ComputeDevice::Gpu);
    }

    #[test]
    fn visible_devices_parsing() {
        assert_eq!(parse_visible_devices(""), 0);
        assert_eq!(parse_visible_devices("-1"), 0);
        assert_eq!(parse_visible_devices("0"), 1);
        assert_eq!(parse_visible_devices("0,1, 3"), 3);
        assert_eq!(parse_visible_devices("0,-1,2"), 1);
    }

    #[test]
    fn overrides_win_over_probe() {
        let d = ComputeDevices::detect(Some(3), Some(0));
        assert_eq!(d, ComputeDevices { gpus: 3, cpu_workers: 1 });
        assert!(ComputeDevices::detect(None, None).cpu_workers >= 1);
    }

    #[test]
    fn missing_proc_dir_counts_zero() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(count_dir_entries(&dir.path().join("absent")), 0);
        std::fs::create_dir(dir.path().join("0000:01:00.0")).unwrap();
        assert_eq!(count_dir_entries(dir.path()), 1);
    }
}
