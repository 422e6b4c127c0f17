use serde::{Deserialize, Serialize};
use std::fmt;

/// Compute preference carried by a recognition request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComputeMode {
    /// GPU or nothing (unless the server allows CPU fallback).
    Gpu,
    Cpu,
    /// GPU when one is present, CPU otherwise.
    #[default]
    Auto,
}

impl fmt::Display for ComputeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComputeMode::Gpu => write!(f, "gpu"),
            ComputeMode::Cpu => write!(f, "cpu"),
            ComputeMode::Auto => write!(f, "auto"),
        }
    }
}

impl std::str::FromStr for ComputeMode {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gpu" => Ok(ComputeMode::Gpu),
            "cpu" => Ok(ComputeMode::Cpu),
            "auto" => Ok(ComputeMode::Auto),
            other => Err(format!("Unknown compute mode: '{other}'")),
        }
    }
}

/// The device class a request actually ran on, after resolving its `ComputeMode`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComputeDevice {
    Gpu,
    Cpu,
}

impl fmt::Display for ComputeDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComputeDevice::Gpu => write!(f, "gpu"),
            ComputeDevice::Cpu => write!(f, "cpu"),
        }
    }
}

/// Thresholding strategy picked from the histogram's peak count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinarizationDecision {
    /// Two or more histogram peaks: a single Otsu cut over the whole image.
    GlobalOtsu,
    /// Fewer than two peaks: per-pixel Gaussian-weighted neighbourhood threshold.
    LocalAdaptive,
}

impl fmt::Display for BinarizationDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BinarizationDecision::GlobalOtsu => write!(f, "global_otsu"),
            BinarizationDecision::LocalAdaptive => write!(f, "local_adaptive"),
        }
    }
}
