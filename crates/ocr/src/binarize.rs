use image::{GrayImage, ImageBuffer, Luma};
use imageproc::filter::separable_filter_equal;
use scanocr_core::BinarizationDecision;
use serde::{Deserialize, Serialize};

use crate::histogram::{Histogram, PeakSet};

/// Tuning for [`binarize`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BinarizeOptions {
    /// Side of the square neighbourhood for local thresholding. Even values
    /// are rounded up to the next odd size; the minimum is 3.
    pub window: u32,
    /// Constant subtracted from the neighbourhood mean.
    pub bias: i32,
    /// Minimum bucket count for a histogram peak.
    pub min_peak_height: u64,
}

impl Default for BinarizeOptions {
    fn default() -> Self {
        Self { window: 11, bias: 2, min_peak_height: 1 }
    }
}

impl BinarizeOptions {
    fn kernel_size(&self) -> usize {
        let k = self.window.max(3) as usize;
        k | 1
    }
}

/// A grayscale image whose every sample is 0 or 255.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryImage(GrayImage);

impl BinaryImage {
    pub fn as_gray(&self) -> &GrayImage {
        &self.0
    }

    pub fn into_gray(self) -> GrayImage {
        self.0
    }

    pub fn width(&self) -> u32 {
        self.0.width()
    }

    pub fn height(&self) -> u32 {
        self.0.height()
    }
}

/// Output of one binarization run.
#[derive(Debug, Clone)]
pub struct Binarized {
    pub image: BinaryImage,
    pub decision: BinarizationDecision,
    pub peaks: PeakSet,
    /// The global cut, when Otsu was used.
    pub threshold: Option<u8>,
}

/// Two or more peaks mean the page has separable foreground and background.
pub fn decide(peaks: &PeakSet) -> BinarizationDecision {
    if peaks.len() >= 2 {
        BinarizationDecision::GlobalOtsu
    } else {
        BinarizationDecision::LocalAdaptive
    }
}

/// Binarize a grayscale page, choosing global or local thresholding from the
/// shape of its own histogram. Never fails.
pub fn binarize(gray: &GrayImage, options: &BinarizeOptions) -> Binarized {
    let histogram = Histogram::from_gray(gray);
    let peaks = histogram.peaks(options.min_peak_height);
    let decision = decide(&peaks);

    match decision {
        BinarizationDecision::GlobalOtsu => {
            let level = otsu_level(&histogram);
            Binarized {
                image: threshold_global(gray, level),
                decision,
                peaks,
                threshold: Some(level),
            }
        }
        BinarizationDecision::LocalAdaptive => Binarized {
            image: threshold_gaussian(gray, options.kernel_size(), options.bias),
            decision,
            peaks,
            threshold: None,
        },
    }
}

/// Otsu's level: the cut `t` maximising between-class variance for the
/// classes `[0, t]` and `(t, 255]`. The first maximising `t` wins.
pub fn otsu_level(histogram: &Histogram) -> u8 {
    let total = histogram.total();
    if total == 0 {
        return 0;
    }

    let sum_total: f64 = histogram
        .counts()
        .iter()
        .enumerate()
        .map(|(i, &n)| i as f64 * n as f64)
        .sum();

    let mut sum_background = 0.0f64;
    let mut weight_background = 0u64;
    let mut max_variance = 0.0f64;
    let mut best = 0u8;

    for (t, &count) in histogram.counts().iter().enumerate() {
        weight_background += count;
        sum_background += t as f64 * count as f64;
        if weight_background == 0 {
            continue;
        }
        let weight_foreground = total - weight_background;
        if weight_foreground == 0 {
            break;
        }

        let mean_background = sum_background / weight_background as f64;
        let mean_foreground = (sum_total - sum_background) / weight_foreground as f64;
        let between = weight_background as f64
            * weight_foreground as f64
            * (mean_background - mean_foreground).powi(2);

        if between > max_variance {
            max_variance = between;
            best = t as u8;
        }
    }

    best
}

fn threshold_global(gray: &GrayImage, level: u8) -> BinaryImage {
    let out = ImageBuffer::from_fn(gray.width(), gray.height(), |x, y| {
        let p = gray.get_pixel(x, y)[0];
        Luma([if p > level { 255u8 } else { 0u8 }])
    });
    BinaryImage(out)
}

/// Per-pixel threshold against the Gaussian-weighted neighbourhood mean
/// minus `bias`. Borders replicate the edge pixels, so a uniform image
/// compares every pixel against itself minus `bias`.
fn threshold_gaussian(gray: &GrayImage, ksize: usize, bias: i32) -> BinaryImage {
    if gray.width() == 0 || gray.height() == 0 {
        return BinaryImage(gray.clone());
    }
    let means = separable_filter_equal(gray, &gaussian_kernel(ksize));
    let out = ImageBuffer::from_fn(gray.width(), gray.height(), |x, y| {
        let p = gray.get_pixel(x, y)[0] as i32;
        let mean = means.get_pixel(x, y)[0] as i32;
        Luma([if p > mean - bias { 255u8 } else { 0u8 }])
    });
    BinaryImage(out)
}

/// Normalised 1-D Gaussian kernel; sigma follows the usual size-derived
/// default `0.3 * ((k - 1) * 0.5 - 1) + 0.8`.
fn gaussian_kernel(ksize: usize) -> Vec<f32> {
    let sigma = 0.3 * ((ksize as f32 - 1.0) * 0.5 - 1.0) + 0.8;
    let half = (ksize / 2) as i32;
    let mut kernel: Vec<f32> = (-half..=half)
        .map(|i| (-((i * i) as f32) / (2.0 * sigma * sigma)).exp())
        .collect();
    let sum: f32 = kernel.iter().sum();
    kernel.iter_mut().for_each(|w| *w /= sum);
    kernel
}
