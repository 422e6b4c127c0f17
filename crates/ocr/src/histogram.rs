use image::GrayImage;

pub const BUCKETS: usize = 256;

/// Intensity histogram of an 8-bit grayscale image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Histogram {
    counts: [u64; BUCKETS],
}

/// Local maxima of a histogram. Only the count drives binarization; the
/// indices are kept for logging.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PeakSet {
    indices: Vec<u8>,
}

impl PeakSet {
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn indices(&self) -> &[u8] {
        &self.indices
    }
}

impl Histogram {
    pub fn from_gray(img: &GrayImage) -> Self {
        let mut counts = [0u64; BUCKETS];
        for p in img.pixels() {
            counts[p[0] as usize] += 1;
        }
        Self { counts }
    }

    pub fn from_counts(counts: [u64; BUCKETS]) -> Self {
        Self { counts }
    }

    pub fn counts(&self) -> &[u64; BUCKETS] {
        &self.counts
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }

    /// Find local maxima with at least `min_height` samples (values below 1
    /// are treated as 1).
    ///
    /// A maximal run of equal counts is one candidate; it is a peak when
    /// every neighbour of the run is strictly lower. Runs touching bucket 0
    /// or 255 are judged against their single neighbour, and a run covering
    /// the whole histogram is a peak on height alone. The reported index is
    /// the run's midpoint.
    pub fn peaks(&self, min_height: u64) -> PeakSet {
        let min_height = min_height.max(1);
        let c = &self.counts;
        let mut indices = Vec::new();

        let mut start = 0;
        while start < BUCKETS {
            let height = c[start];
            let mut end = start;
            while end + 1 < BUCKETS && c[end + 1] == height {
                end += 1;
            }

            let left_lower = start == 0 || c[start - 1] < height;
            let right_lower = end == BUCKETS - 1 || c[end + 1] < height;
            if height >= min_height && left_lower && right_lower {
                indices.push(((start + end) / 2) as u8);
            }

            start = end + 1;
        }

        PeakSet { indices }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Luma};

    fn with_buckets(entries: &[(usize, u64)]) -> Histogram {
        let mut counts = [0u64; BUCKETS];
        for &(i, n) in entries {
            counts[i] = n;
        }
        Histogram::from_counts(counts)
    }

    #[test]
    fn counts_every_pixel() {
        let img: GrayImage = ImageBuffer::from_fn(16, 4, |x, _| Luma([if x < 8 { 10 } else { 240 }]));
        let h = Histogram::from_gray(&img);
        assert_eq!(h.total(), 64);
        assert_eq!(h.counts()[10], 32);
        assert_eq!(h.counts()[240], 32);
    }

    #[test]
    fn all_zero_histogram_has_no_peaks() {
        let h = Histogram::from_counts([0; BUCKETS]);
        assert!(h.peaks(1).is_empty());
        assert!(Histogram::from_gray(&GrayImage::new(0, 0)).peaks(1).is_empty());
    }

    #[test]
    fn single_bucket_is_exactly_one_peak_anywhere() {
        for i in [0, 1, 77, 128, 254, 255] {
            let peaks = with_buckets(&[(i, 500)]).peaks(1);
            assert_eq!(peaks.indices(), &[i as u8], "bucket {i}");
        }
    }

    #[test]
    fn two_separated_buckets_are_two_peaks() {
        let peaks = with_buckets(&[(40, 300), (200, 700)]).peaks(1);
        assert_eq!(peaks.indices(), &[40, 200]);
    }

    #[test]
    fn boundary_buckets_count_as_peaks() {
        let peaks = with_buckets(&[(0, 10), (255, 90)]).peaks(1);
        assert_eq!(peaks.len(), 2);
    }

    #[test]
    fn plateau_counts_once_at_its_midpoint() {
        let peaks = with_buckets(&[(50, 5), (51, 5), (52, 5), (53, 5)]).peaks(1);
        assert_eq!(peaks.indices(), &[51]);
    }

    #[test]
    fn shoulder_is_not_a_peak() {
        // 10 rises into 20, so only the 20 bucket is a maximum.
        let peaks = with_buckets(&[(100, 10), (101, 20), (102, 3)]).peaks(1);
        assert_eq!(peaks.indices(), &[101]);
    }

    #[test]
    fn flat_histogram_is_one_peak() {
        let h = Histogram::from_counts([7; BUCKETS]);
        assert_eq!(h.peaks(1).len(), 1);
    }

    #[test]
    fn min_height_filters_small_bumps() {
        let h = with_buckets(&[(30, 2), (120, 50), (220, 60)]);
        assert_eq!(h.peaks(1).len(), 3);
        assert_eq!(h.peaks(10).indices(), &[120, 220]);
        assert_eq!(h.peaks(0).len(), 3);
    }
}
