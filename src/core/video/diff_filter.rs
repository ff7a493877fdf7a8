//! 帧差计算 - MSE + 灰度直方图相关系数

use super::error::ExtractError;
use super::frame::{fit_width, to_luma, Frame};
use image::imageops::{self, FilterType};
use image::{GrayImage, RgbImage};
use log::debug;

const HIST_BINS: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimilarityScore {
    pub mse: f64,
    pub hist_correlation: f64,
}

/// 预计算的比较特征：缩放后的灰度图 + 256 级直方图
#[derive(Debug, Clone)]
pub struct FrameSignature {
    luma: GrayImage,
    histogram: [u32; HIST_BINS],
}

impl FrameSignature {
    pub fn compute(image: &RgbImage, comparison_width: u32) -> Self {
        let gray = to_luma(image);
        let (w, h) = fit_width(gray.width(), gray.height(), comparison_width);
        let luma = if (w, h) == gray.dimensions() {
            gray
        } else {
            imageops::resize(&gray, w, h, FilterType::Triangle)
        };
        let histogram = luma_histogram(&luma);
        Self { luma, histogram }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.luma.dimensions()
    }

    pub fn histogram(&self) -> &[u32; HIST_BINS] {
        &self.histogram
    }
}

/// Scores `candidate` against `reference`. Pure; identical inputs give
/// `{ mse: 0, hist_correlation: 1 }`.
pub fn score(
    reference: &RgbImage,
    candidate: &RgbImage,
    comparison_width: u32,
) -> Result<SimilarityScore, ExtractError> {
    let reference = FrameSignature::compute(reference, comparison_width);
    let candidate = FrameSignature::compute(candidate, comparison_width);
    compare(&reference, &candidate)
}

pub fn compare(
    reference: &FrameSignature,
    candidate: &FrameSignature,
) -> Result<SimilarityScore, ExtractError> {
    if reference.dimensions() != candidate.dimensions() {
        return Err(ExtractError::DimensionMismatch {
            expected: reference.dimensions(),
            actual: candidate.dimensions(),
        });
    }
    Ok(SimilarityScore {
        mse: mean_squared_error(&reference.luma, &candidate.luma),
        hist_correlation: histogram_correlation(&reference.histogram, &candidate.histogram),
    })
}

fn mean_squared_error(a: &GrayImage, b: &GrayImage) -> f64 {
    let pixels = a.as_raw().len();
    if pixels == 0 {
        return 0.0;
    }
    let sum: u64 = a
        .as_raw()
        .iter()
        .zip(b.as_raw().iter())
        .map(|(&x, &y)| {
            let d = x as i64 - y as i64;
            (d * d) as u64
        })
        .sum();
    sum as f64 / pixels as f64
}

fn luma_histogram(gray: &GrayImage) -> [u32; HIST_BINS] {
    let mut hist = [0u32; HIST_BINS];
    for &val in gray.as_raw() {
        hist[val as usize] += 1;
    }
    hist
}

/// Pearson correlation of two histograms; flat histograms count as identical.
fn histogram_correlation(h1: &[u32; HIST_BINS], h2: &[u32; HIST_BINS]) -> f64 {
    let n = HIST_BINS as f64;
    let mean1 = h1.iter().map(|&v| v as f64).sum::<f64>() / n;
    let mean2 = h2.iter().map(|&v| v as f64).sum::<f64>() / n;

    let mut num = 0.0;
    let mut den1 = 0.0;
    let mut den2 = 0.0;
    for (&a, &b) in h1.iter().zip(h2.iter()) {
        let da = a as f64 - mean1;
        let db = b as f64 - mean2;
        num += da * db;
        den1 += da * da;
        den2 += db * db;
    }

    let den = (den1 * den2).sqrt();
    if den <= f64::EPSILON {
        return 1.0;
    }
    (num / den).clamp(-1.0, 1.0)
}

/// 差异过滤器：持有上一保留帧的特征，逐帧判断是否保留
pub struct FrameDiffFilter {
    comparison_width: u32,
    mse_threshold: f64,
    hist_threshold: f64,
    reference: Option<FrameSignature>,
}

impl FrameDiffFilter {
    pub fn new(mse_threshold: f64, hist_threshold: f64, comparison_width: u32) -> Self {
        Self {
            comparison_width,
            mse_threshold,
            hist_threshold,
            reference: None,
        }
    }

    /// Returns `true` when `frame` should be kept. The first frame is always
    /// kept; a kept frame becomes the new reference.
    pub fn should_retain(&mut self, frame: &Frame) -> Result<bool, ExtractError> {
        let current = FrameSignature::compute(&frame.image, self.comparison_width);

        let retain = match &self.reference {
            None => true,
            Some(reference) => {
                let score = compare(reference, &current)?;
                let changed =
                    score.mse > self.mse_threshold || score.hist_correlation < self.hist_threshold;
                if changed {
                    debug!(
                        "frame {} changed (MSE: {:.2}, Hist: {:.3})",
                        frame.frame_number, score.mse, score.hist_correlation
                    );
                }
                changed
            }
        };

        if retain {
            self.reference = Some(current);
        }
        Ok(retain)
    }

    pub fn reset(&mut self) {
        self.reference = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;
    use std::time::Duration;

    fn solid(width: u32, height: u32, fill: u8) -> RgbImage {
        RgbImage::from_pixel(width, height, Rgb([fill, fill, fill]))
    }

    fn gradient(width: u32, height: u32, offset: u8) -> RgbImage {
        RgbImage::from_fn(width, height, |x, y| {
            let v = ((x + y) as u8).wrapping_add(offset);
            Rgb([v, v, v])
        })
    }

    fn create_test_frame(image: RgbImage, frame_number: u64) -> Frame {
        Frame::new(frame_number, Duration::from_secs(frame_number), image)
    }

    #[test]
    fn test_identical_images_score() {
        for img in [solid(32, 24, 0), solid(32, 24, 200), gradient(64, 48, 7)] {
            let s = score(&img, &img, 640).unwrap();
            assert_eq!(s.mse, 0.0);
            assert!((s.hist_correlation - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_mse_value() {
        let a = solid(10, 10, 100);
        let b = solid(10, 10, 110);
        let s = score(&a, &b, 640).unwrap();
        assert!((s.mse - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_mse_no_wraparound() {
        let s = score(&solid(4, 4, 0), &solid(4, 4, 255), 640).unwrap();
        assert!((s.mse - 65025.0).abs() < 1e-9);
    }

    #[test]
    fn test_histogram_correlation_range() {
        let s = score(&solid(16, 16, 10), &solid(16, 16, 240), 640).unwrap();
        assert!(s.hist_correlation < 0.0);
        assert!(s.hist_correlation >= -1.0);

        let s = score(&gradient(64, 64, 0), &gradient(64, 64, 1), 640).unwrap();
        assert!(s.hist_correlation > 0.5 && s.hist_correlation <= 1.0);
    }

    #[test]
    fn test_flat_histograms_correlate() {
        let mut h = [0u32; HIST_BINS];
        h.iter_mut().for_each(|v| *v = 4);
        assert_eq!(histogram_correlation(&h, &h), 1.0);
    }

    #[test]
    fn test_dimension_mismatch() {
        let err = score(&solid(10, 10, 0), &solid(12, 10, 0), 640).unwrap_err();
        assert!(matches!(err, ExtractError::DimensionMismatch { .. }));
    }

    #[test]
    fn test_downscale_before_compare() {
        let sig = FrameSignature::compute(&solid(1280, 720, 50), 640);
        assert_eq!(sig.dimensions(), (640, 360));
        assert_eq!(sig.histogram()[50], 640 * 360);
    }

    #[test]
    fn test_identical_frames() {
        let mut filter = FrameDiffFilter::new(30.0, 0.95, 640);
        let frame1 = create_test_frame(solid(100, 100, 128), 0);
        let frame2 = create_test_frame(solid(100, 100, 128), 1);

        assert!(filter.should_retain(&frame1).unwrap());
        assert!(!filter.should_retain(&frame2).unwrap());
    }

    #[test]
    fn test_different_frames() {
        let mut filter = FrameDiffFilter::new(30.0, 0.95, 640);
        let frame1 = create_test_frame(solid(100, 100, 0), 0);
        let frame2 = create_test_frame(solid(100, 100, 255), 1);

        assert!(filter.should_retain(&frame1).unwrap());
        assert!(filter.should_retain(&frame2).unwrap());
    }

    #[test]
    fn test_reference_is_last_retained() {
        // 缓慢漂移：每帧只差 2 级，但累计超过阈值后应被保留
        let mut filter = FrameDiffFilter::new(30.0, -1.0, 640);
        let mut kept = Vec::new();
        for i in 0..10u8 {
            let frame = create_test_frame(solid(8, 8, 100 + i * 2), i as u64);
            if filter.should_retain(&frame).unwrap() {
                kept.push(i);
            }
        }
        // 差值 6 级时 MSE = 36 > 30
        assert_eq!(kept, vec![0, 3, 6, 9]);
    }

    #[test]
    fn test_reset() {
        let mut filter = FrameDiffFilter::new(30.0, 0.95, 640);
        let frame = create_test_frame(solid(8, 8, 1), 0);
        assert!(filter.should_retain(&frame).unwrap());
        assert!(!filter.should_retain(&frame).unwrap());
        filter.reset();
        assert!(filter.should_retain(&frame).unwrap());
    }
}
