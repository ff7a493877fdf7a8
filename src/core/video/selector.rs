//! 关键帧选择 - 按模式逐帧决定是否保留
//!
//! Selection is a strictly ordered fold over one source: every decision in
//! difference mode depends on the last retained frame, so a source is never
//! split across threads.

use super::config::{ExtractionConfig, SelectionMode};
use super::diff_filter::FrameDiffFilter;
use super::error::ExtractError;
use super::frame::{Frame, RetainedFrame};
use super::source::{FrameIter, FrameSource};
use log::{debug, info};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

const TIMESTAMP_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SelectionAction {
    Retain,
    Skip,
}

pub trait RetentionPolicy {
    fn decide(&mut self, frame: &Frame) -> Result<SelectionAction, ExtractError>;

    /// `true` once nothing further from this source can be retained.
    fn is_done(&self) -> bool {
        false
    }
}

pub struct DifferencePolicy {
    filter: FrameDiffFilter,
}

impl DifferencePolicy {
    pub fn new(config: &ExtractionConfig) -> Self {
        Self {
            filter: FrameDiffFilter::new(
                config.mse_threshold,
                config.hist_threshold,
                config.comparison_width,
            ),
        }
    }
}

impl RetentionPolicy for DifferencePolicy {
    fn decide(&mut self, frame: &Frame) -> Result<SelectionAction, ExtractError> {
        Ok(if self.filter.should_retain(frame)? {
            SelectionAction::Retain
        } else {
            SelectionAction::Skip
        })
    }
}

/// Keeps the first frame at or after each multiple of the interval.
pub struct IntervalPolicy {
    interval: f64,
    next_target: f64,
}

impl IntervalPolicy {
    pub fn new(interval_seconds: f64) -> Self {
        Self {
            interval: interval_seconds,
            next_target: 0.0,
        }
    }
}

impl RetentionPolicy for IntervalPolicy {
    fn decide(&mut self, frame: &Frame) -> Result<SelectionAction, ExtractError> {
        let ts = frame.timestamp_secs();
        if ts + TIMESTAMP_EPSILON < self.next_target {
            return Ok(SelectionAction::Skip);
        }
        // 跳过没有帧的区间
        let k = (ts / self.interval + TIMESTAMP_EPSILON).floor();
        self.next_target = (k + 1.0) * self.interval;
        Ok(SelectionAction::Retain)
    }
}

pub struct FixedCountPolicy {
    targets: Vec<u64>,
    cursor: usize,
    position: u64,
}

impl FixedCountPolicy {
    pub fn new(total_frames: u64, frame_count: u32) -> Self {
        Self {
            targets: fixed_count_indices(total_frames, frame_count),
            cursor: 0,
            position: 0,
        }
    }
}

impl RetentionPolicy for FixedCountPolicy {
    fn decide(&mut self, _frame: &Frame) -> Result<SelectionAction, ExtractError> {
        let position = self.position;
        self.position += 1;

        match self.targets.get(self.cursor) {
            Some(&target) if target == position => {
                self.cursor += 1;
                Ok(SelectionAction::Retain)
            }
            _ => Ok(SelectionAction::Skip),
        }
    }

    fn is_done(&self) -> bool {
        self.cursor >= self.targets.len()
    }
}

/// Evenly spaced indices `round(i * (total - 1) / (count - 1))`, deduplicated.
/// First and last frames are always included when `count >= 2`.
pub fn fixed_count_indices(total_frames: u64, frame_count: u32) -> Vec<u64> {
    if total_frames == 0 || frame_count == 0 {
        return Vec::new();
    }
    if frame_count == 1 {
        return vec![0];
    }
    if frame_count as u64 >= total_frames {
        return (0..total_frames).collect();
    }

    let last = (total_frames - 1) as f64;
    let steps = (frame_count - 1) as f64;
    let mut indices: Vec<u64> = (0..frame_count)
        .map(|i| (i as f64 * last / steps).round() as u64)
        .collect();
    indices.dedup();
    indices
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SelectionStats {
    pub processed_frames: u64,
    pub retained_frames: u32,
}

pub struct KeyframeSelector {
    config: ExtractionConfig,
    cancel: Option<Arc<AtomicBool>>,
}

impl KeyframeSelector {
    pub fn new(config: ExtractionConfig) -> Self {
        Self {
            config,
            cancel: None,
        }
    }

    /// Selection aborts with `Cancelled` once `flag` is set.
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    /// Runs selection over `source` and collects the retained frames.
    pub fn select(&self, source: &mut dyn FrameSource) -> Result<Vec<RetainedFrame>, ExtractError> {
        let mut retained = Vec::new();
        self.select_each(source, |frame| {
            retained.push(frame);
            Ok(())
        })?;
        Ok(retained)
    }

    /// Runs selection over `source`, handing each retained frame to `sink` as
    /// soon as it is chosen so it can be written and dropped.
    pub fn select_each<F>(
        &self,
        source: &mut dyn FrameSource,
        sink: F,
    ) -> Result<SelectionStats, ExtractError>
    where
        F: FnMut(RetainedFrame) -> Result<(), ExtractError>,
    {
        let name = source.name().to_string();
        self.select_each_as(&name, source, sink)
    }

    /// Same as [`Self::select_each`], with retained frames tagged `name`
    /// instead of the source's own name.
    pub fn select_each_as<F>(
        &self,
        name: &str,
        source: &mut dyn FrameSource,
        sink: F,
    ) -> Result<SelectionStats, ExtractError>
    where
        F: FnMut(RetainedFrame) -> Result<(), ExtractError>,
    {
        let total = match self.config.mode {
            SelectionMode::FixedCount => Some(count_frames(source)?),
            _ => source.frame_count_hint(),
        };
        let frames = source.frames()?;
        self.run(name, frames, total, sink)
    }

    /// Selection over an arbitrary frame sequence. Fixed-count mode needs the
    /// total up front.
    pub fn select_frames<I>(
        &self,
        source_name: &str,
        frames: I,
        total_frames: Option<u64>,
    ) -> Result<Vec<RetainedFrame>, ExtractError>
    where
        I: IntoIterator<Item = Result<Frame, ExtractError>>,
        I::IntoIter: 'static,
    {
        let mut retained = Vec::new();
        self.run(
            source_name,
            Box::new(frames.into_iter()),
            total_frames,
            |frame| {
                retained.push(frame);
                Ok(())
            },
        )?;
        Ok(retained)
    }

    fn policy(&self, total: Option<u64>) -> Result<Box<dyn RetentionPolicy>, ExtractError> {
        let policy: Box<dyn RetentionPolicy> = match self.config.mode {
            SelectionMode::Difference => Box::new(DifferencePolicy::new(&self.config)),
            SelectionMode::Interval => Box::new(IntervalPolicy::new(self.config.interval_seconds)),
            SelectionMode::FixedCount => {
                let total = total.ok_or_else(|| {
                    ExtractError::InvalidConfig(
                        "fixed count selection needs the total frame count".to_string(),
                    )
                })?;
                Box::new(FixedCountPolicy::new(total, self.config.frame_count))
            }
        };
        Ok(policy)
    }

    fn run<F>(
        &self,
        source_name: &str,
        mut frames: FrameIter<'_>,
        total: Option<u64>,
        mut sink: F,
    ) -> Result<SelectionStats, ExtractError>
    where
        F: FnMut(RetainedFrame) -> Result<(), ExtractError>,
    {
        let mut policy = self.policy(total)?;
        let mut stats = SelectionStats::default();
        let mut last_progress = 0u64;

        info!(
            "🎬 selecting frames from '{}' ({:?} mode{})",
            source_name,
            self.config.mode,
            total.map(|t| format!(", {} frames", t)).unwrap_or_default()
        );

        while !policy.is_done() {
            if self.is_cancelled() {
                return Err(ExtractError::Cancelled);
            }
            let frame = match frames.next() {
                Some(frame) => frame?,
                None => break,
            };

            let action = policy.decide(&frame)?;
            stats.processed_frames += 1;

            if action == SelectionAction::Retain {
                let sequence = stats.retained_frames;
                stats.retained_frames += 1;
                debug!(
                    "'{}': keep frame {} as #{} (t={:.2}s)",
                    source_name,
                    frame.frame_number,
                    sequence,
                    frame.timestamp_secs()
                );
                sink(RetainedFrame {
                    frame,
                    sequence,
                    source_name: source_name.to_string(),
                })?;

                if self.config.max_frames == Some(stats.retained_frames) {
                    debug!("'{}': reached max frames", source_name);
                    break;
                }
            }

            if let Some(total) = total.filter(|&t| t > 0) {
                let progress = stats.processed_frames * 100 / total;
                if progress >= last_progress + 10 {
                    info!(
                        "  Progress: {}% ({}/{} frames processed, {} kept)",
                        progress, stats.processed_frames, total, stats.retained_frames
                    );
                    last_progress = progress;
                }
            }
        }

        info!(
            "✅ '{}': kept {} of {} frames",
            source_name, stats.retained_frames, stats.processed_frames
        );
        Ok(stats)
    }

    fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .map(|flag| flag.load(Ordering::Relaxed))
            .unwrap_or(false)
    }
}

/// Frame count from the container, or from a counting pass when unknown.
fn count_frames(source: &mut dyn FrameSource) -> Result<u64, ExtractError> {
    if let Some(total) = source.frame_count_hint() {
        return Ok(total);
    }
    let mut total = 0u64;
    for frame in source.frames()? {
        frame?;
        total += 1;
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::video::source::MemorySource;
    use image::{Rgb, RgbImage};
    use std::time::Duration;

    fn solid_frame(fill: u8, frame_number: u64, secs: f64) -> Frame {
        Frame::new(
            frame_number,
            Duration::from_secs_f64(secs),
            RgbImage::from_pixel(16, 16, Rgb([fill, fill, fill])),
        )
    }

    fn source_from_fills(fills: &[u8]) -> MemorySource {
        let frames = fills
            .iter()
            .enumerate()
            .map(|(i, &f)| solid_frame(f, i as u64, i as f64))
            .collect();
        MemorySource::new("clip", frames)
    }

    fn kept_numbers(retained: &[RetainedFrame]) -> Vec<u64> {
        retained.iter().map(|r| r.frame.frame_number).collect()
    }

    /// Source without a frame count hint.
    struct Unsized(MemorySource);

    impl FrameSource for Unsized {
        fn name(&self) -> &str {
            self.0.name()
        }

        fn frames(&mut self) -> Result<FrameIter<'_>, ExtractError> {
            self.0.frames()
        }
    }

    #[test]
    fn test_difference_identical_then_change() {
        let selector = KeyframeSelector::new(ExtractionConfig::difference());
        let mut source = source_from_fills(&[100, 100, 200]);
        let retained = selector.select(&mut source).unwrap();

        assert_eq!(kept_numbers(&retained), vec![0, 2]);
        assert_eq!(retained[0].sequence, 0);
        assert_eq!(retained[1].sequence, 1);
        assert_eq!(retained[1].source_name, "clip");
    }

    #[test]
    fn test_difference_first_frame_always_kept() {
        let config = ExtractionConfig::difference().with_thresholds(1e9, -1.0);
        let selector = KeyframeSelector::new(config);
        let mut source = source_from_fills(&[0, 255, 0, 255]);
        let retained = selector.select(&mut source).unwrap();
        assert_eq!(kept_numbers(&retained), vec![0]);
    }

    #[test]
    fn test_difference_monotonic_in_thresholds() {
        let fills = [10, 12, 20, 40, 41, 90, 95, 150, 151, 152, 220];
        let count = |mse: f64, hist: f64| {
            let config = ExtractionConfig::difference().with_thresholds(mse, hist);
            let mut source = source_from_fills(&fills);
            KeyframeSelector::new(config).select(&mut source).unwrap().len()
        };

        let mut previous = usize::MAX;
        for mse in [1.0, 10.0, 30.0, 100.0, 1000.0, 10000.0] {
            let n = count(mse, -1.0);
            assert!(n <= previous, "mse {} kept {} > {}", mse, n, previous);
            previous = n;
        }

        let mut previous = usize::MAX;
        for hist in [1.0, 0.99, 0.5, 0.0, -0.5, -1.0] {
            let n = count(1e9, hist);
            assert!(n <= previous, "hist {} kept {} > {}", hist, n, previous);
            previous = n;
        }
    }

    #[test]
    fn test_max_frames_caps_count() {
        let fills = [0, 60, 120, 180, 240];
        let unconstrained = {
            let mut source = source_from_fills(&fills);
            KeyframeSelector::new(ExtractionConfig::difference())
                .select(&mut source)
                .unwrap()
                .len()
        };
        assert_eq!(unconstrained, 5);

        for cap in 1..=7u32 {
            let config = ExtractionConfig::difference().with_max_frames(cap);
            let mut source = source_from_fills(&fills);
            let kept = KeyframeSelector::new(config).select(&mut source).unwrap();
            assert_eq!(kept.len(), (cap as usize).min(unconstrained));
        }
    }

    #[test]
    fn test_max_frames_stops_consuming() {
        let config = ExtractionConfig::difference().with_max_frames(2);
        let mut source = source_from_fills(&[0, 80, 160, 240]);
        let stats = KeyframeSelector::new(config)
            .select_each(&mut source, |_| Ok(()))
            .unwrap();
        assert_eq!(stats.retained_frames, 2);
        assert_eq!(stats.processed_frames, 2);
    }

    #[test]
    fn test_interval_mode() {
        let selector = KeyframeSelector::new(ExtractionConfig::interval(5.0));
        let frames: Vec<Frame> = (0..12).map(|i| solid_frame(0, i, i as f64)).collect();
        let mut source = MemorySource::new("talk", frames);
        let retained = selector.select(&mut source).unwrap();

        let secs: Vec<f64> = retained.iter().map(|r| r.frame.timestamp_secs()).collect();
        assert_eq!(secs, vec![0.0, 5.0, 10.0]);
    }

    #[test]
    fn test_interval_skips_gaps() {
        let selector = KeyframeSelector::new(ExtractionConfig::interval(5.0));
        let frames = [0.0, 1.0, 6.5, 7.0, 17.2, 18.0, 20.1]
            .iter()
            .enumerate()
            .map(|(i, &t)| solid_frame(0, i as u64, t))
            .collect();
        let mut source = MemorySource::new("gaps", frames);
        let retained = selector.select(&mut source).unwrap();
        assert_eq!(kept_numbers(&retained), vec![0, 2, 4, 6]);
    }

    #[test]
    fn test_interval_with_max_frames() {
        let config = ExtractionConfig::interval(2.0).with_max_frames(2);
        let frames: Vec<Frame> = (0..10).map(|i| solid_frame(0, i, i as f64)).collect();
        let mut source = MemorySource::new("talk", frames);
        let retained = KeyframeSelector::new(config).select(&mut source).unwrap();
        assert_eq!(kept_numbers(&retained), vec![0, 2]);
    }

    #[test]
    fn test_fixed_count_indices() {
        assert_eq!(fixed_count_indices(10, 3), vec![0, 5, 9]);
        assert_eq!(fixed_count_indices(10, 2), vec![0, 9]);
        assert_eq!(fixed_count_indices(10, 1), vec![0]);
        assert_eq!(fixed_count_indices(3, 5), vec![0, 1, 2]);
        assert_eq!(fixed_count_indices(0, 5), Vec::<u64>::new());
        assert_eq!(fixed_count_indices(1, 4), vec![0]);
        assert_eq!(fixed_count_indices(10, 10), (0..10).collect::<Vec<u64>>());
    }

    #[test]
    fn test_fixed_count_larger_than_source() {
        assert_eq!(fixed_count_indices(4, u32::MAX), vec![0, 1, 2, 3]);

        let selector = KeyframeSelector::new(ExtractionConfig::fixed_count(u32::MAX));
        let mut source = source_from_fills(&[0; 5]);
        let retained = selector.select(&mut source).unwrap();
        assert_eq!(kept_numbers(&retained), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_select_each_as_renames_frames() {
        let selector = KeyframeSelector::new(ExtractionConfig::interval(5.0));
        let mut source = source_from_fills(&[0, 0]);
        let mut names = Vec::new();
        selector
            .select_each_as("clip_mov", &mut source, |retained| {
                names.push(retained.source_name);
                Ok(())
            })
            .unwrap();
        assert_eq!(names, vec!["clip_mov"]);
    }

    #[test]
    fn test_fixed_count_mode() {
        let selector = KeyframeSelector::new(ExtractionConfig::fixed_count(3));
        let mut source = source_from_fills(&[0; 10]);
        let retained = selector.select(&mut source).unwrap();
        assert_eq!(kept_numbers(&retained), vec![0, 5, 9]);
    }

    #[test]
    fn test_fixed_count_counts_unsized_source() {
        let selector = KeyframeSelector::new(ExtractionConfig::fixed_count(4));
        let mut source = Unsized(source_from_fills(&[0; 7]));
        let retained = selector.select(&mut source).unwrap();
        assert_eq!(kept_numbers(&retained), vec![0, 2, 4, 6]);
    }

    #[test]
    fn test_fixed_count_stops_after_last_target() {
        let selector = KeyframeSelector::new(ExtractionConfig::fixed_count(2));
        let frames: Vec<Result<Frame, ExtractError>> = (0..5)
            .map(|i| Ok(solid_frame(0, i, i as f64)))
            .chain(std::iter::once(Err(ExtractError::unreadable("late", "never reached"))))
            .collect();
        // total of 5 puts the last target at index 4, before the error
        let retained = selector.select_frames("late", frames, Some(5)).unwrap();
        assert_eq!(kept_numbers(&retained), vec![0, 4]);
    }

    #[test]
    fn test_fixed_count_needs_total() {
        let selector = KeyframeSelector::new(ExtractionConfig::fixed_count(2));
        let result = selector.select_frames("x", Vec::new(), None);
        assert!(matches!(result, Err(ExtractError::InvalidConfig(_))));
    }

    #[test]
    fn test_empty_source() {
        for config in [
            ExtractionConfig::difference(),
            ExtractionConfig::interval(5.0),
            ExtractionConfig::fixed_count(3),
        ] {
            let mut source = MemorySource::new("empty", Vec::new());
            let retained = KeyframeSelector::new(config).select(&mut source).unwrap();
            assert!(retained.is_empty());
        }
    }

    #[test]
    fn test_decode_error_propagates() {
        let selector = KeyframeSelector::new(ExtractionConfig::difference());
        let frames = vec![
            Ok(solid_frame(0, 0, 0.0)),
            Err(ExtractError::unreadable("broken", "bad packet")),
            Ok(solid_frame(255, 2, 2.0)),
        ];
        let result = selector.select_frames("broken", frames, None);
        assert!(matches!(result, Err(ExtractError::SourceUnreadable { .. })));
    }

    #[test]
    fn test_cancel_flag() {
        let flag = Arc::new(AtomicBool::new(true));
        let selector =
            KeyframeSelector::new(ExtractionConfig::difference()).with_cancel_flag(flag);
        let mut source = source_from_fills(&[0, 1, 2]);
        assert!(matches!(
            selector.select(&mut source),
            Err(ExtractError::Cancelled)
        ));
    }

    #[test]
    fn test_dimension_change_is_fatal() {
        let selector = KeyframeSelector::new(ExtractionConfig::difference());
        let frames = vec![
            Ok(solid_frame(0, 0, 0.0)),
            Ok(Frame::new(1, Duration::from_secs(1), RgbImage::new(8, 8))),
        ];
        let result = selector.select_frames("mixed", frames, None);
        assert!(matches!(result, Err(ExtractError::DimensionMismatch { .. })));
    }
}
