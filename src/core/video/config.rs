//! 抽帧配置
//!
//! `ExtractionRequest` mirrors the historical command-line flags and is what
//! callers fill in (or load from a JSON5 file). `resolve` turns it into an
//! immutable `ExtractionConfig`, applying the mode precedence rules.

use super::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_MSE_THRESHOLD: f64 = 30.0;
pub const DEFAULT_HIST_THRESHOLD: f64 = 0.95;
pub const DEFAULT_INTERVAL_SECONDS: f64 = 5.0;
pub const DEFAULT_COMPARISON_WIDTH: u32 = 640;
pub const DEFAULT_MAX_OUTPUT_WIDTH: u32 = 1920;
pub const DEFAULT_JPEG_QUALITY: u8 = 95;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionMode {
    Difference,
    Interval,
    FixedCount,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    Jpeg,
    Png,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "jpg",
            OutputFormat::Png => "png",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionConfig {
    pub mode: SelectionMode,
    pub mse_threshold: f64,
    pub hist_threshold: f64,
    pub interval_seconds: f64,
    pub frame_count: u32,
    pub max_frames: Option<u32>,
    /// 比较前缩放到的宽度
    pub comparison_width: u32,
    pub max_output_width: u32,
    pub format: OutputFormat,
    pub jpeg_quality: u8,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            mode: SelectionMode::Interval,
            mse_threshold: DEFAULT_MSE_THRESHOLD,
            hist_threshold: DEFAULT_HIST_THRESHOLD,
            interval_seconds: DEFAULT_INTERVAL_SECONDS,
            frame_count: 10,
            max_frames: None,
            comparison_width: DEFAULT_COMPARISON_WIDTH,
            max_output_width: DEFAULT_MAX_OUTPUT_WIDTH,
            format: OutputFormat::Jpeg,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
        }
    }
}

impl ExtractionConfig {
    pub fn difference() -> Self {
        Self {
            mode: SelectionMode::Difference,
            ..Default::default()
        }
    }

    pub fn interval(seconds: f64) -> Self {
        Self {
            mode: SelectionMode::Interval,
            interval_seconds: seconds,
            ..Default::default()
        }
    }

    pub fn fixed_count(count: u32) -> Self {
        Self {
            mode: SelectionMode::FixedCount,
            frame_count: count,
            ..Default::default()
        }
    }

    pub fn with_max_frames(mut self, max_frames: u32) -> Self {
        self.max_frames = Some(max_frames);
        self
    }

    pub fn with_thresholds(mut self, mse_threshold: f64, hist_threshold: f64) -> Self {
        self.mse_threshold = mse_threshold;
        self.hist_threshold = hist_threshold;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.mse_threshold > 0.0) {
            return Err(invalid(format!(
                "mse threshold must be positive, got {}",
                self.mse_threshold
            )));
        }
        if !(-1.0..=1.0).contains(&self.hist_threshold) {
            return Err(invalid(format!(
                "histogram threshold must be within [-1, 1], got {}",
                self.hist_threshold
            )));
        }
        if !(self.interval_seconds > 0.0) {
            return Err(invalid(format!(
                "interval must be positive, got {}",
                self.interval_seconds
            )));
        }
        if self.frame_count == 0 {
            return Err(invalid("frame count must be positive"));
        }
        if self.max_frames == Some(0) {
            return Err(invalid("max frames must be positive"));
        }
        if self.mode == SelectionMode::FixedCount && self.max_frames.is_some() {
            return Err(invalid("frame count and max frames cannot be combined"));
        }
        if self.comparison_width == 0 {
            return Err(invalid("comparison width must be positive"));
        }
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(invalid(format!(
                "jpeg quality must be within 1..=100, got {}",
                self.jpeg_quality
            )));
        }
        Ok(())
    }
}

/// 原始请求参数（对应旧版命令行）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionRequest {
    pub different: bool,
    pub threshold: f64,
    pub hist_threshold: f64,
    pub interval: f64,
    pub num_frames: Option<u32>,
    pub max_frames: Option<u32>,
    pub comparison_width: u32,
    pub max_output_width: u32,
    pub format: OutputFormat,
    pub jpeg_quality: u8,
}

impl Default for ExtractionRequest {
    fn default() -> Self {
        Self {
            different: false,
            threshold: DEFAULT_MSE_THRESHOLD,
            hist_threshold: DEFAULT_HIST_THRESHOLD,
            interval: DEFAULT_INTERVAL_SECONDS,
            num_frames: None,
            max_frames: None,
            comparison_width: DEFAULT_COMPARISON_WIDTH,
            max_output_width: DEFAULT_MAX_OUTPUT_WIDTH,
            format: OutputFormat::Jpeg,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
        }
    }
}

impl ExtractionRequest {
    pub fn from_json5(text: &str) -> Result<Self, ConfigError> {
        Ok(json5::from_str(text)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json5(&text)
    }

    /// `num_frames` overrides difference mode; combining it with `max_frames`
    /// is rejected.
    pub fn resolve(&self) -> Result<ExtractionConfig, ConfigError> {
        let mode = if self.num_frames.is_some() {
            if self.max_frames.is_some() {
                return Err(invalid(
                    "num_frames and max_frames cannot be combined",
                ));
            }
            SelectionMode::FixedCount
        } else if self.different {
            SelectionMode::Difference
        } else {
            SelectionMode::Interval
        };

        let config = ExtractionConfig {
            mode,
            mse_threshold: self.threshold,
            hist_threshold: self.hist_threshold,
            interval_seconds: self.interval,
            frame_count: self.num_frames.unwrap_or(ExtractionConfig::default().frame_count),
            max_frames: self.max_frames,
            comparison_width: self.comparison_width,
            max_output_width: self.max_output_width,
            format: self.format,
            jpeg_quality: self.jpeg_quality,
        };
        config.validate()?;
        Ok(config)
    }
}

fn invalid(message: impl Into<String>) -> ConfigError {
    ConfigError::Invalid(message.into())
}
