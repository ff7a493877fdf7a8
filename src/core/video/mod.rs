//! 视频关键帧提取
//!
//! 核心流程：
//! 1. 帧来源 - 解码器抽象，按顺序产出帧
//! 2. 帧差计算 - MSE + 直方图相关系数
//! 3. 关键帧选择 - 差异 / 固定间隔 / 固定数量三种模式
//! 4. 落盘 - 按视频源分目录，文件名编码序号和时间戳

pub mod config;
pub mod diff_filter;
pub mod error;
#[cfg(feature = "ffmpeg")]
pub mod ffmpeg;
pub mod frame;
pub mod manager;
pub mod selector;
pub mod source;
pub mod store;

pub use config::{ExtractionConfig, ExtractionRequest, OutputFormat, SelectionMode};
pub use diff_filter::{score, FrameDiffFilter, FrameSignature, SimilarityScore};
pub use error::{ConfigError, ExtractError, WriteCause};
#[cfg(feature = "ffmpeg")]
pub use ffmpeg::{FfmpegOpener, FfmpegSource};
pub use frame::{Frame, RetainedFrame};
pub use manager::{
    discover_videos, output_names, BatchReport, ExtractionStats, FrameExtractorManager, SourceOutcome,
    SourceSummary,
};
pub use selector::{KeyframeSelector, SelectionStats};
pub use source::{
    FrameIter, FrameSource, ImageSequenceOpener, ImageSequenceSource, MemorySource, SourceOpener,
};
pub use store::{frame_file_name, FrameStore};
