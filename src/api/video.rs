//! 视频关键帧提取器

use crate::core::video::{
    BatchReport, ExtractError, ExtractionConfig, ExtractionRequest, ExtractionStats,
    FrameExtractorManager, FrameSource, ImageSequenceOpener, SourceOpener, SourceSummary,
};
use log::info;
use std::path::{Path, PathBuf};

/// 视频关键帧提取器 - 差异 / 间隔 / 固定数量选帧 + 按视频分目录落盘
///
/// ```no_run
/// use slide_lib::api::video::VideoSlideExtractor;
/// use slide_lib::core::video::{ExtractionConfig, ImageSequenceOpener};
///
/// let extractor = VideoSlideExtractor::create(ExtractionConfig::difference(), "frames")?;
/// let report = extractor.extract_path("captures".as_ref(), &ImageSequenceOpener { fps: 1.0 })?;
/// println!("{} frames", report.total_frames());
/// # Ok::<(), slide_lib::core::video::ExtractError>(())
/// ```
pub struct VideoSlideExtractor {
    manager: FrameExtractorManager,
}

impl VideoSlideExtractor {
    pub fn create(
        config: ExtractionConfig,
        output_root: impl Into<PathBuf>,
    ) -> Result<Self, ExtractError> {
        let manager = FrameExtractorManager::new(config, output_root)?;
        info!(
            "🎬 VideoSlideExtractor: created ({:?} mode, output {})",
            manager.config().mode,
            manager.store().output_root().display()
        );
        Ok(Self { manager })
    }

    /// 从 JSON5 请求创建
    pub fn from_request(
        request: &ExtractionRequest,
        output_root: impl Into<PathBuf>,
    ) -> Result<Self, ExtractError> {
        Self::create(request.resolve()?, output_root)
    }

    /// 从 JSON5 配置文件创建
    pub fn from_config_file(
        path: impl AsRef<Path>,
        output_root: impl Into<PathBuf>,
    ) -> Result<Self, ExtractError> {
        Self::from_request(&ExtractionRequest::from_file(path)?, output_root)
    }

    pub fn with_parallelism(mut self, parallelism: usize) -> Self {
        self.manager.set_parallelism(parallelism);
        self
    }

    /// 处理单个视频或视频目录
    pub fn extract_path(
        &self,
        input: &Path,
        opener: &dyn SourceOpener,
    ) -> Result<BatchReport, ExtractError> {
        self.manager.run_path(input, opener)
    }

    /// Decodes the videos under `input` with ffmpeg.
    #[cfg(feature = "ffmpeg")]
    pub fn extract_videos(&self, input: &Path) -> Result<BatchReport, ExtractError> {
        self.manager
            .run_path(input, &crate::core::video::FfmpegOpener)
    }

    /// 处理已解码的图片序列目录（每个子目录视为一个视频）
    pub fn extract_image_sequences(
        &self,
        dirs: &[PathBuf],
        fps: f64,
    ) -> Result<BatchReport, ExtractError> {
        self.manager.run(dirs, &ImageSequenceOpener { fps })
    }

    pub fn extract_source(
        &self,
        source: &mut dyn FrameSource,
    ) -> Result<SourceSummary, ExtractError> {
        self.manager.extract_source(source)
    }

    pub fn config(&self) -> &ExtractionConfig {
        self.manager.config()
    }

    pub fn output_root(&self) -> &Path {
        self.manager.store().output_root()
    }

    /// 获取提取统计
    pub fn stats(&self) -> ExtractionStats {
        self.manager.get_stats()
    }

    /// 重置统计
    pub fn reset(&self) {
        self.manager.reset()
    }
}

impl Drop for VideoSlideExtractor {
    fn drop(&mut self) {
        info!("🗑️ VideoSlideExtractor: released");
    }
}
