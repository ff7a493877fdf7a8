//! 帧来源 - 解码器抽象
//!
//! Decoding is not this crate's job: anything that can hand out an ordered,
//! finite stream of frames implements [`FrameSource`]. Two adapters live here,
//! an in-memory source and a directory of pre-decoded images; the ffmpeg
//! adapter sits behind the `ffmpeg` feature.

use super::error::ExtractError;
use super::frame::Frame;
use log::debug;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub type FrameIter<'a> = Box<dyn Iterator<Item = Result<Frame, ExtractError>> + 'a>;

pub trait FrameSource {
    /// Name used for the output subdirectory, usually the file stem.
    fn name(&self) -> &str;

    /// Total number of frames, when the container knows it up front.
    fn frame_count_hint(&self) -> Option<u64> {
        None
    }

    /// Starts a fresh pass over the frames, from the first one.
    fn frames(&mut self) -> Result<FrameIter<'_>, ExtractError>;
}

/// Opens a path as a frame source. The batch manager goes through this so
/// that open failures stay scoped to one source.
pub trait SourceOpener: Sync {
    fn open(&self, path: &Path) -> Result<Box<dyn FrameSource + Send>, ExtractError>;
}

/// `clip.final.mp4` -> `clip.final`
pub fn source_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

/// 内存帧序列
pub struct MemorySource {
    name: String,
    frames: Vec<Frame>,
}

impl MemorySource {
    pub fn new(name: impl Into<String>, frames: Vec<Frame>) -> Self {
        Self {
            name: name.into(),
            frames,
        }
    }
}

impl FrameSource for MemorySource {
    fn name(&self) -> &str {
        &self.name
    }

    fn frame_count_hint(&self) -> Option<u64> {
        Some(self.frames.len() as u64)
    }

    fn frames(&mut self) -> Result<FrameIter<'_>, ExtractError> {
        Ok(Box::new(self.frames.iter().cloned().map(Ok)))
    }
}

const SEQUENCE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp"];

/// A directory of already-decoded frames (`0001.png`, `0002.png`, ...) played
/// back at a fixed frame rate. Files are taken in file-name order.
pub struct ImageSequenceSource {
    name: String,
    files: Vec<PathBuf>,
    fps: f64,
}

impl ImageSequenceSource {
    pub fn open(dir: impl AsRef<Path>, fps: f64) -> Result<Self, ExtractError> {
        let dir = dir.as_ref();
        let name = source_name(dir);
        if !(fps > 0.0) {
            return Err(ExtractError::InvalidConfig(format!(
                "frame rate must be positive, got {}",
                fps
            )));
        }

        let entries = std::fs::read_dir(dir).map_err(|e| ExtractError::unreadable(&name, e))?;
        let mut files = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| ExtractError::unreadable(&name, e))?.path();
            if path.is_file() && has_extension(&path, SEQUENCE_EXTENSIONS) {
                files.push(path);
            }
        }
        files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

        debug!("image sequence '{}': {} frames at {} fps", name, files.len(), fps);
        Ok(Self { name, files, fps })
    }
}

impl FrameSource for ImageSequenceSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn frame_count_hint(&self) -> Option<u64> {
        Some(self.files.len() as u64)
    }

    fn frames(&mut self) -> Result<FrameIter<'_>, ExtractError> {
        let name = self.name.as_str();
        let fps = self.fps;
        let decode = move |(i, path): (usize, &PathBuf)| -> Result<Frame, ExtractError> {
            let image = image::open(path)
                .map_err(|e| ExtractError::unreadable(name, format!("{}: {}", path.display(), e)))?
                .to_rgb8();
            let timestamp = Duration::from_secs_f64(i as f64 / fps);
            Ok(Frame::new(i as u64, timestamp, image))
        };
        Ok(Box::new(self.files.iter().enumerate().map(decode)))
    }
}

/// Opens each input path as an [`ImageSequenceSource`].
pub struct ImageSequenceOpener {
    pub fps: f64,
}

impl SourceOpener for ImageSequenceOpener {
    fn open(&self, path: &Path) -> Result<Box<dyn FrameSource + Send>, ExtractError> {
        Ok(Box::new(ImageSequenceSource::open(path, self.fps)?))
    }
}

pub(crate) fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| extensions.iter().any(|ext| e.eq_ignore_ascii_case(ext)))
        .unwrap_or(false)
}
