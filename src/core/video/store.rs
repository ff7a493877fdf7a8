//! 关键帧落盘
//!
//! Layout: `<output_root>/<source_name>/frame_NNNN_tSS.SSs.<ext>`. The
//! zero-padded sequence number keeps lexicographic order equal to selection
//! order, which the deck assembler relies on.

use super::config::{ExtractionConfig, OutputFormat};
use super::error::{ExtractError, WriteCause};
use super::frame::{fit_width, RetainedFrame};
use image::imageops::{self, FilterType};
use image::{DynamicImage, ImageOutputFormat};
use log::{debug, error};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// `frame_0003_t12.50s.jpg`
pub fn frame_file_name(sequence: u32, timestamp_secs: f64, format: OutputFormat) -> String {
    format!(
        "frame_{:04}_t{:.2}s.{}",
        sequence,
        timestamp_secs,
        format.extension()
    )
}

pub struct FrameStore {
    output_root: PathBuf,
    format: OutputFormat,
    jpeg_quality: u8,
    max_width: u32,
}

impl FrameStore {
    pub fn new(output_root: impl Into<PathBuf>, config: &ExtractionConfig) -> Self {
        Self {
            output_root: output_root.into(),
            format: config.format,
            jpeg_quality: config.jpeg_quality,
            max_width: config.max_output_width,
        }
    }

    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    pub fn source_dir(&self, source_name: &str) -> PathBuf {
        self.output_root.join(source_name)
    }

    pub fn destination(&self, retained: &RetainedFrame) -> PathBuf {
        self.source_dir(&retained.source_name).join(frame_file_name(
            retained.sequence,
            retained.frame.timestamp_secs(),
            self.format,
        ))
    }

    /// Writes one retained frame and consumes it, so the image is released as
    /// soon as it is on disk.
    pub fn write(&self, retained: RetainedFrame) -> Result<PathBuf, ExtractError> {
        let path = self.destination(&retained);
        let dir = self.source_dir(&retained.source_name);
        fs::create_dir_all(&dir).map_err(|e| ExtractError::write_failure(&dir, e))?;

        let image = self.prepare(retained);
        let mut guard = TempFile::new(&path);

        let result = self
            .encode_to(&image, guard.path())
            .and_then(|()| fs::rename(guard.path(), &path).map_err(WriteCause::from));

        match result {
            Ok(()) => {
                guard.commit();
                debug!("wrote {}", path.display());
                Ok(path)
            }
            Err(cause) => {
                error!("❌ failed to write {}: {}", path.display(), cause);
                Err(ExtractError::write_failure(path, cause))
            }
        }
    }

    fn prepare(&self, retained: RetainedFrame) -> DynamicImage {
        let image = retained.frame.image;
        let (w, h) = fit_width(image.width(), image.height(), self.max_width);
        if (w, h) == image.dimensions() {
            DynamicImage::ImageRgb8(image)
        } else {
            DynamicImage::ImageRgb8(imageops::resize(&image, w, h, FilterType::Triangle))
        }
    }

    fn encode_to(&self, image: &DynamicImage, path: &Path) -> Result<(), WriteCause> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        let format = match self.format {
            OutputFormat::Jpeg => ImageOutputFormat::Jpeg(self.jpeg_quality),
            OutputFormat::Png => ImageOutputFormat::Png,
        };
        image.write_to(&mut writer, format)?;
        writer.flush()?;
        Ok(())
    }
}

/// Removes the temporary file on drop unless committed.
struct TempFile {
    path: PathBuf,
    committed: bool,
}

impl TempFile {
    fn new(destination: &Path) -> Self {
        let name = destination
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            path: destination.with_file_name(format!(".{}.tmp", name)),
            committed: false,
        }
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn commit(&mut self) {
        self.committed = true;
    }
}

impl Drop for TempFile {
    fn drop(&mut self) {
        if !self.committed && self.path.exists() {
            if let Err(e) = fs::remove_file(&self.path) {
                error!("failed to remove {}: {}", self.path.display(), e);
            }
        }
    }
}
