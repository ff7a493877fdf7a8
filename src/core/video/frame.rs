use image::{GrayImage, Luma, RgbImage};
use std::time::Duration;

/// 帧数据结构
#[derive(Debug, Clone)]
pub struct Frame {
    pub frame_number: u64,
    pub timestamp: Duration,
    pub image: RgbImage,
}

impl Frame {
    pub fn new(frame_number: u64, timestamp: Duration, image: RgbImage) -> Self {
        Self {
            frame_number,
            timestamp,
            image,
        }
    }

    pub fn timestamp_secs(&self) -> f64 {
        self.timestamp.as_secs_f64()
    }
}

/// 选中的关键帧，写盘后即释放
#[derive(Debug, Clone)]
pub struct RetainedFrame {
    pub frame: Frame,
    pub sequence: u32,
    pub source_name: String,
}

/// BT.601 luma, same weights the diff filter has always used.
pub fn to_luma(image: &RgbImage) -> GrayImage {
    let mut gray = GrayImage::new(image.width(), image.height());
    for (src, dst) in image.pixels().zip(gray.pixels_mut()) {
        let [r, g, b] = src.0;
        let val = (r as u32 * 299 + g as u32 * 587 + b as u32 * 114) / 1000;
        *dst = Luma([val as u8]);
    }
    gray
}

/// Output size after capping the width at `max_width`, aspect ratio preserved.
pub fn fit_width(width: u32, height: u32, max_width: u32) -> (u32, u32) {
    if width <= max_width || max_width == 0 {
        return (width, height);
    }
    let scale = max_width as f64 / width as f64;
    let new_height = ((height as f64 * scale) as u32).max(1);
    (max_width, new_height)
}
