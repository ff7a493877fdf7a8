//! ffmpeg 解码适配（feature = "ffmpeg"）

use super::error::ExtractError;
use super::frame::Frame;
use super::source::{source_name, FrameIter, FrameSource, SourceOpener};
use ffmpeg_next::{
    self as ffmpeg, codec, decoder, format, media, software::scaling, util::error::EAGAIN,
    util::frame::video::Video, Rational,
};
use image::RgbImage;
use log::{debug, info};
use std::path::{Path, PathBuf};
use std::sync::Once;
use std::time::Duration;

static INIT: Once = Once::new();

fn init() -> Result<(), ExtractError> {
    let mut result = Ok(());
    INIT.call_once(|| {
        if let Err(e) = ffmpeg::init() {
            result = Err(ExtractError::unreadable("ffmpeg", e));
        }
    });
    result
}

/// A video file decoded through ffmpeg, converted to RGB24.
pub struct FfmpegSource {
    path: PathBuf,
    name: String,
    frame_count: Option<u64>,
}

impl FfmpegSource {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ExtractError> {
        init()?;
        let path = path.as_ref().to_path_buf();
        let name = source_name(&path);

        let input = format::input(&path).map_err(|e| ExtractError::unreadable(&name, e))?;
        let stream = input
            .streams()
            .best(media::Type::Video)
            .ok_or_else(|| ExtractError::unreadable(&name, "no video stream"))?;

        let frames = stream.frames();
        let rate = stream.avg_frame_rate();
        info!(
            "Video: {} (fps {:.2}, {} frames)",
            name,
            rational_to_f64(rate),
            frames
        );

        Ok(Self {
            path,
            name,
            frame_count: (frames > 0).then_some(frames as u64),
        })
    }
}

impl FrameSource for FfmpegSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn frame_count_hint(&self) -> Option<u64> {
        self.frame_count
    }

    fn frames(&mut self) -> Result<FrameIter<'_>, ExtractError> {
        Ok(Box::new(FfmpegFrames::open(&self.path, &self.name)?))
    }
}

pub struct FfmpegOpener;

impl SourceOpener for FfmpegOpener {
    fn open(&self, path: &Path) -> Result<Box<dyn FrameSource + Send>, ExtractError> {
        Ok(Box::new(FfmpegSource::open(path)?))
    }
}

struct FfmpegFrames {
    name: String,
    input: format::context::Input,
    decoder: decoder::Video,
    scaler: scaling::Context,
    stream_index: usize,
    time_base: Rational,
    fps: f64,
    next_index: u64,
    eof_sent: bool,
    finished: bool,
}

impl FfmpegFrames {
    fn open(path: &Path, name: &str) -> Result<Self, ExtractError> {
        let unreadable = |e: ffmpeg::Error| ExtractError::unreadable(name, e);

        let input = format::input(&path).map_err(unreadable)?;
        let stream = input
            .streams()
            .best(media::Type::Video)
            .ok_or_else(|| ExtractError::unreadable(name, "no video stream"))?;
        let stream_index = stream.index();
        let time_base = stream.time_base();
        let fps = rational_to_f64(stream.avg_frame_rate());

        let decoder = codec::context::Context::from_parameters(stream.parameters())
            .map_err(unreadable)?
            .decoder()
            .video()
            .map_err(unreadable)?;

        let scaler = scaling::Context::get(
            decoder.format(),
            decoder.width(),
            decoder.height(),
            format::Pixel::RGB24,
            decoder.width(),
            decoder.height(),
            scaling::Flags::BILINEAR,
        )
        .map_err(unreadable)?;

        Ok(Self {
            name: name.to_string(),
            input,
            decoder,
            scaler,
            stream_index,
            time_base,
            fps,
            next_index: 0,
            eof_sent: false,
            finished: false,
        })
    }

    fn convert(&mut self, decoded: &Video) -> Result<Frame, ExtractError> {
        let mut rgb = Video::empty();
        self.scaler
            .run(decoded, &mut rgb)
            .map_err(|e| ExtractError::unreadable(&self.name, e))?;

        let width = rgb.width();
        let height = rgb.height();
        let stride = rgb.stride(0);
        let row_len = width as usize * 3;
        let data = rgb.data(0);

        let mut pixels = Vec::with_capacity(row_len * height as usize);
        for row in 0..height as usize {
            let start = row * stride;
            pixels.extend_from_slice(&data[start..start + row_len]);
        }
        let image = RgbImage::from_raw(width, height, pixels)
            .ok_or_else(|| ExtractError::unreadable(&self.name, "short RGB frame"))?;

        let index = self.next_index;
        self.next_index += 1;
        Ok(Frame::new(index, self.timestamp(decoded, index), image))
    }

    fn timestamp(&self, decoded: &Video, index: u64) -> Duration {
        let secs = match decoded.timestamp() {
            Some(pts) => pts as f64 * rational_to_f64(self.time_base),
            None if self.fps > 0.0 => index as f64 / self.fps,
            None => 0.0,
        };
        Duration::from_secs_f64(secs.max(0.0))
    }
}

/// Decoder state after a `receive_frame` call.
#[derive(Debug, PartialEq)]
enum Received {
    Frame,
    NeedInput,
    Drained,
    Failed(ffmpeg::Error),
}

fn classify(result: Result<(), ffmpeg::Error>) -> Received {
    match result {
        Ok(()) => Received::Frame,
        Err(ffmpeg::Error::Other { errno }) if errno == EAGAIN => Received::NeedInput,
        Err(ffmpeg::Error::Eof) => Received::Drained,
        Err(e) => Received::Failed(e),
    }
}

impl Iterator for FfmpegFrames {
    type Item = Result<Frame, ExtractError>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.finished {
            let mut decoded = Video::empty();
            match classify(self.decoder.receive_frame(&mut decoded)) {
                Received::Frame => return Some(self.convert(&decoded)),
                Received::NeedInput if !self.eof_sent => {}
                Received::NeedInput | Received::Drained => {
                    self.finished = true;
                    return None;
                }
                Received::Failed(e) => {
                    self.finished = true;
                    return Some(Err(ExtractError::unreadable(&self.name, e)));
                }
            }

            let next = self
                .input
                .packets()
                .next()
                .map(|(stream, packet)| (stream.index(), packet));
            match next {
                Some((index, packet)) if index == self.stream_index => {
                    if let Err(e) = self.decoder.send_packet(&packet) {
                        self.finished = true;
                        return Some(Err(ExtractError::unreadable(&self.name, e)));
                    }
                }
                Some(_) => {}
                None => {
                    debug!("'{}': end of stream after {} frames", self.name, self.next_index);
                    if let Err(e) = self.decoder.send_eof() {
                        self.finished = true;
                        return Some(Err(ExtractError::unreadable(&self.name, e)));
                    }
                    self.eof_sent = true;
                }
            }
        }
        None
    }
}

fn rational_to_f64(r: Rational) -> f64 {
    if r.denominator() == 0 {
        0.0
    } else {
        r.numerator() as f64 / r.denominator() as f64
    }
}
