//! Video frame sources.
//!
//! `stub://` paths produce a deterministic synthetic clip and are always available.
//! Local files are decoded with FFmpeg when the `video-ffmpeg` feature is enabled;
//! otherwise opening them fails with `SourceUnavailable`.

use image::{Rgb, RgbImage};
use std::path::Path;

use crate::error::{PipelineError, PipelineResult};

/// Native frame rate assumed when a container does not report one.
pub const FALLBACK_FPS: f64 = 24.0;

/// Sequential decoded frames plus the source frame rate.
pub trait VideoSource {
    fn native_fps(&self) -> f64;

    /// Next frame in presentation order, `None` once the source is exhausted.
    fn next_frame(&mut self) -> PipelineResult<Option<RgbImage>>;
}

/// Open a video path as a frame source.
pub fn open_source(path: &str) -> PipelineResult<Box<dyn VideoSource>> {
    if path.starts_with("stub://") {
        return Ok(Box::new(SyntheticVideo::parse(path)?));
    }
    if path.contains("://") {
        return Err(PipelineError::source_unavailable(
            path,
            "only local files and stub:// sources are supported",
        ));
    }
    if !Path::new(path).is_file() {
        return Err(PipelineError::source_unavailable(path, "no such file"));
    }

    #[cfg(feature = "video-ffmpeg")]
    {
        Ok(Box::new(super::ffmpeg::FfmpegVideoSource::open(path)?))
    }
    #[cfg(not(feature = "video-ffmpeg"))]
    {
        Err(PipelineError::source_unavailable(
            path,
            "video decoding requires the video-ffmpeg feature",
        ))
    }
}

// ----------------------------------------------------------------------------
// Synthetic source (stub://) for tests and demos
// ----------------------------------------------------------------------------

/// Deterministic synthetic clip: `stub://name?frames=30&fps=10&size=64x64`.
#[derive(Clone, Debug)]
pub struct SyntheticVideo {
    pub frames: u64,
    pub fps: f64,
    pub width: u32,
    pub height: u32,
    emitted: u64,
}

impl SyntheticVideo {
    pub fn new(frames: u64, fps: f64, width: u32, height: u32) -> Self {
        Self {
            frames,
            fps,
            width,
            height,
            emitted: 0,
        }
    }

    pub fn parse(url: &str) -> PipelineResult<Self> {
        let mut video = Self::new(30, 10.0, 64, 64);
        let query = url.split_once('?').map(|(_, q)| q).unwrap_or("");
        for pair in query.split('&').filter(|p| !p.is_empty()) {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            let bad = || PipelineError::source_unavailable(url, format!("bad parameter {}", pair));
            match key {
                "frames" => video.frames = value.parse().map_err(|_| bad())?,
                "fps" => video.fps = value.parse().map_err(|_| bad())?,
                "size" => {
                    let (w, h) = value.split_once('x').ok_or_else(|| bad())?;
                    video.width = w.parse().map_err(|_| bad())?;
                    video.height = h.parse().map_err(|_| bad())?;
                }
                _ => return Err(bad()),
            }
        }
        if video.width == 0 || video.height == 0 {
            return Err(PipelineError::source_unavailable(url, "frame size must be non-zero"));
        }
        Ok(video)
    }

    fn render(&self, index: u64) -> RgbImage {
        let shift = (index * 8 % 256) as u32;
        RgbImage::from_fn(self.width, self.height, |x, y| {
            Rgb([
                ((x + shift) % 256) as u8,
                ((y + shift) % 256) as u8,
                (index % 256) as u8,
            ])
        })
    }
}

impl VideoSource for SyntheticVideo {
    fn native_fps(&self) -> f64 {
        self.fps
    }

    fn next_frame(&mut self) -> PipelineResult<Option<RgbImage>> {
        if self.emitted >= self.frames {
            return Ok(None);
        }
        let frame = self.render(self.emitted);
        self.emitted += 1;
        Ok(Some(frame))
    }
}
