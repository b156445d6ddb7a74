//! Frame encoders.
//!
//! A `VideoEncoder` opens a `FrameSink` for one output file. Frame size and rate are
//! fixed when the sink is opened.

use image::RgbImage;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::error::RunnerError;

pub trait FrameSink {
    fn write_frame(&mut self, frame: &RgbImage) -> Result<(), RunnerError>;

    /// Flush and close the container.
    fn finish(self: Box<Self>) -> Result<(), RunnerError>;
}

pub trait VideoEncoder {
    fn name(&self) -> &'static str;

    /// Set when every `open` will report `Unavailable`.
    fn unavailable_reason(&self) -> Option<&str> {
        None
    }

    fn open(
        &self,
        path: &Path,
        fps: u32,
        width: u32,
        height: u32,
    ) -> Result<Box<dyn FrameSink>, RunnerError>;
}

/// The MP4 encoder when built with `video-ffmpeg`, otherwise an encoder that is always unavailable.
pub fn default_encoder() -> Box<dyn VideoEncoder> {
    #[cfg(feature = "video-ffmpeg")]
    {
        Box::new(super::ffmpeg::Mp4Encoder)
    }
    #[cfg(not(feature = "video-ffmpeg"))]
    {
        Box::new(UnavailableEncoder::new(
            "video encoding requires the video-ffmpeg feature",
        ))
    }
}

/// Encoder standing in for a missing dependency.
#[derive(Clone, Debug)]
pub struct UnavailableEncoder {
    reason: String,
}

impl UnavailableEncoder {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl VideoEncoder for UnavailableEncoder {
    fn name(&self) -> &'static str {
        "unavailable"
    }

    fn unavailable_reason(&self) -> Option<&str> {
        Some(&self.reason)
    }

    fn open(&self, _: &Path, _: u32, _: u32, _: u32) -> Result<Box<dyn FrameSink>, RunnerError> {
        Err(RunnerError::unavailable(self.reason.clone()))
    }
}

/// One encoded video held in memory.
#[derive(Clone, Debug, Default)]
pub struct RecordedVideo {
    pub path: PathBuf,
    pub fps: u32,
    pub width: u32,
    pub height: u32,
    pub frames: Vec<RgbImage>,
    pub finished: bool,
}

/// Encoder that keeps frames in memory. Used for previews and for exercising assembly.
#[derive(Clone, Debug, Default)]
pub struct MemoryEncoder {
    videos: Arc<Mutex<Vec<RecordedVideo>>>,
}

impl MemoryEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every video opened so far.
    pub fn videos(&self) -> Vec<RecordedVideo> {
        self.videos
            .lock()
            .map(|videos| videos.clone())
            .unwrap_or_default()
    }
}

impl VideoEncoder for MemoryEncoder {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn open(
        &self,
        path: &Path,
        fps: u32,
        width: u32,
        height: u32,
    ) -> Result<Box<dyn FrameSink>, RunnerError> {
        let mut videos = self
            .videos
            .lock()
            .map_err(|_| RunnerError::failed("memory encoder lock poisoned"))?;
        videos.push(RecordedVideo {
            path: path.to_path_buf(),
            fps,
            width,
            height,
            ..RecordedVideo::default()
        });
        Ok(Box::new(MemorySink {
            videos: self.videos.clone(),
            index: videos.len() - 1,
        }))
    }
}

struct MemorySink {
    videos: Arc<Mutex<Vec<RecordedVideo>>>,
    index: usize,
}

impl MemorySink {
    fn with_video<T>(&self, f: impl FnOnce(&mut RecordedVideo) -> T) -> Result<T, RunnerError> {
        let mut videos = self
            .videos
            .lock()
            .map_err(|_| RunnerError::failed("memory encoder lock poisoned"))?;
        let video = videos
            .get_mut(self.index)
            .ok_or_else(|| RunnerError::failed("recorded video missing"))?;
        Ok(f(video))
    }
}

impl FrameSink for MemorySink {
    fn write_frame(&mut self, frame: &RgbImage) -> Result<(), RunnerError> {
        self.with_video(|video| {
            if frame.dimensions() != (video.width, video.height) {
                return Err(RunnerError::failed(format!(
                    "frame {}x{} does not match video {}x{}",
                    frame.width(),
                    frame.height(),
                    video.width,
                    video.height
                )));
            }
            video.frames.push(frame.clone());
            Ok(())
        })?
    }

    fn finish(self: Box<Self>) -> Result<(), RunnerError> {
        self.with_video(|video| video.finished = true)
    }
}
