//! Keyframe video assembly.
//!
//! Each keyframe is held for `hold_frames`, then cross-dissolved into the next over
//! `transition_frames` with `alpha = f / transition_frames`, `f in 0..transition_frames`.
//! Alpha never reaches 1: the next keyframe's hold supplies the pure frame.
//!
//! Frame size is fixed by the first keyframe; later keyframes of another size are resized.
//! An empty keyframe list or an unreadable first keyframe returns `Ok(None)`. Encoder
//! errors are returned as `Err` so the caller can try another entry point.

use image::imageops::{self, FilterType};
use image::RgbImage;
use std::path::{Path, PathBuf};

use super::sink::{FrameSink, VideoEncoder};
use crate::error::RunnerError;

/// Total frames for `keyframes` decodable keyframes.
pub fn expected_frame_count(keyframes: usize, hold_frames: u32, transition_frames: u32) -> usize {
    if keyframes == 0 {
        return 0;
    }
    keyframes * hold_frames as usize + (keyframes - 1) * transition_frames as usize
}

/// Per-pixel `(1 - alpha) * current + alpha * next`, rounded and saturated.
pub fn blend(current: &RgbImage, next: &RgbImage, alpha: f32) -> RgbImage {
    let data: Vec<u8> = current
        .as_raw()
        .iter()
        .zip(next.as_raw().iter())
        .map(|(&a, &b)| {
            let value = (1.0 - alpha) * a as f32 + alpha * b as f32;
            value.round().clamp(0.0, 255.0) as u8
        })
        .collect();
    RgbImage::from_raw(current.width(), current.height(), data).unwrap_or_else(|| current.clone())
}

/// Primary assembler bound to one output file and frame rate.
pub struct VideoAssembler<'a> {
    encoder: &'a dyn VideoEncoder,
    output_path: PathBuf,
    fps: u32,
}

impl<'a> VideoAssembler<'a> {
    pub fn new(encoder: &'a dyn VideoEncoder, output_path: impl Into<PathBuf>, fps: u32) -> Self {
        Self {
            encoder,
            output_path: output_path.into(),
            fps,
        }
    }

    pub fn create_video(
        &self,
        keyframes: &[PathBuf],
        transition_frames: u32,
        hold_frames: u32,
    ) -> Result<Option<PathBuf>, RunnerError> {
        if let Some(parent) = self.output_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        write_video(
            self.encoder,
            keyframes,
            &self.output_path,
            self.fps,
            transition_frames,
            hold_frames,
        )
    }
}

/// Adapter entry point: same dissolve, explicit arguments.
pub fn create_video_from_keyframes(
    encoder: &dyn VideoEncoder,
    keyframes: &[PathBuf],
    output_path: &Path,
    fps: u32,
    transition_frames: u32,
    hold_frames: u32,
) -> Result<Option<PathBuf>, RunnerError> {
    if let Some(parent) = output_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    write_video(
        encoder,
        keyframes,
        output_path,
        fps,
        transition_frames,
        hold_frames,
    )
}

/// Quick crossfade with the hold derived from the crossfade length: `max(6, 2 * crossfade)`.
pub fn make_video_from_keyframes(
    encoder: &dyn VideoEncoder,
    keyframes: &[PathBuf],
    output_path: &Path,
    fps: u32,
    crossfade_frames: u32,
) -> Result<Option<PathBuf>, RunnerError> {
    create_video_from_keyframes(
        encoder,
        keyframes,
        output_path,
        fps,
        crossfade_frames,
        (crossfade_frames * 2).max(6),
    )
}

fn write_video(
    encoder: &dyn VideoEncoder,
    keyframes: &[PathBuf],
    output_path: &Path,
    fps: u32,
    transition_frames: u32,
    hold_frames: u32,
) -> Result<Option<PathBuf>, RunnerError> {
    let Some(first_path) = keyframes.first() else {
        log::error!("no keyframes provided for video creation");
        return Ok(None);
    };
    let first = match image::open(first_path) {
        Ok(img) => img.to_rgb8(),
        Err(e) => {
            log::error!("could not read keyframe {}: {}", first_path.display(), e);
            return Ok(None);
        }
    };
    let size = first.dimensions();
    log::info!(
        "creating video {} | size {}x{} | fps {} | encoder {}",
        output_path.display(),
        size.0,
        size.1,
        fps,
        encoder.name()
    );

    let mut sink = encoder.open(output_path, fps, size.0, size.1)?;
    let written = write_dissolve(
        sink.as_mut(),
        keyframes,
        first,
        size,
        transition_frames,
        hold_frames,
    )?;
    sink.finish()?;

    log::info!("video saved to {} ({} frames)", output_path.display(), written);
    Ok(Some(output_path.to_path_buf()))
}

fn write_dissolve(
    sink: &mut dyn FrameSink,
    keyframes: &[PathBuf],
    first: RgbImage,
    size: (u32, u32),
    transition_frames: u32,
    hold_frames: u32,
) -> Result<usize, RunnerError> {
    let mut written = 0usize;
    let mut pending = Some(first);

    for i in 0..keyframes.len() {
        let current = match pending.take().or_else(|| load_keyframe(&keyframes[i], size)) {
            Some(img) => img,
            None => continue,
        };

        for _ in 0..hold_frames {
            sink.write_frame(&current)?;
            written += 1;
        }

        if i + 1 < keyframes.len() {
            if let Some(next) = load_keyframe(&keyframes[i + 1], size) {
                for f in 0..transition_frames {
                    let alpha = f as f32 / transition_frames as f32;
                    sink.write_frame(&blend(&current, &next, alpha))?;
                    written += 1;
                }
                pending = Some(next);
            }
        }
    }
    Ok(written)
}

fn load_keyframe(path: &Path, size: (u32, u32)) -> Option<RgbImage> {
    let img = match image::open(path) {
        Ok(img) => img.to_rgb8(),
        Err(e) => {
            log::warn!("skipping unreadable keyframe {}: {}", path.display(), e);
            return None;
        }
    };
    if img.dimensions() == size {
        Some(img)
    } else {
        Some(imageops::resize(&img, size.0, size.1, FilterType::Triangle))
    }
}
