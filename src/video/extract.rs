//! Sampled frame extraction.

use std::path::{Path, PathBuf};

use super::source::{open_source, VideoSource, FALLBACK_FPS};
use crate::error::PipelineResult;

/// Stride between sampled frames: `max(1, round(native / sampling))`.
pub fn sampling_interval(native_fps: f64, sampling_fps: f64) -> u64 {
    let native = if native_fps.is_finite() && native_fps > 0.0 {
        native_fps
    } else {
        FALLBACK_FPS
    };
    if !(sampling_fps.is_finite() && sampling_fps > 0.0) {
        return 1;
    }
    ((native / sampling_fps).round() as u64).max(1)
}

/// `frame_0001.jpg` for index 1.
pub fn frame_file_name(index: usize) -> String {
    format!("frame_{:04}.jpg", index)
}

/// Open `video_path` and save sampled frames into `out_dir`.
pub fn extract_frames(
    video_path: &str,
    out_dir: &Path,
    sampling_fps: f64,
    max_frames: usize,
) -> PipelineResult<Vec<PathBuf>> {
    let mut source = open_source(video_path)?;
    let paths = extract_from(source.as_mut(), out_dir, sampling_fps, max_frames)?;
    log::info!("extracted {} frames from {}", paths.len(), video_path);
    Ok(paths)
}

/// Save every `interval`-th frame until the source ends or `max_frames` are written.
pub fn extract_from(
    source: &mut dyn VideoSource,
    out_dir: &Path,
    sampling_fps: f64,
    max_frames: usize,
) -> PipelineResult<Vec<PathBuf>> {
    std::fs::create_dir_all(out_dir)?;
    let interval = sampling_interval(source.native_fps(), sampling_fps);
    log::debug!(
        "sampling every {} frames (native {:.2} fps, target {:.2} fps)",
        interval,
        source.native_fps(),
        sampling_fps
    );

    let mut paths = Vec::new();
    let mut frame_index: u64 = 0;
    while paths.len() < max_frames {
        let Some(frame) = source.next_frame()? else {
            break;
        };
        if frame_index % interval == 0 {
            let path = out_dir.join(frame_file_name(paths.len() + 1));
            frame.save(&path)?;
            paths.push(path);
            log::info!(
                "extracted frame {}/{}: {}",
                paths.len(),
                max_frames,
                paths[paths.len() - 1].display()
            );
        }
        frame_index += 1;
    }
    Ok(paths)
}
