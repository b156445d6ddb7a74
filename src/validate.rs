//! Output validation for a finished run directory.

use std::path::Path;

use crate::placeholder::VIDEO_PLACEHOLDER_FILE;
use crate::scene::SceneManifest;

/// Styled images at or below this size are treated as truncated.
pub const MIN_STYLED_BYTES: u64 = 100;

/// Check the documented outputs of `output_dir`. Returns the problems found; empty means pass.
pub fn validate_outputs(output_dir: &Path) -> Vec<String> {
    let mut problems = Vec::new();

    let scene_path = output_dir.join("scene").join("frame_0001.json");
    match SceneManifest::load(&scene_path) {
        Ok(manifest) if manifest.frames.is_empty() => {
            problems.push(format!("{}: manifest has no frames", scene_path.display()))
        }
        Ok(_) => {}
        Err(e) => problems.push(format!("{}: {}", scene_path.display(), e)),
    }

    let styled = output_dir.join("frame_0001_styled.png");
    match std::fs::metadata(&styled) {
        Ok(meta) if meta.len() > MIN_STYLED_BYTES => {}
        Ok(meta) => problems.push(format!(
            "{}: only {} bytes",
            styled.display(),
            meta.len()
        )),
        Err(_) => problems.push(format!("{}: missing", styled.display())),
    }

    let video = output_dir.join("final_video.mp4");
    let video_marker = output_dir.join(VIDEO_PLACEHOLDER_FILE);
    if !video.is_file() && !video_marker.is_file() {
        problems.push(format!(
            "neither {} nor {} exists",
            video.display(),
            video_marker.display()
        ));
    }

    problems
}
