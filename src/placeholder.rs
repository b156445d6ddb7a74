//! Deterministic placeholder artifacts.
//!
//! Placeholders depend only on their target resolution (and the recorded reason), so
//! re-running against the same output directory produces byte-identical files.

use image::{ImageFormat, Rgb, RgbImage};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::io::Cursor;
use std::path::{Path, PathBuf};

use crate::error::PipelineResult;

pub const VIDEO_PLACEHOLDER_FILE: &str = "video_placeholder.txt";

/// Sidecar written next to a placeholder image.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaceholderMarker {
    pub skipped: String,
    pub reason: String,
    pub width: u32,
    pub height: u32,
    pub sha256: String,
}

#[derive(Clone, Debug)]
pub struct PlaceholderArtifact {
    pub image_path: PathBuf,
    pub marker_path: PathBuf,
    pub marker: PlaceholderMarker,
}

/// Gradient where pixel `(x, y)` is `(x*255/W, y*255/H, 128)`.
pub fn gradient(width: u32, height: u32) -> RgbImage {
    let (w, h) = (width.max(1) as u64, height.max(1) as u64);
    RgbImage::from_fn(width, height, |x, y| {
        Rgb([
            (x as u64 * 255 / w) as u8,
            (y as u64 * 255 / h) as u8,
            128,
        ])
    })
}

/// `frame_0001_styled.png` -> `frame_0001_styled.placeholder`.
pub fn marker_path(image_path: &Path) -> PathBuf {
    image_path.with_extension("placeholder")
}

/// Write the gradient placeholder as PNG plus its marker file.
pub fn write_image_placeholder(
    image_path: &Path,
    resolution: (u32, u32),
    skipped: &str,
    reason: &str,
) -> PipelineResult<PlaceholderArtifact> {
    let (width, height) = resolution;
    let mut bytes = Vec::new();
    gradient(width, height).write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;

    if let Some(parent) = image_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(image_path, &bytes)?;

    let marker = PlaceholderMarker {
        skipped: skipped.to_string(),
        reason: reason.to_string(),
        width,
        height,
        sha256: hex::encode(Sha256::digest(&bytes)),
    };
    let marker_path = marker_path(image_path);
    std::fs::write(&marker_path, serde_json::to_string_pretty(&marker)?)?;

    log::warn!(
        "wrote placeholder {} ({}x{}): {}",
        image_path.display(),
        width,
        height,
        reason
    );
    Ok(PlaceholderArtifact {
        image_path: image_path.to_path_buf(),
        marker_path,
        marker,
    })
}

/// Record that no video was produced for this run.
pub fn write_video_placeholder(
    output_dir: &Path,
    reason: &str,
    keyframes: &[PathBuf],
) -> PipelineResult<PathBuf> {
    let path = output_dir.join(VIDEO_PLACEHOLDER_FILE);
    let mut body = format!("video skipped: {}\nkeyframes:\n", reason);
    for keyframe in keyframes {
        let name = keyframe
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| keyframe.display().to_string());
        body.push_str("  ");
        body.push_str(&name);
        body.push('\n');
    }
    std::fs::write(&path, body)?;
    log::warn!("wrote video placeholder {}: {}", path.display(), reason);
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gradient_matches_formula() {
        let img = gradient(4, 2);
        assert_eq!(img.get_pixel(0, 0), &Rgb([0, 0, 128]));
        assert_eq!(img.get_pixel(3, 1), &Rgb([191, 127, 128]));
        assert_eq!(img.get_pixel(2, 0), &Rgb([127, 0, 128]));
    }

    #[test]
    fn placeholder_is_byte_identical_across_writes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frame_0001_styled.png");

        let first = write_image_placeholder(&path, (64, 48), "generation", "no runner").unwrap();
        let bytes_a = std::fs::read(&path).unwrap();
        let marker_a = std::fs::read(&first.marker_path).unwrap();

        write_image_placeholder(&path, (64, 48), "generation", "no runner").unwrap();
        assert_eq!(bytes_a, std::fs::read(&path).unwrap());
        assert_eq!(marker_a, std::fs::read(&first.marker_path).unwrap());

        assert!(bytes_a.len() > 100);
        assert_eq!(first.marker.sha256, hex::encode(Sha256::digest(&bytes_a)));
        assert_eq!(
            first.marker_path,
            dir.path().join("frame_0001_styled.placeholder")
        );
    }

    #[test]
    fn video_placeholder_lists_keyframes() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_video_placeholder(
            dir.path(),
            "encoder unavailable",
            &[dir.path().join("frame_0001_styled.png")],
        )
        .unwrap();
        let body = std::fs::read_to_string(path).unwrap();
        assert!(body.contains("encoder unavailable"));
        assert!(body.contains("frame_0001_styled.png"));
    }
}
