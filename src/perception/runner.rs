use image::{GrayImage, RgbImage};

use crate::error::RunnerError;
use crate::scene::BBox;

/// One raw detector output, in image pixel coordinates.
#[derive(Clone, Debug, PartialEq)]
pub struct RawDetection {
    pub bbox: BBox,
    pub class_id: i64,
    pub confidence: f32,
}

/// Monocular depth estimation.
///
/// Returns a single-channel map; the adapter resizes it to the source size if needed.
pub trait DepthEstimator: Send {
    fn name(&self) -> &'static str;

    /// Why the runner cannot work at all, for runners standing in for a missing dependency.
    fn unavailable_reason(&self) -> Option<&str> {
        None
    }

    fn estimate(&mut self, image: &RgbImage) -> Result<GrayImage, RunnerError>;
}

/// Object detection. Detections are returned in the order the adapter should index them.
pub trait ObjectDetector: Send {
    fn name(&self) -> &'static str;

    /// Why the runner cannot work at all, for runners standing in for a missing dependency.
    fn unavailable_reason(&self) -> Option<&str> {
        None
    }

    fn detect(&mut self, image: &RgbImage) -> Result<Vec<RawDetection>, RunnerError>;
}

/// Box-prompted segmentation.
///
/// `bbox` is already expanded and clamped. The mask covers the whole image, non-zero inside
/// the object.
pub trait Segmenter: Send {
    fn name(&self) -> &'static str;

    /// Why the runner cannot work at all, for runners standing in for a missing dependency.
    fn unavailable_reason(&self) -> Option<&str> {
        None
    }

    fn segment(&mut self, image: &RgbImage, bbox: BBox) -> Result<GrayImage, RunnerError>;
}
