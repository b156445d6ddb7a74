use image::{GrayImage, RgbImage};

use crate::error::RunnerError;
use crate::perception::runner::{DepthEstimator, ObjectDetector, RawDetection, Segmenter};
use crate::scene::BBox;

/// Runner standing in for a model that could not be loaded. Every call reports `Unavailable`.
#[derive(Clone, Debug)]
pub struct UnavailableRunner {
    reason: String,
}

impl UnavailableRunner {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    fn err(&self) -> RunnerError {
        RunnerError::unavailable(self.reason.clone())
    }
}

impl DepthEstimator for UnavailableRunner {
    fn name(&self) -> &'static str {
        "unavailable"
    }

    fn unavailable_reason(&self) -> Option<&str> {
        Some(&self.reason)
    }

    fn estimate(&mut self, _image: &RgbImage) -> Result<GrayImage, RunnerError> {
        Err(self.err())
    }
}

impl ObjectDetector for UnavailableRunner {
    fn name(&self) -> &'static str {
        "unavailable"
    }

    fn unavailable_reason(&self) -> Option<&str> {
        Some(&self.reason)
    }

    fn detect(&mut self, _image: &RgbImage) -> Result<Vec<RawDetection>, RunnerError> {
        Err(self.err())
    }
}

impl Segmenter for UnavailableRunner {
    fn name(&self) -> &'static str {
        "unavailable"
    }

    fn unavailable_reason(&self) -> Option<&str> {
        Some(&self.reason)
    }

    fn segment(&mut self, _image: &RgbImage, _bbox: BBox) -> Result<GrayImage, RunnerError> {
        Err(self.err())
    }
}
