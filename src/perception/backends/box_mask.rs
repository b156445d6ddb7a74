use image::{GrayImage, Luma, RgbImage};

use crate::error::RunnerError;
use crate::perception::runner::Segmenter;
use crate::scene::BBox;

/// Segmenter for `box-only` mode: the mask is the filled prompt box.
#[derive(Clone, Copy, Debug, Default)]
pub struct BoxSegmenter;

impl BoxSegmenter {
    pub fn new() -> Self {
        Self
    }
}

impl Segmenter for BoxSegmenter {
    fn name(&self) -> &'static str {
        "box"
    }

    fn segment(&mut self, image: &RgbImage, bbox: BBox) -> Result<GrayImage, RunnerError> {
        let (w, h) = image.dimensions();
        let x1 = bbox[0].floor().max(0.0) as u32;
        let y1 = bbox[1].floor().max(0.0) as u32;
        let x2 = (bbox[2].ceil().max(0.0) as u32).min(w);
        let y2 = (bbox[3].ceil().max(0.0) as u32).min(h);
        Ok(GrayImage::from_fn(w, h, |x, y| {
            if x >= x1 && x < x2 && y >= y1 && y < y2 {
                Luma([255])
            } else {
                Luma([0])
            }
        }))
    }
}
