pub mod box_mask;
pub mod unavailable;

#[cfg(feature = "backend-tract")]
pub mod tract;

pub use box_mask::BoxSegmenter;
pub use unavailable::UnavailableRunner;

#[cfg(feature = "backend-tract")]
pub use tract::{OnnxDepth, OnnxDetector};
