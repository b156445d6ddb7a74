//! Video input and output.
//!
//! - `source`: frame sources (synthetic `stub://` or decoded files with `video-ffmpeg`)
//! - `extract`: sampled frame extraction to `frame_NNNN.jpg`
//! - `sink`: frame encoders
//! - `assemble`: hold + cross-dissolve keyframe video assembly

pub mod assemble;
pub mod extract;
#[cfg(feature = "video-ffmpeg")]
mod ffmpeg;
pub mod sink;
pub mod source;

pub use assemble::{
    blend, create_video_from_keyframes, expected_frame_count, make_video_from_keyframes,
    VideoAssembler,
};
pub use extract::{extract_frames, extract_from, frame_file_name, sampling_interval};
pub use sink::{default_encoder, FrameSink, MemoryEncoder, UnavailableEncoder, VideoEncoder};
pub use source::{open_source, SyntheticVideo, VideoSource};
