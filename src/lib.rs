//! Room Restyle
//!
//! Turns a room photo (or a video of a room) into a restyled image sequence and a
//! cross-dissolve video.
//!
//! # Pipeline
//!
//! 1. **Extract** (video mode): sample frames at a target rate.
//! 2. **Perceive**: depth map, object detections and box-prompted masks, normalized into a
//!    `SceneFrame`. Missing models degrade to a placeholder record.
//! 3. **Generate**: a redesign prompt is synthesized from the scene and handed, with the
//!    depth map, to a diffusion runner. Failures leave a deterministic gradient placeholder.
//! 4. **Assemble**: keyframes are held and cross-dissolved into `final_video.mp4`.
//!
//! Heavy runners report `RunnerError::Unavailable` or `RunnerError::Failed`; each stage
//! matches on the variant to pick its degraded path. A run always finishes with the
//! documented set of output files.
//!
//! # Module Structure
//!
//! - `preset`: quality presets (`fast`, `balanced`, `quality`)
//! - `scene`: scene-frame records and manifests
//! - `video`: frame sources, extraction, encoders, keyframe assembly
//! - `perception`, `prompt`, `generation`: the per-frame stages
//! - `pipeline`: the orchestrator
//! - `config`, `logging`, `validate`: ambient support

pub mod config;
pub mod error;
pub mod generation;
pub mod logging;
pub mod perception;
pub mod pipeline;
pub mod placeholder;
pub mod preset;
pub mod prompt;
pub mod scene;
pub mod validate;
pub mod video;

pub use config::PipelineConfig;
pub use error::{PipelineError, PipelineResult, RunnerError};
pub use generation::{DiffusionRequest, DiffusionRunner, GeneratedImage, GenerationAdapter};
pub use perception::{PerceptionAdapter, PerceptionRunners};
pub use pipeline::{Orchestrator, RunRequest, RunSummary, VideoOutcome};
pub use preset::{resolve, Preset, PresetConfig};
pub use scene::{RunMode, SceneFrame, SceneManifest};
