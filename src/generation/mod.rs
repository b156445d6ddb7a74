//! Depth-conditioned image generation.
//!
//! The adapter bridges a `SceneFrame` to a `DiffusionRunner`. Whatever the runner
//! reports, the adapter leaves an image at `out_path`: the styled result, or the
//! deterministic gradient placeholder with its marker.

mod backends;

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::{PipelineResult, RunnerError};
use crate::placeholder::{self, PlaceholderArtifact};
use crate::preset::PresetConfig;
use crate::prompt::{self, PromptParams};
use crate::scene::{PromptScene, SceneFrame};

pub use backends::{CommandDiffusion, UnavailableDiffusion};

/// One img2img call.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DiffusionRequest {
    pub prompt: String,
    pub init_image: PathBuf,
    pub control_image: Option<PathBuf>,
    pub resolution: (u32, u32),
    pub steps: u32,
    pub guidance_scale: f64,
    pub strength: f64,
    pub output: PathBuf,
}

/// Heavy diffusion handle, constructed once and reused for every frame.
pub trait DiffusionRunner: Send {
    fn name(&self) -> &'static str;

    /// Set when the runner stands in for a missing dependency.
    fn unavailable_reason(&self) -> Option<&str> {
        None
    }

    /// Generate `request.output`. Returns the path actually written.
    fn generate(&mut self, request: &DiffusionRequest) -> Result<PathBuf, RunnerError>;
}

/// Build the configured runner: `CommandDiffusion` when a command is set and found.
pub fn runner_from_command(command: Option<&str>) -> Box<dyn DiffusionRunner> {
    let Some(command) = command.filter(|c| !c.trim().is_empty()) else {
        log::warn!("no diffusion command configured; styled images will be placeholders");
        return Box::new(UnavailableDiffusion::new("no diffusion command configured"));
    };
    match CommandDiffusion::locate(command) {
        Ok(runner) => Box::new(runner),
        Err(e) => {
            log::warn!("{}", e);
            Box::new(UnavailableDiffusion::new(e.to_string()))
        }
    }
}

/// Prompt strategy and its inputs.
#[derive(Clone, Debug, PartialEq)]
pub struct PromptSettings {
    pub mode: String,
    pub style: String,
    pub text: Option<String>,
}

impl Default for PromptSettings {
    fn default() -> Self {
        Self {
            mode: "auto_design".into(),
            style: "modern".into(),
            text: None,
        }
    }
}

#[derive(Clone, Debug)]
pub enum GeneratedImage {
    Styled(PathBuf),
    Placeholder(PlaceholderArtifact),
}

impl GeneratedImage {
    pub fn path(&self) -> &Path {
        match self {
            GeneratedImage::Styled(path) => path,
            GeneratedImage::Placeholder(artifact) => &artifact.image_path,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self, GeneratedImage::Placeholder(_))
    }
}

pub struct GenerationAdapter {
    runner: Box<dyn DiffusionRunner>,
    prompt: PromptSettings,
    guidance_scale: Option<f64>,
    strength: f64,
    scratch_dir: Option<PathBuf>,
}

impl GenerationAdapter {
    pub fn new(
        runner: Box<dyn DiffusionRunner>,
        prompt: PromptSettings,
        guidance_scale: Option<f64>,
        strength: f64,
    ) -> Self {
        Self {
            runner,
            prompt,
            guidance_scale,
            strength,
            scratch_dir: None,
        }
    }

    /// Directory for the temporary prompt scene (system temp dir by default).
    pub fn with_scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = Some(dir.into());
        self
    }

    pub fn runner_name(&self) -> &'static str {
        self.runner.name()
    }

    pub fn unavailable_reason(&self) -> Option<&str> {
        self.runner.unavailable_reason()
    }

    /// Generate the styled image for `frame`. Without a configured guidance scale the
    /// preset's is used.
    ///
    /// `artifact_dir` is the directory the frame's relative paths resolve against. Only
    /// filesystem errors while writing the placeholder are returned as `Err`.
    pub fn generate(
        &mut self,
        frame: &SceneFrame,
        artifact_dir: &Path,
        source_image: &Path,
        out_path: &Path,
        preset: &PresetConfig,
    ) -> PipelineResult<GeneratedImage> {
        if let Some(parent) = out_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let control_image = stage_depth_map(frame, artifact_dir, source_image);

        let scene = PromptScene::from_frame(frame, average_brightness(source_image));
        let mut builder = tempfile::Builder::new();
        builder.prefix("prompt_scene_").suffix(".json");
        let scene_file = match &self.scratch_dir {
            Some(dir) => builder.tempfile_in(dir)?,
            None => builder.tempfile()?,
        };
        serde_json::to_writer_pretty(scene_file.as_file(), &scene)?;

        let prompt = prompt::prompt(
            &self.prompt.mode,
            &PromptParams {
                style: Some(self.prompt.style.as_str()),
                user_input: self.prompt.text.as_deref(),
                scene_json: Some(scene_file.path()),
            },
        );
        drop(scene_file);

        let (width, height) = preset.sd_resolution;
        let request = DiffusionRequest {
            prompt,
            init_image: source_image.to_path_buf(),
            control_image,
            resolution: preset.sd_resolution,
            steps: preset.sd_steps,
            guidance_scale: self.guidance_scale.unwrap_or(preset.guidance_scale),
            strength: self.strength,
            output: out_path.to_path_buf(),
        };
        log::info!(
            "{}: generating {}x{} with {} ({} steps)",
            frame.id,
            width,
            height,
            self.runner.name(),
            request.steps
        );

        let failure = match self.runner.generate(&request) {
            Ok(written) => match finish_styled(&written, out_path) {
                Ok(()) => {
                    log::info!("{}: styled image saved to {}", frame.id, out_path.display());
                    return Ok(GeneratedImage::Styled(out_path.to_path_buf()));
                }
                Err(e) => RunnerError::failed(format!("cannot place generated image: {}", e)),
            },
            Err(e) => e,
        };

        match &failure {
            RunnerError::Unavailable(reason) => {
                log::warn!("{}: generation unavailable: {}", frame.id, reason)
            }
            RunnerError::Failed(detail) => {
                log::error!("{}: generation failed: {}", frame.id, detail)
            }
        }
        let artifact = placeholder::write_image_placeholder(
            out_path,
            preset.sd_resolution,
            "generation",
            &failure.to_string(),
        )?;
        Ok(GeneratedImage::Placeholder(artifact))
    }
}

/// Put the recorded depth map where the runner expects it: `{source stem}_depth.png`
/// inside the artifact directory.
fn stage_depth_map(frame: &SceneFrame, artifact_dir: &Path, source_image: &Path) -> Option<PathBuf> {
    let stem = source_image
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| frame.id.clone());
    let expected = artifact_dir.join(format!("{}_depth.png", stem));
    let recorded = artifact_dir.join(&frame.depth_path);

    if recorded != expected && recorded.is_file() {
        if let Err(e) = std::fs::copy(&recorded, &expected) {
            log::warn!(
                "{}: cannot copy depth map {} to {}: {}",
                frame.id,
                recorded.display(),
                expected.display(),
                e
            );
        }
    }
    if expected.is_file() {
        Some(expected)
    } else {
        log::warn!("{}: no depth map available, generating unconditioned", frame.id);
        None
    }
}

fn finish_styled(written: &Path, out_path: &Path) -> std::io::Result<()> {
    if written != out_path {
        std::fs::copy(written, out_path)?;
    }
    let marker = placeholder::marker_path(out_path);
    if marker.is_file() {
        std::fs::remove_file(marker)?;
    }
    Ok(())
}

/// Mean Rec. 601 luma of an image, `None` if it cannot be decoded.
pub fn average_brightness(image_path: &Path) -> Option<f64> {
    let luma = image::open(image_path).ok()?.to_luma8();
    let count = luma.as_raw().len();
    if count == 0 {
        return None;
    }
    let total: u64 = luma.as_raw().iter().map(|&v| v as u64).sum();
    Some(total as f64 / count as f64)
}
