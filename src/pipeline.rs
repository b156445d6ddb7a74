//! Orchestrator: extract (video mode) -> per-frame perceive/generate -> assemble -> manifest.
//!
//! Per-frame failures are isolated:
//! - perception failure skips the frame (no manifest entry, no keyframe);
//! - generation failure substitutes a copy of the raw frame as `{id}_styled_error.png`;
//! - a per-frame manifest that cannot be written is logged and the frame continues.
//!
//! The combined `scene/scene.json` is written on every path, including an aborted
//! video run. All long-lived runner handles are owned here and passed down explicitly.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::config::{PipelineConfig, VideoSettings};
use crate::error::{PipelineResult, RunnerError};
use crate::generation::{runner_from_command, GeneratedImage, GenerationAdapter};
use crate::logging::RunLog;
use crate::perception::{PerceptionAdapter, PerceptionRunners};
use crate::placeholder::{self, VIDEO_PLACEHOLDER_FILE};
use crate::preset::{self, PresetConfig};
use crate::scene::{RunMode, SceneFrame, SceneManifest};
use crate::video::{
    create_video_from_keyframes, default_encoder, extract_frames, VideoAssembler, VideoEncoder,
};

pub const FINAL_VIDEO_FILE: &str = "final_video.mp4";
pub const RUN_LOG_FILE: &str = "run.log";

/// One pipeline invocation.
#[derive(Clone, Debug)]
pub struct RunRequest {
    pub mode: RunMode,
    pub preset: String,
    /// Image path, video file, or `stub://` source.
    pub input: PathBuf,
    pub output_dir: PathBuf,
    /// Video mode sampling rate.
    pub sampling_fps: f64,
    pub max_frames: usize,
}

#[derive(Clone, Debug, PartialEq)]
pub enum VideoOutcome {
    Encoded(PathBuf),
    Placeholder { path: PathBuf, reason: String },
    /// The run aborted before any frame was processed.
    Skipped(String),
}

impl std::fmt::Display for VideoOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VideoOutcome::Encoded(path) => write!(f, "{}", path.display()),
            VideoOutcome::Placeholder { path, reason } => {
                write!(f, "placeholder {} ({})", path.display(), reason)
            }
            VideoOutcome::Skipped(reason) => write!(f, "skipped ({})", reason),
        }
    }
}

#[derive(Clone, Debug)]
pub struct RunSummary {
    pub mode: RunMode,
    pub preset: String,
    pub frames_requested: usize,
    pub frames_perceived: usize,
    pub styled: Vec<PathBuf>,
    pub placeholders: usize,
    pub generation_errors: usize,
    pub video: VideoOutcome,
    pub manifest_path: PathBuf,
    pub elapsed: Duration,
}

/// Progress hooks for front ends. Every method defaults to a no-op.
pub trait RunObserver {
    fn stage(&mut self, _name: &str) {}

    fn frames(&mut self, _total: usize) {}

    fn frame_done(&mut self, _frame_id: &str) {}
}

pub struct SilentObserver;

impl RunObserver for SilentObserver {}

pub struct Orchestrator {
    perception: PerceptionAdapter,
    generation: GenerationAdapter,
    encoder: Box<dyn VideoEncoder>,
    video: VideoSettings,
}

impl Orchestrator {
    pub fn new(
        perception: PerceptionAdapter,
        generation: GenerationAdapter,
        encoder: Box<dyn VideoEncoder>,
        video: VideoSettings,
    ) -> Self {
        Self {
            perception,
            generation,
            encoder,
            video,
        }
    }

    /// Construct every runner from configuration: models for `preset`, the configured
    /// diffusion command and the default encoder.
    pub fn from_config(config: &PipelineConfig, preset: &PresetConfig) -> Self {
        let perception = PerceptionAdapter::new(PerceptionRunners::for_preset(
            preset,
            &config.models_dir,
        ));
        let generation = GenerationAdapter::new(
            runner_from_command(config.diffusion.command.as_deref()),
            config.prompt.clone(),
            config.diffusion.guidance_scale,
            config.diffusion.strength,
        );
        Self::new(perception, generation, default_encoder(), config.video)
    }

    pub fn run(&mut self, request: &RunRequest) -> PipelineResult<RunSummary> {
        self.run_with(request, &mut SilentObserver)
    }

    pub fn run_with(
        &mut self,
        request: &RunRequest,
        observer: &mut dyn RunObserver,
    ) -> PipelineResult<RunSummary> {
        let started = Instant::now();
        let output = request.output_dir.as_path();
        std::fs::create_dir_all(output)?;
        let _run_log = RunLog::open(&output.join(RUN_LOG_FILE))?;

        let preset = preset::resolve(&request.preset);
        let scene_dir = output.join("scene");
        let frames_dir = output.join("frames");
        std::fs::create_dir_all(&scene_dir)?;
        let manifest_path = scene_dir.join("scene.json");
        log::info!(
            "run start | mode {} | preset {} ({}) | input {} | output {} | generation {}",
            request.mode,
            request.preset,
            preset.preset,
            request.input.display(),
            output.display(),
            self.generation.runner_name()
        );
        self.log_runner_status();

        let mut summary = RunSummary {
            mode: request.mode,
            preset: preset.preset.name().to_string(),
            frames_requested: 0,
            frames_perceived: 0,
            styled: Vec::new(),
            placeholders: 0,
            generation_errors: 0,
            video: VideoOutcome::Skipped("not attempted".into()),
            manifest_path: manifest_path.clone(),
            elapsed: Duration::ZERO,
        };

        let inputs = match request.mode {
            RunMode::Image => vec![request.input.clone()],
            RunMode::Video => {
                observer.stage("extract frames");
                let source = request.input.to_string_lossy();
                match extract_frames(&source, &frames_dir, request.sampling_fps, request.max_frames)
                {
                    Ok(paths) if !paths.is_empty() => paths,
                    Ok(_) => return self.abort(summary, request, "no frames extracted", started),
                    Err(e) => {
                        let reason = format!("frame extraction failed: {}", e);
                        return self.abort(summary, request, &reason, started);
                    }
                }
            }
        };
        summary.frames_requested = inputs.len();

        observer.stage("process frames");
        observer.frames(inputs.len());
        let mut perceived: Vec<SceneFrame> = Vec::new();
        for (index, input) in inputs.iter().enumerate() {
            let frame_id = format!("frame_{:04}", index + 1);
            if let Some(frame) = self.process_frame(
                input,
                &frame_id,
                output,
                &frames_dir,
                preset,
                request.mode,
                &mut summary,
            )? {
                perceived.push(frame);
            }
            observer.frame_done(&frame_id);
        }
        summary.frames_perceived = perceived.len();

        observer.stage("assemble video");
        let video = self.assemble(&summary.styled, output);
        SceneManifest::new(perceived, preset.preset.name(), request.mode).write(&manifest_path)?;
        summary.video = video?;
        summary.elapsed = started.elapsed();
        log::info!(
            "run complete | {}/{} frames perceived | {} styled ({} placeholders, {} errors) | video {} | {:.2}s",
            summary.frames_perceived,
            summary.frames_requested,
            summary.styled.len(),
            summary.placeholders,
            summary.generation_errors,
            summary.video,
            summary.elapsed.as_secs_f64()
        );
        Ok(summary)
    }

    /// Runner problems found at construction predate the run log; record them in it.
    fn log_runner_status(&self) {
        let perception = self.perception.runner_status();
        let generation = (
            "generation",
            self.generation.runner_name(),
            self.generation.unavailable_reason(),
        );
        let encoding = (
            "video encoding",
            self.encoder.name(),
            self.encoder.unavailable_reason(),
        );
        for (stage, name, reason) in perception.into_iter().chain([generation, encoding]) {
            match reason {
                Some(reason) => log::warn!("{} unavailable: {}", stage, reason),
                None => log::info!("{} runner: {}", stage, name),
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn process_frame(
        &mut self,
        input: &Path,
        frame_id: &str,
        output: &Path,
        frames_dir: &Path,
        preset: &PresetConfig,
        mode: RunMode,
        summary: &mut RunSummary,
    ) -> PipelineResult<Option<SceneFrame>> {
        let artifact_dir = frames_dir.join(frame_id);
        let frame = match self
            .perception
            .perceive(input, &artifact_dir, preset, frame_id)
        {
            Ok(frame) => frame,
            Err(e) => {
                log::error!("{}: perception failed, skipping frame: {}", frame_id, e);
                return Ok(None);
            }
        };
        let frame_manifest = output.join("scene").join(format!("{}.json", frame_id));
        if let Err(e) =
            SceneManifest::new(vec![frame.clone()], preset.preset.name(), mode).write(&frame_manifest)
        {
            log::error!(
                "{}: cannot write {}: {}",
                frame_id,
                frame_manifest.display(),
                e
            );
        }

        let styled_path = output.join(format!("{}_styled.png", frame_id));
        match self
            .generation
            .generate(&frame, &artifact_dir, input, &styled_path, preset)
        {
            Ok(generated) => {
                if let GeneratedImage::Placeholder(_) = &generated {
                    summary.placeholders += 1;
                }
                summary.styled.push(generated.path().to_path_buf());
            }
            Err(e) => {
                log::error!("{}: generation raised: {}", frame_id, e);
                summary.generation_errors += 1;
                let error_path = output.join(format!("{}_styled_error.png", frame_id));
                match copy_as_png(input, &error_path) {
                    Ok(()) => summary.styled.push(error_path),
                    Err(copy_err) => log::error!(
                        "{}: cannot write error placeholder {}: {}",
                        frame_id,
                        error_path.display(),
                        copy_err
                    ),
                }
            }
        }
        Ok(Some(frame))
    }

    fn assemble(&self, keyframes: &[PathBuf], output: &Path) -> PipelineResult<VideoOutcome> {
        let video_path = output.join(FINAL_VIDEO_FILE);
        let VideoSettings {
            fps,
            hold_frames,
            transition_frames,
        } = self.video;

        let reason = if keyframes.is_empty() {
            "no styled frames".to_string()
        } else {
            let primary = VideoAssembler::new(self.encoder.as_ref(), &video_path, fps);
            match primary.create_video(keyframes, transition_frames, hold_frames) {
                Ok(Some(path)) => return Ok(encoded(path, output)),
                Ok(None) => "no decodable keyframes".to_string(),
                Err(RunnerError::Unavailable(reason)) => reason,
                Err(RunnerError::Failed(detail)) => {
                    log::warn!("primary video assembly failed: {}; retrying", detail);
                    match create_video_from_keyframes(
                        self.encoder.as_ref(),
                        keyframes,
                        &video_path,
                        fps,
                        transition_frames,
                        hold_frames,
                    ) {
                        Ok(Some(path)) => return Ok(encoded(path, output)),
                        Ok(None) => "no decodable keyframes".to_string(),
                        Err(e) => e.to_string(),
                    }
                }
            }
        };

        if video_path.is_file() {
            std::fs::remove_file(&video_path)?;
        }
        let path = placeholder::write_video_placeholder(output, &reason, keyframes)?;
        Ok(VideoOutcome::Placeholder { path, reason })
    }

    fn abort(
        &self,
        mut summary: RunSummary,
        request: &RunRequest,
        reason: &str,
        started: Instant,
    ) -> PipelineResult<RunSummary> {
        log::error!("aborting run: {}", reason);
        SceneManifest::new(Vec::new(), &summary.preset, request.mode)
            .write(&summary.manifest_path)?;
        summary.video = VideoOutcome::Skipped(reason.to_string());
        summary.elapsed = started.elapsed();
        Ok(summary)
    }
}

fn encoded(path: PathBuf, output: &Path) -> VideoOutcome {
    let stale = output.join(VIDEO_PLACEHOLDER_FILE);
    if stale.is_file() {
        if let Err(e) = std::fs::remove_file(&stale) {
            log::warn!("cannot remove stale {}: {}", stale.display(), e);
        }
    }
    VideoOutcome::Encoded(path)
}

/// Re-encode the raw frame as PNG; fall back to a byte copy if it cannot be decoded.
fn copy_as_png(source: &Path, dest: &Path) -> PipelineResult<()> {
    match image::open(source) {
        Ok(img) => img.save(dest)?,
        Err(_) => {
            std::fs::copy(source, dest)?;
        }
    }
    Ok(())
}
