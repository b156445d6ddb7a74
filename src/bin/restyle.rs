//! restyle - run the room restyle pipeline on an image or a video
//!
//! Outputs (under `--output`):
//! - `scene/frame_NNNN.json`, `scene/scene.json`
//! - `frames/frame_NNNN/` perception artifacts (and extracted frames in video mode)
//! - `frame_NNNN_styled.png` (+ `.placeholder` marker when generation was skipped)
//! - `final_video.mp4` or `video_placeholder.txt`
//! - `run.log`

use anyhow::{Context, Result};
use clap::Parser;
use std::io::IsTerminal;
use std::path::PathBuf;

use room_restyle::{logging, resolve, Orchestrator, PipelineConfig, RunMode, RunRequest};

#[path = "../ui.rs"]
mod ui;

#[derive(Parser, Debug)]
#[command(name = "restyle", about = "Restyle a room photo or video")]
struct Args {
    /// Input kind
    #[arg(long, value_enum, default_value_t = RunMode::Image)]
    mode: RunMode,

    /// Quality preset
    #[arg(long, default_value = "fast", value_parser = ["fast", "balanced", "quality"])]
    preset: String,

    /// Input image, video file, or stub:// source
    #[arg(short, long, value_name = "PATH")]
    input: PathBuf,

    /// Output directory
    #[arg(short, long, value_name = "DIR", default_value = "outputs/integration_test")]
    output: PathBuf,

    /// Frame sampling rate in video mode
    #[arg(long, default_value_t = 1.0)]
    fps: f64,

    /// Maximum number of frames extracted in video mode
    #[arg(long, default_value_t = 10)]
    max_frames: usize,

    /// Prompt strategy (defaults to the configured mode)
    #[arg(long, value_parser = ["auto_design", "generic", "prompt_based"])]
    prompt_mode: Option<String>,

    /// Style name for the generic prompt
    #[arg(long)]
    style: Option<String>,

    /// Prompt text for prompt_based mode
    #[arg(long)]
    prompt: Option<String>,

    /// UI mode for stderr progress
    #[arg(long, value_enum, default_value_t = ui::UiMode::Auto)]
    ui: ui::UiMode,
}

fn main() -> Result<()> {
    let args = Args::parse();
    logging::init();

    let mut config = PipelineConfig::load().context("failed to load pipeline configuration")?;
    if let Some(style) = &args.style {
        config.prompt.style = style.clone();
    }
    if let Some(text) = &args.prompt {
        config.prompt.text = Some(text.clone());
    }
    config.prompt.mode = match (&args.prompt_mode, &args.prompt, &args.style) {
        (Some(mode), _, _) => mode.clone(),
        (None, Some(_), _) => "prompt_based".to_string(),
        (None, None, Some(_)) => "generic".to_string(),
        (None, None, None) => config.prompt.mode,
    };

    let preset = resolve(&args.preset);
    let mut orchestrator = Orchestrator::from_config(&config, preset);
    let request = RunRequest {
        mode: args.mode,
        preset: args.preset.clone(),
        input: args.input.clone(),
        output_dir: args.output.clone(),
        sampling_fps: args.fps,
        max_frames: args.max_frames,
    };

    let ui = ui::Ui::new(args.ui, std::io::stderr().is_terminal());
    let mut observer = ui::UiObserver::new(ui);
    let summary = orchestrator
        .run_with(&request, &mut observer)
        .with_context(|| format!("pipeline run into {} failed", args.output.display()))?;
    observer.finish();

    println!("mode:      {}", summary.mode);
    println!("preset:    {}", summary.preset);
    println!(
        "frames:    {} perceived of {}",
        summary.frames_perceived, summary.frames_requested
    );
    println!(
        "styled:    {} ({} placeholders, {} errors)",
        summary.styled.len(),
        summary.placeholders,
        summary.generation_errors
    );
    for path in &summary.styled {
        println!("  {}", path.display());
    }
    println!("video:     {}", summary.video);
    println!("manifest:  {}", summary.manifest_path.display());
    println!("elapsed:   {:.2}s", summary.elapsed.as_secs_f64());
    Ok(())
}
