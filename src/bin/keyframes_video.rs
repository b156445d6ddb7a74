//! keyframes_video - build a cross-dissolve video from keyframe images

use anyhow::{anyhow, Result};
use clap::Parser;
use std::io::IsTerminal;
use std::path::PathBuf;

use room_restyle::video::{create_video_from_keyframes, default_encoder, make_video_from_keyframes};

#[path = "../ui.rs"]
#[allow(dead_code)]
mod ui;

#[derive(Parser, Debug)]
#[command(name = "keyframes_video", about = "Hold and cross-dissolve keyframes into a video")]
struct Args {
    /// Keyframe images, in order
    #[arg(required = true, value_name = "IMAGE")]
    keyframes: Vec<PathBuf>,

    /// Output video path
    #[arg(short, long, value_name = "PATH", default_value = "final_video.mp4")]
    output: PathBuf,

    #[arg(long, default_value_t = 24)]
    fps: u32,

    /// Dissolve length in frames
    #[arg(long, default_value_t = 6)]
    crossfade: u32,

    /// Frames each keyframe is held (defaults to max(6, 2 * crossfade))
    #[arg(long)]
    hold: Option<u32>,

    /// UI mode for stderr progress
    #[arg(long, value_enum, default_value_t = ui::UiMode::Auto)]
    ui: ui::UiMode,
}

fn main() -> Result<()> {
    let args = Args::parse();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    if args.fps == 0 {
        return Err(anyhow!("fps must be >= 1"));
    }

    let ui = ui::Ui::new(args.ui, std::io::stderr().is_terminal());
    let encoder = default_encoder();
    let result = {
        let _stage = ui.stage("Assemble video");
        match args.hold {
            Some(hold) => create_video_from_keyframes(
                encoder.as_ref(),
                &args.keyframes,
                &args.output,
                args.fps,
                args.crossfade,
                hold,
            ),
            None => make_video_from_keyframes(
                encoder.as_ref(),
                &args.keyframes,
                &args.output,
                args.fps,
                args.crossfade,
            ),
        }
    };

    match result.map_err(|e| anyhow!("video encoding failed: {}", e))? {
        Some(path) => {
            println!("{}", path.display());
            Ok(())
        }
        None => Err(anyhow!("no readable keyframes; video not written")),
    }
}
