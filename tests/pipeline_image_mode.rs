use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use image::{Rgb, RgbImage};

use room_restyle::config::VideoSettings;
use room_restyle::generation::{PromptSettings, UnavailableDiffusion};
use room_restyle::placeholder::{PlaceholderMarker, VIDEO_PLACEHOLDER_FILE};
use room_restyle::validate::validate_outputs;
use room_restyle::video::{FrameSink, MemoryEncoder, UnavailableEncoder, VideoEncoder};
use room_restyle::{
    resolve, GenerationAdapter, Orchestrator, PerceptionAdapter, PerceptionRunners,
    PipelineConfig, RunMode, RunRequest, RunnerError, SceneManifest, VideoOutcome,
};

const VIDEO: VideoSettings = VideoSettings {
    fps: 24,
    hold_frames: 24,
    transition_frames: 12,
};

fn orchestrator(encoder: Box<dyn VideoEncoder>) -> Orchestrator {
    Orchestrator::new(
        PerceptionAdapter::new(PerceptionRunners::unavailable("models not installed")),
        GenerationAdapter::new(
            Box::new(UnavailableDiffusion::new("no diffusion command configured")),
            PromptSettings::default(),
            None,
            0.7,
        ),
        encoder,
        VIDEO,
    )
}

fn room_image(dir: &Path) -> PathBuf {
    let path = dir.join("living_room.png");
    RgbImage::from_fn(64, 48, |x, y| Rgb([(x * 4) as u8, (y * 5) as u8, 90]))
        .save(&path)
        .unwrap();
    path
}

fn image_request(input: PathBuf, output: PathBuf) -> RunRequest {
    RunRequest {
        mode: RunMode::Image,
        preset: "fast".into(),
        input,
        output_dir: output,
        sampling_fps: 1.0,
        max_frames: 10,
    }
}

#[test]
fn degraded_image_run_produces_documented_outputs() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out");
    let request = image_request(room_image(dir.path()), out.clone());

    let summary = orchestrator(Box::new(UnavailableEncoder::new("no encoder")))
        .run(&request)
        .unwrap();
    assert_eq!(summary.frames_requested, 1);
    assert_eq!(summary.frames_perceived, 1);
    assert_eq!(summary.placeholders, 1);

    let manifest = SceneManifest::load(&out.join("scene").join("frame_0001.json")).unwrap();
    assert_eq!(manifest.mode, RunMode::Image);
    assert_eq!(manifest.preset, "fast");
    assert!(manifest.frames[0].is_placeholder());
    assert!(out
        .join("frames")
        .join("frame_0001")
        .join(&manifest.frames[0].depth_path)
        .is_file());

    let styled = out.join("frame_0001_styled.png");
    assert!(std::fs::metadata(&styled).unwrap().len() > 100);
    let marker: PlaceholderMarker = serde_json::from_str(
        &std::fs::read_to_string(out.join("frame_0001_styled.placeholder")).unwrap(),
    )
    .unwrap();
    assert_eq!(marker.skipped, "generation");
    assert_eq!((marker.width, marker.height), (512, 512));

    assert!(matches!(summary.video, VideoOutcome::Placeholder { .. }));
    assert!(out.join(VIDEO_PLACEHOLDER_FILE).is_file());
    assert!(out.join("run.log").is_file());

    let combined = SceneManifest::load(&out.join("scene").join("scene.json")).unwrap();
    assert_eq!(combined.frames.len(), 1);
    assert!(validate_outputs(&out).is_empty());
}

#[test]
fn rerun_overwrites_with_identical_artifacts() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out");
    let request = image_request(room_image(dir.path()), out.clone());
    let files = [
        "frame_0001_styled.png",
        "frame_0001_styled.placeholder",
        "scene/scene.json",
        "scene/frame_0001.json",
    ];

    orchestrator(Box::new(UnavailableEncoder::new("no encoder")))
        .run(&request)
        .unwrap();
    let first: Vec<Vec<u8>> = files
        .iter()
        .map(|f| std::fs::read(out.join(f)).unwrap())
        .collect();

    orchestrator(Box::new(UnavailableEncoder::new("no encoder")))
        .run(&request)
        .unwrap();
    for (name, before) in files.iter().zip(first) {
        assert_eq!(std::fs::read(out.join(name)).unwrap(), before, "{}", name);
    }
}

#[test]
fn default_configuration_completes_degraded() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out");
    let request = image_request(room_image(dir.path()), out.clone());

    let mut config = PipelineConfig::default();
    config.models_dir = dir.path().join("no_models_here");
    Orchestrator::from_config(&config, resolve("fast"))
        .run(&request)
        .unwrap();
    assert_eq!(validate_outputs(&out), Vec::<String>::new());
}

#[test]
fn unreadable_input_is_skipped_but_manifest_written() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out");
    let bogus = dir.path().join("room.jpg");
    std::fs::write(&bogus, b"definitely not a jpeg").unwrap();

    let summary = orchestrator(Box::new(MemoryEncoder::new()))
        .run(&image_request(bogus, out.clone()))
        .unwrap();
    assert_eq!(summary.frames_perceived, 0);
    assert!(summary.styled.is_empty());
    assert!(!out.join("scene").join("frame_0001.json").exists());

    let combined = SceneManifest::load(&out.join("scene").join("scene.json")).unwrap();
    assert!(combined.frames.is_empty());
    match summary.video {
        VideoOutcome::Placeholder { reason, .. } => assert_eq!(reason, "no styled frames"),
        other => panic!("unexpected video outcome {:?}", other),
    }
}

#[test]
fn generation_error_substitutes_raw_frame() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out");
    // a directory in the way makes the placeholder write fail
    std::fs::create_dir_all(out.join("frame_0001_styled.png")).unwrap();
    let encoder = MemoryEncoder::new();

    let summary = orchestrator(Box::new(encoder.clone()))
        .run(&image_request(room_image(dir.path()), out.clone()))
        .unwrap();
    assert_eq!(summary.generation_errors, 1);
    let error_copy = out.join("frame_0001_styled_error.png");
    assert_eq!(summary.styled, vec![error_copy.clone()]);
    assert_eq!(image::open(&error_copy).unwrap().width(), 64);

    // the substitute still becomes a keyframe
    let videos = encoder.videos();
    assert_eq!(videos.len(), 1);
    assert_eq!(videos[0].frames.len(), VIDEO.hold_frames as usize);
    assert_eq!(summary.video, VideoOutcome::Encoded(out.join("final_video.mp4")));
}

#[test]
fn unwritable_frame_manifest_does_not_end_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out");
    std::fs::create_dir_all(out.join("scene").join("frame_0001.json")).unwrap();

    let summary = orchestrator(Box::new(UnavailableEncoder::new("no encoder")))
        .run(&image_request(room_image(dir.path()), out.clone()))
        .unwrap();
    assert_eq!(summary.frames_perceived, 1);
    assert!(out.join("frame_0001_styled.png").is_file());
    assert!(out.join(VIDEO_PLACEHOLDER_FILE).is_file());

    let combined = SceneManifest::load(&out.join("scene").join("scene.json")).unwrap();
    assert_eq!(combined.frames.len(), 1);
}

#[test]
fn encoded_video_replaces_stale_placeholder() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out");
    let request = image_request(room_image(dir.path()), out.clone());

    orchestrator(Box::new(UnavailableEncoder::new("no encoder")))
        .run(&request)
        .unwrap();
    assert!(out.join(VIDEO_PLACEHOLDER_FILE).is_file());

    let encoder = MemoryEncoder::new();
    let summary = orchestrator(Box::new(encoder.clone()))
        .run(&request)
        .unwrap();
    assert!(matches!(summary.video, VideoOutcome::Encoded(_)));
    assert!(!out.join(VIDEO_PLACEHOLDER_FILE).exists());
    assert_eq!(encoder.videos()[0].frames[0].dimensions(), (512, 512));
}

/// Fails the first open at runtime, then records like `MemoryEncoder`.
struct FlakyEncoder {
    opens: AtomicUsize,
    inner: MemoryEncoder,
}

impl VideoEncoder for FlakyEncoder {
    fn name(&self) -> &'static str {
        "flaky"
    }

    fn open(
        &self,
        path: &Path,
        fps: u32,
        width: u32,
        height: u32,
    ) -> Result<Box<dyn FrameSink>, RunnerError> {
        if self.opens.fetch_add(1, Ordering::SeqCst) == 0 {
            return Err(RunnerError::failed("encoder crashed"));
        }
        self.inner.open(path, fps, width, height)
    }
}

#[test]
fn failed_primary_assembly_retries_through_adapter() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out");
    let inner = MemoryEncoder::new();
    let encoder = FlakyEncoder {
        opens: AtomicUsize::new(0),
        inner: inner.clone(),
    };

    let summary = orchestrator(Box::new(encoder))
        .run(&image_request(room_image(dir.path()), out.clone()))
        .unwrap();
    assert!(matches!(summary.video, VideoOutcome::Encoded(_)));
    assert_eq!(inner.videos().len(), 1);
    assert!(!out.join(VIDEO_PLACEHOLDER_FILE).exists());
}
