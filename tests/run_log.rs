use image::{Rgb, RgbImage};

use room_restyle::{logging, resolve, Orchestrator, PipelineConfig, RunMode, RunRequest};

fn messages(log: &str, level: &str) -> Vec<String> {
    let marker = format!(" - {} - ", level);
    log.lines()
        .filter_map(|line| line.split_once(marker.as_str()).map(|(_, m)| m.to_string()))
        .collect()
}

#[test]
fn run_log_records_startup_dependency_warnings() {
    logging::init();
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("room.png");
    RgbImage::from_pixel(32, 24, Rgb([120, 110, 100]))
        .save(&input)
        .unwrap();
    let out = dir.path().join("out");

    let mut config = PipelineConfig::default();
    config.models_dir = dir.path().join("no_models_here");
    Orchestrator::from_config(&config, resolve("fast"))
        .run(&RunRequest {
            mode: RunMode::Image,
            preset: "fast".into(),
            input,
            output_dir: out.clone(),
            sampling_fps: 1.0,
            max_frames: 1,
        })
        .unwrap();

    let text = std::fs::read_to_string(out.join("run.log")).unwrap();
    let warnings = messages(&text, "WARN");
    assert!(
        warnings
            .iter()
            .any(|m| m == "generation unavailable: no diffusion command configured"),
        "{}",
        text
    );
    assert!(
        warnings
            .iter()
            .any(|m| m.starts_with("depth estimation unavailable: ")),
        "{}",
        text
    );
}
