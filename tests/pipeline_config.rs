use std::path::PathBuf;
use std::sync::Mutex;

use room_restyle::PipelineConfig;

static ENV_LOCK: Mutex<()> = Mutex::new(());

const VARS: [&str; 7] = [
    "ROOMSTYLE_CONFIG",
    "ROOMSTYLE_MODELS_DIR",
    "ROOMSTYLE_DIFFUSION_CMD",
    "ROOMSTYLE_PROMPT_MODE",
    "ROOMSTYLE_STYLE",
    "ROOMSTYLE_PROMPT",
    "ROOMSTYLE_VIDEO_FPS",
];

fn clear_env() {
    for var in VARS {
        std::env::remove_var(var);
    }
}

#[test]
fn json_file_then_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    clear_env();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("restyle.json");
    std::fs::write(
        &path,
        r#"{
            "models_dir": "/opt/models",
            "diffusion": { "command": "sd-depth", "strength": 0.5 },
            "video": { "fps": 30 },
            "prompt": { "style": "rustic" }
        }"#,
    )
    .unwrap();
    std::env::set_var("ROOMSTYLE_CONFIG", &path);
    std::env::set_var("ROOMSTYLE_STYLE", "scandinavian");
    std::env::set_var("ROOMSTYLE_VIDEO_FPS", "12");

    let cfg = PipelineConfig::load().unwrap();
    clear_env();

    assert_eq!(cfg.models_dir, PathBuf::from("/opt/models"));
    assert_eq!(cfg.diffusion.command.as_deref(), Some("sd-depth"));
    assert_eq!(cfg.diffusion.strength, 0.5);
    assert_eq!(cfg.diffusion.guidance_scale, None);
    assert_eq!(cfg.video.fps, 12);
    assert_eq!(cfg.video.hold_frames, 24);
    assert_eq!(cfg.prompt.style, "scandinavian");
    assert_eq!(cfg.prompt.mode, "auto_design");
}

#[test]
fn toml_file_is_accepted() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    clear_env();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("restyle.toml");
    std::fs::write(
        &path,
        "[prompt]\nmode = \"prompt_based\"\ntext = \"warm wooden loft\"\n\n[video]\ntransition_frames = 8\n",
    )
    .unwrap();
    std::env::set_var("ROOMSTYLE_CONFIG", &path);

    let cfg = PipelineConfig::load().unwrap();
    clear_env();

    assert_eq!(cfg.prompt.mode, "prompt_based");
    assert_eq!(cfg.prompt.text.as_deref(), Some("warm wooden loft"));
    assert_eq!(cfg.video.transition_frames, 8);
    assert_eq!(cfg.models_dir, PathBuf::from("models"));
}

#[test]
fn environment_alone_without_file() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    clear_env();
    std::env::set_var("ROOMSTYLE_MODELS_DIR", "/srv/weights");
    std::env::set_var("ROOMSTYLE_DIFFUSION_CMD", "   ");

    let cfg = PipelineConfig::load().unwrap();
    clear_env();

    assert_eq!(cfg.models_dir, PathBuf::from("/srv/weights"));
    assert_eq!(cfg.diffusion.command, None);
}

#[test]
fn non_numeric_fps_is_rejected() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    clear_env();
    std::env::set_var("ROOMSTYLE_VIDEO_FPS", "fast");

    let err = PipelineConfig::load().unwrap_err();
    clear_env();

    assert!(err.to_string().contains("ROOMSTYLE_VIDEO_FPS"));
}

#[test]
fn invalid_file_values_are_rejected() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    clear_env();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("restyle.json");
    std::fs::write(&path, r#"{ "diffusion": { "strength": 1.5 } }"#).unwrap();
    std::env::set_var("ROOMSTYLE_CONFIG", &path);
    assert!(PipelineConfig::load().is_err());

    std::fs::write(&path, r#"{ "colour": "teal" }"#).unwrap();
    assert!(PipelineConfig::load().is_err());
    clear_env();
}
