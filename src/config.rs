use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::generation::PromptSettings;

const DEFAULT_MODELS_DIR: &str = "models";
const DEFAULT_STRENGTH: f64 = 0.7;
const DEFAULT_VIDEO_FPS: u32 = 24;
const DEFAULT_HOLD_FRAMES: u32 = 24;
const DEFAULT_TRANSITION_FRAMES: u32 = 12;
const DEFAULT_PROMPT_MODE: &str = "auto_design";
const DEFAULT_STYLE: &str = "modern";

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct PipelineConfigFile {
    models_dir: Option<PathBuf>,
    diffusion: Option<DiffusionConfigFile>,
    video: Option<VideoConfigFile>,
    prompt: Option<PromptConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct DiffusionConfigFile {
    command: Option<String>,
    guidance_scale: Option<f64>,
    strength: Option<f64>,
}

#[derive(Debug, Deserialize, Default)]
struct VideoConfigFile {
    fps: Option<u32>,
    hold_frames: Option<u32>,
    transition_frames: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct PromptConfigFile {
    mode: Option<String>,
    style: Option<String>,
    text: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub models_dir: PathBuf,
    pub diffusion: DiffusionSettings,
    pub video: VideoSettings,
    pub prompt: PromptSettings,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DiffusionSettings {
    pub command: Option<String>,
    /// Overrides the preset's guidance scale when set.
    pub guidance_scale: Option<f64>,
    pub strength: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoSettings {
    pub fps: u32,
    pub hold_frames: u32,
    pub transition_frames: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::from_file(PipelineConfigFile::default())
    }
}

impl PipelineConfig {
    /// File named by `ROOMSTYLE_CONFIG` (if any), then `ROOMSTYLE_*` overrides, then validation.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("ROOMSTYLE_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) if !path.trim().is_empty() => Some(read_config_file(Path::new(path))?),
            _ => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: PipelineConfigFile) -> Self {
        let diffusion = file.diffusion.unwrap_or_default();
        let video = file.video.unwrap_or_default();
        let prompt = file.prompt.unwrap_or_default();
        Self {
            models_dir: file
                .models_dir
                .unwrap_or_else(|| PathBuf::from(DEFAULT_MODELS_DIR)),
            diffusion: DiffusionSettings {
                command: diffusion.command.filter(|c| !c.trim().is_empty()),
                guidance_scale: diffusion.guidance_scale,
                strength: diffusion.strength.unwrap_or(DEFAULT_STRENGTH),
            },
            video: VideoSettings {
                fps: video.fps.unwrap_or(DEFAULT_VIDEO_FPS),
                hold_frames: video.hold_frames.unwrap_or(DEFAULT_HOLD_FRAMES),
                transition_frames: video.transition_frames.unwrap_or(DEFAULT_TRANSITION_FRAMES),
            },
            prompt: PromptSettings {
                mode: prompt
                    .mode
                    .unwrap_or_else(|| DEFAULT_PROMPT_MODE.to_string()),
                style: prompt.style.unwrap_or_else(|| DEFAULT_STYLE.to_string()),
                text: prompt.text,
            },
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Some(dir) = non_empty_var("ROOMSTYLE_MODELS_DIR") {
            self.models_dir = PathBuf::from(dir);
        }
        if let Some(command) = non_empty_var("ROOMSTYLE_DIFFUSION_CMD") {
            self.diffusion.command = Some(command);
        }
        if let Some(mode) = non_empty_var("ROOMSTYLE_PROMPT_MODE") {
            self.prompt.mode = mode;
        }
        if let Some(style) = non_empty_var("ROOMSTYLE_STYLE") {
            self.prompt.style = style;
        }
        if let Some(text) = non_empty_var("ROOMSTYLE_PROMPT") {
            self.prompt.text = Some(text);
        }
        if let Some(fps) = non_empty_var("ROOMSTYLE_VIDEO_FPS") {
            self.video.fps = fps
                .trim()
                .parse()
                .map_err(|_| anyhow!("ROOMSTYLE_VIDEO_FPS must be an integer frame rate"))?;
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.video.fps == 0 {
            return Err(anyhow!("video fps must be at least 1"));
        }
        if self.diffusion.guidance_scale.is_some_and(|g| !g.is_finite()) {
            return Err(anyhow!("diffusion guidance_scale must be finite"));
        }
        let strength = self.diffusion.strength;
        if !strength.is_finite() || strength <= 0.0 || strength > 1.0 {
            return Err(anyhow!(
                "diffusion strength must be in (0, 1], got {}",
                strength
            ));
        }
        Ok(())
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn read_config_file(path: &Path) -> Result<PipelineConfigFile> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    let is_toml = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    let cfg = if is_toml {
        toml::from_str(&raw).map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}
