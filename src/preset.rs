//! Quality presets.
//!
//! A preset picks model variants and generation budgets. Resolution is total:
//! any name that is not a known preset resolves to `fast`, so a typo in a long
//! batch run degrades quality instead of aborting.

use serde::Serialize;

/// Named quality/performance tradeoff level.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Preset {
    #[default]
    Fast,
    Balanced,
    Quality,
}

impl Preset {
    /// Case-insensitive lookup. Unknown or empty names map to `Fast`.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "balanced" => Preset::Balanced,
            "quality" => Preset::Quality,
            _ => Preset::Fast,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Preset::Fast => "fast",
            Preset::Balanced => "balanced",
            Preset::Quality => "quality",
        }
    }

    pub fn config(self) -> &'static PresetConfig {
        match self {
            Preset::Fast => &FAST,
            Preset::Balanced => &BALANCED,
            Preset::Quality => &QUALITY,
        }
    }
}

impl std::fmt::Display for Preset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Model and budget selection for one preset.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PresetConfig {
    pub preset: Preset,
    pub midas_model: &'static str,
    pub yolo_model: &'static str,
    pub sam_mode: &'static str,
    pub sd_resolution: (u32, u32),
    pub sd_steps: u32,
    /// Classifier-free guidance used unless the configuration sets one.
    pub guidance_scale: f64,
    pub guidance: &'static str,
}

impl PresetConfig {
    /// File stem of the detector weights (`yolov8n.pt` -> `yolov8n`).
    pub fn yolo_stem(&self) -> &'static str {
        self.yolo_model
            .rsplit_once('.')
            .map(|(stem, _)| stem)
            .unwrap_or(self.yolo_model)
    }
}

static FAST: PresetConfig = PresetConfig {
    preset: Preset::Fast,
    midas_model: "MiDaS_small",
    yolo_model: "yolov8n.pt",
    sam_mode: "box-only",
    sd_resolution: (512, 512),
    sd_steps: 20,
    guidance_scale: 7.5,
    guidance: "depth",
};

static BALANCED: PresetConfig = PresetConfig {
    preset: Preset::Balanced,
    midas_model: "DPT_Hybrid",
    yolo_model: "yolov8n.pt",
    sam_mode: "box+prompts",
    sd_resolution: (768, 768),
    sd_steps: 25,
    guidance_scale: 7.5,
    guidance: "keyframes",
};

static QUALITY: PresetConfig = PresetConfig {
    preset: Preset::Quality,
    midas_model: "DPT_Hybrid",
    yolo_model: "yolov8m.pt",
    sam_mode: "full",
    sd_resolution: (1024, 1024),
    sd_steps: 40,
    guidance_scale: 8.0,
    guidance: "depth+mask",
};

/// Resolve a preset name to its configuration. Never fails.
pub fn resolve(name: &str) -> &'static PresetConfig {
    Preset::from_name(name).config()
}
