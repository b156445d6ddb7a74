//! Redesign prompt synthesis.
//!
//! Three strategies, selected by name:
//! - `generic`: a style name dropped into a fixed template.
//! - `prompt_based`: user text, sanitized, with a photorealism suffix.
//! - `auto_design`: room type, tone and style derived from a prompt scene document.
//!
//! Nothing here fails. An unknown mode or an unreadable scene document yields
//! [`default_prompt`].

use std::path::Path;

use crate::scene::PromptScene;

pub const SAFETY_SUFFIX: &str =
    "high detail, photorealistic, interior design, architectural visualization";

pub const RECOMMENDED_STYLES: [&str; 3] = ["modern", "minimal", "luxury"];

const LIVING_ROOM_LABELS: [&str; 4] = ["sofa", "couch", "tv", "coffee table"];
const BEDROOM_LABELS: [&str; 2] = ["bed", "nightstand"];
const DINING_ROOM_LABELS: [&str; 2] = ["dining table", "chair"];
const KITCHEN_LABELS: [&str; 3] = ["stove", "fridge", "counter"];

/// Prompt strategy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PromptMode {
    Generic,
    PromptBased,
    AutoDesign,
}

impl PromptMode {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "generic" => Some(PromptMode::Generic),
            "prompt_based" => Some(PromptMode::PromptBased),
            "auto_design" => Some(PromptMode::AutoDesign),
            _ => None,
        }
    }
}

/// Inputs for the prompt strategies. Each mode reads only its own field.
#[derive(Clone, Copy, Debug, Default)]
pub struct PromptParams<'a> {
    pub style: Option<&'a str>,
    pub user_input: Option<&'a str>,
    pub scene_json: Option<&'a Path>,
}

pub fn default_prompt() -> String {
    format!("professional interior design, {}", SAFETY_SUFFIX)
}

/// Build the prompt for `mode`.
pub fn prompt(mode: &str, params: &PromptParams<'_>) -> String {
    match PromptMode::parse(mode) {
        Some(PromptMode::Generic) => generic(params.style.unwrap_or("modern")),
        Some(PromptMode::PromptBased) => prompt_based(params.user_input.unwrap_or("")),
        Some(PromptMode::AutoDesign) => match params.scene_json {
            Some(path) => auto_design(path),
            None => {
                log::error!("auto_design prompt requested without a scene document");
                default_prompt()
            }
        },
        None => {
            log::error!("unknown prompt mode: {}", mode);
            default_prompt()
        }
    }
}

pub fn generic(style: &str) -> String {
    if !RECOMMENDED_STYLES.contains(&style.to_lowercase().as_str()) {
        log::warn!(
            "style '{}' not in recommended list {:?}; proceeding anyway",
            style,
            RECOMMENDED_STYLES
        );
    }
    let prompt = format!(
        "Redesign this room in a {} interior style with improved lighting, cohesive materials, realistic textures, and professional architectural photography.",
        style
    );
    log::info!("generic prompt: {}", prompt);
    prompt
}

pub fn prompt_based(user_input: &str) -> String {
    let prompt = format!("{}, {}", sanitize(user_input), SAFETY_SUFFIX);
    log::info!("prompt-based prompt: {}", prompt);
    prompt
}

fn sanitize(text: &str) -> String {
    let mut out = text.trim().replace("\r\n", " ").replace(['\n', '\r'], " ");
    while out.contains("  ") {
        out = out.replace("  ", " ");
    }
    out
}

/// Auto-design from a scene document on disk. A document that cannot be read or parsed
/// yields the default prompt.
pub fn auto_design(scene_json: &Path) -> String {
    let raw = match std::fs::read_to_string(scene_json) {
        Ok(raw) => raw,
        Err(e) => {
            log::error!("failed to read scene document {}: {}", scene_json.display(), e);
            return default_prompt();
        }
    };
    match serde_json::from_str::<PromptScene>(&raw) {
        Ok(scene) => auto_design_scene(&scene),
        Err(e) => {
            log::error!("failed to parse scene document {}: {}", scene_json.display(), e);
            default_prompt()
        }
    }
}

pub fn auto_design_scene(scene: &PromptScene) -> String {
    let labels: Vec<String> = scene
        .objects
        .iter()
        .map(|o| o.label.to_lowercase())
        .collect();
    let has_any = |group: &[&str]| labels.iter().any(|l| group.contains(&l.as_str()));

    let room_type = if has_any(&LIVING_ROOM_LABELS) {
        "living room"
    } else if has_any(&BEDROOM_LABELS) {
        "bedroom"
    } else if has_any(&DINING_ROOM_LABELS) {
        "dining room"
    } else if has_any(&KITCHEN_LABELS) {
        "kitchen"
    } else {
        "room"
    };

    let tone = if scene.brightness_metadata.is_dark {
        "bright, "
    } else {
        ""
    };

    let variance = scene.depth_summary.variance;
    let style = if variance > 1.5 {
        "spacious modern"
    } else if variance < 0.5 {
        "cozy minimal"
    } else {
        "modern"
    };

    let prompt = format!(
        "Design a {}{} {} with neutral tones, improved lighting, balanced furniture placement, and natural materials.",
        tone, style, room_type
    );
    log::info!("auto-design prompt: {}", prompt);
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{BrightnessMetadata, DepthSummary, SceneObject};

    fn scene(labels: &[&str], is_dark: bool, variance: f64) -> PromptScene {
        PromptScene {
            objects: labels
                .iter()
                .map(|l| SceneObject {
                    label: l.to_string(),
                    ..SceneObject::default()
                })
                .collect(),
            brightness_metadata: BrightnessMetadata {
                is_dark,
                average_brightness: 0.0,
            },
            depth_summary: DepthSummary {
                variance,
                ..DepthSummary::default()
            },
        }
    }

    #[test]
    fn generic_accepts_any_style() {
        assert!(generic("luxury").contains("in a luxury interior style"));
        assert!(generic("steampunk").contains("steampunk"));
    }

    #[test]
    fn prompt_based_sanitizes_and_appends_suffix() {
        let p = prompt_based("  cyberpunk\nstyle   with  neon \n");
        assert_eq!(p, format!("cyberpunk style with neon, {}", SAFETY_SUFFIX));
    }

    #[test]
    fn auto_design_dark_living_room() {
        let p = auto_design_scene(&scene(&["sofa"], true, 1.0));
        assert!(p.contains("bright, modern living room"), "{}", p);
    }

    #[test]
    fn room_type_priority_order() {
        assert!(auto_design_scene(&scene(&["bed", "TV"], false, 1.0)).contains("living room"));
        assert!(auto_design_scene(&scene(&["chair", "nightstand"], false, 1.0)).contains("bedroom"));
        assert!(auto_design_scene(&scene(&["stove", "chair"], false, 1.0)).contains("dining room"));
        assert!(auto_design_scene(&scene(&["fridge"], false, 1.0)).contains("modern kitchen"));
        assert!(auto_design_scene(&scene(&["person"], false, 1.0)).contains("modern room"));
    }

    #[test]
    fn variance_picks_style() {
        assert!(auto_design_scene(&scene(&[], false, 2.0)).contains("a spacious modern room"));
        assert!(auto_design_scene(&scene(&[], false, 0.1)).contains("a cozy minimal room"));
        assert!(auto_design_scene(&scene(&[], false, 1.5)).contains("a modern room"));
        assert!(auto_design_scene(&scene(&[], false, 0.5)).contains("a modern room"));
    }

    #[test]
    fn auto_design_reads_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scene.json");
        std::fs::write(
            &path,
            r#"{"objects":[{"label":"sofa"}],"brightness_metadata":{"is_dark":true},"depth_summary":{"variance":1.0}}"#,
        )
        .unwrap();
        let p = prompt(
            "auto_design",
            &PromptParams {
                scene_json: Some(&path),
                ..PromptParams::default()
            },
        );
        assert!(p.contains("bright, modern living room"));
    }

    #[test]
    fn unreadable_document_yields_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{not json").unwrap();
        assert_eq!(auto_design(&path), default_prompt());
        assert_eq!(auto_design(&dir.path().join("missing.json")), default_prompt());
    }

    #[test]
    fn unknown_mode_yields_default() {
        assert_eq!(prompt("freestyle", &PromptParams::default()), default_prompt());
        assert_eq!(prompt("auto_design", &PromptParams::default()), default_prompt());
    }
}
